//! User models and password hashing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
#[cfg(feature = "utoipa")]
use crate::utoipa::ToSchema;

/// Users younger than this cannot register
pub const MINIMUM_AGE: u32 = 18;

/// bcrypt work factor for stored passwords
const HASH_COST: u32 = 10;

/// Registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct User {
    /// Unique user ID
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub email: String,
    /// bcrypt password hash
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub age: u32,
    pub country: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct NewUser {
    pub name: String,
    pub address: String,
    pub email: String,
    pub password: String,
    pub age: u32,
    pub country: String,
    pub state: String,
}

impl NewUser {
    /// Validate the registration and build the user with a hashed password
    pub fn into_user(self, now: DateTime<Utc>) -> Result<User> {
        let required = [
            ("name", &self.name),
            ("address", &self.address),
            ("email", &self.email),
            ("password", &self.password),
            ("country", &self.country),
            ("state", &self.state),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(Error::ValidationError(format!("{} is required", field)));
        }

        if self.age < MINIMUM_AGE {
            return Err(Error::ValidationError(format!(
                "You must be at least {} years old to open an account",
                MINIMUM_AGE
            )));
        }

        Ok(User {
            id: Uuid::new_v4(),
            name: self.name,
            address: self.address,
            email: self.email.trim().to_lowercase(),
            password_hash: hash_password(&self.password)?,
            age: self.age,
            country: self.country,
            state: self.state,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update of a user's profile; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct UserUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub age: Option<u32>,
    pub country: Option<String>,
    pub state: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.address.is_none()
            && self.age.is_none()
            && self.country.is_none()
            && self.state.is_none()
    }

    /// Apply the present fields to `user`
    pub fn apply(&self, user: &mut User, now: DateTime<Utc>) -> Result<()> {
        if self.is_empty() {
            return Err(Error::ValidationError("There are no fields to update".to_string()));
        }
        if let Some(age) = self.age {
            if age < MINIMUM_AGE {
                return Err(Error::ValidationError(format!("age must be at least {}", MINIMUM_AGE)));
            }
            user.age = age;
        }
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(address) = &self.address {
            user.address = address.clone();
        }
        if let Some(country) = &self.country {
            user.country = country.clone();
        }
        if let Some(state) = &self.state {
            user.state = state.clone();
        }
        user.updated_at = now;
        Ok(())
    }
}

/// Login payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Hash a password with bcrypt and a fresh random salt
pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, HASH_COST)
        .map_err(|e| Error::Internal(format!("password hashing failed: {}", e)))
}

/// Check a candidate password against a stored bcrypt hash; malformed hashes never match
pub fn verify_password(password: &str, stored: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(age: u32) -> NewUser {
        NewUser {
            name: "Ada".into(),
            address: "1 Main St".into(),
            email: "Ada@Example.com".into(),
            password: "s3cret".into(),
            age,
            country: "GE".into(),
            state: "Tbilisi".into(),
        }
    }

    #[test]
    fn test_password_round_trip() {
        let stored = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &stored));
        assert!(!verify_password("hunter3", &stored));
        assert!(!verify_password("hunter2", "garbage"));
    }

    #[test]
    fn test_hashes_are_salted() {
        let first = hash_password("same").unwrap();
        let second = hash_password("same").unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with("$2b$10$"));
        assert!(verify_password("same", &second));
    }

    #[test]
    fn test_registration_rules() {
        let user = registration(30).into_user(Utc::now()).unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert!(verify_password("s3cret", &user.password_hash));

        assert!(matches!(registration(17).into_user(Utc::now()), Err(Error::ValidationError(_))));

        let mut missing = registration(30);
        missing.address = " ".into();
        assert!(matches!(missing.into_user(Utc::now()), Err(Error::ValidationError(_))));
    }

    #[test]
    fn test_partial_update() {
        let mut user = registration(30).into_user(Utc::now()).unwrap();
        let update = UserUpdate { country: Some("DE".into()), ..Default::default() };
        update.apply(&mut user, Utc::now()).unwrap();

        assert_eq!(user.country, "DE");
        assert_eq!(user.name, "Ada");
        assert!(UserUpdate::default().apply(&mut user, Utc::now()).is_err());
    }

    #[test]
    fn test_password_hash_is_not_serialized() {
        let user = registration(30).into_user(Utc::now()).unwrap();
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
    }
}
