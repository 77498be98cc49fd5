//! Repository for registered users

use async_trait::async_trait;
use common::db::DbUser;
use common::error::{Error, Result};
use common::model::user::User;
use dashmap::DashMap;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

/// User repository trait defining the interface for user data storage
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Store a new user; fails with `UserAlreadyExists` if the email is taken
    async fn create_user(&self, user: User) -> Result<User>;

    /// Get a user by ID
    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;

    /// Get a user by (normalized) email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Replace a stored user's profile
    async fn save_user(&self, user: User) -> Result<User>;
}

/// In-memory repository for user data
#[derive(Default)]
pub struct InMemoryUserRepository {
    /// Users by ID
    pub users: DashMap<Uuid, User>,
    /// User IDs by email
    emails: DashMap<String, Uuid>,
}

impl InMemoryUserRepository {
    /// Create a new in-memory user repository
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create_user(&self, user: User) -> Result<User> {
        match self.emails.entry(user.email.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(Error::UserAlreadyExists(user.email)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(user.id);
                self.users.insert(user.id, user.clone());
                Ok(user)
            }
        }
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let id = match self.emails.get(email) {
            Some(id) => *id,
            None => return Ok(None),
        };
        self.get_user(id).await
    }

    async fn save_user(&self, user: User) -> Result<User> {
        if !self.users.contains_key(&user.id) {
            return Err(Error::UserNotFound(user.id.to_string()));
        }
        self.users.insert(user.id, user.clone());
        Ok(user)
    }
}

/// PostgreSQL repository for user data
pub struct PostgresUserRepository {
    /// Database connection pool
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Create a repository over an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_USER: &str = "SELECT id, name, address, email, password_hash, age, country, state, \
     created_at, updated_at FROM users";

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create_user(&self, user: User) -> Result<User> {
        debug!("Creating user in database: {}", user.id);

        let result = sqlx::query(
            "INSERT INTO users
                (id, name, address, email, password_hash, age, country, state, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.address)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.age as i32)
        .bind(&user.country)
        .bind(&user.state)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(Error::UserAlreadyExists(user.email)),
            Err(e) => Err(Error::Database(e)),
        }
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, DbUser>(&format!("{} WHERE id = $1", SELECT_USER))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, DbUser>(&format!("{} WHERE email = $1", SELECT_USER))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(User::from))
    }

    async fn save_user(&self, user: User) -> Result<User> {
        let result = sqlx::query(
            "UPDATE users
             SET name = $2, address = $3, age = $4, country = $5, state = $6, updated_at = $7
             WHERE id = $1"
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.address)
        .bind(user.age as i32)
        .bind(&user.country)
        .bind(&user.state)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::UserNotFound(user.id.to_string()));
        }
        Ok(user)
    }
}
