use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::decimal::Amount;
use crate::error::{Error, Result};
use crate::model::card::Card;
use crate::model::transaction::TransactionRecord;
use crate::model::user::User;

/// Database model for the cards table
///
/// `balance` is selected as `balance::text` and parsed, so no driver-side
/// decimal support is needed.
#[derive(Debug, Clone, FromRow)]
pub struct DbCard {
    pub number: String,
    pub owner_id: Uuid,
    pub security_code: String,
    pub network: String,
    pub expiration_date: NaiveDate,
    pub balance: String,
    pub transaction_history: Json<Vec<TransactionRecord>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbCard> for Card {
    type Error = Error;

    fn try_from(row: DbCard) -> Result<Self> {
        let balance = row.balance.parse::<Amount>()
            .map_err(|e| Error::Internal(format!("Invalid balance format for card {}: {}", row.number, e)))?;
        let version = u64::try_from(row.version)
            .map_err(|_| Error::Internal(format!("Negative version for card {}", row.number)))?;

        Ok(Card {
            network: row.network.parse()?,
            number: row.number,
            owner: row.owner_id,
            security_code: row.security_code,
            expiration_date: row.expiration_date,
            balance,
            transaction_history: row.transaction_history.0,
            version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Database model for the users table
#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub email: String,
    pub password_hash: String,
    pub age: i32,
    pub country: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbUser> for User {
    fn from(row: DbUser) -> Self {
        User {
            id: row.id,
            name: row.name,
            address: row.address,
            email: row.email,
            password_hash: row.password_hash,
            age: row.age.max(0) as u32,
            country: row.country,
            state: row.state,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
