use std::time::Duration;

use async_trait::async_trait;
use common::db::DbCard;
use common::error::{Error, Result};
use common::model::card::Card;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, error};

use super::{order_updates, prepare_write, CardChange, CardMutator, CardStore};

const SELECT_CARD: &str = "SELECT number, owner_id, security_code, network, expiration_date, \
     balance::text AS balance, transaction_history, version, created_at, updated_at \
     FROM cards";

/// PostgreSQL card store
///
/// Multi-card updates run in one SQL transaction with the affected rows locked
/// `FOR UPDATE` in ascending card-number order.
pub struct PostgresCardStore {
    /// Database connection pool
    pool: PgPool,
    /// Upper bound for each statement
    statement_timeout: Duration,
}

impl PostgresCardStore {
    /// Create a store over an existing pool
    pub fn new(pool: PgPool, statement_timeout: Duration) -> Self {
        Self { pool, statement_timeout }
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        // SET does not accept bind parameters; the value is an integer we format ourselves.
        let statement = format!("SET LOCAL statement_timeout = {}", self.statement_timeout.as_millis());
        sqlx::query(&statement)
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;

        Ok(tx)
    }

    async fn lock_card(tx: &mut Transaction<'static, Postgres>, number: &str) -> Result<Card> {
        let row = sqlx::query_as::<_, DbCard>(&format!("{} WHERE number = $1 FOR UPDATE", SELECT_CARD))
            .bind(number)
            .fetch_optional(&mut **tx)
            .await
            .map_err(unavailable)?;

        match row {
            Some(row) => Card::try_from(row),
            None => Err(Error::CardNotFound(number.to_string())),
        }
    }

    async fn write_card(tx: &mut Transaction<'static, Postgres>, change: &CardChange) -> Result<()> {
        let card = &change.after;
        let result = sqlx::query(
            "UPDATE cards
             SET balance = $2::numeric,
                 transaction_history = $3,
                 version = $4,
                 updated_at = $5
             WHERE number = $1 AND version = $6"
        )
        .bind(&card.number)
        .bind(card.balance.to_string())
        .bind(Json(&card.transaction_history))
        .bind(card.version as i64)
        .bind(card.updated_at)
        .bind(change.before.version as i64)
        .execute(&mut **tx)
        .await
        .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Err(Error::ConcurrentConflict(format!(
                "card {} changed after version {}", card.number, change.before.version
            )));
        }

        Ok(())
    }

    async fn rollback(tx: Transaction<'static, Postgres>) {
        if let Err(rollback_err) = tx.rollback().await {
            error!("Failed to roll back card transaction: {}", rollback_err);
        }
    }
}

#[async_trait]
impl CardStore for PostgresCardStore {
    async fn get(&self, number: &str) -> Result<Option<Card>> {
        debug!("Getting card from database: {}", number);

        let row = sqlx::query_as::<_, DbCard>(&format!("{} WHERE number = $1", SELECT_CARD))
            .bind(number)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        row.map(Card::try_from).transpose()
    }

    async fn insert(&self, card: Card) -> Result<()> {
        debug!("Inserting card into database: {}", card.number);

        let result = sqlx::query(
            "INSERT INTO cards
                (number, owner_id, security_code, network, expiration_date, balance,
                 transaction_history, version, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6::numeric, $7, $8, $9, $10)"
        )
        .bind(&card.number)
        .bind(card.owner)
        .bind(&card.security_code)
        .bind(card.network.to_string())
        .bind(card.expiration_date)
        .bind(card.balance.to_string())
        .bind(Json(&card.transaction_history))
        .bind(card.version as i64)
        .bind(card.created_at)
        .bind(card.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(Error::DuplicateCard(card.number)),
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                Err(Error::UserNotFound(card.owner.to_string()))
            }
            Err(e) => Err(unavailable(e)),
        }
    }

    async fn atomic_update(&self, number: &str, mutator: CardMutator) -> Result<CardChange> {
        let mut changes = self.atomic_multi_update(vec![(number.to_string(), mutator)]).await?;
        changes.pop().ok_or_else(|| Error::Internal(format!("no change recorded for card {}", number)))
    }

    async fn atomic_multi_update(&self, updates: Vec<(String, CardMutator)>) -> Result<Vec<CardChange>> {
        let updates = order_updates(updates)?;
        let mut tx = self.begin().await?;

        let mut staged = Vec::with_capacity(updates.len());
        for (index, number, mutator) in updates {
            let staged_change = match Self::lock_card(&mut tx, &number).await {
                Ok(before) => mutator(before.clone())
                    .and_then(|after| prepare_write(&before, after))
                    .map(|after| CardChange { before, after }),
                Err(e) => Err(e),
            };
            match staged_change {
                Ok(change) => staged.push((index, change)),
                Err(e) => {
                    Self::rollback(tx).await;
                    return Err(e);
                }
            }
        }

        for (_, change) in &staged {
            if let Err(e) = Self::write_card(&mut tx, change).await {
                Self::rollback(tx).await;
                return Err(e);
            }
        }

        tx.commit().await.map_err(unavailable)?;

        debug!("Committed multi-update of {} card(s)", staged.len());
        staged.sort_by_key(|(index, _)| *index);
        Ok(staged.into_iter().map(|(_, change)| change).collect())
    }
}

/// Driver failures on the card path are transient from the ledger's point of view
fn unavailable(e: sqlx::Error) -> Error {
    Error::StoreUnavailable(e.to_string())
}
