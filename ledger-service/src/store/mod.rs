//! Card Store: key-addressed card records with atomic single- and multi-card updates

mod memory;
mod postgres;

pub use memory::InMemoryCardStore;
pub use postgres::PostgresCardStore;

use async_trait::async_trait;
use common::decimal::Amount;
use common::error::{Error, Result};
use common::model::card::Card;
use tracing::{error, warn};

/// Transformation applied to the freshest copy of a card inside an atomic update.
///
/// Returning an error aborts the update without writing anything.
pub type CardMutator = Box<dyn FnOnce(Card) -> Result<Card> + Send>;

/// Compensation is attempted this many times before the store gives up
const COMPENSATION_ATTEMPTS: usize = 3;

/// A committed change to one card
#[derive(Debug, Clone)]
pub struct CardChange {
    /// Card as read just before the mutator ran
    pub before: Card,
    /// Card as written
    pub after: Card,
}

/// Card store trait defining the interface for card data storage
#[async_trait]
pub trait CardStore: Send + Sync {
    /// Get a card by number
    async fn get(&self, number: &str) -> Result<Option<Card>>;

    /// Insert a new card; fails with `DuplicateCard` if the number is taken
    async fn insert(&self, card: Card) -> Result<()>;

    /// Read-modify-write one card with compare-and-swap semantics
    async fn atomic_update(&self, number: &str, mutator: CardMutator) -> Result<CardChange>;

    /// Apply every mutator or none of them.
    ///
    /// Results are returned in the order the updates were given. The default
    /// implementation serves stores without multi-record transactions: it
    /// applies the updates one by one in the order given, so a transfer's debit
    /// lands before its credit, and if one fails it restores each
    /// already-updated card to its before-image. Callers hold the cards' locks
    /// in ascending order, so the write order cannot deadlock.
    async fn atomic_multi_update(&self, updates: Vec<(String, CardMutator)>) -> Result<Vec<CardChange>> {
        ensure_distinct(&updates)?;
        let mut applied: Vec<CardChange> = Vec::with_capacity(updates.len());

        for (number, mutator) in updates {
            match self.atomic_update(&number, mutator).await {
                Ok(change) => applied.push(change),
                Err(e) => {
                    warn!("Update of card {} failed, compensating {} applied update(s): {}", number, applied.len(), e);
                    for change in applied.iter().rev() {
                        compensate(self, change).await?;
                    }
                    return Err(e);
                }
            }
        }

        Ok(applied)
    }
}

fn ensure_distinct(updates: &[(String, CardMutator)]) -> Result<()> {
    let mut numbers: Vec<&str> = updates.iter().map(|(number, _)| number.as_str()).collect();
    numbers.sort_unstable();
    if numbers.windows(2).any(|pair| pair[0] == pair[1]) {
        return Err(Error::Internal("the same card appears twice in one multi-update".to_string()));
    }
    Ok(())
}

/// Sort updates by card number, remembering their original position
pub(crate) fn order_updates(updates: Vec<(String, CardMutator)>) -> Result<Vec<(usize, String, CardMutator)>> {
    ensure_distinct(&updates)?;
    let mut ordered: Vec<(usize, String, CardMutator)> = updates
        .into_iter()
        .enumerate()
        .map(|(index, (number, mutator))| (index, number, mutator))
        .collect();
    ordered.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(ordered)
}

/// Check a mutated card before it is written and stamp its next version
pub(crate) fn prepare_write(before: &Card, mut after: Card) -> Result<Card> {
    if after.number != before.number {
        return Err(Error::Internal(format!(
            "mutator changed card number {} to {}",
            before.number, after.number
        )));
    }
    if after.balance < Amount::ZERO {
        return Err(Error::Internal(format!(
            "refusing to commit negative balance {} on card {}",
            after.balance, after.number
        )));
    }
    after.version = before.version + 1;
    Ok(after)
}

/// Put a card back to its before-image, provided nobody wrote it since
async fn compensate<S: CardStore + ?Sized>(store: &S, change: &CardChange) -> Result<()> {
    let number = change.after.number.clone();
    let mut last_error = None;

    for _ in 0..COMPENSATION_ATTEMPTS {
        let expected_version = change.after.version;
        let before = change.before.clone();
        let restore: CardMutator = Box::new(move |current: Card| {
            if current.version != expected_version {
                return Err(Error::ConcurrentConflict(format!(
                    "card {} moved from version {} to {} before compensation",
                    current.number, expected_version, current.version
                )));
            }
            Ok(before)
        });

        match store.atomic_update(&number, restore).await {
            Ok(_) => return Ok(()),
            Err(e) if matches!(e, Error::StoreUnavailable(_)) => last_error = Some(e),
            Err(e) => {
                last_error = Some(e);
                break;
            }
        }
    }

    let cause = last_error.map(|e| e.to_string()).unwrap_or_default();
    error!("Compensation of card {} failed, manual reconciliation required: {}", number, cause);
    Err(Error::Internal(format!("compensation of card {} failed: {}", number, cause)))
}
