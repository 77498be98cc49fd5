use std::time::Duration;

use async_trait::async_trait;
use common::error::{Error, Result};
use common::model::card::Card;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use super::{order_updates, prepare_write, CardChange, CardMutator, CardStore};
use crate::locks::{CardLockGuard, CardLocks};

/// Default bound on waiting for a record lock
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// In-memory card store
///
/// Records live in a `DashMap`; every read-modify-write holds the record's
/// lock from an internal lock table, so multi-card updates are staged in full
/// before the first write and are therefore all-or-nothing. Reads take the
/// same lock and never observe half of a multi-card commit.
pub struct InMemoryCardStore {
    /// Cards by number
    pub cards: DashMap<String, Card>,
    locks: CardLocks,
    lock_timeout: Duration,
}

impl InMemoryCardStore {
    /// Create a new in-memory card store
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Create a store whose record locks give up after `lock_timeout`
    pub fn with_timeout(lock_timeout: Duration) -> Self {
        Self {
            cards: DashMap::new(),
            locks: CardLocks::new(),
            lock_timeout,
        }
    }

    async fn lock(&self, numbers: &[&str]) -> Result<CardLockGuard> {
        tokio::time::timeout(self.lock_timeout, self.locks.acquire(numbers))
            .await
            .map_err(|_| Error::StoreUnavailable(format!(
                "timed out after {:?} waiting for card record lock", self.lock_timeout
            )))
    }

    fn read(&self, number: &str) -> Result<Card> {
        self.cards
            .get(number)
            .map(|card| card.clone())
            .ok_or_else(|| Error::CardNotFound(number.to_string()))
    }
}

impl Default for InMemoryCardStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CardStore for InMemoryCardStore {
    async fn get(&self, number: &str) -> Result<Option<Card>> {
        let _guard = self.lock(&[number]).await?;
        Ok(self.cards.get(number).map(|card| card.clone()))
    }

    async fn insert(&self, card: Card) -> Result<()> {
        match self.cards.entry(card.number.clone()) {
            Entry::Occupied(_) => Err(Error::DuplicateCard(card.number)),
            Entry::Vacant(slot) => {
                debug!("Inserted card {}", card.number);
                slot.insert(card);
                Ok(())
            }
        }
    }

    async fn atomic_update(&self, number: &str, mutator: CardMutator) -> Result<CardChange> {
        let _guard = self.lock(&[number]).await?;

        let before = self.read(number)?;
        let after = prepare_write(&before, mutator(before.clone())?)?;
        self.cards.insert(number.to_string(), after.clone());

        debug!("Card {} updated to version {}", number, after.version);
        Ok(CardChange { before, after })
    }

    async fn atomic_multi_update(&self, updates: Vec<(String, CardMutator)>) -> Result<Vec<CardChange>> {
        let updates = order_updates(updates)?;
        let numbers: Vec<&str> = updates.iter().map(|(_, number, _)| number.as_str()).collect();
        let _guard = self.lock(&numbers).await?;

        // Stage every change first; nothing is written unless all succeed.
        let mut staged = Vec::with_capacity(updates.len());
        for (index, number, mutator) in updates {
            let before = self.read(&number)?;
            let after = prepare_write(&before, mutator(before.clone())?)?;
            staged.push((index, CardChange { before, after }));
        }

        for (_, change) in &staged {
            self.cards.insert(change.after.number.clone(), change.after.clone());
        }

        debug!("Committed multi-update of {} card(s)", staged.len());
        staged.sort_by_key(|(index, _)| *index);
        Ok(staged.into_iter().map(|(_, change)| change).collect())
    }
}
