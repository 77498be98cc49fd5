//! Per-card exclusive locks with deadlock-free multi-card acquisition

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock table keyed by card number.
///
/// Multi-card acquisition always locks in ascending card-number order, so two
/// operations touching the same pair of cards cannot wait on each other.
#[derive(Default)]
pub struct CardLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl CardLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every card in `numbers`, waiting as long as necessary.
    ///
    /// The guard exists from the first lock on, so a cancelled acquisition
    /// still releases what it holds and evicts its table entries.
    pub async fn acquire(&self, numbers: &[&str]) -> CardLockGuard {
        let mut keys: Vec<String> = numbers.iter().map(|n| n.to_string()).collect();
        keys.sort();
        keys.dedup();

        let mut guard = CardLockGuard {
            guards: Vec::with_capacity(keys.len()),
            keys,
            table: Arc::clone(&self.locks),
        };

        for index in 0..guard.keys.len() {
            let lock = self.locks
                .entry(guard.keys[index].clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            let held = lock.lock_owned().await;
            guard.guards.push(held);
        }

        guard
    }

    /// Number of cards with a live lock entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Exclusive access to a set of cards; released on drop
pub struct CardLockGuard {
    keys: Vec<String>,
    guards: Vec<OwnedMutexGuard<()>>,
    table: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl CardLockGuard {
    /// Card numbers held, in acquisition order
    pub fn cards(&self) -> &[String] {
        &self.keys
    }
}

impl Drop for CardLockGuard {
    fn drop(&mut self) {
        self.guards.clear();
        // Only the table holds the Arc once no guard or waiter references it.
        for key in &self.keys {
            self.table.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_acquire_sorts_and_dedups() {
        let locks = CardLocks::new();
        let guard = locks.acquire(&["b", "a", "b"]).await;

        assert_eq!(guard.cards(), &["a".to_string(), "b".to_string()]);
        assert_eq!(locks.len(), 2);

        drop(guard);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_same_card_is_exclusive() {
        let locks = Arc::new(CardLocks::new());
        let guard = locks.acquire(&["a"]).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire(&["a"]).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should acquire after release")
            .unwrap();
    }

    #[tokio::test]
    async fn test_opposite_order_does_not_deadlock() {
        let locks = Arc::new(CardLocks::new());
        let mut handles = Vec::new();

        for i in 0..50 {
            let locks = Arc::clone(&locks);
            handles.push(tokio::spawn(async move {
                let pair = if i % 2 == 0 { ["a", "b"] } else { ["b", "a"] };
                let _guard = locks.acquire(&pair).await;
                tokio::task::yield_now().await;
            }));
        }

        let all = futures::future::join_all(handles);
        let results = tokio::time::timeout(Duration::from_secs(5), all)
            .await
            .expect("lock acquisition deadlocked");
        assert!(results.into_iter().all(|r| r.is_ok()));
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_acquire_evicts_entries() {
        let locks = CardLocks::new();
        let held = locks.acquire(&["b"]).await;

        let attempt = tokio::time::timeout(Duration::from_millis(20), locks.acquire(&["a", "b"])).await;
        assert!(attempt.is_err());

        // "a" was locked and released by the cancelled attempt; "b" is still held.
        assert_eq!(locks.len(), 1);
        let again = tokio::time::timeout(Duration::from_millis(100), locks.acquire(&["a"])).await;
        assert!(again.is_ok());
        drop(again);

        drop(held);
        assert!(locks.is_empty());
    }
}
