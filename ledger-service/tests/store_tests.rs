use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use common::decimal::{dec, Amount};
use common::error::{Error, Result};
use common::model::card::{Card, CardNetwork};
use ledger_service::{
    CardChange, CardMutator, CardNumberGenerator, CardStore, InMemoryCardStore, InMemoryUserRepository,
    LedgerService, LedgerServiceConfig,
};
use rand::rngs::mock::StepRng;
use uuid::Uuid;

const LOW: &str = "1111111111111111";
const HIGH: &str = "9999999999999999";

fn card(number: &str, balance: Amount) -> Card {
    let mut card = Card::open(number.to_string(), Uuid::new_v4(), "123".to_string(), CardNetwork::Visa, Utc::now());
    if balance > Amount::ZERO {
        card.deposit(balance, Utc::now()).unwrap();
    }
    card
}

/// Store without multi-card transactions whose single-card updates fail for one card while armed
struct FailingStore {
    inner: InMemoryCardStore,
    fail_on: String,
    armed: AtomicBool,
    /// Card numbers passed to `atomic_update`, in call order
    writes: Mutex<Vec<String>>,
}

impl FailingStore {
    fn new(fail_on: &str) -> Self {
        Self {
            inner: InMemoryCardStore::new(),
            fail_on: fail_on.to_string(),
            armed: AtomicBool::new(false),
            writes: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CardStore for FailingStore {
    async fn get(&self, number: &str) -> Result<Option<Card>> {
        self.inner.get(number).await
    }

    async fn insert(&self, card: Card) -> Result<()> {
        self.inner.insert(card).await
    }

    async fn atomic_update(&self, number: &str, mutator: CardMutator) -> Result<CardChange> {
        self.writes.lock().unwrap().push(number.to_string());
        if number == self.fail_on && self.armed.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable(format!("write to {} failed", number)));
        }
        self.inner.atomic_update(number, mutator).await
    }
}

/// Store whose first `failures` commits fail with a transient error
struct FlakyStore {
    inner: InMemoryCardStore,
    failures: u32,
    conflict: bool,
    commits: AtomicU32,
}

impl FlakyStore {
    fn new(failures: u32, conflict: bool) -> Self {
        Self { inner: InMemoryCardStore::new(), failures, conflict, commits: AtomicU32::new(0) }
    }

    fn fail_first(&self) -> Result<()> {
        let attempt = self.commits.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt > self.failures {
            return Ok(());
        }
        if self.conflict {
            Err(Error::ConcurrentConflict(format!("attempt {}", attempt)))
        } else {
            Err(Error::StoreUnavailable(format!("attempt {}", attempt)))
        }
    }
}

#[async_trait]
impl CardStore for FlakyStore {
    async fn get(&self, number: &str) -> Result<Option<Card>> {
        self.inner.get(number).await
    }

    async fn insert(&self, card: Card) -> Result<()> {
        self.inner.insert(card).await
    }

    async fn atomic_update(&self, number: &str, mutator: CardMutator) -> Result<CardChange> {
        self.fail_first()?;
        self.inner.atomic_update(number, mutator).await
    }

    async fn atomic_multi_update(&self, updates: Vec<(String, CardMutator)>) -> Result<Vec<CardChange>> {
        self.fail_first()?;
        self.inner.atomic_multi_update(updates).await
    }
}

fn service_over(store: Arc<dyn CardStore>, retries: u32) -> LedgerService {
    let config = LedgerServiceConfig::in_memory().with_commit_retries(retries);
    LedgerService::with_store(store, Arc::new(InMemoryUserRepository::new()), config)
}

#[tokio::test]
async fn test_failed_credit_restores_debited_card() {
    let store = Arc::new(FailingStore::new(HIGH));
    store.insert(card(LOW, dec!(100))).await.unwrap();
    store.insert(card(HIGH, Amount::ZERO)).await.unwrap();
    let before_low = store.get(LOW).await.unwrap().unwrap();
    let before_high = store.get(HIGH).await.unwrap().unwrap();
    store.armed.store(true, Ordering::SeqCst);

    let service = service_over(store.clone(), 1);
    let result = service.transfer(LOW, HIGH, dec!(30), "123").await;
    assert!(matches!(result, Err(Error::StoreUnavailable(_))));

    let after_low = store.get(LOW).await.unwrap().unwrap();
    let after_high = store.get(HIGH).await.unwrap().unwrap();
    assert_eq!(after_low.balance, dec!(100));
    assert_eq!(after_low.transaction_history, before_low.transaction_history);
    // Debit and compensation are both committed writes.
    assert_eq!(after_low.version, before_low.version + 2);
    assert_eq!(after_high, before_high);
}

#[tokio::test]
async fn test_failed_credit_to_lower_card_restores_debited_card() {
    let store = Arc::new(FailingStore::new(LOW));
    store.insert(card(LOW, Amount::ZERO)).await.unwrap();
    store.insert(card(HIGH, dec!(100))).await.unwrap();
    let before_low = store.get(LOW).await.unwrap().unwrap();
    let before_high = store.get(HIGH).await.unwrap().unwrap();
    store.armed.store(true, Ordering::SeqCst);

    let service = service_over(store.clone(), 1);
    let result = service.transfer(HIGH, LOW, dec!(30), "123").await;
    assert!(matches!(result, Err(Error::StoreUnavailable(_))));

    // Debit, failed credit, then compensation of the debit.
    assert_eq!(*store.writes.lock().unwrap(), [HIGH, LOW, HIGH]);

    let after_high = store.get(HIGH).await.unwrap().unwrap();
    assert_eq!(after_high.balance, dec!(100));
    assert_eq!(after_high.transaction_history, before_high.transaction_history);
    assert_eq!(after_high.version, before_high.version + 2);
    assert_eq!(store.get(LOW).await.unwrap().unwrap(), before_low);
}

#[tokio::test]
async fn test_failed_debit_leaves_everything_untouched() {
    let store = Arc::new(FailingStore::new(HIGH));
    store.insert(card(LOW, dec!(5))).await.unwrap();
    store.insert(card(HIGH, dec!(100))).await.unwrap();
    let before_low = store.get(LOW).await.unwrap().unwrap();
    let before_high = store.get(HIGH).await.unwrap().unwrap();
    store.armed.store(true, Ordering::SeqCst);

    let service = service_over(store.clone(), 1);
    let result = service.transfer(HIGH, LOW, dec!(5), "123").await;
    assert!(matches!(result, Err(Error::StoreUnavailable(_))));

    assert_eq!(*store.writes.lock().unwrap(), [HIGH]);
    assert_eq!(store.get(LOW).await.unwrap().unwrap(), before_low);
    assert_eq!(store.get(HIGH).await.unwrap().unwrap(), before_high);
}

#[tokio::test]
async fn test_debit_is_written_before_credit() {
    let store = Arc::new(FailingStore::new(HIGH));
    store.insert(card(LOW, Amount::ZERO)).await.unwrap();
    store.insert(card(HIGH, dec!(100))).await.unwrap();

    let service = service_over(store.clone(), 1);
    let receipt = service.transfer(HIGH, LOW, dec!(40), "123").await.unwrap();

    assert_eq!(*store.writes.lock().unwrap(), [HIGH, LOW]);
    assert_eq!(receipt.from_balance, dec!(60));
    assert_eq!(receipt.to_balance, dec!(40));
}

#[tokio::test]
async fn test_compensated_transfer_succeeds_once_store_recovers() {
    let store = Arc::new(FailingStore::new(HIGH));
    store.insert(card(LOW, dec!(100))).await.unwrap();
    store.insert(card(HIGH, Amount::ZERO)).await.unwrap();
    let service = service_over(store.clone(), 1);

    store.armed.store(true, Ordering::SeqCst);
    assert!(service.transfer(LOW, HIGH, dec!(30), "123").await.is_err());
    store.armed.store(false, Ordering::SeqCst);

    let receipt = service.transfer(LOW, HIGH, dec!(30), "123").await.unwrap();
    assert_eq!(receipt.from_balance, dec!(70));
    assert_eq!(receipt.to_balance, dec!(30));
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let store = Arc::new(FlakyStore::new(2, false));
    store.insert(card(LOW, dec!(100))).await.unwrap();
    store.insert(card(HIGH, Amount::ZERO)).await.unwrap();

    let service = service_over(store.clone(), 3);
    let receipt = service.transfer(LOW, HIGH, dec!(30), "123").await.unwrap();

    assert_eq!(receipt.from_balance, dec!(70));
    assert_eq!(store.commits.load(Ordering::SeqCst), 3);
    let low = store.get(LOW).await.unwrap().unwrap();
    assert_eq!(low.transaction_history.len(), 3);
}

#[tokio::test]
async fn test_conflicts_are_retried_for_deposits() {
    let store = Arc::new(FlakyStore::new(1, true));
    store.insert(card(LOW, Amount::ZERO)).await.unwrap();
    let owner = store.get(LOW).await.unwrap().unwrap().owner;

    let service = service_over(store.clone(), 3);
    let balance = service.deposit(owner, LOW, dec!(50)).await.unwrap();

    assert_eq!(balance, dec!(50));
    assert_eq!(store.commits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let store = Arc::new(FlakyStore::new(10, false));
    store.insert(card(LOW, dec!(100))).await.unwrap();
    store.insert(card(HIGH, Amount::ZERO)).await.unwrap();

    let service = service_over(store.clone(), 3);
    let result = service.transfer(LOW, HIGH, dec!(30), "123").await;

    assert!(matches!(result, Err(Error::StoreUnavailable(_))));
    assert_eq!(store.commits.load(Ordering::SeqCst), 3);
    assert_eq!(store.get(LOW).await.unwrap().unwrap().balance, dec!(100));
    assert_eq!(store.get(HIGH).await.unwrap().unwrap().balance, Amount::ZERO);
}

#[tokio::test]
async fn test_validation_failures_are_not_retried() {
    let store = Arc::new(FlakyStore::new(0, false));
    store.insert(card(LOW, dec!(20))).await.unwrap();
    store.insert(card(HIGH, Amount::ZERO)).await.unwrap();

    let service = service_over(store.clone(), 3);
    let result = service.transfer(LOW, HIGH, dec!(30), "123").await;

    assert!(matches!(result, Err(Error::InsufficientFunds(_))));
    assert_eq!(store.commits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_card_number_space_exhausted() {
    let config = LedgerServiceConfig::in_memory().with_card_number_attempts(3);
    let service = LedgerService::in_memory(config)
        .with_generator(CardNumberGenerator::with_rng(StepRng::new(0, 0)));
    let user = service
        .register_user(common::model::user::NewUser {
            name: "Unlucky".to_string(),
            address: "0 Zero Street".to_string(),
            email: "unlucky@example.com".to_string(),
            password: "secret".to_string(),
            age: 40,
            country: "US".to_string(),
            state: "CA".to_string(),
        })
        .await
        .unwrap();

    let first = service.open_card(user.id, CardNetwork::Visa).await.unwrap();
    assert_eq!(first.number, "0".repeat(16));

    let second = service.open_card(user.id, CardNetwork::MasterCard).await;
    assert!(matches!(second, Err(Error::CardNumberExhausted(_))));
}

