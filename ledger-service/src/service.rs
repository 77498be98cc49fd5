//! Ledger service implementation
//!
//! Every balance mutation follows the same discipline:
//!
//! 1. lock the affected cards (ascending card-number order),
//! 2. validate against a fresh read,
//! 3. hand the commit to the card store as one atomic update whose mutators
//!    re-check the preconditions on the freshest copy,
//! 4. release the locks once the commit has finished.
//!
//! Transient store failures restart the whole sequence a bounded number of
//! times; validation failures are returned immediately.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::db::{init_db_pool, run_migrations};
use common::decimal::{validate_amount, Amount};
use common::error::{Error, ErrorExt, Result};
use common::model::card::{Card, CardNetwork, CARD_NUMBER_LENGTH, SECURITY_CODE_LENGTH};
use common::model::request::TransferReceipt;
use common::model::transaction::TransactionRecord;
use common::model::user::{verify_password, Credentials, NewUser, User, UserUpdate};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::LedgerServiceConfig;
use crate::generator::CardNumberGenerator;
use crate::locks::{CardLockGuard, CardLocks};
use crate::store::{CardMutator, CardStore, InMemoryCardStore, PostgresCardStore};
use crate::users::{InMemoryUserRepository, PostgresUserRepository, UserRepository};

/// Base delay between commit attempts; grows linearly per attempt
const RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// Ledger service validating and applying deposits and transfers
pub struct LedgerService {
    /// Card records
    cards: Arc<dyn CardStore>,
    /// Registered users
    users: Arc<dyn UserRepository>,
    /// Per-card serialization of read-validate-commit sequences
    locks: Arc<CardLocks>,
    /// Source of card numbers and security codes
    generator: CardNumberGenerator,
    config: LedgerServiceConfig,
}

/// Store Type
pub enum StoreType {
    /// In-memory stores
    InMemory,
    /// PostgreSQL stores
    Postgres(Option<String>),
}

impl LedgerService {
    /// Create a new ledger service backed by in-memory stores
    pub fn new() -> Self {
        Self::in_memory(LedgerServiceConfig::in_memory())
    }

    /// Create an in-memory ledger service with the given tuning
    pub fn in_memory(config: LedgerServiceConfig) -> Self {
        let cards = Arc::new(InMemoryCardStore::with_timeout(config.store_timeout));
        Self::with_store(cards, Arc::new(InMemoryUserRepository::new()), config)
    }

    /// Create a ledger service over explicitly constructed stores
    pub fn with_store(
        cards: Arc<dyn CardStore>,
        users: Arc<dyn UserRepository>,
        config: LedgerServiceConfig,
    ) -> Self {
        Self {
            cards,
            users,
            locks: Arc::new(CardLocks::new()),
            generator: CardNumberGenerator::new(),
            config,
        }
    }

    /// Replace the card number source
    pub fn with_generator(mut self, generator: CardNumberGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Create a new ledger service with a specific store type
    pub async fn with_repository(store_type: StoreType) -> Result<Self> {
        match store_type {
            StoreType::InMemory => Ok(Self::new()),
            StoreType::Postgres(database_url) => {
                let mut config = LedgerServiceConfig::from_env();
                if let Some(url) = database_url {
                    config.database_url = url;
                }
                Self::with_config(&config).await
            }
        }
    }

    /// Create a new ledger service backed by PostgreSQL
    pub async fn with_config(config: &LedgerServiceConfig) -> Result<Self> {
        info!("Connecting ledger to PostgreSQL with pool size: {}", config.db_pool_size);

        let pool = init_db_pool(&config.database_url, config.db_pool_size, config.store_timeout)
            .await
            .with_context(|| "Failed to connect to the ledger database")?;
        run_migrations(&pool).await?;

        let cards = Arc::new(PostgresCardStore::new(pool.clone(), config.store_timeout));
        let users = Arc::new(PostgresUserRepository::new(pool));
        Ok(Self::with_store(cards, users, config.clone()))
    }

    pub fn config(&self) -> &LedgerServiceConfig {
        &self.config
    }

    // ========================
    // User operations
    // ========================

    /// Register a new user
    pub async fn register_user(&self, new_user: NewUser) -> Result<User> {
        let user = new_user.into_user(Utc::now())?;
        info!("Registering user {}", user.id);
        self.users.create_user(user).await
    }

    /// Get a user by ID
    pub async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.bounded("user read", self.users.get_user(id)).await
    }

    /// Apply a partial profile update
    pub async fn update_user(&self, id: Uuid, update: UserUpdate) -> Result<User> {
        let mut user = self.get_user(id).await?
            .ok_or_else(|| Error::UserNotFound(id.to_string()))?;

        update.apply(&mut user, Utc::now())?;
        self.users.save_user(user).await
    }

    /// Check an email and password pair
    pub async fn login(&self, credentials: Credentials) -> Result<User> {
        let email = credentials.email.trim().to_lowercase();
        let user = self.bounded("user read", self.users.find_by_email(&email)).await?
            .ok_or_else(|| Error::InvalidCredentials("wrong email or password".to_string()))?;

        if !verify_password(&credentials.password, &user.password_hash) {
            return Err(Error::InvalidCredentials("wrong email or password".to_string()));
        }
        Ok(user)
    }

    // ========================
    // Card operations
    // ========================

    /// Open a card with a fresh unique number, zero balance and a `CardOpened` record
    pub async fn open_card(&self, owner_id: Uuid, network: CardNetwork) -> Result<Card> {
        info!("Opening {} card for user {}", network, owner_id);

        self.get_user(owner_id).await?
            .ok_or_else(|| Error::UserNotFound(owner_id.to_string()))?;

        let attempts = self.config.card_number_attempts;
        for attempt in 1..=attempts {
            let number = self.generator.digits(CARD_NUMBER_LENGTH);
            if self.bounded("card read", self.cards.get(&number)).await?.is_some() {
                debug!("Card number collision on attempt {}/{}", attempt, attempts);
                continue;
            }

            let security_code = self.generator.digits(SECURITY_CODE_LENGTH);
            let card = Card::open(number, owner_id, security_code, network, Utc::now());
            match self.cards.insert(card.clone()).await {
                Ok(()) => {
                    info!("Opened card {} for user {}", card.number, owner_id);
                    return Ok(card);
                }
                Err(Error::DuplicateCard(number)) => {
                    debug!("Card number {} taken concurrently on attempt {}/{}", number, attempt, attempts);
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::CardNumberExhausted(format!("no unused card number after {} attempts", attempts)))
    }

    /// Get a card by number
    pub async fn get_card(&self, number: &str) -> Result<Option<Card>> {
        let card = self.bounded("card read", self.cards.get(number)).await?;
        if let Some(card) = &card {
            card.assert_invariants();
        }
        Ok(card)
    }

    /// Transaction history of a card, oldest first
    pub async fn transaction_history(&self, number: &str) -> Result<Vec<TransactionRecord>> {
        Ok(self.fetch_card(number).await?.transaction_history)
    }

    /// Add `amount` to a card owned by `owner_id` and return the new balance
    pub async fn deposit(&self, owner_id: Uuid, card_number: &str, amount: Amount) -> Result<Amount> {
        info!("Depositing {} to card {} for user {}", amount, card_number, owner_id);

        let amount = validate_amount(amount)?;
        let balance = self
            .with_retries("deposit", move |_| self.deposit_attempt(owner_id, card_number, amount))
            .await?;

        if self.config.transaction_logging {
            info!(card = card_number, %amount, %balance, "deposit committed");
        }
        Ok(balance)
    }

    /// Move `amount` from one card to another, authorized by the source card's security code
    pub async fn transfer(
        &self,
        from_card: &str,
        to_card: &str,
        amount: Amount,
        security_code: &str,
    ) -> Result<TransferReceipt> {
        info!("Transferring {} from card {} to card {}", amount, from_card, to_card);

        let receipt = self
            .with_retries("transfer", move |_| self.transfer_attempt(from_card, to_card, amount, security_code))
            .await?;

        if self.config.transaction_logging {
            info!(
                from = from_card,
                to = to_card,
                amount = %receipt.amount,
                from_balance = %receipt.from_balance,
                to_balance = %receipt.to_balance,
                "transfer committed"
            );
        }
        Ok(receipt)
    }

    async fn deposit_attempt(&self, owner_id: Uuid, card_number: &str, amount: Amount) -> Result<Amount> {
        let guard = self.lock_cards(&[card_number]).await?;

        let card = self.fetch_card(card_number).await?;
        if card.owner != owner_id {
            return Err(Error::NotOwner(format!("card {} does not belong to user {}", card_number, owner_id)));
        }

        let at = Utc::now();
        let mutator: CardMutator = Box::new(move |mut card: Card| {
            if card.owner != owner_id {
                return Err(Error::NotOwner(format!("card {} changed owner", card.number)));
            }
            card.deposit(amount, at)?;
            Ok(card)
        });

        let cards = Arc::clone(&self.cards);
        let number = card_number.to_string();
        let change = self
            .commit(guard, async move { cards.atomic_update(&number, mutator).await })
            .await?;

        Ok(change.after.balance)
    }

    async fn transfer_attempt(
        &self,
        from_card: &str,
        to_card: &str,
        amount: Amount,
        security_code: &str,
    ) -> Result<TransferReceipt> {
        let guard = self.lock_cards(&[from_card, to_card]).await?;

        // Validating: read-only checks against the current state.
        let source = self.fetch_card(from_card).await?;
        if !source.verify_security_code(security_code) {
            return Err(Error::AuthFailed(format!("wrong security code for card {}", from_card)));
        }
        let amount = validate_amount(amount)?;
        if source.balance < amount {
            return Err(Error::InsufficientFunds(format!(
                "card {} holds {}, requested {}",
                from_card, source.balance, amount
            )));
        }
        self.fetch_card(to_card).await?;
        if from_card == to_card {
            return Err(Error::SameCard(from_card.to_string()));
        }

        // Committing: the debit re-checks the balance on the freshest read.
        let at = Utc::now();
        let destination = to_card.to_string();
        let debit: CardMutator = Box::new(move |mut card: Card| {
            card.debit(amount, &destination, at)?;
            Ok(card)
        });
        let source_number = from_card.to_string();
        let credit: CardMutator = Box::new(move |mut card: Card| {
            card.credit(amount, &source_number, at)?;
            Ok(card)
        });

        let cards = Arc::clone(&self.cards);
        let updates = vec![(from_card.to_string(), debit), (to_card.to_string(), credit)];
        let changes = self
            .commit(guard, async move { cards.atomic_multi_update(updates).await })
            .await?;

        let (from_balance, to_balance) = match changes.as_slice() {
            [debited, credited] => (debited.after.balance, credited.after.balance),
            _ => return Err(Error::Internal(format!("expected 2 card changes, got {}", changes.len()))),
        };

        Ok(TransferReceipt {
            from_card: from_card.to_string(),
            to_card: to_card.to_string(),
            amount,
            from_balance,
            to_balance,
            executed_at: at,
        })
    }

    /// Run a commit to completion on its own task, releasing the card locks afterwards.
    ///
    /// Dropping the caller does not cancel a commit that has started.
    async fn commit<T, F>(&self, guard: CardLockGuard, commit: F) -> Result<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let result = commit.await;
            drop(guard);
            result
        });

        match task.await {
            Ok(result) => result,
            Err(join_err) => {
                error!("Commit task failed: {}", join_err);
                Err(Error::Internal(format!("commit task failed: {}", join_err)))
            }
        }
    }

    /// Retry `attempt` while it fails with a transient store error
    async fn with_retries<T, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.config.commit_retries;
        let mut current = 1;
        loop {
            match attempt(current).await {
                Err(e) if e.is_retryable() && current < max_attempts => {
                    warn!("{} attempt {}/{} failed, retrying: {}", operation, current, max_attempts, e);
                    tokio::time::sleep(RETRY_BACKOFF * current).await;
                    current += 1;
                }
                Err(e) if e.is_retryable() => {
                    error!("{} failed after {} attempt(s): {}", operation, current, e);
                    return Err(e);
                }
                result => return result,
            }
        }
    }

    async fn lock_cards(&self, numbers: &[&str]) -> Result<CardLockGuard> {
        self.bounded("card lock", async { Ok(self.locks.acquire(numbers).await) }).await
    }

    async fn fetch_card(&self, number: &str) -> Result<Card> {
        self.get_card(number).await?
            .ok_or_else(|| Error::CardNotFound(number.to_string()))
    }

    /// Bound a lock wait or read by the configured store timeout
    async fn bounded<T>(&self, what: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let timeout = self.config.store_timeout;
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::StoreUnavailable(format!("{} timed out after {:?}", what, timeout))),
        }
    }
}

impl Default for LedgerService {
    fn default() -> Self {
        Self::new()
    }
}
