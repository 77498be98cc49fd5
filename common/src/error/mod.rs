//! Error types for the card ledger
//!
//! One error enum is shared by the ledger core, the card stores and the
//! request shell. Validation failures are detected before any mutation and
//! are never retried; only `StoreUnavailable` and `ConcurrentConflict` are
//! considered transient.

use std::fmt::Display;
use thiserror::Error;

/// Card ledger error type
#[derive(Debug, Error)]
pub enum Error {
    /// Amount is not strictly positive or carries more precision than money allows
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// No card with the given number exists
    #[error("Card not found: {0}")]
    CardNotFound(String),

    /// The caller does not own the card it tried to act on
    #[error("Card not owned by caller: {0}")]
    NotOwner(String),

    /// Security code mismatch on the source card
    #[error("Card authentication failed: {0}")]
    AuthFailed(String),

    /// Source balance is lower than the requested amount
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Transfer source and destination are the same card
    #[error("Source and destination card are the same: {0}")]
    SameCard(String),

    /// Transient store failure or timeout
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Optimistic concurrency check failed and retries were exhausted
    #[error("Concurrent update conflict: {0}")]
    ConcurrentConflict(String),

    /// A card with this number is already stored
    #[error("Duplicate card number: {0}")]
    DuplicateCard(String),

    /// Unique card number generation gave up after its attempt budget
    #[error("Card number generation exhausted: {0}")]
    CardNumberExhausted(String),

    /// Error when a user cannot be found
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// A user with the same email is already registered
    #[error("User already exists: {0}")]
    UserAlreadyExists(String),

    /// Login with a wrong email or password
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Generic validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Database migration error
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Decimal conversion error
    #[error("Decimal conversion error: {0}")]
    DecimalError(String),
}

impl Error {
    /// Whether the ledger may retry the operation that produced this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_) | Error::ConcurrentConflict(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait to add context to error results
pub trait ErrorExt<T> {
    /// Add context information to an error
    fn with_context<C, F>(self, context_fn: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Display;
}

impl<T> ErrorExt<T> for Result<T> {
    fn with_context<C, F>(self, context_fn: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Display,
    {
        self.map_err(|e| {
            let context = context_fn().to_string();
            let prefix = |msg: String| format!("{}: {}", context, msg);
            match e {
                Error::InvalidAmount(msg) => Error::InvalidAmount(prefix(msg)),
                Error::CardNotFound(msg) => Error::CardNotFound(prefix(msg)),
                Error::NotOwner(msg) => Error::NotOwner(prefix(msg)),
                Error::AuthFailed(msg) => Error::AuthFailed(prefix(msg)),
                Error::InsufficientFunds(msg) => Error::InsufficientFunds(prefix(msg)),
                Error::SameCard(msg) => Error::SameCard(prefix(msg)),
                Error::StoreUnavailable(msg) => Error::StoreUnavailable(prefix(msg)),
                Error::ConcurrentConflict(msg) => Error::ConcurrentConflict(prefix(msg)),
                Error::DuplicateCard(msg) => Error::DuplicateCard(prefix(msg)),
                Error::CardNumberExhausted(msg) => Error::CardNumberExhausted(prefix(msg)),
                Error::UserNotFound(msg) => Error::UserNotFound(prefix(msg)),
                Error::UserAlreadyExists(msg) => Error::UserAlreadyExists(prefix(msg)),
                Error::InvalidCredentials(msg) => Error::InvalidCredentials(prefix(msg)),
                Error::ValidationError(msg) => Error::ValidationError(prefix(msg)),
                Error::ConfigurationError(msg) => Error::ConfigurationError(prefix(msg)),
                Error::Internal(msg) => Error::Internal(prefix(msg)),
                Error::DecimalError(msg) => Error::DecimalError(prefix(msg)),
                Error::Database(e) => Error::Database(e),
                Error::Migration(e) => Error::Migration(e),
                Error::Serialization(e) => Error::Serialization(e),
            }
        })
    }
}

/// Convert string messages into an error
impl From<String> for Error {
    fn from(message: String) -> Self {
        Error::Internal(message)
    }
}

/// Convert static string references into an error
impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Error::Internal(message.to_string())
    }
}

/// From rust_decimal::Error
impl From<rust_decimal::Error> for Error {
    fn from(err: rust_decimal::Error) -> Self {
        Error::DecimalError(err.to_string())
    }
}
