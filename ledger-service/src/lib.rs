//! Ledger service for card balances, deposits and transfers

pub mod config;
pub mod generator;
pub mod locks;
pub mod service;
pub mod store;
pub mod users;

pub use config::LedgerServiceConfig;
pub use generator::CardNumberGenerator;
pub use locks::{CardLockGuard, CardLocks};
pub use service::{LedgerService, StoreType};
pub use store::{CardChange, CardMutator, CardStore, InMemoryCardStore, PostgresCardStore};
pub use users::{InMemoryUserRepository, PostgresUserRepository, UserRepository};
