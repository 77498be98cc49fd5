//! Domain models for the card ledger

pub mod card;
pub mod transaction;
pub mod request;
pub mod user;
