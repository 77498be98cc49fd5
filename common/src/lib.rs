//! Common types and utilities for the card ledger
//!
//! This library contains the shared domain model, the money type, and the
//! error taxonomy used by the ledger service and the API gateway. It also
//! carries the PostgreSQL bootstrap helpers shared by every store.

pub mod error;
pub mod model;
pub mod decimal;
pub mod db;

/// Re-export important types
pub use error::{Error, Result, ErrorExt};
pub use decimal::*;

// Re-export utoipa for use in model ToSchema derives
#[cfg(feature = "utoipa")]
pub use utoipa;
