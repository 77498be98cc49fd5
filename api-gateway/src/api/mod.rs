//! API handlers
//!
//! Each handler extracts state and parameters with axum extractors, calls the
//! ledger service, and wraps the result in a response envelope. Ledger errors
//! convert into `ApiError` and from there into an HTTP status.

pub mod card;
pub mod response;
pub mod user;

pub use response::{ApiListResponse, ApiResponse};
