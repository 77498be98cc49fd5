//! Error handling for the API gateway

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::error::Error;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error information
    pub error: ErrorInfo,
    /// Request ID for tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Detailed error information
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error code (string identifier for the error type)
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Ledger(#[from] Error),
}

impl ApiError {
    /// HTTP status and stable error code for this error
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Ledger(e) => match e {
                // Client errors (4xx)
                Error::InvalidAmount(_) => (StatusCode::BAD_REQUEST, "invalid_amount"),
                Error::SameCard(_) => (StatusCode::BAD_REQUEST, "same_card"),
                Error::ValidationError(_) => (StatusCode::BAD_REQUEST, "validation_error"),
                Error::AuthFailed(_) => (StatusCode::UNAUTHORIZED, "auth_failed"),
                Error::InvalidCredentials(_) => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
                Error::NotOwner(_) => (StatusCode::FORBIDDEN, "not_owner"),
                Error::CardNotFound(_) => (StatusCode::NOT_FOUND, "card_not_found"),
                Error::UserNotFound(_) => (StatusCode::NOT_FOUND, "user_not_found"),
                Error::UserAlreadyExists(_) => (StatusCode::CONFLICT, "user_already_exists"),
                Error::DuplicateCard(_) => (StatusCode::CONFLICT, "duplicate_card"),
                Error::ConcurrentConflict(_) => (StatusCode::CONFLICT, "concurrent_conflict"),
                Error::InsufficientFunds(_) => (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_funds"),

                // Server errors (5xx)
                Error::StoreUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable"),
                Error::CardNumberExhausted(_) => (StatusCode::SERVICE_UNAVAILABLE, "card_number_exhausted"),
                Error::ConfigurationError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error"),
                Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
                Error::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
                Error::Migration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "migration_error"),
                Error::Serialization(_) => (StatusCode::INTERNAL_SERVER_ERROR, "serialization_error"),
                Error::DecimalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "decimal_error"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Generate a request ID for tracking errors
        let request_id = Uuid::new_v4().to_string();
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!("API Error [{}]: {:?}", request_id, &self);
        } else {
            tracing::debug!("API Error [{}]: {:?}", request_id, &self);
        }

        let details = match &self {
            ApiError::Ledger(Error::Database(e)) => Some(serde_json::json!({
                "code": e.as_database_error().and_then(|dbe| dbe.code().map(|c| c.to_string())),
            })),
            _ => None,
        };

        let error_response = ErrorResponse {
            error: ErrorInfo {
                code: code.to_string(),
                message: self.to_string(),
                details,
            },
            request_id: Some(request_id),
        };

        (status, Json(error_response)).into_response()
    }
}
