//! Response envelopes shared by every endpoint
//!
//! Successful responses always carry their payload under `data`; the optional
//! `meta` block echoes the request ID assigned by the request-id layer so a
//! client can correlate a committed deposit or transfer with the server logs.

use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Header carrying the request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Envelope for a single resource
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMetadata>,
}

/// Metadata attached to a response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResponseMetadata {
    /// ID of the request that produced this response
    pub request_id: String,
}

/// Envelope for a collection
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiListResponse<T> {
    pub data: Vec<T>,
    /// Number of items in `data`
    pub count: usize,
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

impl<T: Serialize> IntoResponse for ApiListResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data, meta: None }
    }

    /// Wrap `data`, echoing the request ID found in `headers` if there is one
    pub fn for_request(data: T, headers: &HeaderMap) -> Self {
        let meta = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|id| ResponseMetadata { request_id: id.to_string() });
        Self { data, meta }
    }
}

impl<T> ApiListResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self { count: data.len(), data }
    }
}
