//! User API handlers
//!
//! Registration, profile updates and login.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use common::model::user::{Credentials, NewUser, User, UserUpdate};
use uuid::Uuid;

use crate::api::response::ApiResponse;
use crate::error::ApiError;
use crate::AppState;

/// Register a new user
#[utoipa::path(
    post,
    path = "/api/v1/register",
    request_body = NewUser,
    responses(
        (status = 201, description = "User registered"),
        (status = 400, description = "Missing field or applicant under age"),
        (status = 409, description = "Email already registered")
    ),
    tag = "user"
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewUser>,
) -> Result<(StatusCode, ApiResponse<User>), ApiError> {
    let user = state.ledger_service.register_user(request).await?;
    Ok((StatusCode::CREATED, ApiResponse::new(user)))
}

/// Get a user by ID
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User retrieved"),
        (status = 404, description = "User not found")
    ),
    tag = "user"
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<User>, ApiError> {
    let user = state.ledger_service.get_user(id).await?
        .ok_or_else(|| ApiError::NotFound(format!("User not found: {}", id)))?;
    Ok(ApiResponse::new(user))
}

/// Update some of a user's profile fields
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    request_body = UserUpdate,
    responses(
        (status = 200, description = "User updated"),
        (status = 400, description = "No fields to update or invalid value"),
        (status = 404, description = "User not found")
    ),
    tag = "user"
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(update): Json<UserUpdate>,
) -> Result<ApiResponse<User>, ApiError> {
    let user = state.ledger_service.update_user(id, update).await?;
    Ok(ApiResponse::new(user))
}

/// Check a user's email and password
#[utoipa::path(
    post,
    path = "/api/v1/login",
    request_body = Credentials,
    responses(
        (status = 200, description = "Credentials accepted"),
        (status = 401, description = "Wrong email or password")
    ),
    tag = "user"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> Result<ApiResponse<User>, ApiError> {
    let user = state.ledger_service.login(credentials).await?;
    Ok(ApiResponse::new(user))
}
