//! Card API handlers
//!
//! Handles endpoints related to cards:
//! - Open a card
//! - Get card details and history
//! - Deposit and transfer funds

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use common::model::card::Card;
use common::model::request::{
    DepositReceipt, DepositRequest, IssuedCard, OpenCardRequest, TransferReceipt, TransferRequest,
};
use common::model::transaction::TransactionRecord;

use crate::api::response::{ApiListResponse, ApiResponse};
use crate::error::ApiError;
use crate::AppState;

/// Open a new card for a registered user; the security code is returned only here
#[utoipa::path(
    post,
    path = "/api/v1/cards",
    request_body = OpenCardRequest,
    responses(
        (status = 201, description = "Card opened", body = IssuedCard),
        (status = 400, description = "Unknown card type"),
        (status = 404, description = "User not found"),
        (status = 503, description = "No unused card number found")
    ),
    tag = "card"
)]
pub async fn open_card(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OpenCardRequest>,
) -> Result<(StatusCode, ApiResponse<IssuedCard>), ApiError> {
    let network = request.network()?;
    let card = state.ledger_service.open_card(request.owner_id, network).await?;
    Ok((StatusCode::CREATED, ApiResponse::new(IssuedCard::from(card))))
}

/// Get a card by number
#[utoipa::path(
    get,
    path = "/api/v1/cards/{number}",
    params(
        ("number" = String, Path, description = "Card number")
    ),
    responses(
        (status = 200, description = "Card retrieved"),
        (status = 404, description = "Card not found")
    ),
    tag = "card"
)]
pub async fn get_card(
    State(state): State<Arc<AppState>>,
    Path(number): Path<String>,
) -> Result<ApiResponse<Card>, ApiError> {
    let card = state.ledger_service.get_card(&number).await?
        .ok_or_else(|| ApiError::NotFound(format!("Card not found: {}", number)))?;
    Ok(ApiResponse::new(card))
}

/// Get a card's transaction history, oldest first
#[utoipa::path(
    get,
    path = "/api/v1/cards/{number}/history",
    params(
        ("number" = String, Path, description = "Card number")
    ),
    responses(
        (status = 200, description = "History retrieved"),
        (status = 404, description = "Card not found")
    ),
    tag = "card"
)]
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(number): Path<String>,
) -> Result<ApiListResponse<TransactionRecord>, ApiError> {
    let history = state.ledger_service.transaction_history(&number).await?;
    Ok(ApiListResponse::new(history))
}

/// Deposit cash onto a card
#[utoipa::path(
    post,
    path = "/api/v1/deposit",
    request_body = DepositRequest,
    responses(
        (status = 200, description = "Deposit committed"),
        (status = 400, description = "Invalid amount"),
        (status = 403, description = "Card belongs to another user"),
        (status = 404, description = "Card not found"),
        (status = 503, description = "Store unavailable")
    ),
    tag = "card"
)]
pub async fn deposit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<DepositRequest>,
) -> Result<ApiResponse<DepositReceipt>, ApiError> {
    let new_balance = state.ledger_service
        .deposit(request.owner_id, &request.card_number, request.amount)
        .await?;

    let receipt = DepositReceipt {
        card_number: request.card_number,
        deposited: request.amount.normalize(),
        new_balance,
    };
    Ok(ApiResponse::for_request(receipt, &headers))
}

/// Transfer funds between two cards
#[utoipa::path(
    post,
    path = "/api/v1/transfer",
    request_body = TransferRequest,
    responses(
        (status = 200, description = "Transfer committed"),
        (status = 400, description = "Invalid amount or same card"),
        (status = 401, description = "Wrong security code"),
        (status = 404, description = "Card not found"),
        (status = 422, description = "Insufficient funds"),
        (status = 503, description = "Store unavailable")
    ),
    tag = "card"
)]
pub async fn transfer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<TransferRequest>,
) -> Result<ApiResponse<TransferReceipt>, ApiError> {
    let receipt = state.ledger_service
        .transfer(&request.from_card, &request.to_card, request.amount, &request.security_code)
        .await?;
    Ok(ApiResponse::for_request(receipt, &headers))
}
