//! Typed requests accepted by the ledger core and the results it returns

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Amount;
use crate::error::Result;
use crate::model::card::{Card, CardNetwork};
#[cfg(feature = "utoipa")]
use crate::utoipa::ToSchema;

/// Request to move funds between two cards
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct TransferRequest {
    /// Source card number
    pub from_card: String,
    /// Destination card number
    pub to_card: String,
    /// Amount to transfer
    #[cfg_attr(feature = "utoipa", schema(value_type = String))]
    pub amount: Amount,
    /// Security code of the source card
    pub security_code: String,
}

/// Request to deposit cash onto a card
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct DepositRequest {
    /// ID of the user making the deposit
    pub owner_id: Uuid,
    /// Card to credit
    pub card_number: String,
    /// Amount to deposit
    #[cfg_attr(feature = "utoipa", schema(value_type = String))]
    pub amount: Amount,
}

/// Request to open a new card
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct OpenCardRequest {
    /// Owning user ID
    pub owner_id: Uuid,
    /// Network code: 0 MasterCard, 1 Visa
    pub card_type: i64,
}

impl OpenCardRequest {
    pub fn network(&self) -> Result<CardNetwork> {
        CardNetwork::from_code(self.card_type)
    }
}

/// A newly opened card together with its security code.
///
/// This is the only response that carries the code; `Card` never serializes it.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct IssuedCard {
    pub card: Card,
    pub security_code: String,
}

impl From<Card> for IssuedCard {
    fn from(card: Card) -> Self {
        Self { security_code: card.security_code.clone(), card }
    }
}

/// Outcome of a successful transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct TransferReceipt {
    pub from_card: String,
    pub to_card: String,
    #[cfg_attr(feature = "utoipa", schema(value_type = String))]
    pub amount: Amount,
    /// Source balance after the transfer
    #[cfg_attr(feature = "utoipa", schema(value_type = String))]
    pub from_balance: Amount,
    /// Destination balance after the transfer
    #[cfg_attr(feature = "utoipa", schema(value_type = String))]
    pub to_balance: Amount,
    pub executed_at: DateTime<Utc>,
}

/// Outcome of a successful deposit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct DepositReceipt {
    pub card_number: String,
    #[cfg_attr(feature = "utoipa", schema(value_type = String))]
    pub deposited: Amount,
    #[cfg_attr(feature = "utoipa", schema(value_type = String))]
    pub new_balance: Amount,
}
