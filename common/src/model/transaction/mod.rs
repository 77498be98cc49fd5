//! Transaction history records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Amount;
#[cfg(feature = "utoipa")]
use crate::utoipa::ToSchema;

/// Kind of action recorded in a card's history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Cash deposited by the owner
    Deposit,
    /// Funds sent to another card
    TransferOut,
    /// Funds received from another card
    TransferIn,
    /// The card was opened
    CardOpened,
}

/// Immutable entry of a card's transaction history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct TransactionRecord {
    /// Source card number, absent for deposits and openings
    pub from: Option<String>,
    /// Destination card number
    pub to: Option<String>,
    /// Amount moved; zero only for `CardOpened`
    #[cfg_attr(feature = "utoipa", schema(value_type = String))]
    pub amount: Amount,
    /// When the action was committed
    pub action_timestamp: DateTime<Utc>,
    /// What happened
    pub action_kind: ActionKind,
}

impl TransactionRecord {
    pub fn card_opened(number: &str, at: DateTime<Utc>) -> Self {
        Self {
            from: None,
            to: Some(number.to_string()),
            amount: Amount::ZERO,
            action_timestamp: at,
            action_kind: ActionKind::CardOpened,
        }
    }

    pub fn deposit(number: &str, amount: Amount, at: DateTime<Utc>) -> Self {
        Self {
            from: None,
            to: Some(number.to_string()),
            amount,
            action_timestamp: at,
            action_kind: ActionKind::Deposit,
        }
    }

    /// Record appended to the source card of a transfer
    pub fn transfer_out(from: &str, to: &str, amount: Amount, at: DateTime<Utc>) -> Self {
        Self {
            from: Some(from.to_string()),
            to: Some(to.to_string()),
            amount,
            action_timestamp: at,
            action_kind: ActionKind::TransferOut,
        }
    }

    /// Record appended to the destination card of a transfer
    pub fn transfer_in(from: &str, to: &str, amount: Amount, at: DateTime<Utc>) -> Self {
        Self {
            action_kind: ActionKind::TransferIn,
            ..Self::transfer_out(from, to, amount, at)
        }
    }
}
