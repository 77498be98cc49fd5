//! Card models and balance mutation primitives

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Amount, MAX_BALANCE};
use crate::error::{Error, Result};
use crate::model::transaction::TransactionRecord;
#[cfg(feature = "utoipa")]
use crate::utoipa::ToSchema;

/// Length of a generated card number
pub const CARD_NUMBER_LENGTH: usize = 16;

/// Length of a generated security code
pub const SECURITY_CODE_LENGTH: usize = 3;

/// Cards expire this many months after opening
pub const CARD_VALIDITY_MONTHS: u32 = 48;

/// Payment network of a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub enum CardNetwork {
    MasterCard,
    Visa,
}

impl CardNetwork {
    /// Decode the numeric network code used by registration forms (0 MasterCard, 1 Visa)
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(CardNetwork::MasterCard),
            1 => Ok(CardNetwork::Visa),
            other => Err(Error::ValidationError(format!(
                "Invalid card type {}: choose 0 for MasterCard or 1 for Visa",
                other
            ))),
        }
    }
}

impl fmt::Display for CardNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardNetwork::MasterCard => write!(f, "MasterCard"),
            CardNetwork::Visa => write!(f, "Visa"),
        }
    }
}

impl FromStr for CardNetwork {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MasterCard" => Ok(CardNetwork::MasterCard),
            "Visa" => Ok(CardNetwork::Visa),
            other => Err(Error::ValidationError(format!("Unknown card network: {}", other))),
        }
    }
}

/// Card model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct Card {
    /// Unique card number
    pub number: String,
    /// Owning user ID
    pub owner: Uuid,
    /// Security code required to send funds from this card; never serialized
    #[serde(skip_serializing, default)]
    pub security_code: String,
    /// Payment network
    pub network: CardNetwork,
    /// Expiration date
    pub expiration_date: NaiveDate,
    /// Current balance, never negative
    #[cfg_attr(feature = "utoipa", schema(value_type = String))]
    pub balance: Amount,
    /// Append-only history of actions on this card
    pub transaction_history: Vec<TransactionRecord>,
    /// Store-managed version, incremented on every committed write
    pub version: u64,
    /// Card creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Card {
    /// Create a freshly opened card with zero balance and a `CardOpened` record
    pub fn open(
        number: String,
        owner: Uuid,
        security_code: String,
        network: CardNetwork,
        now: DateTime<Utc>,
    ) -> Self {
        let today = now.date_naive();
        let expiration_date = today
            .checked_add_months(Months::new(CARD_VALIDITY_MONTHS))
            .unwrap_or(NaiveDate::MAX);

        Self {
            transaction_history: vec![TransactionRecord::card_opened(&number, now)],
            number,
            owner,
            security_code,
            network,
            expiration_date,
            balance: Amount::ZERO,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check the supplied security code against the stored one in constant time
    pub fn verify_security_code(&self, code: &str) -> bool {
        let (expected, supplied) = (self.security_code.as_bytes(), code.as_bytes());
        expected.len() == supplied.len()
            && expected.iter().zip(supplied).fold(0u8, |diff, (a, b)| diff | (a ^ b)) == 0
    }

    /// Add deposited cash to the balance
    pub fn deposit(&mut self, amount: Amount, at: DateTime<Utc>) -> Result<()> {
        self.balance = self.raised_balance(amount)?;
        self.transaction_history.push(TransactionRecord::deposit(&self.number, amount, at));
        self.updated_at = at;
        Ok(())
    }

    /// Remove funds sent to `to`
    pub fn debit(&mut self, amount: Amount, to: &str, at: DateTime<Utc>) -> Result<()> {
        if amount > self.balance {
            return Err(Error::InsufficientFunds(format!(
                "card {} holds {}, requested {}",
                self.number, self.balance, amount
            )));
        }

        self.balance -= amount;
        self.transaction_history
            .push(TransactionRecord::transfer_out(&self.number, to, amount, at));
        self.updated_at = at;
        Ok(())
    }

    /// Add funds received from `from`
    pub fn credit(&mut self, amount: Amount, from: &str, at: DateTime<Utc>) -> Result<()> {
        self.balance = self.raised_balance(amount)?;
        self.transaction_history
            .push(TransactionRecord::transfer_in(from, &self.number, amount, at));
        self.updated_at = at;
        Ok(())
    }

    fn raised_balance(&self, amount: Amount) -> Result<Amount> {
        self.balance
            .checked_add(amount)
            .filter(|balance| *balance <= MAX_BALANCE)
            .ok_or_else(|| Error::InvalidAmount(format!(
                "card {} holds {}; adding {} exceeds the maximum balance {}",
                self.number, self.balance, amount, MAX_BALANCE
            )))
    }

    /// Abort if the card violates the non-negative balance invariant.
    ///
    /// A negative balance can only come from earlier corruption of the store,
    /// so there is no sensible way to continue.
    pub fn assert_invariants(&self) {
        assert!(
            self.balance >= Amount::ZERO,
            "card {} has negative balance {}",
            self.number,
            self.balance
        );
    }
}
