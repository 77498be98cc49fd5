//! Decimal type utilities for precise money calculations

use rust_decimal::Decimal;
pub use rust_decimal_macros::dec;

use crate::error::{Error, Result};

/// Money amount with fixed-point precision
pub type Amount = Decimal;

/// Precision constants for money
pub mod precision {
    /// Money is kept to cents
    pub const MONEY_SCALE: u32 = 2;
}

/// Largest balance a card can hold; matches the `NUMERIC(20,2)` balance column
pub const MAX_BALANCE: Amount = dec!(999999999999999999.99);

/// Check that a request amount is strictly positive and representable in cents
pub fn validate_amount(amount: Amount) -> Result<Amount> {
    if amount <= Amount::ZERO {
        return Err(Error::InvalidAmount(format!("amount must be positive, got {}", amount)));
    }

    if amount > MAX_BALANCE {
        return Err(Error::InvalidAmount(format!("amount {} exceeds the maximum of {}", amount, MAX_BALANCE)));
    }

    let normalized = amount.normalize();
    if normalized.scale() > precision::MONEY_SCALE {
        return Err(Error::InvalidAmount(format!(
            "amount {} has more than {} decimal places",
            amount,
            precision::MONEY_SCALE
        )));
    }

    Ok(normalized)
}
