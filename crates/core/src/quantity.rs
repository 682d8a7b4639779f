//! Quantity arithmetic.
//!
//! Stock quantities are exact decimals; floating point never enters the
//! bookkeeping.

use rust_decimal::Decimal;

use crate::error::{DomainError, DomainResult};

/// Stock quantity (exact decimal, never negative when stored).
pub type Quantity = Decimal;

/// Reject negative input quantities.
pub fn ensure_non_negative(what: &str, qty: Quantity) -> DomainResult<()> {
    if qty < Decimal::ZERO {
        return Err(DomainError::validation(format!(
            "{what} cannot be negative (got {qty})"
        )));
    }
    Ok(())
}

/// Reject zero or negative input quantities.
pub fn ensure_positive(what: &str, qty: Quantity) -> DomainResult<()> {
    if qty <= Decimal::ZERO {
        return Err(DomainError::validation(format!(
            "{what} must be positive (got {qty})"
        )));
    }
    Ok(())
}
