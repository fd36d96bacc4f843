//! Interest engine and basis-point fee arithmetic
//!
//! All products are formed in `u128`. Results that do not fit back into an
//! [`Amount`] are reported as [`MineError::ArithmeticOverflow`] rather than clamped.

use crate::error::{MineError, Result};
use crate::types::constants::{BPS_DENOMINATOR, SECONDS_PER_YEAR};
use crate::types::{Amount, Bps};
use serde::{Deserialize, Serialize};

const INTEREST_DENOMINATOR: u128 = SECONDS_PER_YEAR as u128 * BPS_DENOMINATOR as u128;

/// Simple interest on `amount` at `apy_bps` over `interval_secs`, rounded half-up
pub fn projected_interest(amount: Amount, apy_bps: Bps, interval_secs: u64) -> Result<Amount> {
    let numerator = (interval_secs as u128)
        .checked_mul(amount as u128)
        .and_then(|v| v.checked_mul(apy_bps as u128))
        .ok_or(MineError::ArithmeticOverflow)?;

    // numerator <= u128::MAX, so adding half the denominator can still overflow
    let rounded = numerator
        .checked_add(INTEREST_DENOMINATOR / 2)
        .ok_or(MineError::ArithmeticOverflow)?
        / INTEREST_DENOMINATOR;

    Amount::try_from(rounded).map_err(|_| MineError::ArithmeticOverflow)
}

/// `floor(amount × bps / 10000)`
pub fn fee(amount: Amount, bps: Bps) -> Result<Amount> {
    let scaled = (amount as u128)
        .checked_mul(bps as u128)
        .ok_or(MineError::ArithmeticOverflow)?
        / BPS_DENOMINATOR as u128;

    Amount::try_from(scaled).map_err(|_| MineError::ArithmeticOverflow)
}

/// An amount divided into the fee taken and what remains
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub fee: Amount,
    pub net: Amount,
}

/// Split `amount` into a floor-rounded fee and the remainder
///
/// `fee + net == amount` always holds. A rate above 100% is an invariant violation.
pub fn split_fee(amount: Amount, bps: Bps) -> Result<FeeSplit> {
    let fee = fee(amount, bps)?;
    let net = amount.checked_sub(fee).ok_or_else(|| {
        MineError::InvariantViolation(format!("fee {} exceeds base amount {}", fee, amount))
    })?;
    Ok(FeeSplit { fee, net })
}
