//! # Tier Registry
//!
//! Tiers are an append-only sequence indexed by nonce. A tier is never deleted
//! or renumbered, only deactivated, so the nonce held inside an open position
//! stays valid for the life of the mine.
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `apy_bps` | Annualized simple rate, unbounded so accelerated test rates work |
//! | `minimum_token_amount` | Smallest deposit accepted on the normal entry path |
//! | `lock_duration_secs` | Interval after which a position may compound or claim penalty-free |
//! | `total_locked` | Principal currently open in the tier |

use serde::{Deserialize, Serialize};
use tiermine_core::{Amount, Bps, MineError, Result, TierNonce};
use tiermine_storage::{Record, RecordKey};

/// A rate/lock/threshold bucket positions are opened against
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    pub nonce: TierNonce,
    pub apy_bps: Bps,
    pub minimum_token_amount: Amount,
    pub lock_duration_secs: u64,
    pub total_locked: Amount,
    pub is_active: bool,
}

/// Parameters supplied to `add_tier`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierParams {
    pub apy_bps: Bps,
    pub minimum_token_amount: Amount,
    pub lock_duration_secs: u64,
}

/// Partial update; `None` leaves a field untouched
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierUpdate {
    pub minimum_token_amount: Option<Amount>,
    pub apy_bps: Option<Bps>,
    pub lock_duration_secs: Option<u64>,
    pub is_active: Option<bool>,
}

impl TierConfig {
    pub fn new(nonce: TierNonce, params: TierParams) -> Self {
        Self {
            nonce,
            apy_bps: params.apy_bps,
            minimum_token_amount: params.minimum_token_amount,
            lock_duration_secs: params.lock_duration_secs,
            total_locked: 0,
            is_active: true,
        }
    }

    pub fn key(nonce: TierNonce) -> RecordKey {
        RecordKey::new(Self::TAG, nonce.to_le_bytes())
    }

    pub fn ensure_active(&self) -> Result<()> {
        if !self.is_active {
            return Err(MineError::InactiveTier(self.nonce));
        }
        Ok(())
    }

    pub fn ensure_minimum(&self, amount: Amount) -> Result<()> {
        if amount < self.minimum_token_amount {
            return Err(MineError::BelowMinimum {
                amount,
                minimum: self.minimum_token_amount,
            });
        }
        Ok(())
    }

    /// Only future projections see the new values; open positions keep the
    /// interest already projected for them.
    pub fn apply(&mut self, update: &TierUpdate) {
        if let Some(minimum) = update.minimum_token_amount {
            self.minimum_token_amount = minimum;
        }
        if let Some(apy) = update.apy_bps {
            self.apy_bps = apy;
        }
        if let Some(lock) = update.lock_duration_secs {
            self.lock_duration_secs = lock;
        }
        if let Some(is_active) = update.is_active {
            self.is_active = is_active;
        }
    }

    pub fn credit_locked(&mut self, amount: Amount) -> Result<()> {
        self.total_locked = self
            .total_locked
            .checked_add(amount)
            .ok_or(MineError::ArithmeticOverflow)?;
        Ok(())
    }

    pub fn debit_locked(&mut self, amount: Amount) -> Result<()> {
        self.total_locked = self.total_locked.checked_sub(amount).ok_or_else(|| {
            MineError::InvariantViolation(format!(
                "tier #{} holds {} but {} is being released",
                self.nonce, self.total_locked, amount
            ))
        })?;
        Ok(())
    }
}

impl Record for TierConfig {
    const TAG: &'static str = "tier";

    fn record_key(&self) -> RecordKey {
        Self::key(self.nonce)
    }
}
