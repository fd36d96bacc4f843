//! # Position Lifecycle
//!
//! A position is either absent or open. Open positions accept top-ups,
//! compounding and interest claims until an admin terminates them.
//!
//! ```text
//!   Absent ──open──► Open ──terminate──► Absent
//!                    │  ▲
//!                    └──┘ top-up / compound / claim
//! ```
//!
//! `accrued_interest` is always a projection for the current lock interval,
//! fixed at the last checkpoint (`lock_timestamp`). It does not grow between
//! operations.

use serde::{Deserialize, Serialize};
use tiermine_core::{
    elapsed_secs, projected_interest, split_fee, AccountId, Amount, MineError, Result, TierNonce,
    Timestamp,
};
use tiermine_storage::{Record, RecordKey};

use crate::mine::MineConfig;
use crate::tier::TierConfig;

/// A depositor's open stake
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub owner: AccountId,
    pub tier: TierNonce,

    /// Principal
    pub total_locked: Amount,

    /// Interest projected for the current lock interval
    pub accrued_interest: Amount,

    /// Last time principal or its projection was reset
    pub lock_timestamp: Timestamp,

    pub is_whitelisted: bool,
}

/// Fee breakdown of paying out a position's accrued interest
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimBreakdown {
    pub interest: Amount,
    pub dev_fee: Amount,
    pub penalty_fee: Amount,
    pub amount_out: Amount,
    pub early: bool,
}

/// Result of a top-up
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TopUpOutcome {
    /// Interest earned on the previous principal since the last checkpoint
    pub settled_interest: Amount,

    /// Projection for the enlarged principal over a fresh lock period
    pub projected_interest: Amount,
}

impl Position {
    pub fn key(owner: &AccountId) -> RecordKey {
        RecordKey::new(Self::TAG, owner.as_bytes())
    }

    /// Open a position holding `net_principal`
    pub fn open(
        owner: AccountId,
        tier: &TierConfig,
        net_principal: Amount,
        now: Timestamp,
        is_whitelisted: bool,
    ) -> Result<Self> {
        if net_principal == 0 {
            return Err(MineError::InvalidAmount(
                "net principal after fees is zero".into(),
            ));
        }

        Ok(Self {
            owner,
            tier: tier.nonce,
            total_locked: net_principal,
            accrued_interest: projected_interest(
                net_principal,
                tier.apy_bps,
                tier.lock_duration_secs,
            )?,
            lock_timestamp: now,
            is_whitelisted,
        })
    }

    pub fn elapsed(&self, now: Timestamp) -> u64 {
        elapsed_secs(now, self.lock_timestamp)
    }

    pub fn is_matured(&self, tier: &TierConfig, now: Timestamp) -> bool {
        self.elapsed(now) >= tier.lock_duration_secs
    }

    /// Seconds until maturity, zero once matured
    pub fn remaining_lock(&self, tier: &TierConfig, now: Timestamp) -> u64 {
        tier.lock_duration_secs.saturating_sub(self.elapsed(now))
    }

    /// Settle interest earned so far, add `net_amount`, then re-project
    pub fn top_up(
        &mut self,
        tier: &TierConfig,
        net_amount: Amount,
        now: Timestamp,
    ) -> Result<TopUpOutcome> {
        if net_amount == 0 {
            return Err(MineError::InvalidAmount(
                "net top-up after fees is zero".into(),
            ));
        }

        let settled_interest =
            projected_interest(self.total_locked, tier.apy_bps, self.elapsed(now))?;
        let total_locked = self
            .total_locked
            .checked_add(net_amount)
            .ok_or(MineError::ArithmeticOverflow)?;
        let projected = projected_interest(total_locked, tier.apy_bps, tier.lock_duration_secs)?;

        self.accrued_interest = settled_interest
            .checked_add(projected)
            .ok_or(MineError::ArithmeticOverflow)?;
        self.total_locked = total_locked;
        self.lock_timestamp = now;

        Ok(TopUpOutcome {
            settled_interest,
            projected_interest: projected,
        })
    }

    /// Fold the matured projection into principal; returns the compounded amount
    pub fn compound(&mut self, tier: &TierConfig, now: Timestamp) -> Result<Amount> {
        if !self.is_matured(tier, now) {
            return Err(MineError::LockNotMatured {
                remaining_secs: self.remaining_lock(tier, now),
            });
        }

        let compounded = self.accrued_interest;
        let total_locked = self
            .total_locked
            .checked_add(compounded)
            .ok_or(MineError::ArithmeticOverflow)?;

        self.accrued_interest =
            projected_interest(total_locked, tier.apy_bps, tier.lock_duration_secs)?;
        self.total_locked = total_locked;
        self.lock_timestamp = now;

        Ok(compounded)
    }

    /// What claiming right now would pay, without touching the position
    pub fn claim_breakdown(
        &self,
        tier: &TierConfig,
        mine: &MineConfig,
        now: Timestamp,
    ) -> Result<ClaimBreakdown> {
        let interest = self.accrued_interest;
        let early = !self.is_matured(tier, now);

        let dev_fee = split_fee(interest, mine.dev_fee_bps)?.fee;
        let penalty_fee = if early {
            split_fee(interest, mine.early_withdrawal_fee_bps)?.fee
        } else {
            0
        };

        let amount_out = dev_fee
            .checked_add(penalty_fee)
            .and_then(|fees| interest.checked_sub(fees))
            .ok_or_else(|| {
                MineError::InvariantViolation(format!(
                    "fees {} + {} exceed claimed interest {}",
                    dev_fee, penalty_fee, interest
                ))
            })?;

        Ok(ClaimBreakdown {
            interest,
            dev_fee,
            penalty_fee,
            amount_out,
            early,
        })
    }

    /// Pay out accrued interest and start a fresh projection on unchanged principal
    pub fn claim(
        &mut self,
        tier: &TierConfig,
        mine: &MineConfig,
        now: Timestamp,
    ) -> Result<ClaimBreakdown> {
        let breakdown = self.claim_breakdown(tier, mine, now)?;

        self.accrued_interest =
            projected_interest(self.total_locked, tier.apy_bps, tier.lock_duration_secs)?;
        self.lock_timestamp = now;

        Ok(breakdown)
    }
}

impl Record for Position {
    const TAG: &'static str = "position";

    fn record_key(&self) -> RecordKey {
        Self::key(&self.owner)
    }
}
