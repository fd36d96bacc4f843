//! # Mine Configuration
//!
//! The deployment-wide singleton: who administers the mine, where fees go,
//! the fee and reward rates, the tier counter and the kill switch.

use serde::{Deserialize, Serialize};
use tiermine_core::constants::MAX_FEE_BPS;
use tiermine_core::{AccountId, Bps, MineError, Result, TierNonce};
use tiermine_storage::{Record, RecordKey};

/// Global mine settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MineConfig {
    /// Identity allowed to run admin-only operations
    pub admin: AccountId,

    /// Mint of the single value unit staked in this mine
    pub token_mint: AccountId,

    /// Receives dev fees
    pub fee_collector: AccountId,

    /// Receives early-withdrawal penalties
    pub penalty_collector: AccountId,

    pub dev_fee_bps: Bps,
    pub early_withdrawal_fee_bps: Bps,
    pub referral_reward_bps: Bps,

    /// Number of tiers ever added; also the nonce the next tier receives
    pub current_tier_nonce: TierNonce,

    /// Kill switch for new position openings
    pub is_active: bool,
}

/// Parameters supplied to `initialize`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MineParams {
    pub token_mint: AccountId,
    pub fee_collector: AccountId,
    pub penalty_collector: AccountId,
    pub dev_fee_bps: Bps,
    pub early_withdrawal_fee_bps: Bps,
    pub referral_reward_bps: Bps,
}

/// Partial update; `None` leaves a field untouched
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MineUpdate {
    pub fee_collector: Option<AccountId>,
    pub penalty_collector: Option<AccountId>,
    pub dev_fee_bps: Option<Bps>,
    pub early_withdrawal_fee_bps: Option<Bps>,
    pub referral_reward_bps: Option<Bps>,
    pub is_active: Option<bool>,
}

impl MineConfig {
    pub fn new(admin: AccountId, params: MineParams) -> Result<Self> {
        let mine = Self {
            admin,
            token_mint: params.token_mint,
            fee_collector: params.fee_collector,
            penalty_collector: params.penalty_collector,
            dev_fee_bps: params.dev_fee_bps,
            early_withdrawal_fee_bps: params.early_withdrawal_fee_bps,
            referral_reward_bps: params.referral_reward_bps,
            current_tier_nonce: 0,
            is_active: true,
        };
        mine.validate_rates()?;
        Ok(mine)
    }

    pub fn key() -> RecordKey {
        RecordKey::singleton(Self::TAG)
    }

    /// Reject any fee or reward rate above 100%
    pub fn validate_rates(&self) -> Result<()> {
        for bps in [
            self.dev_fee_bps,
            self.early_withdrawal_fee_bps,
            self.referral_reward_bps,
        ] {
            if bps > MAX_FEE_BPS {
                return Err(MineError::InvalidFeeRate(bps));
            }
        }
        Ok(())
    }

    pub fn ensure_admin(&self, signer: &AccountId) -> Result<()> {
        if *signer != self.admin {
            tracing::warn!(signer = %signer, "rejected admin operation from non-admin signer");
            return Err(MineError::Unauthorized { signer: *signer });
        }
        Ok(())
    }

    pub fn ensure_active(&self) -> Result<()> {
        if !self.is_active {
            return Err(MineError::InactiveMine);
        }
        Ok(())
    }

    /// Apply the present fields of `update`, validating the result
    pub fn apply(&mut self, update: &MineUpdate) -> Result<()> {
        let mut next = self.clone();
        if let Some(fee_collector) = update.fee_collector {
            next.fee_collector = fee_collector;
        }
        if let Some(penalty_collector) = update.penalty_collector {
            next.penalty_collector = penalty_collector;
        }
        if let Some(bps) = update.dev_fee_bps {
            next.dev_fee_bps = bps;
        }
        if let Some(bps) = update.early_withdrawal_fee_bps {
            next.early_withdrawal_fee_bps = bps;
        }
        if let Some(bps) = update.referral_reward_bps {
            next.referral_reward_bps = bps;
        }
        if let Some(is_active) = update.is_active {
            next.is_active = is_active;
        }
        next.validate_rates()?;
        *self = next;
        Ok(())
    }

    /// Hand out the next tier nonce and advance the counter
    pub fn next_tier_nonce(&mut self) -> Result<TierNonce> {
        let nonce = self.current_tier_nonce;
        self.current_tier_nonce = nonce.checked_add(1).ok_or(MineError::ArithmeticOverflow)?;
        Ok(nonce)
    }
}

impl Record for MineConfig {
    const TAG: &'static str = "mine";

    fn record_key(&self) -> RecordKey {
        Self::key()
    }
}
