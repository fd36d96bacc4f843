//! Journal of committed ledger operations

use serde::{Deserialize, Serialize};
use tiermine_core::{AccountId, Amount, Bps, TierNonce, Timestamp};

use crate::mine::MineUpdate;
use crate::tier::TierUpdate;

/// Journal entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event: MineEvent,

    /// Ledger time of the operation
    pub timestamp: Timestamp,
}

/// Event types
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MineEvent {
    MineInitialized {
        admin: AccountId,
        token_mint: AccountId,
    },

    MineUpdated {
        update: MineUpdate,
    },

    TierAdded {
        nonce: TierNonce,
        apy_bps: Bps,
        minimum_token_amount: Amount,
        lock_duration_secs: u64,
    },

    TierUpdated {
        nonce: TierNonce,
        update: TierUpdate,
    },

    AccountWhitelisted {
        beneficiary: AccountId,
        tier: TierNonce,
        expiry: Timestamp,
    },

    Staked {
        owner: AccountId,
        tier: TierNonce,
        amount: Amount,
        dev_fee: Amount,
        net_principal: Amount,
        whitelisted: bool,
    },

    ReferralCredited {
        referrer: AccountId,
        referee: AccountId,
        bonus: Amount,
    },

    StakeIncreased {
        owner: AccountId,
        amount: Amount,
        settled_interest: Amount,
        total_locked: Amount,
    },

    Compounded {
        owner: AccountId,
        compounded: Amount,
        total_locked: Amount,
    },

    InterestClaimed {
        owner: AccountId,
        interest: Amount,
        dev_fee: Amount,
        penalty_fee: Amount,
        amount_out: Amount,
    },

    StakingTerminated {
        owner: AccountId,
        principal: Amount,
        dev_fee: Amount,
        amount_out: Amount,
        forfeited_interest: Amount,
        forfeited_referral: Amount,
    },

    ReferralWithdrawn {
        referrer: AccountId,
        earnings: Amount,
        dev_fee: Amount,
        amount_out: Amount,
    },
}

impl MineEvent {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            MineEvent::MineInitialized { .. } => "mine_initialized",
            MineEvent::MineUpdated { .. } => "mine_updated",
            MineEvent::TierAdded { .. } => "tier_added",
            MineEvent::TierUpdated { .. } => "tier_updated",
            MineEvent::AccountWhitelisted { .. } => "account_whitelisted",
            MineEvent::Staked { .. } => "staked",
            MineEvent::ReferralCredited { .. } => "referral_credited",
            MineEvent::StakeIncreased { .. } => "stake_increased",
            MineEvent::Compounded { .. } => "compounded",
            MineEvent::InterestClaimed { .. } => "interest_claimed",
            MineEvent::StakingTerminated { .. } => "staking_terminated",
            MineEvent::ReferralWithdrawn { .. } => "referral_withdrawn",
        }
    }
}
