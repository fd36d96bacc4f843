//! Amounts moved by each mutating operation

use serde::{Deserialize, Serialize};
use tiermine_core::{AccountId, Amount, TierNonce, Timestamp};

pub use crate::position::ClaimBreakdown as ClaimReceipt;

/// Result of opening a position
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositReceipt {
    pub owner: AccountId,
    pub tier: TierNonce,
    pub amount: Amount,
    pub dev_fee: Amount,
    pub net_principal: Amount,
    pub accrued_interest: Amount,

    /// Credited to the referrer, if there was one
    pub referral_bonus: Option<(AccountId, Amount)>,
    pub lock_timestamp: Timestamp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopUpReceipt {
    pub amount: Amount,
    pub dev_fee: Amount,
    pub net_amount: Amount,
    pub settled_interest: Amount,
    pub total_locked: Amount,
    pub accrued_interest: Amount,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundReceipt {
    pub compounded: Amount,
    pub total_locked: Amount,
    pub accrued_interest: Amount,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationReceipt {
    pub owner: AccountId,
    pub principal: Amount,
    pub dev_fee: Amount,
    pub amount_out: Amount,

    /// Interest projected but never paid
    pub forfeited_interest: Amount,

    /// Referral earnings dropped with the referral account
    pub forfeited_referral: Amount,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralPayout {
    pub earnings: Amount,
    pub dev_fee: Amount,
    pub amount_out: Amount,

    /// Lifetime referral count, unchanged by the withdrawal
    pub count: u64,
}
