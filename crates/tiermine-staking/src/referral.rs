//! # Referral Accounts
//!
//! A referrer's account is created the first time one of its referrals deposits,
//! then credited on every later referred deposit. `count` is a lifetime counter
//! and survives withdrawals.

use serde::{Deserialize, Serialize};
use tiermine_core::{fee, AccountId, Amount, Bps, MineError, Result};
use tiermine_storage::{Record, RecordAddress, RecordKey};

use crate::position::Position;

/// Claimable referral earnings of one referrer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralAccount {
    /// The referrer
    pub owner: AccountId,

    /// Address of the referrer's own position record
    pub position: RecordAddress,

    pub earnings: Amount,

    /// Number of referred deposits ever attributed
    pub count: u64,
}

impl ReferralAccount {
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            position: Position::key(&owner).address(),
            earnings: 0,
            count: 0,
        }
    }

    pub fn key(owner: &AccountId) -> RecordKey {
        RecordKey::new(Self::TAG, owner.as_bytes())
    }

    /// Bonus owed for a referred deposit of `net_principal`
    pub fn bonus_for(net_principal: Amount, referral_reward_bps: Bps) -> Result<Amount> {
        fee(net_principal, referral_reward_bps)
    }

    /// Record one referred deposit
    pub fn credit(&mut self, bonus: Amount) -> Result<()> {
        self.earnings = self
            .earnings
            .checked_add(bonus)
            .ok_or(MineError::ArithmeticOverflow)?;
        self.count = self.count.checked_add(1).ok_or(MineError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Zero the earnings and return what was there
    pub fn take_earnings(&mut self) -> Result<Amount> {
        if self.earnings == 0 {
            return Err(MineError::NothingToWithdraw);
        }
        Ok(std::mem::take(&mut self.earnings))
    }
}

impl Record for ReferralAccount {
    const TAG: &'static str = "referral";

    fn record_key(&self) -> RecordKey {
        Self::key(&self.owner)
    }
}
