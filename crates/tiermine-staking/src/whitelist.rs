//! Admin-issued, time-boxed permission to open a position below a tier's minimum

use serde::{Deserialize, Serialize};
use tiermine_core::{AccountId, Entity, MineError, Result, TierNonce, Timestamp};
use tiermine_storage::{Record, RecordKey};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistGrant {
    pub beneficiary: AccountId,
    pub tier: TierNonce,

    /// Last second at which the grant may be consumed
    pub expiry: Timestamp,
}

impl WhitelistGrant {
    pub fn new(beneficiary: AccountId, tier: TierNonce, expiry: Timestamp) -> Self {
        Self {
            beneficiary,
            tier,
            expiry,
        }
    }

    pub fn key(beneficiary: &AccountId) -> RecordKey {
        RecordKey::new(Self::TAG, beneficiary.as_bytes())
    }

    /// Check the grant can be consumed for `tier` at `now`
    pub fn validate(&self, tier: TierNonce, now: Timestamp) -> Result<()> {
        if self.tier != tier {
            return Err(MineError::NotFound(Entity::WhitelistGrant(self.beneficiary)));
        }
        if now > self.expiry {
            return Err(MineError::GrantExpired {
                expiry: self.expiry,
            });
        }
        Ok(())
    }
}

impl Record for WhitelistGrant {
    const TAG: &'static str = "whitelist";

    fn record_key(&self) -> RecordKey {
        Self::key(&self.beneficiary)
    }
}
