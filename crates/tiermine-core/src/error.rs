//! Error types for tiermine ledger operations

use crate::types::{AccountId, Amount, Bps, TierNonce, Timestamp};
use std::fmt;
use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, MineError>;

/// Ledger record an operation expected to find
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entity {
    Mine,
    Tier(TierNonce),
    Position(AccountId),
    Referral(AccountId),
    WhitelistGrant(AccountId),
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Mine => write!(f, "mine"),
            Entity::Tier(nonce) => write!(f, "tier #{}", nonce),
            Entity::Position(owner) => write!(f, "position of {}", owner),
            Entity::Referral(owner) => write!(f, "referral account of {}", owner),
            Entity::WhitelistGrant(owner) => write!(f, "whitelist grant for {}", owner),
        }
    }
}

/// Errors that can occur in ledger operations
///
/// Every error aborts the whole operation; nothing is committed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MineError {
    // === Lookups ===
    /// Expected record is absent
    #[error("Not found: {0}")]
    NotFound(Entity),

    /// Record would be created twice
    #[error("Already exists: {0}")]
    AlreadyExists(Entity),

    // === Authorization ===
    /// Signer is not the mine administrator
    #[error("Signer {signer} is not authorized for this operation")]
    Unauthorized { signer: AccountId },

    /// Referrer equals the depositing owner
    #[error("Referrer {0} cannot refer itself")]
    InvalidReferrer(AccountId),

    // === Switches ===
    /// Mine switch is off
    #[error("Mine is inactive")]
    InactiveMine,

    /// Tier switch is off
    #[error("Tier #{0} is inactive")]
    InactiveTier(TierNonce),

    // === Validation ===
    /// Deposit under the tier minimum
    #[error("Deposit of {amount} is below the tier minimum of {minimum}")]
    BelowMinimum { amount: Amount, minimum: Amount },

    /// Compound attempted before maturity
    #[error("Lock has not matured: {remaining_secs}s remaining")]
    LockNotMatured { remaining_secs: u64 },

    /// Grant used after its expiry
    #[error("Whitelist grant expired at {expiry}")]
    GrantExpired { expiry: Timestamp },

    /// Zero or otherwise unusable amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Rate above 100%
    #[error("Fee rate of {0} bps exceeds 10000")]
    InvalidFeeRate(Bps),

    /// Referral withdrawal with zero earnings
    #[error("No referral earnings to withdraw")]
    NothingToWithdraw,

    // === Arithmetic ===
    /// Checked arithmetic overflowed
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    /// Internal accounting inconsistency
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    // === Collaborators ===
    /// Record store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Transfer batch rejected by the funds collaborator
    #[error("Funds transfer failed: {0}")]
    Transfer(String),
}

impl MineError {
    /// Stable numeric code for API responses
    pub fn code(&self) -> u32 {
        match self {
            Self::NotFound(_) => 1001,
            Self::AlreadyExists(_) => 1002,
            Self::Unauthorized { .. } => 2001,
            Self::InvalidReferrer(_) => 2002,
            Self::InactiveMine => 2003,
            Self::InactiveTier(_) => 2004,
            Self::BelowMinimum { .. } => 2005,
            Self::LockNotMatured { .. } => 2006,
            Self::GrantExpired { .. } => 2007,
            Self::InvalidAmount(_) => 2008,
            Self::InvalidFeeRate(_) => 2009,
            Self::NothingToWithdraw => 2010,
            Self::ArithmeticOverflow => 3001,
            Self::InvariantViolation(_) => 3002,
            Self::Storage(_) => 9001,
            Self::Transfer(_) => 9002,
        }
    }

    /// Check if resubmitting the same request later may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::LockNotMatured { .. }
                | Self::InactiveMine
                | Self::InactiveTier(_)
                | Self::Storage(_)
                | Self::Transfer(_)
        )
    }

    /// Fatal precondition failures: the request can never succeed as submitted
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ArithmeticOverflow | Self::InvariantViolation(_))
    }
}
