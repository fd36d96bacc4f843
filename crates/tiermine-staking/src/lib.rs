//! # Tiermine Staking - Tiered Staking Ledger
//!
//! Depositors lock a single value unit into one of several tiers. Each tier
//! carries its own annual rate, lock duration and minimum deposit.
//!
//! ## Key Features
//!
//! - **Projected interest**: a full lock period of interest is fixed at every checkpoint
//! - **Top-ups**: settle the elapsed sub-interval, then re-project on the new principal
//! - **Compounding**: matured interest folds into principal, fee-free
//! - **Early claims**: interest is paid before maturity minus an early-withdrawal penalty
//! - **Referrals**: a share of each referred net deposit is credited to the referrer
//! - **Whitelist grants**: time-boxed admin exceptions to a tier's minimum
//!
//! ## Records
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │  ("mine", ∅)            MineConfig      singleton              │
//! │  ("tier", nonce)        TierConfig      append-only            │
//! │  ("position", owner)    Position        one per owner          │
//! │  ("referral", owner)    ReferralAccount created on first refer │
//! │  ("whitelist", owner)   WhitelistGrant  consumed on open       │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Fee Schedule
//!
//! | Operation | Dev fee | Penalty | Paid by |
//! |-----------|---------|---------|---------|
//! | open / top-up | on deposit | - | owner |
//! | compound | - | - | - |
//! | claim | on interest | on interest, before maturity | vault |
//! | terminate | on principal | - | vault |
//! | referral withdrawal | on earnings | - | vault |

pub mod engine;
pub mod events;
pub mod funds;
pub mod mine;
pub mod position;
pub mod receipts;
pub mod referral;
pub mod tier;
pub mod whitelist;

// Re-exports
pub use engine::{TierMine, JOURNAL_CAPACITY};
pub use events::{EventRecord, MineEvent};
pub use funds::{FundsTransfer, InMemoryBank, Party, Transfer, TransferBatch, TransferError};
pub use mine::{MineConfig, MineParams, MineUpdate};
pub use position::{ClaimBreakdown, Position, TopUpOutcome};
pub use receipts::{
    ClaimReceipt, CompoundReceipt, DepositReceipt, ReferralPayout, TerminationReceipt,
    TopUpReceipt,
};
pub use referral::ReferralAccount;
pub use tier::{TierConfig, TierParams, TierUpdate};
pub use whitelist::WhitelistGrant;
