//! # Tiermine Core
//!
//! Core building blocks for the tiermine staking ledger.
//!
//! This crate provides:
//! - `AccountId` - 32-byte identity for admins, depositors, collectors and mints
//! - `math` - the interest engine and basis-point fee helpers
//! - `Clock` - wall-clock abstraction so the ledger can be driven deterministically
//! - `MineError` - the error type shared by every ledger operation
//!
//! ## Interest model
//!
//! ```text
//!                 interval × amount × apy_bps
//!   interest = ─────────────────────────────────   (rounded half-up)
//!                  31_536_000 × 10_000
//! ```
//!
//! Interest is simple (linear) over the interval. Compounding only happens when
//! a depositor explicitly compounds a matured position.

pub mod clock;
pub mod error;
pub mod math;
pub mod types;

pub use clock::*;
pub use error::*;
pub use math::*;
pub use types::*;
