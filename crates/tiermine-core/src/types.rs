//! Core type definitions for the tiermine ledger

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Amount of the deployment's single fungible value unit, in its smallest denomination
pub type Amount = u64;

/// Rate expressed in basis points (1/10000)
pub type Bps = u64;

/// Unix timestamp in seconds
pub type Timestamp = i64;

/// Index of a tier in the append-only tier registry
pub type TierNonce = u64;

/// AccountId - 32-byte identity of any participant
///
/// Admins, depositors, referrers, fee collectors and the value-unit mint are all
/// addressed by an `AccountId`. Human-readable encodings (JSON, TOML, logs) use hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AccountId {
    id: [u8; 32],
}

impl AccountId {
    pub const fn new(id: [u8; 32]) -> Self {
        Self { id }
    }

    /// Derive an identity from a public key using BLAKE3
    pub fn from_public_key(public_key: &[u8]) -> Self {
        let hash = blake3::hash(public_key);
        Self {
            id: *hash.as_bytes(),
        }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.id
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.id)
    }

    /// Parse from a 64-character hex string
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut id = [0u8; 32];
        hex::decode_to_slice(s.trim_start_matches("0x"), &mut id)?;
        Ok(Self { id })
    }

    /// Zero identity
    pub const ZERO: Self = Self { id: [0u8; 32] };
}

impl FromStr for AccountId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..12])
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            self.id.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Self::from_hex(&s).map_err(serde::de::Error::custom)
        } else {
            <[u8; 32]>::deserialize(deserializer).map(Self::new)
        }
    }
}

/// Ledger-wide constants
pub mod constants {
    /// Seconds in a (365-day) year used by the interest engine
    pub const SECONDS_PER_YEAR: u64 = 31_536_000;

    /// One whole unit in basis points (100%)
    pub const BPS_DENOMINATOR: u64 = 10_000;

    /// Largest accepted fee or reward rate
    pub const MAX_FEE_BPS: u64 = BPS_DENOMINATOR;
}
