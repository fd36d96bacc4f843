//! # Tiermine Storage
//!
//! Atomic key-value ledger backing the staking records.
//!
//! ## Storage Layout
//!
//! - `address` - deterministic record addressing: `BLAKE3(tag || 0x00 || key)`
//! - `ledger_db` - transactional in-memory store with bincode-encoded records
//! - snapshots - the whole store serialized to a single file
//!
//! Every write goes through [`LedgerStore::transaction`]. Writes are staged in an
//! overlay and only applied when the closure returns `Ok`, so a failed operation
//! leaves no trace.

use thiserror::Error;
use tiermine_core::MineError;

pub mod address {
    //! Deterministic record addressing

    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Serialize};
    use std::fmt;

    /// Canonical 32-byte location of a record
    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub struct RecordAddress([u8; 32]);

    impl RecordAddress {
        pub fn as_bytes(&self) -> &[u8; 32] {
            &self.0
        }

        pub fn to_hex(&self) -> String {
            hex::encode(self.0)
        }
    }

    impl fmt::Debug for RecordAddress {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "RecordAddress({})", &self.to_hex()[..16])
        }
    }

    impl fmt::Display for RecordAddress {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", &self.to_hex()[..16])
        }
    }

    /// Namespace tag plus owning key
    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub struct RecordKey {
        tag: &'static str,
        key: Vec<u8>,
    }

    impl RecordKey {
        pub fn new(tag: &'static str, key: impl AsRef<[u8]>) -> Self {
            Self {
                tag,
                key: key.as_ref().to_vec(),
            }
        }

        /// Key for a singleton record
        pub fn singleton(tag: &'static str) -> Self {
            Self {
                tag,
                key: Vec::new(),
            }
        }

        pub fn tag(&self) -> &'static str {
            self.tag
        }

        /// Derive the storage address
        pub fn address(&self) -> RecordAddress {
            let mut hasher = blake3::Hasher::new();
            hasher.update(self.tag.as_bytes());
            // separator keeps ("ab", "c") and ("a", "bc") apart
            hasher.update(&[0u8]);
            hasher.update(&self.key);
            RecordAddress(*hasher.finalize().as_bytes())
        }
    }

    /// A type persisted in the ledger under its own namespace
    pub trait Record: Serialize + DeserializeOwned {
        /// Namespace tag
        const TAG: &'static str;

        /// Key this record is stored under
        fn record_key(&self) -> RecordKey;
    }
}

pub mod ledger_db {
    //! Transactional record store

    use super::address::{Record, RecordAddress, RecordKey};
    use super::StorageError;
    use parking_lot::RwLock;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use std::path::Path;

    const SNAPSHOT_VERSION: u32 = 1;

    #[derive(Serialize, Deserialize)]
    struct Snapshot {
        version: u32,
        records: Vec<(RecordAddress, Vec<u8>)>,
    }

    /// In-memory ledger of encoded records
    ///
    /// Transactions hold the write lock for their whole duration, which makes
    /// every committed transaction linearizable against every other.
    pub struct LedgerStore {
        data: RwLock<HashMap<RecordAddress, Vec<u8>>>,
    }

    impl LedgerStore {
        pub fn new() -> Self {
            Self {
                data: RwLock::new(HashMap::new()),
            }
        }

        /// Read a committed record
        pub fn get<T: Record>(&self, key: &RecordKey) -> Result<Option<T>, StorageError> {
            debug_assert_eq!(key.tag(), T::TAG);
            self.data
                .read()
                .get(&key.address())
                .map(|bytes| decode(bytes))
                .transpose()
        }

        pub fn contains(&self, key: &RecordKey) -> bool {
            self.data.read().contains_key(&key.address())
        }

        /// Number of committed records
        pub fn len(&self) -> usize {
            self.data.read().len()
        }

        pub fn is_empty(&self) -> bool {
            self.data.read().is_empty()
        }

        /// Run `f` as one atomic transaction
        ///
        /// Staged writes are applied only if `f` returns `Ok`.
        pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
        where
            F: FnOnce(&mut StoreTxn<'_>) -> Result<T, E>,
        {
            let mut guard = self.data.write();

            let (out, writes) = {
                let mut txn = StoreTxn::new(&guard);
                let out = f(&mut txn)?;
                (out, txn.writes)
            };

            let staged = writes.len();
            for (address, value) in writes {
                match value {
                    Some(bytes) => {
                        guard.insert(address, bytes);
                    }
                    None => {
                        guard.remove(&address);
                    }
                }
            }
            tracing::trace!(staged, "ledger transaction committed");

            Ok(out)
        }

        /// Run `f` against a consistent read-only view of committed data
        pub fn view<T, E, F>(&self, f: F) -> Result<T, E>
        where
            F: FnOnce(&StoreTxn<'_>) -> Result<T, E>,
        {
            let guard = self.data.read();
            let txn = StoreTxn::new(&guard);
            f(&txn)
        }

        /// Serialize every committed record
        pub fn to_snapshot_bytes(&self) -> Result<Vec<u8>, StorageError> {
            let mut records: Vec<(RecordAddress, Vec<u8>)> = self
                .data
                .read()
                .iter()
                .map(|(address, bytes)| (*address, bytes.clone()))
                .collect();
            records.sort_by(|a, b| a.0.cmp(&b.0));

            bincode::serialize(&Snapshot {
                version: SNAPSHOT_VERSION,
                records,
            })
            .map_err(|e| StorageError::Encode(e.to_string()))
        }

        pub fn from_snapshot_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
            let snapshot: Snapshot =
                bincode::deserialize(bytes).map_err(|e| StorageError::Decode(e.to_string()))?;

            if snapshot.version != SNAPSHOT_VERSION {
                return Err(StorageError::UnsupportedSnapshot(snapshot.version));
            }

            Ok(Self {
                data: RwLock::new(snapshot.records.into_iter().collect()),
            })
        }

        pub fn save_snapshot(&self, path: &Path) -> Result<(), StorageError> {
            let bytes = self.to_snapshot_bytes()?;
            std::fs::write(path, bytes)?;
            tracing::debug!(path = %path.display(), records = self.len(), "snapshot saved");
            Ok(())
        }

        pub fn load_snapshot(path: &Path) -> Result<Self, StorageError> {
            let bytes = std::fs::read(path)?;
            let store = Self::from_snapshot_bytes(&bytes)?;
            tracing::debug!(path = %path.display(), records = store.len(), "snapshot loaded");
            Ok(store)
        }
    }

    impl Default for LedgerStore {
        fn default() -> Self {
            Self::new()
        }
    }

    /// View of the store inside a transaction: committed data plus staged writes
    pub struct StoreTxn<'a> {
        base: &'a HashMap<RecordAddress, Vec<u8>>,
        writes: HashMap<RecordAddress, Option<Vec<u8>>>,
    }

    impl<'a> StoreTxn<'a> {
        fn new(base: &'a HashMap<RecordAddress, Vec<u8>>) -> Self {
            Self {
                base,
                writes: HashMap::new(),
            }
        }

        fn raw(&self, address: &RecordAddress) -> Option<&[u8]> {
            match self.writes.get(address) {
                Some(staged) => staged.as_deref(),
                None => self.base.get(address).map(Vec::as_slice),
            }
        }

        pub fn get<T: Record>(&self, key: &RecordKey) -> Result<Option<T>, StorageError> {
            debug_assert_eq!(key.tag(), T::TAG);
            self.raw(&key.address()).map(decode).transpose()
        }

        pub fn contains(&self, key: &RecordKey) -> bool {
            self.raw(&key.address()).is_some()
        }

        /// Stage an insert or overwrite
        pub fn put<T: Record>(&mut self, record: &T) -> Result<(), StorageError> {
            let key = record.record_key();
            debug_assert_eq!(key.tag(), T::TAG);
            let bytes =
                bincode::serialize(record).map_err(|e| StorageError::Encode(e.to_string()))?;
            self.writes.insert(key.address(), Some(bytes));
            Ok(())
        }

        /// Stage a delete, returning whether the record existed
        pub fn delete(&mut self, key: &RecordKey) -> bool {
            let address = key.address();
            let existed = self.raw(&address).is_some();
            self.writes.insert(address, None);
            existed
        }
    }

    fn decode<T: Record>(bytes: &[u8]) -> Result<T, StorageError> {
        bincode::deserialize(bytes).map_err(|e| StorageError::Decode(e.to_string()))
    }
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to encode record: {0}")]
    Encode(String),

    #[error("Failed to decode record: {0}")]
    Decode(String),

    #[error("Unsupported snapshot version {0}")]
    UnsupportedSnapshot(u32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for MineError {
    fn from(err: StorageError) -> Self {
        MineError::Storage(err.to_string())
    }
}

// Re-export for convenience
pub use address::{Record, RecordAddress, RecordKey};
pub use ledger_db::{LedgerStore, StoreTxn};
