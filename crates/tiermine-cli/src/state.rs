//! On-disk state between CLI invocations: ledger records plus bank balances

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tiermine_core::Amount;
use tiermine_staking::{InMemoryBank, Party};
use tiermine_storage::LedgerStore;

const STATE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct StateFile {
    version: u32,

    /// `LedgerStore` snapshot bytes
    ledger: Vec<u8>,

    balances: Vec<(Party, Amount)>,
}

/// Load the store and bank from `path`; a missing file yields empty ones
pub fn load(path: &Path) -> anyhow::Result<(LedgerStore, InMemoryBank)> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no state file, starting empty");
        return Ok((LedgerStore::new(), InMemoryBank::new()));
    }

    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let state: StateFile =
        bincode::deserialize(&bytes).with_context(|| format!("decoding {}", path.display()))?;
    if state.version != STATE_VERSION {
        bail!("unsupported state file version {}", state.version);
    }

    let store = LedgerStore::from_snapshot_bytes(&state.ledger)?;
    let bank = InMemoryBank::from_balances(state.balances.into_iter().collect());
    tracing::debug!(path = %path.display(), records = store.len(), "state loaded");
    Ok((store, bank))
}

pub fn save(path: &Path, store: &LedgerStore, bank: &InMemoryBank) -> anyhow::Result<()> {
    let mut balances: Vec<(Party, Amount)> = bank.balances().into_iter().collect();
    balances.sort();

    let state = StateFile {
        version: STATE_VERSION,
        ledger: store.to_snapshot_bytes()?,
        balances,
    };
    let bytes = bincode::serialize(&state)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
    tracing::debug!(path = %path.display(), records = store.len(), "state saved");
    Ok(())
}
