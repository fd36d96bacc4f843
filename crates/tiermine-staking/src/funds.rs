//! # Funds Transfer
//!
//! The ledger never moves value itself. Each operation builds a
//! [`TransferBatch`] and hands it to a [`FundsTransfer`] implementation as the
//! last step of its transaction. A failed batch rolls the whole operation back.
//!
//! ```text
//!   deposit:   owner ──net──► Vault      owner ──fee──► fee collector
//!   payout:    Vault ──out──► owner      Vault ──fee──► collectors / referrer
//! ```

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tiermine_core::{AccountId, Amount, MineError};

/// One side of a transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Party {
    /// The mine's pooled holdings
    Vault,
    Account(AccountId),
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::Vault => write!(f, "vault"),
            Party::Account(id) => write!(f, "{}", id.to_hex()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: Party,
    pub to: Party,
    pub amount: Amount,
}

/// Ordered set of transfers executed all-or-nothing
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransferBatch {
    transfers: Vec<Transfer>,
}

impl TransferBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a transfer; zero amounts are dropped
    pub fn push(&mut self, from: Party, to: Party, amount: Amount) -> &mut Self {
        if amount > 0 {
            self.transfers.push(Transfer { from, to, amount });
        }
        self
    }

    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.transfers.len()
    }
}

/// Funds-transfer errors
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransferError {
    #[error("Insufficient funds in {party}: needed {needed}, available {available}")]
    InsufficientFunds {
        party: Party,
        needed: Amount,
        available: Amount,
    },

    #[error("Balance overflow crediting {0}")]
    Overflow(Party),

    #[error("Transfer rejected: {0}")]
    Rejected(String),
}

impl From<TransferError> for MineError {
    fn from(err: TransferError) -> Self {
        MineError::Transfer(err.to_string())
    }
}

/// Capability to move value between parties
pub trait FundsTransfer: Send + Sync {
    /// Execute every transfer in `batch`, or none of them
    fn execute(&self, batch: &TransferBatch) -> Result<(), TransferError>;
}

/// Balance book held in memory
pub struct InMemoryBank {
    balances: RwLock<HashMap<Party, Amount>>,
}

impl InMemoryBank {
    pub fn new() -> Self {
        Self {
            balances: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_balances(balances: HashMap<Party, Amount>) -> Self {
        Self {
            balances: RwLock::new(balances),
        }
    }

    /// Mint `amount` into `party`
    pub fn credit(&self, party: Party, amount: Amount) -> Result<Amount, TransferError> {
        let mut balances = self.balances.write();
        let balance = balances.entry(party).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(TransferError::Overflow(party))?;
        Ok(*balance)
    }

    pub fn balance(&self, party: &Party) -> Amount {
        self.balances.read().get(party).copied().unwrap_or(0)
    }

    pub fn balances(&self) -> HashMap<Party, Amount> {
        self.balances.read().clone()
    }
}

impl Default for InMemoryBank {
    fn default() -> Self {
        Self::new()
    }
}

impl FundsTransfer for InMemoryBank {
    fn execute(&self, batch: &TransferBatch) -> Result<(), TransferError> {
        let mut balances = self.balances.write();

        // Work on a scratch copy of the touched entries so a failure midway
        // leaves the book untouched.
        let mut scratch: HashMap<Party, Amount> = HashMap::new();
        for t in batch.transfers() {
            for party in [t.from, t.to] {
                scratch
                    .entry(party)
                    .or_insert_with(|| balances.get(&party).copied().unwrap_or(0));
            }
        }

        for t in batch.transfers() {
            let available = scratch.get(&t.from).copied().unwrap_or(0);
            let debited =
                available
                    .checked_sub(t.amount)
                    .ok_or(TransferError::InsufficientFunds {
                        party: t.from,
                        needed: t.amount,
                        available,
                    })?;
            scratch.insert(t.from, debited);

            let current = scratch.get(&t.to).copied().unwrap_or(0);
            let credited = current
                .checked_add(t.amount)
                .ok_or(TransferError::Overflow(t.to))?;
            scratch.insert(t.to, credited);
        }

        balances.extend(scratch);
        tracing::trace!(transfers = batch.len(), "transfer batch settled");
        Ok(())
    }
}
