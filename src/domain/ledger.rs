use super::transaction::{Transaction, TransactionId};
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};

/// An immutable, sequenced ledger record.
///
/// Only [`LedgerEntry::seal`] builds new entries, so anything a store appends
/// holds a terminal transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    sequence: u64,
    transaction: Transaction,
}

impl LedgerEntry {
    pub fn seal(sequence: u64, transaction: Transaction) -> Result<Self> {
        if !transaction.is_terminal() {
            return Err(LedgerError::AppendRejected {
                id: transaction.id.clone(),
                reason: format!("state {} is not terminal", transaction.state()),
            });
        }
        Ok(Self {
            sequence,
            transaction,
        })
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn id(&self) -> &TransactionId {
        &self.transaction.id
    }

    pub fn into_transaction(self) -> Transaction {
        self.transaction
    }
}

/// Rejection used by stores when an id is already recorded.
pub fn duplicate_entry(id: &TransactionId) -> LedgerError {
    LedgerError::AppendRejected {
        id: id.clone(),
        reason: "transaction is already recorded".to_string(),
    }
}

/// A point-in-time copy of the ledger, in insertion order.
///
/// Can be iterated any number of times; later appends never show up in it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerSnapshot {
    entries: Vec<LedgerEntry>,
}

impl LedgerSnapshot {
    pub fn new(entries: Vec<LedgerEntry>) -> Self {
        Self { entries }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LedgerEntry> {
        self.entries.iter()
    }

    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.entries.iter().map(LedgerEntry::transaction)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a LedgerSnapshot {
    type Item = &'a LedgerEntry;
    type IntoIter = std::slice::Iter<'a, LedgerEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl IntoIterator for LedgerSnapshot {
    type Item = LedgerEntry;
    type IntoIter = std::vec::IntoIter<LedgerEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
