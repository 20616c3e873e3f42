use super::ledger::{LedgerEntry, LedgerSnapshot};
use super::transaction::{IdempotencyKey, Transaction, TransactionId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Result of an idempotent claim on a key.
#[derive(Debug, Clone, PartialEq)]
pub enum Claim {
    /// The key was unseen; the candidate is now bound to it.
    Fresh(Transaction),
    /// The key was already bound; this is the stored transaction, unchanged.
    Replay(Transaction),
}

impl Claim {
    pub fn transaction(&self) -> &Transaction {
        match self {
            Claim::Fresh(tx) | Claim::Replay(tx) => tx,
        }
    }

    pub fn into_transaction(self) -> Transaction {
        match self {
            Claim::Fresh(tx) | Claim::Replay(tx) => tx,
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, Claim::Replay(_))
    }
}

/// Durable, append-only, ordered sequence of finalized transactions.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Appends a terminal transaction. Appends are serialized by the store.
    async fn append(&self, tx: Transaction) -> Result<LedgerEntry>;
    async fn find(&self, id: &TransactionId) -> Result<Option<LedgerEntry>>;
    /// Consistent copy of every entry in insertion order.
    async fn read_all(&self) -> Result<LedgerSnapshot>;
    async fn len(&self) -> Result<u64>;
}

/// Key → transaction mapping, first write wins, no expiry.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Atomically returns the transaction bound to `key`, or binds `candidate`.
    async fn claim(&self, key: &IdempotencyKey, candidate: Transaction) -> Result<Claim>;
    /// Refreshes the snapshot for `key` if it is bound to `tx.id`.
    async fn settle(&self, key: &IdempotencyKey, tx: &Transaction) -> Result<()>;
}

/// Time source and scheduler for simulated processing latency.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    async fn sleep(&self, duration: Duration);
}

pub type LedgerStoreBox = Box<dyn LedgerStore>;
pub type IdempotencyStoreBox = Box<dyn IdempotencyStore>;
pub type ClockBox = Box<dyn Clock>;
