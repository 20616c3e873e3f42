use crate::domain::ledger::{LedgerEntry, LedgerSnapshot, duplicate_entry};
use crate::domain::ports::{Claim, IdempotencyStore, LedgerStore};
use crate::domain::transaction::{IdempotencyKey, Transaction, TransactionId};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct LedgerState {
    entries: Vec<LedgerEntry>,
    index: HashMap<TransactionId, usize>,
}

/// A thread-safe in-memory ledger.
///
/// The write lock serializes appends; readers copy the entries under the read
/// lock, so a snapshot never sees a half-applied append.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn append(&self, tx: Transaction) -> Result<LedgerEntry> {
        let mut state = self.state.write().await;
        if state.index.contains_key(&tx.id) {
            return Err(duplicate_entry(&tx.id));
        }
        let position = state.entries.len();
        let entry = LedgerEntry::seal(position as u64, tx)?;
        state.index.insert(entry.id().clone(), position);
        state.entries.push(entry.clone());
        Ok(entry)
    }

    async fn find(&self, id: &TransactionId) -> Result<Option<LedgerEntry>> {
        let state = self.state.read().await;
        Ok(state
            .index
            .get(id)
            .map(|&position| state.entries[position].clone()))
    }

    async fn read_all(&self) -> Result<LedgerSnapshot> {
        let state = self.state.read().await;
        Ok(LedgerSnapshot::new(state.entries.clone()))
    }

    async fn len(&self) -> Result<u64> {
        Ok(self.state.read().await.entries.len() as u64)
    }
}

/// A thread-safe in-memory idempotency map.
///
/// `claim` holds the write lock across lookup and insert.
#[derive(Default, Clone)]
pub struct InMemoryIdempotencyStore {
    keys: Arc<RwLock<HashMap<IdempotencyKey, Transaction>>>,
}

impl InMemoryIdempotencyStore {
    /// Creates a new, empty in-memory idempotency store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn claim(&self, key: &IdempotencyKey, candidate: Transaction) -> Result<Claim> {
        let mut keys = self.keys.write().await;
        match keys.entry(key.clone()) {
            Entry::Occupied(existing) => Ok(Claim::Replay(existing.get().clone())),
            Entry::Vacant(slot) => {
                slot.insert(candidate.clone());
                Ok(Claim::Fresh(candidate))
            }
        }
    }

    async fn settle(&self, key: &IdempotencyKey, tx: &Transaction) -> Result<()> {
        let mut keys = self.keys.write().await;
        if let Some(stored) = keys.get_mut(key)
            && stored.id == tx.id
        {
            *stored = tx.clone();
        }
        Ok(())
    }
}
