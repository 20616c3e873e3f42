use crate::domain::ledger::{LedgerEntry, LedgerSnapshot, duplicate_entry};
use crate::domain::ports::{Claim, IdempotencyStore, LedgerStore};
use crate::domain::transaction::{IdempotencyKey, Transaction, TransactionId};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch, WriteOptions,
};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for ledger entries, keyed by big-endian sequence number.
pub const CF_LEDGER: &str = "ledger";
/// Column Family mapping transaction ids to sequence numbers.
pub const CF_LEDGER_INDEX: &str = "ledger_index";
/// Column Family for idempotency keys.
pub const CF_IDEMPOTENCY: &str = "idempotency";

/// A persistent store implementation using RocksDB.
///
/// Serves both the ledger and the idempotency map from separate Column Families.
/// Appends hold the writer mutex and land as one `WriteBatch` (entry + index),
/// so the ledger never holds an entry without its index or vice versa.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>` and locks).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    next_sequence: Arc<Mutex<u64>>,
    claims: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures the required column families exist and recovers the next
    /// sequence number from the last ledger entry.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_LEDGER, Options::default()),
            ColumnFamilyDescriptor::new(CF_LEDGER_INDEX, Options::default()),
            ColumnFamilyDescriptor::new(CF_IDEMPOTENCY, Options::default()),
        ];
        let db = DB::open_cf_descriptors(&opts, path.as_ref(), cfs)?;

        let next_sequence = {
            let cf = db
                .cf_handle(CF_LEDGER)
                .ok_or_else(|| LedgerError::storage("Ledger column family not found"))?;
            match db.iterator_cf(cf, IteratorMode::End).next() {
                Some(item) => {
                    let (key, _) = item?;
                    decode_sequence(&key)? + 1
                }
                None => 0,
            }
        };

        tracing::info!(path = %path.as_ref().display(), next_sequence, "Opened RocksDB store");

        Ok(Self {
            db: Arc::new(db),
            next_sequence: Arc::new(Mutex::new(next_sequence)),
            claims: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::storage(format!("Column family {name} not found")))
    }

    fn entry_at(&self, key: &[u8]) -> Result<Option<LedgerEntry>> {
        let cf = self.cf(CF_LEDGER)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

/// Every write is fsynced before it is acknowledged, matching the file backend.
fn synced() -> WriteOptions {
    let mut opts = WriteOptions::default();
    opts.set_sync(true);
    opts
}

fn decode_sequence(key: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| LedgerError::storage("Malformed ledger sequence key"))?;
    Ok(u64::from_be_bytes(bytes))
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn append(&self, tx: Transaction) -> Result<LedgerEntry> {
        let mut next_sequence = self.next_sequence.lock().await;
        let index = self.cf(CF_LEDGER_INDEX)?;
        if self.db.get_pinned_cf(index, tx.id.as_str())?.is_some() {
            return Err(duplicate_entry(&tx.id));
        }

        let sequence = *next_sequence;
        let entry = LedgerEntry::seal(sequence, tx)?;
        let key = sequence.to_be_bytes();
        let value = serde_json::to_vec(&entry)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_LEDGER)?, key, value);
        batch.put_cf(index, entry.id().as_str(), key);
        self.db.write_opt(batch, &synced())?;
        *next_sequence += 1;

        tracing::debug!(id = %entry.id(), sequence, "Ledger entry appended");
        Ok(entry)
    }

    async fn find(&self, id: &TransactionId) -> Result<Option<LedgerEntry>> {
        let index = self.cf(CF_LEDGER_INDEX)?;
        match self.db.get_cf(index, id.as_str())? {
            Some(key) => self.entry_at(&key),
            None => Ok(None),
        }
    }

    async fn read_all(&self) -> Result<LedgerSnapshot> {
        let cf = self.cf(CF_LEDGER)?;
        // the iterator reads from an implicit snapshot taken at creation
        let entries = self
            .db
            .iterator_cf(cf, IteratorMode::Start)
            .map(|item| {
                let (_key, value) = item?;
                Ok(serde_json::from_slice(&value)?)
            })
            .collect::<Result<Vec<LedgerEntry>>>()?;
        Ok(LedgerSnapshot::new(entries))
    }

    async fn len(&self) -> Result<u64> {
        Ok(*self.next_sequence.lock().await)
    }
}

#[async_trait]
impl IdempotencyStore for RocksDBStore {
    async fn claim(&self, key: &IdempotencyKey, candidate: Transaction) -> Result<Claim> {
        let _guard = self.claims.lock().await;
        let cf = self.cf(CF_IDEMPOTENCY)?;

        if let Some(bytes) = self.db.get_cf(cf, key.as_str())? {
            return Ok(Claim::Replay(serde_json::from_slice(&bytes)?));
        }

        self.db.put_cf_opt(
            cf,
            key.as_str(),
            serde_json::to_vec(&candidate)?,
            &synced(),
        )?;
        Ok(Claim::Fresh(candidate))
    }

    async fn settle(&self, key: &IdempotencyKey, tx: &Transaction) -> Result<()> {
        let _guard = self.claims.lock().await;
        let cf = self.cf(CF_IDEMPOTENCY)?;

        let Some(bytes) = self.db.get_cf(cf, key.as_str())? else {
            return Ok(());
        };
        let stored: Transaction = serde_json::from_slice(&bytes)?;
        if stored.id == tx.id {
            self.db
                .put_cf_opt(cf, key.as_str(), serde_json::to_vec(tx)?, &synced())?;
        }
        Ok(())
    }
}
