//! JSON file backend.
//!
//! - `ledger.jsonl`: one [`LedgerEntry`] per line, appended and fsynced.
//! - `idempotency.json`: the whole key map, replaced atomically on every change.

use crate::domain::ledger::{LedgerEntry, LedgerSnapshot, duplicate_entry};
use crate::domain::ports::{Claim, IdempotencyStore, LedgerStore};
use crate::domain::transaction::{IdempotencyKey, Transaction, TransactionId};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::NamedTempFile;
use tokio::sync::{Mutex, RwLock};

pub const LEDGER_FILE: &str = "ledger.jsonl";
pub const IDEMPOTENCY_FILE: &str = "idempotency.json";

struct LedgerCache {
    entries: Vec<LedgerEntry>,
    index: HashMap<TransactionId, usize>,
}

/// Append-only ledger persisted as JSON lines.
///
/// The writer mutex is the single writer; the cache is only updated after the
/// line is durable, so readers never see a torn entry. A failed write that
/// cannot be rolled back poisons the store and every later append fails.
#[derive(Clone)]
pub struct FileLedgerStore {
    writer: Arc<Mutex<File>>,
    cache: Arc<RwLock<LedgerCache>>,
    poisoned: Arc<AtomicBool>,
}

impl FileLedgerStore {
    /// Opens or creates `ledger.jsonl` under `dir` and loads existing entries.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(LEDGER_FILE);

        let (entries, valid_len) = if path.exists() {
            load_entries(&path)?
        } else {
            (Vec::new(), 0)
        };
        let index = entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.id().clone(), position))
            .collect();

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        if file.metadata()?.len() > valid_len {
            tracing::warn!(path = %path.display(), valid_len, "Truncating torn trailing ledger line");
            file.set_len(valid_len)?;
            file.sync_data()?;
        }

        tracing::info!(path = %path.display(), entries = entries.len(), "Opened file ledger");

        Ok(Self {
            writer: Arc::new(Mutex::new(file)),
            cache: Arc::new(RwLock::new(LedgerCache { entries, index })),
            poisoned: Arc::new(AtomicBool::new(false)),
        })
    }
}

/// Reads every complete line, returning the entries and the byte length they
/// span. Only the last line may be incomplete.
fn load_entries(path: &Path) -> Result<(Vec<LedgerEntry>, u64)> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();
    let mut ids = HashSet::new();
    let mut valid_len = 0u64;
    let mut line = Vec::new();
    let mut number = 0usize;

    loop {
        line.clear();
        let read = reader.read_until(b'\n', &mut line)?;
        if read == 0 {
            break;
        }
        number += 1;

        // a crash mid-append can only tear the last line, and never its newline
        if !line.ends_with(b"\n") {
            tracing::warn!(path = %path.display(), line = number, "Ignoring torn trailing ledger line");
            break;
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            valid_len += read as u64;
            continue;
        }

        let entry: LedgerEntry = serde_json::from_slice(&line).map_err(|e| {
            LedgerError::storage(format!(
                "Corrupt ledger line {number} in {}: {e}",
                path.display()
            ))
        })?;
        if entry.sequence() != entries.len() as u64 {
            return Err(LedgerError::storage(format!(
                "Ledger line {number} in {} has sequence {}, expected {}",
                path.display(),
                entry.sequence(),
                entries.len()
            )));
        }
        if !ids.insert(entry.id().clone()) {
            return Err(LedgerError::storage(format!(
                "Ledger line {number} in {} repeats transaction {}",
                path.display(),
                entry.id()
            )));
        }
        entries.push(entry);
        valid_len += read as u64;
    }
    Ok((entries, valid_len))
}

#[async_trait]
impl LedgerStore for FileLedgerStore {
    async fn append(&self, tx: Transaction) -> Result<LedgerEntry> {
        let mut file = self.writer.lock().await;
        if self.poisoned.load(Ordering::SeqCst) {
            return Err(LedgerError::storage(
                "Ledger file holds an unrolled partial write, reopen the store",
            ));
        }

        let sequence = {
            let cache = self.cache.read().await;
            if cache.index.contains_key(&tx.id) {
                return Err(duplicate_entry(&tx.id));
            }
            cache.entries.len() as u64
        };
        let entry = LedgerEntry::seal(sequence, tx)?;

        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');
        let committed = file.metadata()?.len();
        if let Err(e) = file.write_all(&line).and_then(|()| file.sync_data()) {
            // drop any partial line so later appends stay parseable
            if let Err(rollback) = file.set_len(committed) {
                self.poisoned.store(true, Ordering::SeqCst);
                tracing::error!(id = %entry.id(), error = %rollback, "Failed to roll back ledger write, refusing further appends");
            }
            return Err(e.into());
        }

        let mut cache = self.cache.write().await;
        let position = cache.entries.len();
        cache.index.insert(entry.id().clone(), position);
        cache.entries.push(entry.clone());

        tracing::debug!(id = %entry.id(), sequence, "Ledger entry appended");
        Ok(entry)
    }

    async fn find(&self, id: &TransactionId) -> Result<Option<LedgerEntry>> {
        let cache = self.cache.read().await;
        Ok(cache
            .index
            .get(id)
            .map(|&position| cache.entries[position].clone()))
    }

    async fn read_all(&self) -> Result<LedgerSnapshot> {
        let cache = self.cache.read().await;
        Ok(LedgerSnapshot::new(cache.entries.clone()))
    }

    async fn len(&self) -> Result<u64> {
        Ok(self.cache.read().await.entries.len() as u64)
    }
}

/// Idempotency map persisted as a single JSON document.
#[derive(Clone)]
pub struct FileIdempotencyStore {
    path: PathBuf,
    keys: Arc<Mutex<BTreeMap<IdempotencyKey, Transaction>>>,
}

impl FileIdempotencyStore {
    /// Opens or creates `idempotency.json` under `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(IDEMPOTENCY_FILE);

        let keys = if path.exists() {
            let bytes = fs::read(&path)?;
            serde_json::from_slice(&bytes)?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            keys: Arc::new(Mutex::new(keys)),
        })
    }

    fn persist(&self, keys: &BTreeMap<IdempotencyKey, Transaction>) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut staged = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut staged, keys)?;
        staged.as_file().sync_all()?;
        staged
            .persist(&self.path)
            .map_err(|e| LedgerError::from(e.error))?;
        Ok(())
    }
}

#[async_trait]
impl IdempotencyStore for FileIdempotencyStore {
    async fn claim(&self, key: &IdempotencyKey, candidate: Transaction) -> Result<Claim> {
        let mut keys = self.keys.lock().await;
        if let Some(existing) = keys.get(key) {
            return Ok(Claim::Replay(existing.clone()));
        }

        keys.insert(key.clone(), candidate.clone());
        if let Err(e) = self.persist(&keys) {
            // not durable, so not bound
            keys.remove(key);
            return Err(e);
        }
        Ok(Claim::Fresh(candidate))
    }

    async fn settle(&self, key: &IdempotencyKey, tx: &Transaction) -> Result<()> {
        let mut keys = self.keys.lock().await;
        let previous = match keys.get_mut(key) {
            Some(stored) if stored.id == tx.id => std::mem::replace(stored, tx.clone()),
            _ => return Ok(()),
        };
        if let Err(e) = self.persist(&keys) {
            keys.insert(key.clone(), previous);
            return Err(e);
        }
        Ok(())
    }
}
