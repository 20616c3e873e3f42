use crate::domain::state::TransactionState;
use crate::domain::transaction::{IdempotencyKey, TransactionId};
use thiserror::Error;

/// Boxed source for storage failures coming from any backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum LedgerError {
    /// Rejected before any state was created. The caller may retry with corrected input.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The requested state is not reachable from the current one. No mutation happened.
    #[error("Invalid state transition {from} → {to}")]
    InvalidTransition {
        from: TransactionState,
        to: TransactionState,
    },

    /// The ledger refused the entry (non-terminal state or an id already recorded).
    #[error("Ledger append rejected for {id}: {reason}")]
    AppendRejected { id: TransactionId, reason: String },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] BoxError),

    /// The transaction finalized but every attempt to record it failed.
    #[error("Transaction {id} reached {state} but could not be recorded in the ledger")]
    Unrecorded {
        id: TransactionId,
        state: TransactionState,
        #[source]
        source: Box<LedgerError>,
    },

    /// Another submission holding the same key has not finished yet.
    #[error("Transaction for idempotency key {key} is still being processed")]
    InFlight { key: IdempotencyKey },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl LedgerError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageUnavailable(Box::new(std::io::Error::other(message.into())))
    }

    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_) | Self::InFlight { .. })
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageUnavailable(Box::new(err))
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::StorageUnavailable(Box::new(err))
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for LedgerError {
    fn from(err: rocksdb::Error) -> Self {
        Self::StorageUnavailable(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
