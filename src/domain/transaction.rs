use super::account::{AccountId, Amount};
use super::state::{TimelineEntry, TransactionState};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn generate() -> Self {
        Self(format!("tx_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Caller-supplied deduplication token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Blank keys mean "no deduplication", so they parse to `None`. Any other
    /// key is kept byte for byte.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A caller's request to move `amount` from one account to another.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransferRequest {
    pub from: String,
    pub to: String,
    pub amount: Decimal,
    #[serde(default)]
    pub key: Option<String>,
}

impl TransferRequest {
    pub fn new(from: impl Into<String>, to: impl Into<String>, amount: Decimal) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            amount,
            key: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn idempotency_key(&self) -> Option<IdempotencyKey> {
        self.key.as_deref().and_then(IdempotencyKey::parse)
    }
}

/// A transfer moving through the state machine.
///
/// `state` and `timeline` are only reachable through [`Transaction::transition`],
/// which keeps the timeline append-only and freezes the transaction once it
/// reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Amount,
    state: TransactionState,
    timeline: Vec<TimelineEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<IdempotencyKey>,
}

impl Transaction {
    /// Validates the request and builds a fresh transaction in `CREATED`.
    pub fn open(request: &TransferRequest, at: DateTime<Utc>) -> Result<Self> {
        let from = AccountId::parse(request.from.clone())?;
        let to = AccountId::parse(request.to.clone())?;
        if from == to {
            return Err(LedgerError::InvalidRequest(format!(
                "Source and destination must differ, got {from} twice"
            )));
        }
        let amount = Amount::new(request.amount)?;

        Ok(Self {
            id: TransactionId::generate(),
            from,
            to,
            amount,
            state: TransactionState::Created,
            timeline: vec![TimelineEntry {
                state: TransactionState::Created,
                at,
            }],
            idempotency_key: request.idempotency_key(),
        })
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn timeline(&self) -> &[TimelineEntry] {
        &self.timeline
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Moves to `target` and records it on the timeline.
    ///
    /// On failure nothing is mutated.
    pub fn transition(&mut self, target: TransactionState, at: DateTime<Utc>) -> Result<()> {
        TransactionState::ensure_transition(self.state, target)?;
        self.state = target;
        self.timeline.push(TimelineEntry { state: target, at });
        Ok(())
    }
}
