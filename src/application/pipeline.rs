use crate::domain::balances::Balances;
use crate::domain::ports::{Claim, ClockBox, IdempotencyStoreBox, LedgerStoreBox};
use crate::domain::risk::RiskPolicy;
use crate::domain::state::TransactionState;
use crate::domain::transaction::{IdempotencyKey, Transaction, TransferRequest};
use crate::error::{LedgerError, Result};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Tuning knobs for [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Simulated processing latency before each transition.
    pub step_delay: Duration,
    /// Total attempts at recording a finalized transaction.
    pub append_attempts: u32,
    /// Base backoff between append attempts, multiplied by the attempt number.
    pub retry_backoff: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            step_delay: Duration::from_millis(500),
            append_attempts: 3,
            retry_backoff: Duration::from_millis(50),
        }
    }
}

/// What [`Pipeline::submit`] hands back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub transaction: Transaction,
    /// True when the key's transaction was already in the ledger and nothing was processed.
    pub replayed: bool,
}

/// Keys with a submission currently running in this pipeline.
#[derive(Default)]
struct InFlightKeys(Mutex<HashSet<IdempotencyKey>>);

impl InFlightKeys {
    fn enter(&self, key: IdempotencyKey) -> Result<InFlightGuard<'_>> {
        let mut keys = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if !keys.insert(key.clone()) {
            return Err(LedgerError::InFlight { key });
        }
        Ok(InFlightGuard { keys: self, key })
    }
}

struct InFlightGuard<'a> {
    keys: &'a InFlightKeys,
    key: IdempotencyKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.keys
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

/// Orchestrates creation → transitions → ledger append.
///
/// Owns the storage backends and the clock. Different transactions may be
/// processed concurrently through a shared `&Pipeline`; each transaction's own
/// transitions run sequentially inside [`Pipeline::process`].
pub struct Pipeline {
    ledger: LedgerStoreBox,
    idempotency: IdempotencyStoreBox,
    clock: ClockBox,
    settings: PipelineSettings,
    in_flight: InFlightKeys,
}

impl Pipeline {
    /// Creates a new `Pipeline`.
    ///
    /// # Arguments
    ///
    /// * `ledger` - Where finalized transactions are recorded.
    /// * `idempotency` - Key to transaction bindings.
    /// * `clock` - Timestamps for timelines and the scheduler for simulated latency.
    pub fn new(
        ledger: LedgerStoreBox,
        idempotency: IdempotencyStoreBox,
        clock: ClockBox,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            ledger,
            idempotency,
            clock,
            settings,
            in_flight: InFlightKeys::default(),
        }
    }

    /// Validates the request and creates a transaction, or replays the one bound
    /// to the request's idempotency key.
    ///
    /// A replay resolves to the finalized ledger record when there is one, and
    /// to the stored snapshot otherwise.
    pub async fn create(&self, request: &TransferRequest) -> Result<Claim> {
        let candidate = Transaction::open(request, self.clock.now())?;

        let Some(key) = candidate.idempotency_key.clone() else {
            tracing::info!(id = %candidate.id, amount = %candidate.amount, "Transaction created");
            return Ok(Claim::Fresh(candidate));
        };

        match self.idempotency.claim(&key, candidate).await? {
            Claim::Fresh(tx) => {
                tracing::info!(id = %tx.id, key = %key, amount = %tx.amount, "Transaction created");
                Ok(Claim::Fresh(tx))
            }
            Claim::Replay(stored) => {
                tracing::warn!(id = %stored.id, key = %key, "Idempotent replay detected");
                match self.ledger.find(&stored.id).await? {
                    Some(entry) => Ok(Claim::Replay(entry.into_transaction())),
                    None => Ok(Claim::Replay(stored)),
                }
            }
        }
    }

    /// Drives a transaction from its current state to a terminal one and
    /// records it.
    ///
    /// `AUTHORIZED` → `PENDING` → whatever `policy` decides. A transaction that
    /// is already terminal is only recorded. The transaction is only returned
    /// once its ledger entry is written.
    pub async fn process(
        &self,
        mut tx: Transaction,
        policy: &dyn RiskPolicy,
    ) -> Result<Transaction> {
        while let Some(target) = next_target(&tx, policy) {
            self.step(&mut tx, target).await?;
        }

        self.record(&tx).await?;

        if let Some(key) = &tx.idempotency_key
            && let Err(e) = self.idempotency.settle(key, &tx).await
        {
            // the ledger already holds the record replays resolve to
            tracing::warn!(id = %tx.id, key = %key, error = %e, "Failed to refresh idempotency snapshot");
        }

        tracing::info!(id = %tx.id, state = %tx.state(), "Transaction finalized");
        Ok(tx)
    }

    /// `create` followed by `process`.
    ///
    /// A replay whose transaction is in the ledger is returned untouched. A
    /// replay that never reached the ledger (an earlier attempt failed or
    /// crashed) is resumed from its stored state. While a submission for a key
    /// is running, other submissions with that key fail with `InFlight`.
    pub async fn submit(
        &self,
        request: &TransferRequest,
        policy: &dyn RiskPolicy,
    ) -> Result<Submission> {
        let _guard = match request.idempotency_key() {
            Some(key) => Some(self.in_flight.enter(key)?),
            None => None,
        };

        match self.create(request).await? {
            Claim::Fresh(tx) => Ok(Submission {
                transaction: self.process(tx, policy).await?,
                replayed: false,
            }),
            Claim::Replay(tx) => {
                if self.ledger.find(&tx.id).await?.is_some() {
                    return Ok(Submission {
                        transaction: tx,
                        replayed: true,
                    });
                }
                tracing::warn!(id = %tx.id, state = %tx.state(), "Resuming unrecorded transaction");
                Ok(Submission {
                    transaction: self.process(tx, policy).await?,
                    replayed: false,
                })
            }
        }
    }

    /// Replays the current ledger into per-account balances.
    pub async fn balances(&self) -> Result<Balances> {
        let snapshot = self.ledger.read_all().await?;
        Ok(Balances::derive(&snapshot))
    }

    async fn step(&self, tx: &mut Transaction, target: TransactionState) -> Result<()> {
        self.clock.sleep(self.settings.step_delay).await;
        let from = tx.state();
        tx.transition(target, self.clock.now())?;
        tracing::debug!(id = %tx.id, %from, to = %target, "Transition applied");
        Ok(())
    }

    async fn record(&self, tx: &Transaction) -> Result<()> {
        let attempts = self.settings.append_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.ledger.append(tx.clone()).await {
                Ok(entry) => {
                    tracing::debug!(id = %tx.id, sequence = entry.sequence(), "Recorded in ledger");
                    return Ok(());
                }
                Err(e) if e.is_transient() && attempt < attempts => {
                    tracing::warn!(id = %tx.id, attempt, error = %e, "Ledger append failed, retrying");
                    self.clock
                        .sleep(self.settings.retry_backoff * attempt)
                        .await;
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    tracing::error!(id = %tx.id, state = %tx.state(), error = %e, "Finalized transaction could not be recorded");
                    return Err(LedgerError::Unrecorded {
                        id: tx.id.clone(),
                        state: tx.state(),
                        source: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn next_target(tx: &Transaction, policy: &dyn RiskPolicy) -> Option<TransactionState> {
    match tx.state() {
        TransactionState::Created => Some(TransactionState::Authorized),
        TransactionState::Authorized => Some(TransactionState::Pending),
        TransactionState::Pending => Some(policy.decide(tx).target()),
        TransactionState::Completed | TransactionState::Reversed => None,
    }
}
