use super::state::TransactionState;
use super::transaction::Transaction;
use rust_decimal::Decimal;

/// Outcome of the risk decision taken on a `PENDING` transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Complete,
    Reverse,
}

impl Verdict {
    pub fn target(self) -> TransactionState {
        match self {
            Verdict::Complete => TransactionState::Completed,
            Verdict::Reverse => TransactionState::Reversed,
        }
    }
}

/// Decides how a pending transaction settles.
///
/// Kept outside the state machine so thresholds can change without touching
/// transition rules. Any `Fn(&Transaction) -> Verdict` is a policy.
pub trait RiskPolicy: Send + Sync {
    fn decide(&self, tx: &Transaction) -> Verdict;
}

impl<F> RiskPolicy for F
where
    F: Fn(&Transaction) -> Verdict + Send + Sync,
{
    fn decide(&self, tx: &Transaction) -> Verdict {
        self(tx)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysComplete;

impl RiskPolicy for AlwaysComplete {
    fn decide(&self, _tx: &Transaction) -> Verdict {
        Verdict::Complete
    }
}

/// Reverses any transfer strictly above `limit`.
#[derive(Debug, Clone, Copy)]
pub struct AmountThreshold {
    pub limit: Decimal,
}

impl AmountThreshold {
    pub fn new(limit: Decimal) -> Self {
        Self { limit }
    }
}

impl RiskPolicy for AmountThreshold {
    fn decide(&self, tx: &Transaction) -> Verdict {
        if tx.amount.value() > self.limit {
            Verdict::Reverse
        } else {
            Verdict::Complete
        }
    }
}
