//! Transaction state machine.
//!
//! ```text
//! CREATED ──► AUTHORIZED ──► PENDING ──► COMPLETED
//!                  │             │
//!                  └─────────────┴─────► REVERSED
//! ```
//!
//! The table only validates. Deciding between `COMPLETED` and `REVERSED` belongs
//! to the risk policy driven by the pipeline.

use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    Created,
    Authorized,
    Pending,
    Completed,
    Reversed,
}

impl TransactionState {
    /// States reachable in one step from `self`.
    pub fn allowed_targets(self) -> &'static [TransactionState] {
        use TransactionState::*;
        match self {
            Created => &[Authorized],
            Authorized => &[Pending, Reversed],
            Pending => &[Completed, Reversed],
            Completed | Reversed => &[],
        }
    }

    pub fn can_transition_to(self, target: TransactionState) -> bool {
        self.allowed_targets().contains(&target)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }

    /// Fails with `InvalidTransition` when `to` is not reachable from `from`.
    pub fn ensure_transition(from: TransactionState, to: TransactionState) -> Result<()> {
        if from.can_transition_to(to) {
            Ok(())
        } else {
            Err(LedgerError::InvalidTransition { from, to })
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionState::Created => "CREATED",
            TransactionState::Authorized => "AUTHORIZED",
            TransactionState::Pending => "PENDING",
            TransactionState::Completed => "COMPLETED",
            TransactionState::Reversed => "REVERSED",
        };
        f.write_str(name)
    }
}

/// One entry of a transaction's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub state: TransactionState,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::TransactionState::*;
    use super::*;

    const ALL: [TransactionState; 5] = [Created, Authorized, Pending, Completed, Reversed];

    #[test]
    fn test_transition_table() {
        assert!(Created.can_transition_to(Authorized));
        assert!(Authorized.can_transition_to(Pending));
        assert!(Authorized.can_transition_to(Reversed));
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Reversed));

        assert!(!Created.can_transition_to(Completed));
        assert!(!Created.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Authorized));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for target in ALL {
            assert!(!Completed.can_transition_to(target));
            assert!(!Reversed.can_transition_to(target));
        }
        assert!(Completed.is_terminal());
        assert!(Reversed.is_terminal());
        assert!(!Pending.is_terminal());
    }

    #[test]
    fn test_ensure_transition_names_the_pair() {
        let err = TransactionState::ensure_transition(Created, Completed).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidTransition {
                from: Created,
                to: Completed
            }
        ));
        assert_eq!(err.to_string(), "Invalid state transition CREATED → COMPLETED");
    }

    #[test]
    fn test_state_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Reversed).unwrap(), "\"reversed\"");
        let parsed: TransactionState = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(parsed, Pending);
    }
}
