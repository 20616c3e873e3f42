//! Balance derivation by ledger replay.
//!
//! Balances are never stored. They are folded left to right over the ledger:
//! a `COMPLETED` entry debits `from` and credits `to`; a `REVERSED` entry applies
//! the same transfer followed by its inverse, so both accounts show up with a
//! net zero. Every entry moves equal and opposite amounts, hence the sum of all
//! balances is always zero.

use super::account::{AccountId, Balance};
use super::ledger::LedgerEntry;
use super::state::TransactionState;
use super::transaction::Transaction;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Balances(BTreeMap<AccountId, Balance>);

impl Serialize for Balances {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(self.iter())
    }
}

impl Balances {
    pub fn derive<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> Self {
        entries
            .into_iter()
            .map(LedgerEntry::transaction)
            .fold(Self::default(), |mut balances, tx| {
                balances.apply(tx);
                balances
            })
    }

    fn apply(&mut self, tx: &Transaction) {
        let amount = Balance::from(tx.amount);
        match tx.state() {
            TransactionState::Completed => {
                self.post(&tx.from, -amount);
                self.post(&tx.to, amount);
            }
            TransactionState::Reversed => {
                self.post(&tx.from, -amount);
                self.post(&tx.to, amount);
                self.post(&tx.from, amount);
                self.post(&tx.to, -amount);
            }
            // unreachable through LedgerEntry::seal
            _ => {
                tracing::warn!(id = %tx.id, state = %tx.state(), "Skipping non-settled ledger entry");
            }
        }
    }

    fn post(&mut self, account: &AccountId, delta: Balance) {
        *self.0.entry(account.clone()).or_default() += delta;
    }

    pub fn get(&self, account: &str) -> Option<Balance> {
        self.0
            .iter()
            .find(|(id, _)| id.as_str() == account)
            .map(|(_, balance)| balance.normalized())
    }

    /// Sum over all accounts. Zero for any ledger.
    pub fn total(&self) -> Balance {
        self.0.values().fold(Balance::ZERO, |acc, b| acc + *b)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AccountId, Balance)> {
        self.0.iter().map(|(id, b)| (id, b.normalized()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction::TransferRequest;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn settled(
        seq: u64,
        from: &str,
        to: &str,
        amount: Decimal,
        end: TransactionState,
    ) -> LedgerEntry {
        let mut tx =
            Transaction::open(&TransferRequest::new(from, to, amount), Utc::now()).unwrap();
        tx.transition(TransactionState::Authorized, Utc::now()).unwrap();
        tx.transition(TransactionState::Pending, Utc::now()).unwrap();
        tx.transition(end, Utc::now()).unwrap();
        LedgerEntry::seal(seq, tx).unwrap()
    }

    #[test]
    fn test_empty_ledger() {
        let balances = Balances::derive(&[]);
        assert!(balances.is_empty());
        assert_eq!(balances.total(), Balance::ZERO);
    }

    #[test]
    fn test_completed_transfer() {
        let ledger = [settled(0, "$A", "$B", dec!(100), TransactionState::Completed)];
        let balances = Balances::derive(&ledger);
        assert_eq!(balances.get("$A"), Some(Balance::new(dec!(-100))));
        assert_eq!(balances.get("$B"), Some(Balance::new(dec!(100))));
    }

    #[test]
    fn test_reversed_transfer_nets_to_zero() {
        let ledger = [settled(0, "$A", "$B", dec!(5000), TransactionState::Reversed)];
        let balances = Balances::derive(&ledger);
        assert_eq!(balances.len(), 2);
        assert_eq!(balances.get("$A"), Some(Balance::ZERO));
        assert_eq!(balances.get("$B"), Some(Balance::ZERO));
    }

    #[test]
    fn test_mixed_ledger_conserves() {
        let ledger = [
            settled(0, "$A", "$B", dec!(100), TransactionState::Completed),
            settled(1, "$B", "$C", dec!(40.5), TransactionState::Completed),
            settled(2, "$C", "$A", dec!(7000), TransactionState::Reversed),
            settled(3, "$C", "$A", dec!(0.25), TransactionState::Completed),
        ];
        let balances = Balances::derive(&ledger);
        assert_eq!(balances.get("$A"), Some(Balance::new(dec!(-99.75))));
        assert_eq!(balances.get("$B"), Some(Balance::new(dec!(59.5))));
        assert_eq!(balances.get("$C"), Some(Balance::new(dec!(40.25))));
        assert_eq!(balances.total(), Balance::ZERO);
    }

    #[test]
    fn test_serializes_as_map() {
        let ledger = [settled(0, "$A", "$B", dec!(100), TransactionState::Completed)];
        let json = serde_json::to_value(Balances::derive(&ledger)).unwrap();
        assert_eq!(json["$A"], "-100");
        assert_eq!(json["$B"], "100");
    }
}
