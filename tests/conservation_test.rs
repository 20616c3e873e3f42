mod common;

use cashledger::domain::account::Balance;
use cashledger::domain::risk::{AmountThreshold, Verdict};
use cashledger::domain::state::TransactionState;
use cashledger::domain::transaction::{Transaction, TransferRequest};
use rand::Rng;
use rust_decimal::Decimal;

const ACCOUNTS: [&str; 5] = ["$A", "$B", "$C", "$D", "$E"];

#[tokio::test]
async fn test_random_ledgers_conserve_money() {
    let mut rng = rand::thread_rng();

    for _ in 0..20 {
        let pipeline = common::memory_pipeline();
        let policy = AmountThreshold::new(Decimal::new(3000, 0));

        for _ in 0..rng.gen_range(1..40) {
            let from = rng.gen_range(0..ACCOUNTS.len());
            let to = (from + rng.gen_range(1..ACCOUNTS.len())) % ACCOUNTS.len();
            let amount = Decimal::new(rng.gen_range(1..1_000_000), 2);
            let request = TransferRequest::new(ACCOUNTS[from], ACCOUNTS[to], amount);
            pipeline.submit(&request, &policy).await.unwrap();
        }

        let balances = pipeline.balances().await.unwrap();
        assert_eq!(balances.total(), Balance::ZERO);
    }
}

#[tokio::test]
async fn test_reversals_leave_accounts_untouched() {
    let mut rng = rand::thread_rng();
    let pipeline = common::memory_pipeline();
    let reverse_all = |_: &Transaction| Verdict::Reverse;

    for _ in 0..25 {
        let amount = Decimal::new(rng.gen_range(1..1_000_000), 2);
        let tx = pipeline
            .submit(&TransferRequest::new("$A", "$B", amount), &reverse_all)
            .await
            .unwrap()
            .transaction;
        assert_eq!(tx.state(), TransactionState::Reversed);
        assert_eq!(tx.timeline().len(), 4);
    }

    let balances = pipeline.balances().await.unwrap();
    assert_eq!(balances.get("$A"), Some(Balance::ZERO));
    assert_eq!(balances.get("$B"), Some(Balance::ZERO));
}
