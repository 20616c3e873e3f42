mod common;

use cashledger::domain::account::Balance;
use cashledger::domain::risk::{AlwaysComplete, AmountThreshold};
use cashledger::domain::state::TransactionState;
use cashledger::domain::transaction::TransferRequest;
use cashledger::error::LedgerError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

#[tokio::test]
async fn test_completed_transfer_scenario() {
    let pipeline = common::memory_pipeline();

    let submission = pipeline
        .submit(&TransferRequest::new("$A", "$B", dec!(100)), &AlwaysComplete)
        .await
        .unwrap();
    let tx = submission.transaction;
    assert_eq!(tx.from.as_str(), "$A");
    assert_eq!(tx.to.as_str(), "$B");
    assert_eq!(tx.amount.value(), dec!(100));
    assert_eq!(tx.state(), TransactionState::Completed);

    let balances = pipeline.balances().await.unwrap();
    assert_eq!(balances.len(), 2);
    assert_eq!(balances.get("$A"), Some(Balance::new(dec!(-100))));
    assert_eq!(balances.get("$B"), Some(Balance::new(dec!(100))));
}

#[tokio::test]
async fn test_risky_transfer_scenario() {
    let pipeline = common::memory_pipeline();
    let request = TransferRequest::new("$A", "$B", dec!(5000)).with_key("kRisky");

    let submission = pipeline
        .submit(&request, &AmountThreshold::new(dec!(3000)))
        .await
        .unwrap();
    assert_eq!(submission.transaction.state(), TransactionState::Reversed);

    let balances = pipeline.balances().await.unwrap();
    assert_eq!(balances.get("$A"), Some(Balance::ZERO));
    assert_eq!(balances.get("$B"), Some(Balance::ZERO));
}

#[tokio::test]
async fn test_idempotent_create_records_once() {
    let pipeline = common::memory_pipeline();
    let request = TransferRequest::new("$A", "$B", dec!(100)).with_key("k1");

    let first = pipeline.submit(&request, &AlwaysComplete).await.unwrap();
    let second = pipeline.submit(&request, &AlwaysComplete).await.unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(first.transaction.id, second.transaction.id);
    assert_eq!(first.transaction, second.transaction);

    let balances = pipeline.balances().await.unwrap();
    assert_eq!(balances.get("$B"), Some(Balance::new(dec!(100))));
}

#[tokio::test]
async fn test_concurrent_creates_with_same_key() {
    let pipeline = Arc::new(common::memory_pipeline());

    let handles: Vec<_> = [dec!(100), dec!(999)]
        .into_iter()
        .map(|amount| {
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                let request = TransferRequest::new("$A", "$B", amount).with_key("shared");
                pipeline.create(&request).await.unwrap()
            })
        })
        .collect();

    let mut claims = Vec::new();
    for handle in handles {
        claims.push(handle.await.unwrap());
    }

    assert_eq!(claims.iter().filter(|c| !c.is_replay()).count(), 1);
    assert_eq!(claims[0].transaction().id, claims[1].transaction().id);
    assert_eq!(claims[0].transaction().amount, claims[1].transaction().amount);

    let winner = claims.into_iter().find(|c| !c.is_replay()).unwrap();
    let amount = winner.transaction().amount;
    pipeline
        .process(winner.into_transaction(), &AlwaysComplete)
        .await
        .unwrap();

    let balances = pipeline.balances().await.unwrap();
    assert_eq!(balances.get("$B"), Some(Balance::from(amount)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_balances_stay_conserved_while_appending() {
    let pipeline = Arc::new(common::memory_pipeline());

    let handles: Vec<_> = (1..=40u32)
        .map(|i| {
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                let request = TransferRequest::new(
                    format!("$U{}", i % 7),
                    format!("$V{}", i % 5),
                    Decimal::from(i),
                )
                .with_key(format!("k{i}"));
                pipeline.submit(&request, &AmountThreshold::new(dec!(30))).await
            })
        })
        .collect();

    loop {
        let balances = pipeline.balances().await.unwrap();
        assert_eq!(balances.total(), Balance::ZERO);
        if handles.iter().all(|handle| handle.is_finished()) {
            break;
        }
        tokio::task::yield_now().await;
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    let balances = pipeline.balances().await.unwrap();
    assert_eq!(balances.total(), Balance::ZERO);
    assert_eq!(balances.get("$V1").map(|b| b.value() > Decimal::ZERO), Some(true));
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let pipeline = common::memory_pipeline();

    for request in [
        TransferRequest::new("$A", "$B", dec!(0)),
        TransferRequest::new("$A", "$B", dec!(-1)),
        TransferRequest::new("$A", "$A", dec!(1)),
        TransferRequest::new("", "$A", dec!(1)),
    ] {
        let err = pipeline.submit(&request, &AlwaysComplete).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRequest(_)));
    }
    assert!(pipeline.balances().await.unwrap().is_empty());
}
