// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use fhemock_kernel::abi::OperationCall;
use fhemock_kernel::codec::{encode, HandlePreimage};
use fhemock_kernel::operator::Operator;
use fhemock_kernel::trace::{ExecutionTrace, TraceLog};
use fhemock_kernel::types::{FheType, Handle};
use fhemock_node::config::CoprocessorConfig;
use fhemock_node::engine::Coprocessor;
use fhemock_node::errors::EngineError;
use fhemock_node::ledger::mock::executor_trace;
use fhemock_node::ledger::MockLedger;
use fhemock_node::scanner::ScanState;
use num_bigint::BigUint;

fn session(ledger: Arc<MockLedger>) -> Coprocessor {
    let _ = tracing_subscriber::fmt().with_env_filter("fhemock_node=debug").try_init();
    let cfg = CoprocessorConfig {
        rng_seed: Some(3),
        query_attempts: 2,
        query_backoff: Duration::from_millis(1),
        ..Default::default()
    };
    Coprocessor::new(cfg, ledger)
}

fn trivial(value: u64) -> (OperationCall, Handle) {
    let ty = FheType::Uint32;
    let call = OperationCall::TrivialEncrypt { plaintext: U256::from(value), to_type: ty.tag() };
    let handle = encode(
        Operator::TrivialEncrypt,
        ty,
        &HandlePreimage::Typed { value: U256::from(value), to_type: ty.tag() },
    );
    (call, handle)
}

#[tokio::test]
async fn test_untraceable_transaction_does_not_stop_scan() {
    let ledger = Arc::new(MockLedger::new());
    let cop = session(ledger.clone());
    let executor = cop.config().executor;
    let (enc1, h1) = trivial(1);
    let (enc2, h2) = trivial(2);

    ledger.mine_calls(executor, &[enc1]).await.unwrap();
    let (bad_block, bad_tx) = ledger.mine_untraceable().await;
    ledger.mine_calls(executor, &[enc2]).await.unwrap();

    match cop.wait().await {
        Err(EngineError::Scan(failures)) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].block, bad_block);
            assert_eq!(failures[0].tx, bad_tx.to_string());
        }
        other => panic!("expected aggregated failure, got {:?}", other),
    }
    assert_eq!(cop.scan_state(), ScanState::Idle);
    assert_eq!(cop.query_clear_text(&h1).await.unwrap(), BigUint::from(1u8));
    assert_eq!(cop.query_clear_text(&h2).await.unwrap(), BigUint::from(2u8));

    // Failures are reported once; the session keeps going.
    let report = cop.wait().await.unwrap();
    assert_eq!(report.transactions, 0);
}

#[tokio::test]
async fn test_unknown_selector_is_reported() {
    let ledger = Arc::new(MockLedger::new());
    let cop = session(ledger.clone());
    let executor = cop.config().executor;
    let (enc, h) = trivial(5);

    let mut trace = executor_trace(executor, &[enc]).unwrap();
    trace.struct_logs.insert(0, TraceLog::call_frame(executor, &[0xde, 0xad, 0xbe, 0xef], 2));
    ledger.mine(vec![trace]).await;

    let report = cop.flush().await.unwrap();
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].reason.contains("deadbeef"));
    assert_eq!(report.evaluations.len(), 1);
    assert_eq!(cop.query_clear_text(&h).await.unwrap(), BigUint::from(5u8));
}

#[tokio::test]
async fn test_missing_operand_is_reported() {
    let ledger = Arc::new(MockLedger::new());
    let cop = session(ledger.clone());
    let (_, never_stored) = trivial(77);
    let call = OperationCall::Unary { op: Operator::Neg, ct: never_stored.to_u256() };
    ledger.mine_calls(cop.config().executor, &[call]).await.unwrap();

    let report = cop.flush().await.unwrap();
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].reason.contains("Handle not found"));
}

#[tokio::test]
async fn test_reverted_and_foreign_calls_are_ignored() {
    let ledger = Arc::new(MockLedger::new());
    let cop = session(ledger.clone());
    let executor = cop.config().executor;
    let (enc_failed, h_failed) = trivial(8);
    let (enc_foreign, h_foreign) = trivial(9);

    let mut failed = executor_trace(executor, &[enc_failed]).unwrap();
    failed.failed = true;
    let foreign = executor_trace(Address::repeat_byte(0x77), &[enc_foreign]).unwrap();
    ledger.mine(vec![failed, foreign, ExecutionTrace::default()]).await;

    let report = cop.wait().await.unwrap();
    assert_eq!(report.transactions, 3);
    assert_eq!(report.skipped, 1);
    assert!(report.evaluations.is_empty());
    assert!(cop.query_clear_text(&h_failed).await.is_err());
    assert!(cop.query_clear_text(&h_foreign).await.is_err());
}
