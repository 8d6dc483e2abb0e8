// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{B256, U256};
use async_trait::async_trait;
use fhemock_kernel::abi::OperationCall;
use fhemock_kernel::codec::{encode, HandlePreimage};
use fhemock_kernel::operator::Operator;
use fhemock_kernel::trace::ExecutionTrace;
use fhemock_kernel::types::FheType;
use fhemock_node::config::CoprocessorConfig;
use fhemock_node::engine::Coprocessor;
use fhemock_node::errors::EngineError;
use fhemock_node::ledger::{Ledger, MockLedger};
use fhemock_node::scanner::ScanState;
use fhemock_node::snapshot::ScanCheckpoint;
use num_bigint::BigUint;

const NEVER: u64 = u64::MAX;

/// Mock chain whose block fetch or marker write can be made to fail once.
struct OutageLedger {
    chain: Arc<MockLedger>,
    fail_block: AtomicU64,
    fail_marker_write: AtomicU64,
}

impl OutageLedger {
    fn new(chain: Arc<MockLedger>) -> Self {
        Self { chain, fail_block: AtomicU64::new(NEVER), fail_marker_write: AtomicU64::new(0) }
    }

    fn fail_block_once(&self, height: u64) {
        self.fail_block.store(height, Ordering::SeqCst);
    }

    fn fail_marker_write_once(&self) {
        self.fail_marker_write.store(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Ledger for OutageLedger {
    async fn block_number(&self) -> Result<u64, EngineError> {
        self.chain.block_number().await
    }

    async fn block_transactions(&self, height: u64) -> Result<Vec<B256>, EngineError> {
        if self.fail_block.compare_exchange(height, NEVER, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
            return Err(EngineError::Network("connection reset".into()));
        }
        self.chain.block_transactions(height).await
    }

    async fn trace_transaction(&self, tx: B256) -> Result<ExecutionTrace, EngineError> {
        self.chain.trace_transaction(tx).await
    }

    async fn snapshot_block(&self) -> Result<Option<u64>, EngineError> {
        self.chain.snapshot_block().await
    }

    async fn set_snapshot_block(&self, next_block: u64) -> Result<(), EngineError> {
        if self.fail_marker_write.swap(0, Ordering::SeqCst) == 1 {
            return Err(EngineError::Network("marker write refused".into()));
        }
        self.chain.set_snapshot_block(next_block).await
    }
}

fn session(ledger: Arc<OutageLedger>) -> Coprocessor {
    let _ = tracing_subscriber::fmt().with_env_filter("fhemock_node=debug").try_init();
    let cfg = CoprocessorConfig {
        rng_seed: Some(5),
        query_attempts: 2,
        query_backoff: Duration::from_millis(1),
        ..Default::default()
    };
    Coprocessor::new(cfg, ledger)
}

fn rand32() -> OperationCall {
    OperationCall::Rand { rand_type: FheType::Uint32.tag() }
}

#[tokio::test]
async fn test_block_fetch_outage_resumes_without_rescan() {
    let chain = Arc::new(MockLedger::new());
    let ledger = Arc::new(OutageLedger::new(chain.clone()));
    let cop = session(ledger.clone());
    let executor = cop.config().executor;
    for _ in 0..3 {
        chain.mine_calls(executor, &[rand32()]).await.unwrap();
    }

    ledger.fail_block_once(3);
    match cop.wait().await {
        Err(EngineError::ScanAborted { next_block, cause, failures }) => {
            assert_eq!(next_block, 3);
            assert!(matches!(*cause, EngineError::Network(_)));
            assert!(failures.is_empty());
        }
        other => panic!("expected an aborted scan, got {:?}", other),
    }
    assert_eq!(cop.scan_state(), ScanState::Idle);
    assert_eq!(cop.checkpoint().await, ScanCheckpoint { next_block: 3, random_counter: 2 });
    assert_eq!(chain.snapshot_block().await.unwrap(), Some(3));

    let report = cop.wait().await.unwrap();
    assert!(!report.rewound);
    assert_eq!(report.from_block, 3);
    assert_eq!(report.evaluations.len(), 1);
    assert_eq!(cop.checkpoint().await, ScanCheckpoint { next_block: 4, random_counter: 3 });
    assert_eq!(chain.snapshot_block().await.unwrap(), Some(4));
}

#[tokio::test]
async fn test_failures_before_abort_are_reported() {
    let chain = Arc::new(MockLedger::new());
    let ledger = Arc::new(OutageLedger::new(chain.clone()));
    let cop = session(ledger.clone());
    let executor = cop.config().executor;

    let (bad_block, bad_tx) = chain.mine_untraceable().await;
    let value = U256::from(12);
    let enc = OperationCall::TrivialEncrypt { plaintext: value, to_type: FheType::Uint8.tag() };
    let handle = encode(
        Operator::TrivialEncrypt,
        FheType::Uint8,
        &HandlePreimage::Typed { value, to_type: FheType::Uint8.tag() },
    );
    chain.mine_calls(executor, &[enc]).await.unwrap();

    ledger.fail_block_once(2);
    match cop.wait().await {
        Err(EngineError::ScanAborted { next_block, failures, .. }) => {
            assert_eq!(next_block, 2);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].block, bad_block);
            assert_eq!(failures[0].tx, bad_tx.to_string());
        }
        other => panic!("expected an aborted scan, got {:?}", other),
    }

    let report = cop.wait().await.unwrap();
    assert!(report.failures.is_empty());
    assert_eq!(cop.query_clear_text(&handle).await.unwrap(), BigUint::from(12u8));
}

#[tokio::test]
async fn test_refused_marker_write_is_not_mistaken_for_revert() {
    let chain = Arc::new(MockLedger::new());
    let ledger = Arc::new(OutageLedger::new(chain.clone()));
    let cop = session(ledger.clone());
    let executor = cop.config().executor;
    chain.mine_calls(executor, &[rand32()]).await.unwrap();

    ledger.fail_marker_write_once();
    match cop.wait().await {
        Err(EngineError::ScanAborted { next_block, failures, .. }) => {
            assert_eq!(next_block, 2);
            assert!(failures.is_empty());
        }
        other => panic!("expected an aborted scan, got {:?}", other),
    }
    assert_eq!(cop.checkpoint().await, ScanCheckpoint { next_block: 2, random_counter: 1 });
    assert_eq!(chain.snapshot_block().await.unwrap(), Some(0));

    let report = cop.wait().await.unwrap();
    assert!(!report.rewound);
    assert!(report.evaluations.is_empty());
    assert_eq!(chain.snapshot_block().await.unwrap(), Some(2));
    assert_eq!(cop.checkpoint().await, ScanCheckpoint { next_block: 2, random_counter: 1 });

    // A real revert afterwards is still detected.
    cop.on_snapshot().await.unwrap();
    let id = chain.snapshot().await;
    chain.mine_calls(executor, &[rand32()]).await.unwrap();
    cop.wait().await.unwrap();
    assert!(chain.revert(id).await);
    let report = cop.wait().await.unwrap();
    assert!(report.rewound);
    assert_eq!(cop.checkpoint().await, ScanCheckpoint { next_block: 2, random_counter: 1 });
}
