// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Walks newly mined blocks and evaluates every executor call found in their traces.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use alloy_primitives::{Address, B256};
use fhemock_kernel::abi::decode_call;
use serde::Serialize;

use crate::errors::{EngineError, ScanFailure};
use crate::evaluator::{Evaluation, OperationEvaluator};
use crate::ledger::Ledger;
use crate::snapshot::{ScanCheckpoint, SnapshotLedger};
use crate::store::HandleStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ScanState {
    Idle,
    Scanning,
}

/// Whether a flush is running. Readable without holding the scanner.
#[derive(Clone, Debug, Default)]
pub struct ScanStatus(Arc<AtomicBool>);

impl ScanStatus {
    pub fn get(&self) -> ScanState {
        if self.0.load(Ordering::Acquire) {
            ScanState::Scanning
        } else {
            ScanState::Idle
        }
    }

    fn set(&self, state: ScanState) {
        self.0.store(state == ScanState::Scanning, Ordering::Release);
    }
}

/// Outcome of one flush.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ScanReport {
    /// First block scanned, after any rewind.
    pub from_block: u64,
    /// Ledger head at scan time.
    pub head: u64,
    pub rewound: bool,
    pub transactions: usize,
    /// Reverted transactions, which the coprocessor ignores.
    pub skipped: usize,
    pub evaluations: Vec<Evaluation>,
    pub failures: Vec<ScanFailure>,
}

pub struct TraceScanner {
    executor: Address,
    evaluator: OperationEvaluator,
    snapshots: SnapshotLedger,
    status: ScanStatus,
    /// Marker the ledger kept because storing our cursor failed.
    stale_marker: Option<u64>,
}

impl TraceScanner {
    pub fn new(executor: Address, evaluator: OperationEvaluator) -> Self {
        Self {
            executor,
            evaluator,
            snapshots: SnapshotLedger::new(),
            status: ScanStatus::default(),
            stale_marker: None,
        }
    }

    pub fn status(&self) -> ScanStatus {
        self.status.clone()
    }

    pub fn snapshots(&self) -> &SnapshotLedger {
        &self.snapshots
    }

    pub fn snapshots_mut(&mut self) -> &mut SnapshotLedger {
        &mut self.snapshots
    }

    /// Forgets the cursor and every marker written to the ledger.
    pub fn reset(&mut self) {
        self.snapshots.reset();
        self.stale_marker = None;
    }

    /// Scans every block from the checkpoint to the ledger head.
    ///
    /// Per-transaction failures are collected in the report and do not stop the
    /// scan. Ledger failures outside a single transaction abort it with
    /// [`EngineError::ScanAborted`], leaving the checkpoint at the first
    /// unscanned block.
    pub async fn flush(&mut self, ledger: &dyn Ledger, store: &HandleStore) -> Result<ScanReport, EngineError> {
        self.status.set(ScanState::Scanning);
        let start = Instant::now();
        let result = self.scan(ledger, store).await;
        self.status.set(ScanState::Idle);
        metrics::histogram!("fhemock_scan_duration_seconds", start.elapsed().as_secs_f64());

        let failures = match &result {
            Ok(report) => {
                metrics::gauge!("fhemock_last_scanned_block", report.head as f64);
                report.failures.len()
            }
            Err(EngineError::ScanAborted { failures, .. }) => failures.len(),
            Err(_) => 0,
        };
        if failures > 0 {
            metrics::counter!("fhemock_scan_failures_total", failures as u64);
        }
        result
    }

    async fn scan(&mut self, ledger: &dyn Ledger, store: &HandleStore) -> Result<ScanReport, EngineError> {
        let mut report = ScanReport::default();

        let marker = ledger.snapshot_block().await?;
        match marker {
            // Unchanged since a cursor the ledger never accepted: not a revert.
            Some(marker) if self.stale_marker == Some(marker) => {
                tracing::debug!("Ledger marker {} is stale, keeping scan cursor", marker);
            }
            Some(marker) => report.rewound = self.snapshots.reconcile(marker),
            None => tracing::trace!("Ledger has no snapshot introspection, scanning forward"),
        }

        let ScanCheckpoint { next_block, mut random_counter } = self.snapshots.checkpoint();
        let head = ledger.block_number().await?;
        report.from_block = next_block;
        report.head = head;
        if next_block <= head {
            tracing::debug!("Scanning blocks {}..={}", next_block, head);
        }

        for height in next_block..=head {
            let txs = match ledger.block_transactions(height).await {
                Ok(txs) => txs,
                Err(e) => {
                    tracing::error!("Failed to fetch block {}: {}", height, e);
                    self.snapshots.advance(ScanCheckpoint { next_block: height, random_counter });
                    if let Err(publish) = self.publish(ledger, height, marker).await {
                        tracing::warn!("Could not store scan cursor {}: {}", height, publish);
                    }
                    return Err(EngineError::ScanAborted {
                        next_block: height,
                        cause: Box::new(e),
                        failures: report.failures,
                    });
                }
            };
            for tx in txs {
                report.transactions += 1;
                self.scan_transaction(ledger, store, height, tx, &mut random_counter, &mut report)
                    .await;
            }
        }

        let next_block = next_block.max(head.saturating_add(1));
        self.snapshots.advance(ScanCheckpoint { next_block, random_counter });
        if let Err(e) = self.publish(ledger, next_block, marker).await {
            tracing::error!("Could not store scan cursor {}: {}", next_block, e);
            return Err(EngineError::ScanAborted { next_block, cause: Box::new(e), failures: report.failures });
        }

        tracing::info!(
            "Scan complete: {} tx, {} results, {} failures, next block {}",
            report.transactions,
            report.evaluations.len(),
            report.failures.len(),
            next_block
        );
        Ok(report)
    }

    /// Hands the cursor to the ledger as its snapshot marker. `held` is the
    /// marker read at the start of this scan.
    async fn publish(&mut self, ledger: &dyn Ledger, next_block: u64, held: Option<u64>) -> Result<(), EngineError> {
        let result = ledger.set_snapshot_block(next_block).await;
        self.stale_marker = if result.is_err() { held } else { None };
        result
    }

    async fn scan_transaction(
        &mut self,
        ledger: &dyn Ledger,
        store: &HandleStore,
        block: u64,
        tx: B256,
        random_counter: &mut u64,
        report: &mut ScanReport,
    ) {
        let fail = |reason: String| ScanFailure { block, tx: tx.to_string(), reason };

        let trace = match ledger.trace_transaction(tx).await {
            Ok(trace) => trace,
            Err(e) => {
                tracing::warn!("Skipping {} in block {}: {}", tx, block, e);
                report.failures.push(fail(e.to_string()));
                return;
            }
        };
        if trace.failed {
            tracing::debug!("Ignoring reverted transaction {}", tx);
            report.skipped += 1;
            return;
        }

        for calldata in trace.calldata_to(self.executor) {
            let call = match calldata.and_then(|data| decode_call(&data)) {
                Ok(call) => call,
                Err(e) => {
                    tracing::warn!("Undecodable executor call in {}: {}", tx, e);
                    report.failures.push(fail(e.to_string()));
                    continue;
                }
            };
            match self.evaluator.evaluate(&call, store, random_counter).await {
                Ok(evaluation) => {
                    store
                        .insert(evaluation.handle, evaluation.cleartext.clone(), evaluation.replace)
                        .await;
                    report.evaluations.push(evaluation);
                }
                Err(e) => {
                    tracing::warn!("{} in {} failed: {}", call.operator(), tx, e);
                    report.failures.push(fail(e.to_string()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MockLedger;
    use crate::store::RetryPolicy;
    use async_trait::async_trait;
    use fhemock_kernel::trace::ExecutionTrace;
    use std::sync::Mutex;

    /// Records the scan status each time the scanner asks for the head.
    struct Watched {
        chain: MockLedger,
        status: ScanStatus,
        seen: Mutex<Vec<ScanState>>,
    }

    #[async_trait]
    impl Ledger for Watched {
        async fn block_number(&self) -> Result<u64, EngineError> {
            self.seen.lock().unwrap().push(self.status.get());
            self.chain.block_number().await
        }

        async fn block_transactions(&self, height: u64) -> Result<Vec<B256>, EngineError> {
            self.chain.block_transactions(height).await
        }

        async fn trace_transaction(&self, tx: B256) -> Result<ExecutionTrace, EngineError> {
            self.chain.trace_transaction(tx).await
        }

        async fn snapshot_block(&self) -> Result<Option<u64>, EngineError> {
            self.chain.snapshot_block().await
        }

        async fn set_snapshot_block(&self, next_block: u64) -> Result<(), EngineError> {
            self.chain.set_snapshot_block(next_block).await
        }
    }

    #[tokio::test]
    async fn test_status_visible_during_flush() {
        let mut scanner = TraceScanner::new(Address::ZERO, OperationEvaluator::new(Some(1)));
        let ledger = Watched { chain: MockLedger::new(), status: scanner.status(), seen: Mutex::new(Vec::new()) };
        let store = HandleStore::new(RetryPolicy::default());

        assert_eq!(scanner.status().get(), ScanState::Idle);
        scanner.flush(&ledger, &store).await.unwrap();
        assert_eq!(*ledger.seen.lock().unwrap(), vec![ScanState::Scanning]);
        assert_eq!(scanner.status().get(), ScanState::Idle);
    }

    #[tokio::test]
    async fn test_reset_forgets_cursor() {
        let mut scanner = TraceScanner::new(Address::ZERO, OperationEvaluator::new(Some(1)));
        let ledger = MockLedger::new();
        let store = HandleStore::new(RetryPolicy::default());
        ledger.mine(vec![]).await;
        scanner.flush(&ledger, &store).await.unwrap();
        assert_eq!(scanner.snapshots().checkpoint().next_block, 2);

        scanner.reset();
        assert_eq!(scanner.snapshots().checkpoint(), ScanCheckpoint::default());
    }
}
