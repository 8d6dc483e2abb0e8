// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! In-memory chain with EVM-style snapshot and revert.

use alloy_primitives::{keccak256, Address, B256};
use async_trait::async_trait;
use fhemock_kernel::abi::OperationCall;
use fhemock_kernel::trace::{ExecutionTrace, TraceLog};
use rustc_hash::FxHashMap;
use tokio::sync::Mutex;

use super::Ledger;
use crate::errors::EngineError;

/// A successful transaction whose trace calls `executor` once per entry of `calls`.
pub fn executor_trace(executor: Address, calls: &[OperationCall]) -> Result<ExecutionTrace, EngineError> {
    let mut struct_logs = Vec::with_capacity(calls.len());
    for call in calls {
        struct_logs.push(TraceLog::call_frame(executor, &call.abi_encode()?, 2));
    }
    Ok(ExecutionTrace { failed: false, struct_logs })
}

#[derive(Default)]
struct Chain {
    // blocks[0] is genesis.
    blocks: Vec<Vec<B256>>,
    traces: FxHashMap<B256, ExecutionTrace>,
    // (snapshot id, head at snapshot time)
    snapshots: Vec<(u64, u64)>,
    next_snapshot_id: u64,
    marker: u64,
    nonce: u64,
}

impl Chain {
    fn head(&self) -> u64 {
        self.blocks.len() as u64 - 1
    }

    fn next_tx_hash(&mut self) -> B256 {
        self.nonce += 1;
        let mut seed = [0u8; 16];
        seed[..8].copy_from_slice(&(self.blocks.len() as u64).to_be_bytes());
        seed[8..].copy_from_slice(&self.nonce.to_be_bytes());
        keccak256(seed)
    }
}

pub struct MockLedger {
    chain: Mutex<Chain>,
    introspection: bool,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    pub fn new() -> Self {
        let chain = Chain { blocks: vec![Vec::new()], ..Default::default() };
        Self { chain: Mutex::new(chain), introspection: true }
    }

    /// A ledger that answers no snapshot introspection, like coverage runs.
    pub fn without_snapshots() -> Self {
        Self { introspection: false, ..Self::new() }
    }

    /// Mines one block holding `txs`. Returns its height and the tx hashes.
    pub async fn mine(&self, txs: Vec<ExecutionTrace>) -> (u64, Vec<B256>) {
        let mut chain = self.chain.lock().await;
        let mut hashes = Vec::with_capacity(txs.len());
        for trace in txs {
            let hash = chain.next_tx_hash();
            chain.traces.insert(hash, trace);
            hashes.push(hash);
        }
        chain.blocks.push(hashes.clone());
        (chain.head(), hashes)
    }

    /// Mines one block with a single transaction making `calls` in order.
    pub async fn mine_calls(&self, executor: Address, calls: &[OperationCall]) -> Result<u64, EngineError> {
        let trace = executor_trace(executor, calls)?;
        Ok(self.mine(vec![trace]).await.0)
    }

    /// Mines a transaction whose trace the ledger cannot produce.
    pub async fn mine_untraceable(&self) -> (u64, B256) {
        let mut chain = self.chain.lock().await;
        let hash = chain.next_tx_hash();
        chain.blocks.push(vec![hash]);
        (chain.head(), hash)
    }

    pub async fn head(&self) -> u64 {
        self.chain.lock().await.head()
    }

    /// Takes a snapshot of the current head, returning its id.
    pub async fn snapshot(&self) -> u64 {
        let mut chain = self.chain.lock().await;
        let id = chain.next_snapshot_id;
        chain.next_snapshot_id += 1;
        let head = chain.head();
        chain.snapshots.push((id, head));
        id
    }

    /// Reverts to snapshot `id`, discarding it and every later one.
    /// Returns false for an unknown id.
    pub async fn revert(&self, id: u64) -> bool {
        let mut chain = self.chain.lock().await;
        let Some(pos) = chain.snapshots.iter().position(|(sid, _)| *sid == id) else {
            return false;
        };
        let (_, head) = chain.snapshots[pos];
        chain.snapshots.truncate(pos);
        let dropped: Vec<B256> = chain.blocks.drain(head as usize + 1..).flatten().collect();
        for tx in dropped {
            chain.traces.remove(&tx);
        }
        if self.introspection {
            chain.marker = head;
        }
        true
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn block_number(&self) -> Result<u64, EngineError> {
        Ok(self.chain.lock().await.head())
    }

    async fn block_transactions(&self, height: u64) -> Result<Vec<B256>, EngineError> {
        let chain = self.chain.lock().await;
        chain
            .blocks
            .get(height as usize)
            .cloned()
            .ok_or_else(|| EngineError::Network(format!("block {} not found", height)))
    }

    async fn trace_transaction(&self, tx: B256) -> Result<ExecutionTrace, EngineError> {
        let chain = self.chain.lock().await;
        chain.traces.get(&tx).cloned().ok_or_else(|| EngineError::TraceFetchFailed {
            tx: tx.to_string(),
            reason: "transaction not traceable".to_string(),
        })
    }

    async fn snapshot_block(&self) -> Result<Option<u64>, EngineError> {
        if !self.introspection {
            return Ok(None);
        }
        Ok(Some(self.chain.lock().await.marker))
    }

    async fn set_snapshot_block(&self, next_block: u64) -> Result<(), EngineError> {
        if self.introspection {
            self.chain.lock().await.marker = next_block;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_revert_truncates_history() {
        let ledger = MockLedger::new();
        ledger.mine(vec![ExecutionTrace::default()]).await;
        let id = ledger.snapshot().await;
        let (height, hashes) = ledger.mine(vec![ExecutionTrace::default()]).await;
        assert_eq!(height, 2);

        assert!(ledger.revert(id).await);
        assert_eq!(ledger.block_number().await.unwrap(), 1);
        assert_eq!(ledger.snapshot_block().await.unwrap(), Some(1));
        assert!(ledger.trace_transaction(hashes[0]).await.is_err());
        assert!(!ledger.revert(id).await);
    }

    #[tokio::test]
    async fn test_without_snapshots() {
        let ledger = MockLedger::without_snapshots();
        ledger.set_snapshot_block(5).await.unwrap();
        assert_eq!(ledger.snapshot_block().await.unwrap(), None);
    }
}
