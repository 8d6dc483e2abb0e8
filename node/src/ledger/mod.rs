// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! The chain the coprocessor watches.

pub mod mock;
pub mod rpc;

use alloy_primitives::B256;
use async_trait::async_trait;
use fhemock_kernel::trace::ExecutionTrace;

use crate::errors::EngineError;

pub use mock::MockLedger;
pub use rpc::RpcLedger;

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Height of the latest mined block.
    async fn block_number(&self) -> Result<u64, EngineError>;

    /// Transaction hashes of block `height`, in execution order.
    async fn block_transactions(&self, height: u64) -> Result<Vec<B256>, EngineError>;

    async fn trace_transaction(&self, tx: B256) -> Result<ExecutionTrace, EngineError>;

    /// Snapshot marker kept by the ledger. `None` when the ledger has no
    /// snapshot introspection (e.g. coverage runs).
    async fn snapshot_block(&self) -> Result<Option<u64>, EngineError>;

    /// Stores the scanner's cursor so a later revert can be detected.
    async fn set_snapshot_block(&self, next_block: u64) -> Result<(), EngineError>;
}
