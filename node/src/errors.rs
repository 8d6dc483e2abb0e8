// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use fhemock_kernel::error::KernelError;
use fhemock_kernel::types::{FheType, Handle};
use serde::Serialize;
use thiserror::Error;

/// One transaction the scanner could not process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScanFailure {
    pub block: u64,
    pub tx: String,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),
    #[error("Handle not found: {0}")]
    HandleNotFound(Handle),
    #[error("Trace fetch failed for {tx}: {reason}")]
    TraceFetchFailed { tx: String, reason: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Handle {handle} is {actual}, expected {expected}")]
    TypeMismatch { handle: Handle, expected: &'static str, actual: FheType },
    #[error("Scan finished with {} failed transaction(s)", .0.len())]
    Scan(Vec<ScanFailure>),
    /// A ledger call outside any single transaction stopped the flush. Failures
    /// collected before that point travel with it.
    #[error("Scan stopped before block {next_block} ({} failed transaction(s)): {cause}", .failures.len())]
    ScanAborted { next_block: u64, cause: Box<EngineError>, failures: Vec<ScanFailure> },
}
