// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use fhemock_kernel::input::{create_encrypted_input, EncryptedInput};
use fhemock_kernel::types::cleartext::to_be_padded;
use fhemock_kernel::types::{FheType, Handle};
use fhemock_kernel::KernelError;
use num_bigint::BigUint;
use num_traits::{One, ToPrimitive};
use tokio::sync::Mutex;

use crate::config::CoprocessorConfig;
use crate::errors::EngineError;
use crate::evaluator::OperationEvaluator;
use crate::ledger::Ledger;
use crate::scanner::{ScanReport, ScanState, ScanStatus, TraceScanner};
use crate::snapshot::ScanCheckpoint;
use crate::store::{HandleStore, RetryPolicy};

/// One mock coprocessor session bound to a ledger.
pub struct Coprocessor {
    config: CoprocessorConfig,
    ledger: Arc<dyn Ledger>,
    store: Arc<HandleStore>,
    scanner: Mutex<TraceScanner>,
    status: ScanStatus,
}

impl Coprocessor {
    pub fn new(config: CoprocessorConfig, ledger: Arc<dyn Ledger>) -> Self {
        let store = Arc::new(HandleStore::new(RetryPolicy {
            max_attempts: config.query_attempts,
            backoff: config.query_backoff,
        }));
        let scanner = TraceScanner::new(config.executor, OperationEvaluator::new(config.rng_seed));
        tracing::info!("Coprocessor session for executor {}", config.executor);
        let status = scanner.status();
        Self { config, ledger, store, scanner: Mutex::new(scanner), status }
    }

    pub fn config(&self) -> &CoprocessorConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<HandleStore> {
        self.store.clone()
    }

    pub fn scan_state(&self) -> ScanState {
        self.status.get()
    }

    /// Scans everything mined since the last flush. Per-transaction failures
    /// are left in the report.
    pub async fn flush(&self) -> Result<ScanReport, EngineError> {
        let mut scanner = self.scanner.lock().await;
        scanner.flush(self.ledger.as_ref(), &self.store).await
    }

    /// Like [`Coprocessor::flush`], but reports per-transaction failures as
    /// [`EngineError::Scan`]. An aborted flush is returned as
    /// [`EngineError::ScanAborted`] with the failures found before the abort.
    pub async fn wait(&self) -> Result<ScanReport, EngineError> {
        let report = self.flush().await?;
        if report.failures.is_empty() {
            Ok(report)
        } else {
            Err(EngineError::Scan(report.failures))
        }
    }

    pub async fn query_clear_text(&self, handle: &Handle) -> Result<BigUint, EngineError> {
        self.store.query(handle).await
    }

    pub async fn insert(&self, handle: Handle, value: BigUint, replace: bool) -> bool {
        self.store.insert(handle, value, replace).await
    }

    pub fn create_encrypted_input(&self, contract: &str, caller: &str) -> Result<EncryptedInput, EngineError> {
        Ok(create_encrypted_input(contract, caller)?)
    }

    /// Call when the ledger takes a snapshot: flushes, then records the
    /// snapshot at the current head.
    pub async fn on_snapshot(&self) -> Result<ScanReport, EngineError> {
        let mut scanner = self.scanner.lock().await;
        let report = scanner.flush(self.ledger.as_ref(), &self.store).await?;
        let head = self.ledger.block_number().await?;
        scanner.snapshots_mut().record_snapshot(head);
        Ok(report)
    }

    /// Call after the ledger reverted to the latest snapshot.
    pub async fn on_revert(&self) {
        self.scanner.lock().await.snapshots_mut().on_revert();
    }

    pub async fn checkpoint(&self) -> ScanCheckpoint {
        self.scanner.lock().await.snapshots().checkpoint()
    }

    pub async fn current_snapshot(&self) -> (u64, u64) {
        self.scanner.lock().await.snapshots().current_snapshot()
    }

    /// Discards every stored cleartext and rewinds the checkpoint to `(0, 0)`.
    pub async fn reset(&self) {
        let mut scanner = self.scanner.lock().await;
        scanner.reset();
        self.store.clear().await;
        tracing::info!("Coprocessor session reset");
    }

    async fn typed_value(
        &self,
        handle: &Handle,
        expected: &'static str,
        accepts: impl Fn(FheType) -> bool,
    ) -> Result<(FheType, BigUint), EngineError> {
        let actual = handle.fhe_type()?;
        if !accepts(actual) {
            return Err(EngineError::TypeMismatch { handle: *handle, expected, actual });
        }
        Ok((actual, self.query_clear_text(handle).await?))
    }

    pub async fn decrypt_bool(&self, handle: &Handle) -> Result<bool, EngineError> {
        let (_, value) = self.typed_value(handle, "ebool", |t| t == FheType::Bool).await?;
        Ok(value.is_one())
    }

    /// Unsigned integers up to 128 bits.
    pub async fn decrypt_uint(&self, handle: &Handle) -> Result<u128, EngineError> {
        let (ty, value) = self
            .typed_value(handle, "euint4..euint128", |t| {
                matches!(
                    t,
                    FheType::Uint4 | FheType::Uint8 | FheType::Uint16 | FheType::Uint32 | FheType::Uint64 | FheType::Uint128
                )
            })
            .await?;
        match value.to_u128() {
            Some(v) => Ok(v),
            None => Err(KernelError::ValueOutOfRange { ty: ty.name(), value: value.to_string() }.into()),
        }
    }

    pub async fn decrypt_u256(&self, handle: &Handle) -> Result<U256, EngineError> {
        let (_, value) = self
            .typed_value(handle, "euint", |t| !matches!(t, FheType::Bool | FheType::Address) && t.bit_width() <= 256)
            .await?;
        Ok(U256::from_be_slice(&to_be_padded(&value, 32)))
    }

    pub async fn decrypt_address(&self, handle: &Handle) -> Result<Address, EngineError> {
        let (_, value) = self.typed_value(handle, "eaddress", |t| t == FheType::Address).await?;
        Ok(Address::from_slice(&to_be_padded(&value, 20)))
    }

    pub async fn decrypt_bytes(&self, handle: &Handle) -> Result<Vec<u8>, EngineError> {
        let (ty, value) = self
            .typed_value(handle, "ebytes", |t| {
                matches!(t, FheType::Bytes64 | FheType::Bytes128 | FheType::Bytes256)
            })
            .await?;
        Ok(to_be_padded(&value, ty.byte_size()))
    }
}
