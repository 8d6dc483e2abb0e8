// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Session-scoped handle → cleartext store.

use std::time::Duration;

use fhemock_kernel::digest::store_digest;
use fhemock_kernel::types::Handle;
use num_bigint::BigUint;
use rustc_hash::FxHashMap;
use tokio::sync::RwLock;

use crate::errors::EngineError;

/// Bounded retry for reads that may race the scanner.
///
/// This compensates for readers that ask for a handle moments after the
/// generating transaction was mined. It is not a lock: callers that need the
/// result of a specific transaction must flush first.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 100, backoff: Duration::from_millis(5) }
    }
}

pub struct HandleStore {
    data: RwLock<FxHashMap<Handle, BigUint>>,
    retry: RetryPolicy,
}

impl HandleStore {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { data: RwLock::new(FxHashMap::default()), retry }
    }

    /// Writes `value` for `handle`. Without `replace`, an existing row wins.
    /// Returns whether the row was written.
    pub async fn insert(&self, handle: Handle, value: BigUint, replace: bool) -> bool {
        let mut guard = self.data.write().await;
        if !replace && guard.contains_key(&handle) {
            return false;
        }
        guard.insert(handle, value);
        metrics::increment_counter!("fhemock_handles_inserted_total");
        true
    }

    /// Single lookup, no retry.
    pub async fn get(&self, handle: &Handle) -> Option<BigUint> {
        self.data.read().await.get(handle).cloned()
    }

    /// Lookup that retries a miss according to the store's [`RetryPolicy`].
    pub async fn query(&self, handle: &Handle) -> Result<BigUint, EngineError> {
        let attempts = self.retry.max_attempts.max(1);
        for attempt in 1..=attempts {
            if let Some(value) = self.get(handle).await {
                return Ok(value);
            }
            if attempt < attempts {
                if attempt == 1 {
                    tracing::debug!("Handle {} not yet stored, retrying", handle);
                }
                metrics::increment_counter!("fhemock_query_retries_total");
                tokio::time::sleep(self.retry.backoff).await;
            }
        }
        tracing::warn!("Handle {} not found after {} attempts", handle, attempts);
        Err(EngineError::HandleNotFound(*handle))
    }

    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }

    /// Canonical fingerprint of the store contents.
    pub async fn digest(&self) -> Result<[u8; 32], EngineError> {
        let guard = self.data.read().await;
        Ok(store_digest(guard.iter())?)
    }

    pub async fn clear(&self) {
        self.data.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn handle(n: u8) -> Handle {
        let mut b = [n; 32];
        b[30] = 2;
        b[31] = 0;
        Handle::from_bytes(b)
    }

    fn quick() -> RetryPolicy {
        RetryPolicy { max_attempts: 3, backoff: Duration::from_millis(1) }
    }

    #[tokio::test]
    async fn test_insert_without_replace_keeps_first() {
        let store = HandleStore::new(quick());
        assert!(store.insert(handle(1), BigUint::from(5u8), false).await);
        assert!(!store.insert(handle(1), BigUint::from(6u8), false).await);
        assert_eq!(store.get(&handle(1)).await, Some(BigUint::from(5u8)));

        assert!(store.insert(handle(1), BigUint::from(7u8), true).await);
        assert_eq!(store.query(&handle(1)).await.unwrap(), BigUint::from(7u8));
    }

    #[tokio::test]
    async fn test_query_exhausts_retries() {
        let store = HandleStore::new(quick());
        let err = store.query(&handle(9)).await.unwrap_err();
        assert!(matches!(err, EngineError::HandleNotFound(h) if h == handle(9)));
    }

    #[tokio::test]
    async fn test_query_sees_late_write() {
        let store = Arc::new(HandleStore::new(RetryPolicy {
            max_attempts: 200,
            backoff: Duration::from_millis(5),
        }));
        let writer = store.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            writer.insert(handle(3), BigUint::from(42u8), false).await;
        });
        assert_eq!(store.query(&handle(3)).await.unwrap(), BigUint::from(42u8));
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_digest_tracks_contents() {
        let store = HandleStore::new(quick());
        let empty = store.digest().await.unwrap();
        store.insert(handle(1), BigUint::from(1u8), false).await;
        let one = store.digest().await.unwrap();
        assert_ne!(empty, one);
        store.insert(handle(1), BigUint::from(1u8), false).await;
        assert_eq!(store.digest().await.unwrap(), one);
        store.clear().await;
        assert!(store.is_empty().await);
        assert_eq!(store.digest().await.unwrap(), empty);
    }
}
