// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::time::Duration;

use alloy_primitives::{address, Address};

/// Session configuration for one mock coprocessor.
#[derive(Clone, Debug)]
pub struct CoprocessorConfig {
    /// Address of the executor contract whose calls are intercepted.
    pub executor: Address,
    pub rpc_url: String,
    /// Attempts a `query_clear_text` makes before `HandleNotFound`.
    pub query_attempts: u32,
    pub query_backoff: Duration,
    /// Fixed seed for random operators. `None` seeds from the OS.
    pub rng_seed: Option<u64>,
    pub poll_interval: Duration,
    /// Whether the ledger answers snapshot introspection calls.
    pub snapshots: bool,
}

impl Default for CoprocessorConfig {
    fn default() -> Self {
        Self {
            executor: address!("0x05fd9b5efe0a996095f42ed7e77c390810cf660c"),
            rpc_url: "http://127.0.0.1:8545".to_string(),
            query_attempts: 100,
            query_backoff: Duration::from_millis(5),
            rng_seed: None,
            poll_interval: Duration::from_secs(1),
            snapshots: true,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not parseable", key, raw);
            None
        }
    }
}

impl CoprocessorConfig {
    /// Defaults overridden by `FHEMOCK_*` environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(executor) = env_parse::<Address>("FHEMOCK_EXECUTOR") {
            cfg.executor = executor;
        }
        if let Ok(url) = std::env::var("FHEMOCK_RPC_URL") {
            cfg.rpc_url = url;
        }
        if let Some(n) = env_parse::<u32>("FHEMOCK_QUERY_ATTEMPTS") {
            cfg.query_attempts = n.max(1);
        }
        if let Some(ms) = env_parse::<u64>("FHEMOCK_QUERY_BACKOFF_MS") {
            cfg.query_backoff = Duration::from_millis(ms);
        }
        if let Some(seed) = env_parse::<u64>("FHEMOCK_RNG_SEED") {
            cfg.rng_seed = Some(seed);
        }
        if let Some(secs) = env_parse::<u64>("FHEMOCK_POLL_SECS") {
            cfg.poll_interval = Duration::from_secs(secs);
        }
        if let Some(flag) = env_parse::<bool>("FHEMOCK_SNAPSHOTS") {
            cfg.snapshots = flag;
        }
        cfg
    }
}
