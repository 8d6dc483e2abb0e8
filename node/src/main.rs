// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::Arc;

use fhemock_node::config::CoprocessorConfig;
use fhemock_node::engine::Coprocessor;
use fhemock_node::errors::EngineError;
use fhemock_node::ledger::RpcLedger;
use fhemock_node::telemetry::{init_telemetry, render_metrics};

#[tokio::main]
async fn main() {
    init_telemetry();

    let cfg = CoprocessorConfig::from_env();
    tracing::info!("Initializing fhemock watcher with config: {:?}", cfg);

    let ledger = Arc::new(RpcLedger::with_introspection(cfg.rpc_url.clone(), cfg.snapshots));
    tracing::info!("Watching ledger at {}", ledger.url());
    let coprocessor = Coprocessor::new(cfg.clone(), ledger);

    let mut interval = tokio::time::interval(cfg.poll_interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match coprocessor.flush().await {
                    Ok(report) => {
                        for failure in &report.failures {
                            tracing::warn!("Block {} tx {}: {}", failure.block, failure.tx, failure.reason);
                        }
                        if !report.evaluations.is_empty() {
                            tracing::info!(
                                "Blocks {}..={}: {} results",
                                report.from_block,
                                report.head,
                                report.evaluations.len()
                            );
                        }
                    }
                    Err(EngineError::ScanAborted { next_block, cause, failures }) => {
                        for failure in &failures {
                            tracing::warn!("Block {} tx {}: {}", failure.block, failure.tx, failure.reason);
                        }
                        tracing::error!("Flush stopped before block {}: {}", next_block, cause);
                    }
                    Err(e) => tracing::error!("Flush failed: {}", e),
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutting down");
                tracing::info!("Final metrics:\n{}", render_metrics());
                break;
            }
        }
    }
}
