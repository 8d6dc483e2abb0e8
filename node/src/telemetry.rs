// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::sync::OnceLock;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize telemetry (logs + metrics)
pub fn init_telemetry() {
    // 1. Logs
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "fhemock_node=debug".into()),
    );
    if tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_err()
    {
        tracing::warn!("Tracing subscriber already installed");
    }

    // 2. Metrics (Prometheus)
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROM_HANDLE.set(handle).is_err() {
                tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
            }
        }
        Err(e) => tracing::warn!("Failed to install Prometheus recorder: {}", e),
    }

    metrics::describe_counter!("fhemock_handles_inserted_total", "Handle rows written to the store");
    metrics::describe_histogram!("fhemock_scan_duration_seconds", "Time taken by one flush");
    metrics::describe_counter!("fhemock_scan_failures_total", "Transactions the scanner could not process");
    metrics::describe_counter!("fhemock_query_retries_total", "Cleartext queries that had to wait for the scanner");
    metrics::describe_gauge!("fhemock_last_scanned_block", "Ledger head at the last flush");

    metrics::gauge!("fhemock_node_up", 1.0);
}

/// Rendered Prometheus text, if the recorder is installed.
pub fn render_metrics() -> String {
    if let Some(handle) = PROM_HANDLE.get() {
        handle.render()
    } else {
        "# metrics not initialized".to_string()
    }
}
