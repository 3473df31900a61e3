//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define shield metrics (verdicts, blocks, store sizes, sweeps)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `shield_verdicts_total` (counter): verdicts by outcome
//! - `shield_blocks_issued_total` (counter): blocks by cause (rate_limit, threat)
//! - `shield_event_log_size` (gauge): retained security events
//! - `shield_blocked_sources` (gauge): sources under an active block
//! - `shield_sweep_removed_total` (counter): records dropped by the sweeper, by store
//! - `shield_evaluation_duration_seconds` (histogram): time spent in the gate

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

pub const METRIC_VERDICTS_TOTAL: &str = "shield_verdicts_total";
pub const METRIC_BLOCKS_ISSUED_TOTAL: &str = "shield_blocks_issued_total";
pub const METRIC_EVENT_LOG_SIZE: &str = "shield_event_log_size";
pub const METRIC_BLOCKED_SOURCES: &str = "shield_blocked_sources";
pub const METRIC_SWEEP_REMOVED_TOTAL: &str = "shield_sweep_removed_total";
pub const METRIC_EVALUATION_DURATION: &str = "shield_evaluation_duration_seconds";

/// Install the Prometheus recorder and start its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    register_metric_descriptions();
    tracing::info!("Metrics server started on http://{}/metrics", addr);
    Ok(())
}

fn register_metric_descriptions() {
    describe_counter!(METRIC_VERDICTS_TOTAL, "Gate verdicts by outcome");
    describe_counter!(METRIC_BLOCKS_ISSUED_TOTAL, "Blocks issued by cause");
    describe_gauge!(METRIC_EVENT_LOG_SIZE, "Security events currently retained");
    describe_gauge!(METRIC_BLOCKED_SOURCES, "Sources under an active block");
    describe_counter!(METRIC_SWEEP_REMOVED_TOTAL, "Stale records removed by the sweeper");
    describe_histogram!(
        METRIC_EVALUATION_DURATION,
        Unit::Seconds,
        "Time spent evaluating a request"
    );
}

/// Count a verdict and record how long the evaluation took.
pub fn record_verdict(outcome: &str, started: Instant) {
    counter!(METRIC_VERDICTS_TOTAL, "outcome" => outcome.to_string()).increment(1);
    histogram!(METRIC_EVALUATION_DURATION).record(started.elapsed().as_secs_f64());
}

pub fn record_block(cause: &str) {
    counter!(METRIC_BLOCKS_ISSUED_TOTAL, "cause" => cause.to_string()).increment(1);
}

pub fn record_event_log_size(size: usize) {
    gauge!(METRIC_EVENT_LOG_SIZE).set(size as f64);
}

pub fn record_blocked_sources(count: usize) {
    gauge!(METRIC_BLOCKED_SOURCES).set(count as f64);
}

pub fn record_swept(store: &str, removed: usize) {
    if removed > 0 {
        counter!(METRIC_SWEEP_REMOVED_TOTAL, "store" => store.to_string()).increment(removed as u64);
    }
}
