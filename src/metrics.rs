//! Prometheus metrics for the request edge.
//!
//! Metrics are exposed via a dedicated HTTP listener (default port 9090).
//!
//! # Available Metrics
//!
//! ## Counters
//! - `edge_ingest_total` - Ingested requests (labels: source, project)
//! - `edge_rate_limit_rejections_total` - Requests rejected by the quota guard
//! - `edge_auth_failures_total` - Authentication failures (label: reason)
//!
//! ## Histograms
//! - `edge_ingest_latency_seconds` - Ingest handler latency (label: project)
//!
//! # Usage
//!
//! ```rust,ignore
//! use edge_pipeline::metrics::{init_metrics, record_ingest};
//!
//! init_metrics("0.0.0.0:9090".parse()?)?;
//! record_ingest("http", "project-1", 0.012);
//! ```

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const INGEST_LATENCY_SECONDS: &str = "edge_ingest_latency_seconds";
    pub const INGEST_TOTAL: &str = "edge_ingest_total";
    pub const RATE_LIMIT_REJECTIONS_TOTAL: &str = "edge_rate_limit_rejections_total";
    pub const AUTH_FAILURES_TOTAL: &str = "edge_auth_failures_total";
}

/// Initialize the Prometheus metrics exporter.
///
/// # Errors
///
/// Returns a message if the exporter cannot be installed (address in use,
/// recorder already set).
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_histogram!(
        names::INGEST_LATENCY_SECONDS,
        "Latency of ingest requests in seconds"
    );
    describe_counter!(names::INGEST_TOTAL, "Total number of ingest requests");
    describe_counter!(
        names::RATE_LIMIT_REJECTIONS_TOTAL,
        "Total number of requests rejected by the rate limit guard"
    );
    describe_counter!(
        names::AUTH_FAILURES_TOTAL,
        "Total number of requests that failed authentication"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

/// Record one ingest request and its handler latency.
pub fn record_ingest(source: &str, project: &str, duration_secs: f64) {
    histogram!(names::INGEST_LATENCY_SECONDS, "project" => project.to_string())
        .record(duration_secs);
    counter!(names::INGEST_TOTAL, "source" => source.to_string(), "project" => project.to_string())
        .increment(1);
}

pub fn record_rate_limit_rejection() {
    counter!(names::RATE_LIMIT_REJECTIONS_TOTAL).increment(1);
}

/// Record an authentication failure. `reason` is a low-cardinality tag.
pub fn record_auth_failure(reason: &'static str) {
    counter!(names::AUTH_FAILURES_TOTAL, "reason" => reason).increment(1);
}
