//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by branch, status
//! - `proxy_request_duration_seconds` (histogram): time to response head, by branch
//! - `proxy_upstream_errors_total` (counter): failed dispatches by branch
//! - `proxy_guid_lookups_total` (counter): cache hits, joins, resolutions, failures

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Start the Prometheus scrape endpoint. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(branch: &'static str, status: u16, start: Instant) {
    ::metrics::counter!(
        "proxy_requests_total",
        "branch" => branch,
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("proxy_request_duration_seconds", "branch" => branch)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error(branch: &'static str) {
    ::metrics::counter!("proxy_upstream_errors_total", "branch" => branch).increment(1);
}

pub fn record_guid_lookup(outcome: &'static str) {
    ::metrics::counter!("proxy_guid_lookups_total", "outcome" => outcome).increment(1);
}
