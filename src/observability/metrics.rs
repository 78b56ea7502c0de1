//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): terminal requests by unit, target, status
//! - `gateway_request_duration_seconds` (histogram): latency of completed requests
//! - `gateway_response_bytes_total` (counter): declared body size of completed responses
//! - `gateway_request_errors_total` (counter): failed requests by unit, target, kind
//! - `gateway_routing_units` (gauge): registered routing units
//! - `gateway_stats_publish_failures_total` (counter): stats events that failed to publish
//! - `gateway_sync_messages_total` (counter): change notifications by result
//!
//! # Design Decisions
//! - Everything goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - The Prometheus exporter is opt-in

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start Prometheus exporter"),
    }
}

/// A request reached COMPLETED.
pub fn record_request(unit: &str, target: &str, status: u16, start: Instant, bytes: Option<u64>) {
    counter!(
        "gateway_requests_total",
        "unit" => unit.to_string(),
        "target" => target.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        "gateway_request_duration_seconds",
        "unit" => unit.to_string(),
        "target" => target.to_string()
    )
    .record(start.elapsed().as_secs_f64());

    if let Some(bytes) = bytes {
        counter!(
            "gateway_response_bytes_total",
            "unit" => unit.to_string(),
            "target" => target.to_string()
        )
        .increment(bytes);
    }
}

/// A request reached FAILED. No latency or size observation is made.
pub fn record_error(unit: &str, target: &str, status: u16, kind: &'static str) {
    counter!(
        "gateway_requests_total",
        "unit" => unit.to_string(),
        "target" => target.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    counter!(
        "gateway_request_errors_total",
        "unit" => unit.to_string(),
        "target" => target.to_string(),
        "kind" => kind
    )
    .increment(1);
}

pub fn set_routing_units(count: usize) {
    gauge!("gateway_routing_units").set(count as f64);
}

pub fn record_publish_failure(unit: &str) {
    counter!("gateway_stats_publish_failures_total", "unit" => unit.to_string()).increment(1);
}

/// `result` is one of `applied`, `ignored`, `failed`, `lost`.
pub fn record_sync_message(result: &'static str) {
    counter!("gateway_sync_messages_total", "result" => result).increment(1);
}
