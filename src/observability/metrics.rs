//! Metrics collection and exposition.
//!
//! # Metrics
//! - `router_requests_total` (counter): requests by method, status, decision
//! - `router_request_duration_seconds` (histogram): latency distribution
//! - `router_registry_refresh_total` (counter): refresh outcomes
//! - `router_registry_backends` (gauge): usable entries in the live snapshot
//! - `router_registry_generation` (gauge): generation of the live snapshot
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Labels for method, status code, routing decision

use metrics::{counter, gauge, histogram, Label};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Start the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one handled request.
pub fn record_request(method: &str, status: u16, decision: &'static str, start: Instant) {
    let labels = vec![
        Label::new("method", method.to_string()),
        Label::new("status", status.to_string()),
        Label::new("decision", decision),
    ];
    counter!("router_requests_total", labels.clone()).increment(1);
    histogram!("router_request_duration_seconds", labels).record(start.elapsed().as_secs_f64());
}

/// Record the outcome of a registry refresh or reload.
pub fn record_registry_refresh(outcome: &'static str) {
    counter!("router_registry_refresh_total", "outcome" => outcome).increment(1);
}

/// Record a newly installed registry snapshot.
pub fn record_registry_installed(generation: u64, backends: usize) {
    gauge!("router_registry_generation").set(generation as f64);
    gauge!("router_registry_backends").set(backends as f64);
}
