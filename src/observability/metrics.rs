//! Metrics collection and exposition.
//!
//! # Metrics
//! - `xprsso_requests_total` (counter): dispatched requests by method, status
//! - `xprsso_request_duration_seconds` (histogram): dispatch latency
//! - `xprsso_routes_materialized_total` (counter): route entries added by `set`
//! - `xprsso_queries_applied_total` (counter): `set` calls by outcome

use std::net::SocketAddr;
use std::time::Instant;

use axum::http::{Method, StatusCode};
use metrics_exporter_prometheus::PrometheusBuilder;

pub const REQUESTS_TOTAL: &str = "xprsso_requests_total";
pub const REQUEST_DURATION: &str = "xprsso_request_duration_seconds";
pub const ROUTES_MATERIALIZED: &str = "xprsso_routes_materialized_total";
pub const QUERIES_APPLIED: &str = "xprsso_queries_applied_total";

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &Method, status: StatusCode, start: Instant) {
    metrics::counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status.as_u16().to_string()
    )
    .increment(1);
    metrics::histogram!(REQUEST_DURATION, "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_materialized(routes: usize) {
    metrics::counter!(ROUTES_MATERIALIZED).increment(routes as u64);
}

pub fn record_query(outcome: &'static str) {
    metrics::counter!(QUERIES_APPLIED, "outcome" => outcome).increment(1);
}
