//! Prometheus metrics for the gateway.
//!
//! Metrics are exposed via a dedicated HTTP listener (default: `0.0.0.0:9090`).
//!
//! # Available Metrics
//!
//! ## Counters
//! - `gateway_requests_total` - Completed requests (labels: method, status)
//! - `gateway_auth_failures_total` - Rejected credentials (labels: kind)
//! - `gateway_upstream_failures_total` - Backend failures (labels: service, kind)
//!
//! ## Histograms
//! - `gateway_request_duration_seconds` - End-to-end request duration (labels: method, status)
//!
//! ## Gauges
//! - `gateway_requests_in_flight` - Requests currently inside the pipeline
//!
//! Recording functions are no-ops until a recorder is installed, so they are
//! safe to call from tests.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const REQUESTS_TOTAL: &str = "gateway_requests_total";
    pub const REQUEST_DURATION_SECONDS: &str = "gateway_request_duration_seconds";
    pub const REQUESTS_IN_FLIGHT: &str = "gateway_requests_in_flight";
    pub const AUTH_FAILURES_TOTAL: &str = "gateway_auth_failures_total";
    pub const UPSTREAM_FAILURES_TOTAL: &str = "gateway_upstream_failures_total";
}

/// Initialize the Prometheus metrics exporter on `metrics_addr`.
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(names::REQUESTS_TOTAL, "Total number of completed requests");
    describe_counter!(
        names::AUTH_FAILURES_TOTAL,
        "Total number of requests rejected during authentication"
    );
    describe_counter!(
        names::UPSTREAM_FAILURES_TOTAL,
        "Total number of failed or timed out backend calls"
    );
    describe_histogram!(
        names::REQUEST_DURATION_SECONDS,
        "End-to-end request duration in seconds"
    );
    describe_gauge!(
        names::REQUESTS_IN_FLIGHT,
        "Number of requests currently being processed"
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

/// Mark a request as entering the pipeline.
pub fn request_started() {
    gauge!(names::REQUESTS_IN_FLIGHT).increment(1.0);
}

/// Mark a request as finished and record its outcome.
pub fn request_finished(method: &str, status: u16, duration_secs: f64) {
    gauge!(names::REQUESTS_IN_FLIGHT).decrement(1.0);
    let status = status.to_string();
    counter!(names::REQUESTS_TOTAL, "method" => method.to_string(), "status" => status.clone())
        .increment(1);
    histogram!(names::REQUEST_DURATION_SECONDS, "method" => method.to_string(), "status" => status)
        .record(duration_secs);
}

/// Record a rejected credential.
pub fn record_auth_failure(kind: &'static str) {
    counter!(names::AUTH_FAILURES_TOTAL, "kind" => kind).increment(1);
}

/// Record a backend that could not be reached or did not answer in time.
pub fn record_upstream_failure(service: &str, kind: &'static str) {
    counter!(names::UPSTREAM_FAILURES_TOTAL, "service" => service.to_string(), "kind" => kind)
        .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    // These only verify that recording without an installed recorder is harmless.

    #[test]
    fn test_request_lifecycle() {
        request_started();
        request_finished("GET", 200, 0.012);
    }

    #[test]
    fn test_record_auth_failure() {
        record_auth_failure("expired");
    }

    #[test]
    fn test_record_upstream_failure() {
        record_upstream_failure("orders", "timeout");
    }
}
