//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by handler, method, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_upstream_failures_total` (counter): network failures by kind
//! - `gateway_session_refresh_total` (counter): refresh flights by outcome
//!
//! Without an installed recorder every call is a no-op, so library users and
//! tests pay nothing.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::ObservabilityConfig;
use crate::error::GatewayError;

/// Scrape endpoint address from the config.
pub fn metrics_address(config: &ObservabilityConfig) -> Result<SocketAddr, GatewayError> {
    config
        .metrics_address
        .parse()
        .map_err(|e: std::net::AddrParseError| GatewayError::Address {
            address: config.metrics_address.clone(),
            reason: e.to_string(),
        })
}

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished request.
pub fn record_request(handler: &'static str, method: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "handler" => handler,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "gateway_request_duration_seconds",
        "handler" => handler,
        "method" => method.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record an upstream network failure.
pub fn record_upstream_failure(kind: &'static str) {
    counter!("gateway_upstream_failures_total", "kind" => kind).increment(1);
}

/// Record a settled refresh flight.
pub fn record_refresh(refreshed: bool) {
    let outcome = if refreshed { "success" } else { "failure" };
    counter!("gateway_session_refresh_total", "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_address_parse() {
        let mut config = ObservabilityConfig::default();
        assert_eq!(metrics_address(&config).unwrap().port(), 9090);

        config.metrics_address = "localhost:metrics".to_string();
        let err = metrics_address(&config).unwrap_err();
        assert!(matches!(err, GatewayError::Address { ref address, .. } if address == "localhost:metrics"));
        assert!(err.to_string().starts_with("Invalid address localhost:metrics:"));
    }
}
