//! Metrics collection and exposition.
//!
//! # Metrics
//! - `upstream_calls_total` (counter): logical calls by service, outcome
//! - `upstream_call_duration_seconds` (histogram): end-to-end call latency
//! - `upstream_retries_total` (counter): retry attempts by service
//! - `upstream_circuit_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `upstream_circuit_rejections_total` (counter): calls denied by the breaker
//! - `upstream_probe_total` (counter): health probes by service, result
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::CircuitState;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_call(service: &str, outcome: &'static str, elapsed: Duration) {
    counter!(
        "upstream_calls_total",
        "service" => service.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("upstream_call_duration_seconds", "service" => service.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_retry(service: &str) {
    counter!("upstream_retries_total", "service" => service.to_string()).increment(1);
}

pub fn record_circuit_state(service: &str, state: CircuitState) {
    gauge!("upstream_circuit_state", "service" => service.to_string()).set(state.as_gauge());
}

pub fn record_circuit_rejection(service: &str) {
    counter!("upstream_circuit_rejections_total", "service" => service.to_string())
        .increment(1);
}

pub fn record_probe(service: &str, healthy: bool) {
    let result = if healthy { "healthy" } else { "unhealthy" };
    counter!(
        "upstream_probe_total",
        "service" => service.to_string(),
        "result" => result
    )
    .increment(1);
}
