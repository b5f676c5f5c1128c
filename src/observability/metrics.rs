//! Metrics collection and exposition.
//!
//! # Metrics
//! - `resilience_calls_total` (counter): dependency calls by service, outcome
//! - `resilience_breaker_transitions_total` (counter): state changes by service, from, to
//! - `resilience_breaker_rejections_total` (counter): calls refused while open
//! - `resilience_retry_attempts_total` (counter): retries scheduled by context
//! - `resilience_pool_in_flight` (gauge): current bulkhead occupancy
//! - `resilience_pool_rejections_total` (counter): bulkhead rejections
//! - `resilience_health_checks_total` (counter): probes by service, result
//! - `resilience_health_check_duration_seconds` (histogram): probe latency
//! - `resilience_critical_alerts_total` (counter): critical alerts raised
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_call(service: &str, outcome: &'static str) {
    counter!("resilience_calls_total", "service" => service.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_breaker_transition(service: &str, from: &'static str, to: &'static str) {
    counter!(
        "resilience_breaker_transitions_total",
        "service" => service.to_string(),
        "from" => from,
        "to" => to
    )
    .increment(1);
}

pub fn record_breaker_rejection(service: &str) {
    counter!("resilience_breaker_rejections_total", "service" => service.to_string()).increment(1);
}

pub fn record_retry_attempt(context: &str) {
    counter!("resilience_retry_attempts_total", "context" => context.to_string()).increment(1);
}

pub fn record_pool_in_flight(pool: &str, current: usize) {
    gauge!("resilience_pool_in_flight", "pool" => pool.to_string()).set(current as f64);
}

pub fn record_pool_rejection(pool: &str) {
    counter!("resilience_pool_rejections_total", "pool" => pool.to_string()).increment(1);
}

pub fn record_health_check(service: &str, healthy: bool, elapsed: Duration) {
    let result = if healthy { "healthy" } else { "unhealthy" };
    counter!("resilience_health_checks_total", "service" => service.to_string(), "result" => result)
        .increment(1);
    histogram!("resilience_health_check_duration_seconds", "service" => service.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_critical_alert(service: &str) {
    counter!("resilience_critical_alerts_total", "service" => service.to_string()).increment(1);
}
