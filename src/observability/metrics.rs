//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define guard metrics (cache, breaker, rate limiting, abuse)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `cache_hits_total` / `cache_misses_total` (counter): by cache_type, cache_layer
//! - `cache_operation_duration_seconds` (histogram): by cache_type, operation
//! - `cache_errors_total` (counter): by cache_type, reason
//! - `circuit_breaker_state_changes_total` (counter): by breaker, state
//! - `circuit_breaker_failures_total` (counter): by breaker
//! - `circuit_breaker_state` (gauge): 0=closed, 1=open, 2=half_open
//! - `rate_limit_hits_total` (counter): by endpoint, subject_type
//! - `rate_limit_blacklist_rejections_total` (counter): by endpoint
//! - `abuse_detections_total` (counter): by pattern
//! - `rate_limit_whitelist_size` / `rate_limit_blacklist_size` (gauge)
//! - `http_requests_total` (counter), `http_request_duration_seconds` (histogram)
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed (tests need none)
//! - Label values are low-cardinality (never raw keys or identifiers)

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_cache_hit(cache_type: &str, cache_layer: &str) {
    counter!(
        "cache_hits_total",
        "cache_type" => cache_type.to_owned(),
        "cache_layer" => cache_layer.to_owned()
    )
    .increment(1);
}

pub fn record_cache_miss(cache_type: &str, cache_layer: &str) {
    counter!(
        "cache_misses_total",
        "cache_type" => cache_type.to_owned(),
        "cache_layer" => cache_layer.to_owned()
    )
    .increment(1);
}

pub fn record_cache_latency(cache_type: &str, operation: &'static str, start: Instant) {
    histogram!(
        "cache_operation_duration_seconds",
        "cache_type" => cache_type.to_owned(),
        "operation" => operation
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_cache_error(cache_type: &str, reason: &'static str) {
    counter!(
        "cache_errors_total",
        "cache_type" => cache_type.to_owned(),
        "reason" => reason
    )
    .increment(1);
}

fn state_gauge_value(state: CircuitState) -> f64 {
    match state {
        CircuitState::Closed => 0.0,
        CircuitState::Open => 1.0,
        CircuitState::HalfOpen => 2.0,
    }
}

pub fn record_breaker_state(breaker: &str, state: CircuitState) {
    gauge!("circuit_breaker_state", "breaker" => breaker.to_owned()).set(state_gauge_value(state));
}

pub fn record_breaker_transition(breaker: &str, state: CircuitState) {
    counter!(
        "circuit_breaker_state_changes_total",
        "breaker" => breaker.to_owned(),
        "state" => state.as_str()
    )
    .increment(1);
    record_breaker_state(breaker, state);
}

pub fn record_breaker_failure(breaker: &str) {
    counter!("circuit_breaker_failures_total", "breaker" => breaker.to_owned()).increment(1);
}

pub fn record_rate_limited(endpoint: &str, subject_type: &'static str) {
    counter!(
        "rate_limit_hits_total",
        "endpoint" => endpoint.to_owned(),
        "subject_type" => subject_type
    )
    .increment(1);
}

pub fn record_blacklist_rejection(endpoint: &str) {
    counter!("rate_limit_blacklist_rejections_total", "endpoint" => endpoint.to_owned())
        .increment(1);
}

pub fn record_abuse_detected(pattern: &'static str) {
    counter!("abuse_detections_total", "pattern" => pattern).increment(1);
}

pub fn record_access_list_sizes(whitelist: usize, blacklist: usize) {
    gauge!("rate_limit_whitelist_size").set(whitelist as f64);
    gauge!("rate_limit_blacklist_size").set(blacklist as f64);
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "http_requests_total",
        "method" => method.to_owned(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("http_request_duration_seconds", "method" => method.to_owned())
        .record(start.elapsed().as_secs_f64());
}
