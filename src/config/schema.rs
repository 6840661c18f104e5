//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the serving guard.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// External store settings.
    pub store: StoreConfig,

    /// Circuit breaker fronting the cache store.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Sliding-window rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Heuristic abuse detection.
    pub abuse: AbuseConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// External store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Deadline applied to every store call, in milliseconds.
    pub op_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { op_timeout_ms: 5000 }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Error rate (0.0..=1.0) over the window that opens the circuit.
    pub failure_threshold: f64,

    /// Rolling window for the error rate, in seconds.
    pub window_secs: u64,

    /// How long the circuit stays open before probing, in seconds.
    pub open_duration_secs: u64,

    /// Fraction of half-open traffic forwarded as probes.
    pub half_open_test_fraction: f64,

    /// Minimum requests in the window before the error rate is evaluated.
    pub min_requests: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 0.5,
            window_secs: 60,
            open_duration_secs: 30,
            half_open_test_fraction: 0.1,
            min_requests: 10,
        }
    }
}

/// Limit for one subject class on one endpoint.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct LimitConfig {
    /// Maximum admitted requests per window.
    pub limit: u32,

    /// Burst capacity. Reported only; the enforced cutoff is `limit`.
    pub burst: u32,

    /// Sliding window length in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_window_secs() -> u64 {
    60
}

/// Rate limits for a single endpoint.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct EndpointPolicy {
    /// Endpoint prefix, e.g. "/search".
    pub endpoint: String,

    /// Limits for callers identified by client IP.
    pub ip: LimitConfig,

    /// Limits for callers identified by API key.
    pub api_key: LimitConfig,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Per-endpoint policies. Endpoints not listed are not limited.
    pub policies: Vec<EndpointPolicy>,

    /// Paths that bypass the limiter entirely.
    pub exempt_paths: Vec<String>,

    /// Identifiers (IP or API key) that are never limited.
    pub whitelist: Vec<String>,

    /// Identifiers (IP or API key) that are always rejected.
    pub blacklist: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            policies: vec![
                EndpointPolicy {
                    endpoint: "/search".to_string(),
                    ip: LimitConfig { limit: 100, burst: 150, window_secs: 60 },
                    api_key: LimitConfig { limit: 1000, burst: 1500, window_secs: 60 },
                },
                EndpointPolicy {
                    endpoint: "/recommend".to_string(),
                    ip: LimitConfig { limit: 50, burst: 75, window_secs: 60 },
                    api_key: LimitConfig { limit: 500, burst: 750, window_secs: 60 },
                },
            ],
            exempt_paths: ["/health", "/metrics", "/docs", "/openapi.json", "/redoc"]
                .into_iter()
                .map(String::from)
                .collect(),
            whitelist: Vec::new(),
            blacklist: Vec::new(),
        }
    }
}

/// Abuse detection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AbuseConfig {
    /// Enable abuse detection.
    pub enabled: bool,

    /// Rolling lookback for both detectors, in seconds.
    pub lookback_secs: u64,

    /// Same query hash seen more than this many times is flagged.
    pub same_query_threshold: usize,

    /// More than this many distinct path segments is flagged.
    pub enumeration_threshold: usize,

    /// Interval between sweeps of idle identifiers, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for AbuseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lookback_secs: 60,
            same_query_threshold: 20,
            enumeration_threshold: 50,
            sweep_interval_secs: 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "json" or "pretty".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
