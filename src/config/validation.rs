//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (fractions, windows, limits)
//! - Detect duplicate endpoint policies
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{GuardConfig, LimitConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: must be in (0, 1], got {value}")]
    InvalidFraction { field: &'static str, value: f64 },

    #[error("{field}: must be greater than zero")]
    Zero { field: String },

    #[error("rate_limit.policies: endpoint '{0}' must start with '/'")]
    InvalidEndpoint(String),

    #[error("rate_limit.policies: duplicate endpoint '{0}'")]
    DuplicateEndpoint(String),

    #[error("rate_limit.policies[{endpoint}].{subject}: burst {burst} is below limit {limit}")]
    BurstBelowLimit {
        endpoint: String,
        subject: &'static str,
        limit: u32,
        burst: u32,
    },
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }
    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.request_secs".into() });
    }
    if config.store.op_timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "store.op_timeout_ms".into() });
    }

    let cb = &config.circuit_breaker;
    check_fraction(&mut errors, "circuit_breaker.failure_threshold", cb.failure_threshold);
    check_fraction(
        &mut errors,
        "circuit_breaker.half_open_test_fraction",
        cb.half_open_test_fraction,
    );
    if cb.window_secs == 0 {
        errors.push(ValidationError::Zero { field: "circuit_breaker.window_secs".into() });
    }
    if cb.min_requests == 0 {
        errors.push(ValidationError::Zero { field: "circuit_breaker.min_requests".into() });
    }

    let mut seen = HashSet::new();
    for policy in &config.rate_limit.policies {
        if !policy.endpoint.starts_with('/') {
            errors.push(ValidationError::InvalidEndpoint(policy.endpoint.clone()));
        }
        if !seen.insert(policy.endpoint.as_str()) {
            errors.push(ValidationError::DuplicateEndpoint(policy.endpoint.clone()));
        }
        check_limit(&mut errors, &policy.endpoint, "ip", &policy.ip);
        check_limit(&mut errors, &policy.endpoint, "api_key", &policy.api_key);
    }

    if config.abuse.enabled {
        if config.abuse.lookback_secs == 0 {
            errors.push(ValidationError::Zero { field: "abuse.lookback_secs".into() });
        }
        if config.abuse.sweep_interval_secs == 0 {
            errors.push(ValidationError::Zero { field: "abuse.sweep_interval_secs".into() });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_fraction(errors: &mut Vec<ValidationError>, field: &'static str, value: f64) {
    if !(value > 0.0 && value <= 1.0) {
        errors.push(ValidationError::InvalidFraction { field, value });
    }
}

fn check_limit(
    errors: &mut Vec<ValidationError>,
    endpoint: &str,
    subject: &'static str,
    limit: &LimitConfig,
) {
    if limit.limit == 0 {
        errors.push(ValidationError::Zero {
            field: format!("rate_limit.policies[{}].{}.limit", endpoint, subject),
        });
    }
    if limit.window_secs == 0 {
        errors.push(ValidationError::Zero {
            field: format!("rate_limit.policies[{}].{}.window_secs", endpoint, subject),
        });
    }
    if limit.burst < limit.limit {
        errors.push(ValidationError::BurstBelowLimit {
            endpoint: endpoint.to_string(),
            subject,
            limit: limit.limit,
            burst: limit.burst,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::EndpointPolicy;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GuardConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GuardConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.circuit_breaker.failure_threshold = 1.5;
        config.circuit_breaker.half_open_test_fraction = 0.0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidAddress { .. })));
    }

    #[test]
    fn test_duplicate_and_malformed_endpoints() {
        let mut config = GuardConfig::default();
        let dup = config.rate_limit.policies[0].clone();
        config.rate_limit.policies.push(dup);
        config.rate_limit.policies.push(EndpointPolicy {
            endpoint: "items".into(),
            ..config.rate_limit.policies[0].clone()
        });

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicateEndpoint("/search".into())));
        assert!(errors.contains(&ValidationError::InvalidEndpoint("items".into())));
    }

    #[test]
    fn test_burst_below_limit() {
        let mut config = GuardConfig::default();
        config.rate_limit.policies[1].ip.burst = 10;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::BurstBelowLimit {
                endpoint: "/recommend".into(),
                subject: "ip",
                limit: 50,
                burst: 10,
            }]
        );
    }
}
