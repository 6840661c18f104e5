//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::GuardConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GuardConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GuardConfig, ConfigError> {
    let config: GuardConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.rate_limit.policies.len(), 2);
    }

    #[test]
    fn test_partial_override() {
        let config = parse_config(
            r#"
            [circuit_breaker]
            failure_threshold = 0.25

            [rate_limit]
            whitelist = ["10.0.0.1"]

            [[rate_limit.policies]]
            endpoint = "/search"
            ip = { limit = 5, burst = 5 }
            api_key = { limit = 10, burst = 20, window_secs = 30 }
            "#,
        )
        .unwrap();

        assert_eq!(config.circuit_breaker.failure_threshold, 0.25);
        assert_eq!(config.circuit_breaker.window_secs, 60);
        assert_eq!(config.rate_limit.whitelist, vec!["10.0.0.1".to_string()]);
        assert_eq!(config.rate_limit.policies.len(), 1);
        assert_eq!(config.rate_limit.policies[0].ip.window_secs, 60);
        assert_eq!(config.rate_limit.policies[0].api_key.window_secs, 30);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = parse_config("[circuit_breaker]\nhalf_open_test_fraction = 2.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref e) if e.len() == 1));
        assert!(err.to_string().contains("half_open_test_fraction"));
    }

    #[test]
    fn test_syntax_error() {
        let err = parse_config("[listener\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
