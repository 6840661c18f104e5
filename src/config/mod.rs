//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!     → sections handed to the breaker, cache client, limiter and server
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AbuseConfig, AdminConfig, CircuitBreakerConfig, EndpointPolicy, GuardConfig, LimitConfig,
    ListenerConfig, ObservabilityConfig, RateLimitConfig, StoreConfig, TimeoutConfig,
};
