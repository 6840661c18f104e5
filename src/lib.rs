//! Serving-time resilience layer.
//!
//! Protects a low-latency serving path from its own dependencies and from
//! abusive clients:
//!
//! ```text
//!     Client Request
//!         │
//!         ▼
//!   ┌─────────────┐   blacklist → 403, over limit → 429, store down → pass
//!   │ RateLimiter │───────────────────────────────────────────────┐
//!   └──────┬──────┘                                               │
//!          ▼                                                      │
//!   ┌─────────────┐   ┌────────────────┐   ┌───────────────┐      │
//!   │ Cache-aside │──▶│ CircuitBreaker │──▶│ ExternalStore │◀─────┘
//!   │   lookup    │   │   + deadline   │   │  (shared KV)  │
//!   └──────┬──────┘   └────────────────┘   └───────────────┘
//!          ▼ miss or failure
//!   compute from primary source, best-effort write back
//! ```

pub mod admin;
pub mod cache;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod store;

pub use cache::CacheClient;
pub use config::schema::GuardConfig;
pub use http::HttpServer;
pub use lifecycle::{Services, Shutdown};
pub use resilience::circuit_breaker::{BreakerError, CircuitBreaker, CircuitState};
pub use security::RateLimiter;
pub use store::{ExternalStore, MemoryStore, StoreError};
