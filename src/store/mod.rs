//! External key-value store subsystem.
//!
//! # Data Flow
//! ```text
//! CacheClient ──(breaker + deadline)──┐
//!                                     ├─→ Arc<dyn ExternalStore>
//! RateLimiter ──(deadline)────────────┘        │
//!                                              ├─ memory.rs (in-process, DashMap)
//!                                              └─ any networked implementation
//! ```
//!
//! # Design Decisions
//! - One narrow trait; callers never see implementation types
//! - Expiry is owned by the store, never tracked by callers
//! - Deadlines are applied by callers (see `resilience::timeouts`), so a
//!   hung implementation can never block the request path
//! - Single-key operations are atomic; multi-step sequences are not

pub mod memory;
pub mod types;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::time::Duration;

pub use memory::MemoryStore;
pub use types::{StoreError, StoreResult};

/// Operations the serving core needs from its key-value store.
#[async_trait]
pub trait ExternalStore: Send + Sync + std::fmt::Debug {
    /// Fetch a string value.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store a string value that expires after `ttl`.
    async fn set_with_ttl(&self, key: &str, ttl: Duration, value: &str) -> StoreResult<()>;

    /// Remove a key. Returns whether it existed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Enumerate keys matching a glob pattern (`*` and `?`).
    fn scan_match<'a>(&'a self, pattern: &'a str) -> BoxStream<'a, StoreResult<String>>;

    /// Check whether a key is present.
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Add `member` with `score` to the sorted set at `key`.
    async fn sorted_add(&self, key: &str, member: &str, score: f64) -> StoreResult<()>;

    /// Remove members whose score lies in `[min, max]`. Returns the number removed.
    async fn prune_by_score(&self, key: &str, min: f64, max: f64) -> StoreResult<u64>;

    /// Cardinality of the sorted set at `key`.
    async fn count(&self, key: &str) -> StoreResult<u64>;

    /// Set a time-to-live on an existing key. Returns whether the key existed.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// Connectivity check.
    async fn ping(&self) -> StoreResult<()>;
}
