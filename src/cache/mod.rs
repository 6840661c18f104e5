//! Cache-aside subsystem.
//!
//! # Data Flow
//! ```text
//! Handler:
//!     → features.rs / query.rs / ranking.rs (typed families, key + TTL)
//!     → client.rs (codec, breaker, deadline, fallback)
//!     → ExternalStore
//! Miss or failure:
//!     → handler computes the value from the primary source
//!     → best-effort write back through the same family
//! ```
//!
//! # Design Decisions
//! - Caching is an optimization; the request path never fails because of it
//! - Key formats live in one place (keys.rs)
//! - Hit/miss accounting is per family and layer

pub mod client;
pub mod codec;
pub mod features;
pub mod keys;
pub mod query;
pub mod ranking;

pub use client::CacheClient;
pub use features::FeatureCache;
pub use query::QueryCache;
pub use ranking::{RankingCache, RankingWeights};

use crate::observability::metrics;

fn record_lookup<T>(cache_type: &str, cache_layer: &str, value: &Option<T>) {
    if value.is_some() {
        metrics::record_cache_hit(cache_type, cache_layer);
    } else {
        metrics::record_cache_miss(cache_type, cache_layer);
    }
}
