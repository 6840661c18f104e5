//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the cache client and rate limiter over one shared store
//! - Fall back to store-less operation when the store is unreachable
//!
//! # Design Decisions
//! - Subsystems initialize in order, not concurrently
//! - The limiter only gets the store if the cache client's ping succeeded

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheClient, FeatureCache, QueryCache, RankingCache};
use crate::config::GuardConfig;
use crate::security::RateLimiter;
use crate::store::ExternalStore;

/// The protective layers handed to the request path.
#[derive(Debug, Clone)]
pub struct Services {
    pub cache: Arc<CacheClient>,
    pub limiter: Arc<RateLimiter>,
}

impl Services {
    /// Connect to `store` and build every layer over it.
    pub async fn init(config: &GuardConfig, store: Arc<dyn ExternalStore>) -> Self {
        let op_timeout = Duration::from_millis(config.store.op_timeout_ms);
        let cache = CacheClient::connect(store.clone(), config.circuit_breaker.clone(), op_timeout).await;
        let limiter_store = cache.is_configured().then_some(store);

        Self::assemble(config, cache, limiter_store)
    }

    /// Build every layer with no store; caching is off and limiting fails open.
    pub fn without_store(config: &GuardConfig) -> Self {
        let op_timeout = Duration::from_millis(config.store.op_timeout_ms);
        let cache = CacheClient::unconfigured(config.circuit_breaker.clone(), op_timeout);
        Self::assemble(config, cache, None)
    }

    fn assemble(
        config: &GuardConfig,
        cache: CacheClient,
        limiter_store: Option<Arc<dyn ExternalStore>>,
    ) -> Self {
        let op_timeout = Duration::from_millis(config.store.op_timeout_ms);
        let limiter = RateLimiter::new(&config.rate_limit, config.abuse.clone(), limiter_store, op_timeout);
        tracing::info!(
            cache = cache.is_configured(),
            rate_limit = limiter.is_enabled(),
            policies = limiter.policies().len(),
            "Services initialized"
        );

        Self {
            cache: Arc::new(cache),
            limiter: Arc::new(limiter),
        }
    }

    pub fn feature_cache(&self) -> FeatureCache {
        FeatureCache::new(self.cache.clone())
    }

    pub fn query_cache(&self) -> QueryCache {
        QueryCache::new(self.cache.clone())
    }

    pub fn ranking_cache(&self) -> RankingCache {
        RankingCache::new(self.cache.clone())
    }
}
