//! Cache-aside client over the external store.
//!
//! # Responsibilities
//! - Read, write, pattern-delete and probe cached values
//! - Route every store call through the circuit breaker and a deadline
//! - Degrade to "absent" / `false` / `0` on any failure
//!
//! # Design Decisions
//! - No operation ever returns an error to the caller
//! - A missing store is handled like a failing one (logged, counted)
//! - Pattern deletion is not atomic; keys written mid-scan may survive

use futures_util::TryStreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::codec;
use super::keys::family_of;
use crate::observability::logging::redact;
use crate::observability::metrics;
use crate::resilience::circuit_breaker::{
    BreakerError, BreakerMetrics, CircuitBreaker, CircuitBreakerConfig, CircuitState,
};
use crate::resilience::timeouts::with_deadline;
use crate::store::{ExternalStore, StoreError, StoreResult};

/// Why a cache operation fell back.
#[derive(Debug)]
enum Degraded {
    CircuitOpen,
    Store(StoreError),
}

impl Degraded {
    fn reason(&self) -> &'static str {
        match self {
            Degraded::CircuitOpen => "circuit_open",
            Degraded::Store(e) => e.kind(),
        }
    }
}

impl From<BreakerError<StoreError>> for Degraded {
    fn from(err: BreakerError<StoreError>) -> Self {
        match err {
            BreakerError::Open { .. } => Degraded::CircuitOpen,
            BreakerError::Inner(e) => Degraded::Store(e),
        }
    }
}

/// Breaker-protected cache client.
#[derive(Debug)]
pub struct CacheClient {
    store: Option<Arc<dyn ExternalStore>>,
    breaker: CircuitBreaker,
    op_timeout: Duration,
}

impl CacheClient {
    pub const BREAKER_NAME: &'static str = "cache_store";

    pub fn new(
        store: Arc<dyn ExternalStore>,
        breaker_config: CircuitBreakerConfig,
        op_timeout: Duration,
    ) -> Self {
        Self {
            store: Some(store),
            breaker: CircuitBreaker::new(Self::BREAKER_NAME, breaker_config),
            op_timeout,
        }
    }

    /// A client with no store; every operation falls back.
    pub fn unconfigured(breaker_config: CircuitBreakerConfig, op_timeout: Duration) -> Self {
        Self {
            store: None,
            breaker: CircuitBreaker::new(Self::BREAKER_NAME, breaker_config),
            op_timeout,
        }
    }

    /// Ping the store and build a client, or an unconfigured one if the ping fails.
    pub async fn connect(
        store: Arc<dyn ExternalStore>,
        breaker_config: CircuitBreakerConfig,
        op_timeout: Duration,
    ) -> Self {
        match with_deadline(op_timeout, store.ping()).await {
            Ok(()) => {
                tracing::info!("Cache store connected");
                Self::new(store, breaker_config, op_timeout)
            }
            Err(e) => {
                tracing::error!(error = %e, "Cache store unreachable, caching disabled");
                Self::unconfigured(breaker_config, op_timeout)
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.store.is_some()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn breaker_metrics(&self) -> BreakerMetrics {
        self.breaker.metrics()
    }

    /// Fetch and decode a value. Non-JSON payloads come back as strings.
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.fetch(key).await.map(codec::decode)
    }

    /// Fetch and decode a value into `T`. Undecodable payloads count as absent.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.fetch(key).await?;
        match codec::decode_as(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                metrics::record_cache_error(family_of(key), "decode");
                tracing::warn!(key = %redact(key), error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    /// Store a value with a TTL. Returns whether the write was accepted.
    pub async fn set<V: Serialize + ?Sized>(&self, key: &str, value: &V, ttl: Duration) -> bool {
        let payload = match codec::encode(value) {
            Ok(payload) => payload,
            Err(e) => {
                metrics::record_cache_error(family_of(key), "encode");
                tracing::warn!(key = %redact(key), error = %e, "Failed to encode cache value");
                return false;
            }
        };

        let start = Instant::now();
        let result = self
            .guarded(|store| store.set_with_ttl(key, ttl, &payload))
            .await;
        metrics::record_cache_latency(family_of(key), "set", start);

        match result {
            Ok(()) => true,
            Err(degraded) => {
                self.degrade("set", key, &degraded);
                false
            }
        }
    }

    /// Delete every key matching a glob pattern. Returns the number removed.
    pub async fn delete(&self, pattern: &str) -> u64 {
        let store = match self.store.as_deref() {
            Some(store) => store,
            None => {
                self.degrade("delete", pattern, &Degraded::Store(StoreError::NotConfigured));
                return 0;
            }
        };
        if self.breaker.state() == CircuitState::Open {
            self.degrade("delete", pattern, &Degraded::CircuitOpen);
            return 0;
        }

        let start = Instant::now();
        let keys: Vec<String> =
            match with_deadline(self.op_timeout, store.scan_match(pattern).try_collect()).await {
                Ok(keys) => keys,
                Err(e) => {
                    self.degrade("delete", pattern, &Degraded::Store(e));
                    return 0;
                }
            };

        let mut deleted = 0;
        for key in &keys {
            match self.guarded(|store| store.delete(key)).await {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(degraded) => {
                    self.degrade("delete", pattern, &degraded);
                    break;
                }
            }
        }
        metrics::record_cache_latency(family_of(pattern), "delete", start);

        if deleted > 0 {
            tracing::debug!(pattern = %pattern, deleted, "Invalidated cache keys");
        }
        deleted
    }

    /// Whether a key is present.
    pub async fn exists(&self, key: &str) -> bool {
        match self.guarded(|store| store.exists(key)).await {
            Ok(present) => present,
            Err(degraded) => {
                self.degrade("exists", key, &degraded);
                false
            }
        }
    }

    async fn fetch(&self, key: &str) -> Option<String> {
        let start = Instant::now();
        let result = self.guarded(|store| store.get(key)).await;
        metrics::record_cache_latency(family_of(key), "get", start);

        match result {
            Ok(raw) => raw,
            Err(degraded) => {
                self.degrade("get", key, &degraded);
                None
            }
        }
    }

    async fn guarded<'s, T, F, Fut>(&'s self, call: F) -> Result<T, Degraded>
    where
        F: FnOnce(&'s dyn ExternalStore) -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let store = self
            .store
            .as_deref()
            .ok_or(Degraded::Store(StoreError::NotConfigured))?;
        let op_timeout = self.op_timeout;
        self.breaker
            .execute(|| with_deadline(op_timeout, call(store)))
            .await
            .map_err(Degraded::from)
    }

    fn degrade(&self, operation: &'static str, key: &str, degraded: &Degraded) {
        metrics::record_cache_error(family_of(key), degraded.reason());
        match degraded {
            Degraded::Store(StoreError::NotConfigured) | Degraded::CircuitOpen => {
                tracing::debug!(operation, key = %redact(key), reason = degraded.reason(), "Cache bypassed");
            }
            Degraded::Store(e) => {
                tracing::warn!(operation, key = %redact(key), error = %e, "Cache operation failed");
            }
        }
    }
}
