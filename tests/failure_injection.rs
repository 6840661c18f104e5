//! Failure injection tests: the guard layers must degrade, never fail.

use axum::http::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use serving_guard::cache::{CacheClient, FeatureCache};
use serving_guard::config::{CircuitBreakerConfig, GuardConfig};
use serving_guard::lifecycle::Services;
use serving_guard::security::{Admission, SubjectKind};
use serving_guard::store::ExternalStore;
use serving_guard::CircuitState;

mod common;
use common::{FlakyStore, Mode};

fn breaker_config(half_open_test_fraction: f64) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold: 0.5,
        window_secs: 60,
        open_duration_secs: 30,
        half_open_test_fraction,
        min_requests: 10,
    }
}

#[tokio::test]
async fn test_cache_operations_never_raise() {
    let store = FlakyStore::new(Mode::Failing);
    let cache = CacheClient::new(store.clone(), breaker_config(0.1), Duration::from_secs(1));

    assert_eq!(cache.get("search:abc:u1:10").await, None);
    assert!(!cache.set("search:abc:u1:10", &json!([1, 2]), Duration::from_secs(60)).await);
    assert_eq!(cache.delete("search:*").await, 0);
    assert!(!cache.exists("search:abc:u1:10").await);
}

#[tokio::test]
async fn test_breaker_opens_and_stops_calling_store() {
    let store = FlakyStore::new(Mode::Failing);
    let cache = CacheClient::new(store.clone(), breaker_config(0.1), Duration::from_secs(1));

    for _ in 0..10 {
        assert_eq!(cache.get("feature:p1:price").await, None);
    }
    assert_eq!(cache.breaker().state(), CircuitState::Open);
    assert_eq!(store.calls(), 10);

    for _ in 0..20 {
        assert_eq!(cache.get("feature:p1:price").await, None);
        assert!(!cache.set("feature:p1:price", &1, Duration::from_secs(60)).await);
    }
    assert_eq!(cache.delete("feature:*").await, 0);
    assert_eq!(store.calls(), 10, "open breaker must not reach the store");

    let metrics = cache.breaker_metrics();
    assert_eq!(metrics.state, CircuitState::Open);
    assert!(metrics.opened_at_unix_secs.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_breaker_recovers_after_store_heals() {
    let store = FlakyStore::new(Mode::Failing);
    let cache = CacheClient::new(store.clone(), breaker_config(1.0), Duration::from_secs(1));

    for _ in 0..10 {
        cache.get("ranking:config:global").await;
    }
    assert_eq!(cache.breaker().state(), CircuitState::Open);

    store.set_mode(Mode::Healthy);
    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(cache.breaker().state(), CircuitState::HalfOpen);

    for _ in 0..5 {
        assert!(cache.set("ranking:config:global", &json!({"v": 3}), Duration::from_secs(60)).await);
    }
    assert_eq!(cache.breaker().state(), CircuitState::Closed);
    assert_eq!(cache.get("ranking:config:global").await, Some(json!({"v": 3})));
}

#[tokio::test]
async fn test_hanging_store_hits_deadline() {
    let store = FlakyStore::new(Mode::Hanging);
    let cache = CacheClient::new(store.clone(), breaker_config(0.1), Duration::from_millis(50));

    let result = tokio::time::timeout(Duration::from_secs(2), cache.get("popular:global:10")).await;
    assert_eq!(result.expect("cache get must not hang"), None);

    let result = tokio::time::timeout(Duration::from_secs(2), cache.delete("popular:*")).await;
    assert_eq!(result.expect("pattern delete must not hang"), 0);
    assert_eq!(cache.breaker_metrics().recent_failures, 1);
}

#[tokio::test]
async fn test_malformed_payload_is_tolerated() {
    let store = FlakyStore::new(Mode::Healthy);
    store
        .inner
        .set_with_ttl("feature:p9:price", Duration::from_secs(60), "{not json")
        .await
        .unwrap();
    let cache = Arc::new(CacheClient::new(store.clone(), breaker_config(0.1), Duration::from_secs(1)));

    assert_eq!(cache.get("feature:p9:price").await, Some(Value::String("{not json".into())));
    assert_eq!(cache.get_as::<f64>("feature:p9:price").await, None);

    let features = FeatureCache::new(cache);
    assert_eq!(
        features.product_feature("p9", "price").await,
        Some(Value::String("{not json".into()))
    );
}

#[tokio::test]
async fn test_limiter_fails_open_on_store_errors() {
    let store = FlakyStore::new(Mode::Healthy);
    let services = Services::init(&GuardConfig::default(), store.clone()).await;
    store.set_mode(Mode::Failing);

    for _ in 0..150 {
        match services.limiter.allow("1.2.3.4", SubjectKind::Ip, "/search").await {
            Admission::Allowed(status) => {
                assert_eq!(status.remaining, 100);
                assert_eq!(status.retry_after, 60);
            }
            other => panic!("expected fail-open admission, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_unreachable_store_at_startup() {
    let store = FlakyStore::new(Mode::Failing);
    let services = Services::init(&GuardConfig::default(), store.clone()).await;
    assert_eq!(store.calls(), 1);
    assert!(!services.cache.is_configured());

    store.set_mode(Mode::Healthy);
    assert!(!services.query_cache().set_search_results("q", None, 10, &vec![1]).await);
    assert!(services.limiter.allow("1.2.3.4", SubjectKind::Ip, "/search").await.is_allowed());
    assert_eq!(store.calls(), 1, "an unconfigured guard never touches the store");
}

#[tokio::test]
async fn test_http_path_survives_store_outage() {
    let store = FlakyStore::new(Mode::Healthy);
    let server = common::spawn_guard(GuardConfig::default(), store.clone() as Arc<dyn ExternalStore>).await;
    store.set_mode(Mode::Failing);
    let client = common::client();

    for _ in 0..3 {
        let res = client
            .get(server.url("/search?q=shoes"))
            .header("x-forwarded-for", "1.2.3.4")
            .send()
            .await
            .expect("guard unreachable");
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get("x-ratelimit-remaining").and_then(|v| v.to_str().ok()),
            Some("100")
        );
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["cached"], false);
    }
}
