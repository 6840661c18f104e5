//! Sliding-window rate limiting with access lists and abuse detection.
//!
//! # Admission order
//! ```text
//! blacklisted (ip or key) → 403
//! whitelisted (ip or key) → pass
//! endpoint without policy → pass
//! sliding window on "ratelimit:{endpoint}:{identifier}":
//!     add now → prune older than now - window → count → expire
//!     count <= limit → pass (+ X-RateLimit-* headers)
//!     count >  limit → 429 (+ Retry-After)
//! store failure → pass (fail open)
//! ```
//!
//! # Design Decisions
//! - Rejected requests still occupy the window, like any other arrival
//! - `burst` is carried for reporting and never enforced
//! - Abuse detection runs only for admitted requests and never changes the response

use axum::{
    body::Body,
    extract::{ConnectInfo, Query, State},
    http::{HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::config::{AbuseConfig, EndpointPolicy, LimitConfig, RateLimitConfig};
use crate::observability::logging::redact;
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;
use crate::security::abuse::AbuseTracker;
use crate::security::access_lists::AccessLists;
use crate::security::identity::{ClientIdentity, SubjectKind};
use crate::store::{ExternalStore, StoreError, StoreResult};

pub const SEARCH_ENDPOINT: &str = "/search";
pub const RECOMMEND_ENDPOINT: &str = "/recommend";

/// Window position reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowStatus {
    pub limit: u32,
    pub remaining: u32,
    /// Unix seconds at which the window fully resets.
    pub reset_at: u64,
    pub retry_after: u64,
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Blacklisted,
    /// Whitelisted; no counting was done.
    Bypassed,
    /// The endpoint has no policy.
    Unlimited,
    Allowed(WindowStatus),
    Limited(WindowStatus),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Admission::Blacklisted | Admission::Limited(_))
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    enabled: bool,
    store: Option<Arc<dyn ExternalStore>>,
    op_timeout: Duration,
    policies: Vec<EndpointPolicy>,
    exempt_paths: HashSet<String>,
    lists: AccessLists,
    abuse: Arc<AbuseTracker>,
}

impl RateLimiter {
    pub fn new(
        config: &RateLimitConfig,
        abuse: AbuseConfig,
        store: Option<Arc<dyn ExternalStore>>,
        op_timeout: Duration,
    ) -> Self {
        if store.is_none() {
            tracing::warn!("Rate limiter has no store, all requests will be admitted");
        }
        Self {
            enabled: config.enabled,
            store,
            op_timeout,
            policies: config.policies.clone(),
            exempt_paths: config.exempt_paths.iter().cloned().collect(),
            lists: AccessLists::new(config.whitelist.clone(), config.blacklist.clone()),
            abuse: Arc::new(AbuseTracker::new(abuse)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.contains(path)
    }

    pub fn access_lists(&self) -> &AccessLists {
        &self.lists
    }

    pub fn abuse_tracker(&self) -> Arc<AbuseTracker> {
        self.abuse.clone()
    }

    pub fn policies(&self) -> &[EndpointPolicy] {
        &self.policies
    }

    /// Map a request path onto the policy endpoint it falls under.
    pub fn normalize_endpoint(&self, path: &str) -> Option<&str> {
        self.policies
            .iter()
            .find(|p| path.starts_with(p.endpoint.as_str()))
            .map(|p| p.endpoint.as_str())
    }

    /// Admission check for a single identifier.
    pub async fn allow(&self, identifier: &str, subject: SubjectKind, endpoint: &str) -> Admission {
        self.admit(&[identifier], identifier, subject, endpoint, unix_now()).await
    }

    /// Admission check for a resolved client; either of its identifiers may be listed.
    pub async fn check(&self, identity: &ClientIdentity, endpoint: &str) -> Admission {
        let candidates: Vec<&str> = identity.candidates().collect();
        self.admit(&candidates, identity.identifier(), identity.subject(), endpoint, unix_now())
            .await
    }

    /// Feed an admitted request to the abuse detectors.
    pub fn observe(&self, identity: &ClientIdentity, endpoint: &str, path: &str, query: Option<&str>) {
        if !self.abuse.is_enabled() {
            return;
        }
        match endpoint {
            SEARCH_ENDPOINT => {
                if let Some(q) = query.filter(|q| !q.is_empty()) {
                    self.abuse.observe_query(&identity.ip, q);
                }
            }
            RECOMMEND_ENDPOINT => {
                let segments: Vec<&str> = path.split('/').collect();
                if let [_, _, .., last] = segments.as_slice() {
                    self.abuse.observe_path(&identity.ip, last);
                }
            }
            _ => {}
        }
    }

    async fn admit(
        &self,
        candidates: &[&str],
        identifier: &str,
        subject: SubjectKind,
        endpoint: &str,
        now: f64,
    ) -> Admission {
        if candidates.iter().any(|id| self.lists.is_blacklisted(id)) {
            metrics::record_blacklist_rejection(endpoint);
            tracing::warn!(identifier = %redact(identifier), endpoint, "Blacklisted client rejected");
            return Admission::Blacklisted;
        }
        if candidates.iter().any(|id| self.lists.is_whitelisted(id)) {
            return Admission::Bypassed;
        }
        let Some(policy) = self.policies.iter().find(|p| p.endpoint == endpoint) else {
            return Admission::Unlimited;
        };
        let limits = match subject {
            SubjectKind::Ip => policy.ip,
            SubjectKind::ApiKey => policy.api_key,
        };

        let window = Duration::from_secs(limits.window_secs);
        let status = |count: u64| WindowStatus {
            limit: limits.limit,
            remaining: limits.limit.saturating_sub(count.min(u32::MAX as u64) as u32),
            reset_at: (now + window.as_secs_f64()) as u64,
            retry_after: window.as_secs(),
        };

        let key = format!("ratelimit:{}:{}", endpoint, identifier);
        match self.count_window(&key, now, window).await {
            Ok(count) if count <= limits.limit as u64 => Admission::Allowed(status(count)),
            Ok(count) => {
                metrics::record_rate_limited(endpoint, subject.as_str());
                tracing::warn!(
                    identifier = %redact(identifier),
                    limit_type = subject.as_str(),
                    endpoint,
                    count,
                    "Rate limit exceeded"
                );
                Admission::Limited(status(count))
            }
            Err(e) => {
                self.fail_open(identifier, &e);
                Admission::Allowed(fail_open_status(limits, now, window))
            }
        }
    }

    async fn count_window(&self, key: &str, now: f64, window: Duration) -> StoreResult<u64> {
        let store = self.store.as_deref().ok_or(StoreError::NotConfigured)?;
        let member = format!("{:.6}-{}", now, Uuid::new_v4().simple());

        with_deadline(self.op_timeout, store.sorted_add(key, &member, now)).await?;
        with_deadline(
            self.op_timeout,
            store.prune_by_score(key, 0.0, now - window.as_secs_f64()),
        )
        .await?;
        let count = with_deadline(self.op_timeout, store.count(key)).await?;
        with_deadline(self.op_timeout, store.expire(key, window)).await?;
        Ok(count)
    }

    fn fail_open(&self, identifier: &str, error: &StoreError) {
        if *error == StoreError::NotConfigured {
            tracing::debug!(identifier = %redact(identifier), "Rate limit skipped, no store");
        } else {
            tracing::warn!(
                identifier = %redact(identifier),
                error = %error,
                kind = error.kind(),
                "Rate limit check failed, admitting request"
            );
        }
    }
}

fn fail_open_status(limits: LimitConfig, now: f64, window: Duration) -> WindowStatus {
    WindowStatus {
        limit: limits.limit,
        remaining: limits.limit,
        reset_at: (now + window.as_secs_f64()) as u64,
        retry_after: window.as_secs(),
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

fn apply_window_headers(headers: &mut HeaderMap, status: &WindowStatus) {
    headers.insert("x-ratelimit-limit", HeaderValue::from(status.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(status.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(status.reset_at));
}

fn limited_response(status: &WindowStatus) -> Response {
    let body = json!({
        "detail": "Rate limit exceeded",
        "retry_after": status.retry_after,
    });
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    let headers = response.headers_mut();
    headers.insert("retry-after", HeaderValue::from(status.retry_after));
    apply_window_headers(headers, status);
    response
}

fn forbidden_response() -> Response {
    (StatusCode::FORBIDDEN, Json(json!({"detail": "Access denied"}))).into_response()
}

/// Middleware applying [`RateLimiter`] to every request.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !limiter.is_enabled() || limiter.is_exempt(&path) {
        return next.run(request).await;
    }
    let Some(endpoint) = limiter.normalize_endpoint(&path).map(str::to_string) else {
        return next.run(request).await;
    };

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let identity = ClientIdentity::from_headers(request.headers(), peer);

    match limiter.check(&identity, &endpoint).await {
        Admission::Blacklisted => forbidden_response(),
        Admission::Limited(status) => limited_response(&status),
        Admission::Bypassed | Admission::Unlimited => next.run(request).await,
        Admission::Allowed(status) => {
            let query = Query::<HashMap<String, String>>::try_from_uri(request.uri())
                .ok()
                .and_then(|Query(mut params)| params.remove("q"));
            limiter.observe(&identity, &endpoint, &path, query.as_deref());

            let mut response = next.run(request).await;
            apply_window_headers(response.headers_mut(), &status);
            response
        }
    }
}
