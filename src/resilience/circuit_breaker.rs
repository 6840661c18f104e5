//! Circuit breaker for store protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: a sampled fraction of calls probe recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: error rate >= threshold over the rolling window,
//!                once the window holds >= min_requests results
//! Open → Half-Open: lazily, on the first read after open_duration
//! Half-Open → Closed: >= 3 of the first 5 resolved probes succeeded
//! Half-Open → Open: fewer than 3 of them succeeded (opened_at reset)
//! ```
//!
//! # Design Decisions
//! - Per-dependency breaker (not global)
//! - One lock guards bookkeeping only; the wrapped call runs outside it
//! - Half-open sampling is deterministic round-robin (every Nth arrival)
//! - A dropped (cancelled) call is recorded as a failure
//! - Concurrent arrivals may both become probes during a transition

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

pub use crate::config::schema::CircuitBreakerConfig;
use crate::observability::metrics;

/// Resolved probes needed before a half-open verdict.
const HALF_OPEN_MIN_PROBES: u32 = 5;
/// Successful probes (out of the first five) needed to close.
const HALF_OPEN_MIN_SUCCESSES: u32 = 3;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a guarded call that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakerError<E> {
    /// The breaker rejected the call without invoking it.
    Open { name: String },
    /// The wrapped call ran and returned this error.
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for BreakerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerError::Open { name } => write!(f, "circuit breaker '{}' is open", name),
            BreakerError::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for BreakerError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BreakerError::Open { .. } => None,
            BreakerError::Inner(e) => Some(e),
        }
    }
}

/// Read-only snapshot for monitoring.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerMetrics {
    pub name: String,
    pub state: CircuitState,
    pub recent_requests: usize,
    pub recent_failures: usize,
    pub error_rate: f64,
    pub opened_at_unix_secs: Option<u64>,
    pub half_open_tests: u64,
    pub half_open_successes: u32,
    pub half_open_failures: u32,
}

#[derive(Debug, Default)]
struct HalfOpenCounters {
    tests: u64,
    successes: u32,
    failures: u32,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    opened_at: Option<Instant>,
    history: VecDeque<(Instant, bool)>,
    half_open: HalfOpenCounters,
}

impl Inner {
    fn failures(&self) -> usize {
        self.history.iter().filter(|(_, ok)| !ok).count()
    }

    fn error_rate(&self) -> f64 {
        if self.history.is_empty() {
            0.0
        } else {
            self.failures() as f64 / self.history.len() as f64
        }
    }
}

/// Rolling-error-rate circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    window: Duration,
    open_duration: Duration,
    probe_every: u64,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let probe_every = if config.half_open_test_fraction > 0.0 {
            ((1.0 / config.half_open_test_fraction).floor() as u64).max(1)
        } else {
            u64::MAX
        };
        let name = name.into();
        metrics::record_breaker_state(&name, CircuitState::Closed);

        Self {
            window: Duration::from_secs(config.window_secs),
            open_duration: Duration::from_secs(config.open_duration_secs),
            probe_every,
            name,
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                opened_at: None,
                history: VecDeque::new(),
                half_open: HalfOpenCounters::default(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state, applying any pending lazy transition.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.refresh(&mut inner, Instant::now());
        inner.state
    }

    /// Run `call` under breaker protection.
    ///
    /// Returns [`BreakerError::Open`] without invoking `call` when the circuit
    /// is open, or half-open and this arrival is not selected as a probe.
    /// Otherwise the call's own result is returned unchanged.
    pub async fn execute<F, Fut, T, E>(&self, call: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = match self.try_admit() {
            Some(permit) => permit,
            None => {
                return Err(BreakerError::Open {
                    name: self.name.clone(),
                })
            }
        };

        let result = call().await;
        permit.complete(result.is_ok());
        result.map_err(BreakerError::Inner)
    }

    /// Snapshot of the rolling statistics.
    pub fn metrics(&self) -> BreakerMetrics {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        self.refresh(&mut inner, now);

        let opened_at_unix_secs = inner.opened_at.and_then(|at| {
            SystemTime::now()
                .checked_sub(now.duration_since(at))
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
        });

        BreakerMetrics {
            name: self.name.clone(),
            state: inner.state,
            recent_requests: inner.history.len(),
            recent_failures: inner.failures(),
            error_rate: inner.error_rate(),
            opened_at_unix_secs,
            half_open_tests: inner.half_open.tests,
            half_open_successes: inner.half_open.successes,
            half_open_failures: inner.half_open.failures,
        }
    }

    fn try_admit(&self) -> Option<Permit<'_>> {
        let mut inner = self.inner.lock();
        self.refresh(&mut inner, Instant::now());

        match inner.state {
            CircuitState::Closed => Some(Permit::new(self)),
            CircuitState::Open => None,
            CircuitState::HalfOpen => {
                inner.half_open.tests += 1;
                if inner.half_open.tests % self.probe_every == 0 {
                    tracing::debug!(breaker = %self.name, test = inner.half_open.tests, "Forwarding half-open probe");
                    Some(Permit::new(self))
                } else {
                    None
                }
            }
        }
    }

    fn record(&self, success: bool) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        if !success {
            metrics::record_breaker_failure(&self.name);
        }

        if inner.state == CircuitState::HalfOpen {
            if success {
                inner.half_open.successes += 1;
            } else {
                inner.half_open.failures += 1;
            }

            let resolved = inner.half_open.successes + inner.half_open.failures;
            if resolved >= HALF_OPEN_MIN_PROBES {
                let (successes, failures) = (inner.half_open.successes, inner.half_open.failures);
                if successes >= HALF_OPEN_MIN_SUCCESSES {
                    self.transition(&mut inner, CircuitState::Closed, now);
                    tracing::info!(breaker = %self.name, successes, failures, "Circuit breaker closed");
                } else {
                    self.transition(&mut inner, CircuitState::Open, now);
                    tracing::warn!(breaker = %self.name, successes, failures, "Circuit breaker reopened");
                }
            }
        } else {
            inner.history.push_back((now, success));
            self.refresh(&mut inner, now);
        }
    }

    /// Prune the rolling window and apply time- or rate-driven transitions.
    fn refresh(&self, inner: &mut Inner, now: Instant) {
        if let Some(cutoff) = now.checked_sub(self.window) {
            while inner.history.front().is_some_and(|(at, _)| *at < cutoff) {
                inner.history.pop_front();
            }
        }

        match inner.state {
            CircuitState::Open => {
                let elapsed = inner.opened_at.map(|at| now.duration_since(at));
                if elapsed.is_some_and(|e| e >= self.open_duration) {
                    self.transition(inner, CircuitState::HalfOpen, now);
                    tracing::info!(breaker = %self.name, "Circuit breaker half-open");
                }
            }
            CircuitState::Closed => {
                let total = inner.history.len();
                if total >= self.config.min_requests {
                    let error_rate = inner.error_rate();
                    if error_rate >= self.config.failure_threshold {
                        let failures = inner.failures();
                        self.transition(inner, CircuitState::Open, now);
                        tracing::warn!(
                            breaker = %self.name,
                            error_rate,
                            failures,
                            total,
                            "Circuit breaker opened"
                        );
                    }
                }
            }
            CircuitState::HalfOpen => {}
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState, now: Instant) {
        inner.state = to;
        match to {
            CircuitState::Open => {
                inner.opened_at = Some(now);
            }
            CircuitState::HalfOpen => {
                inner.half_open = HalfOpenCounters::default();
            }
            CircuitState::Closed => {
                inner.opened_at = None;
                inner.history.clear();
            }
        }
        metrics::record_breaker_transition(&self.name, to);
    }
}

/// Admission ticket for one guarded call.
///
/// Dropping it without `complete` (the call was cancelled) records a failure.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    done: bool,
}

impl<'a> Permit<'a> {
    fn new(breaker: &'a CircuitBreaker) -> Self {
        Self { breaker, done: false }
    }

    fn complete(mut self, success: bool) {
        self.done = true;
        self.breaker.record(success);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.breaker.record(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn config(threshold: f64, min_requests: usize, fraction: f64) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: threshold,
            window_secs: 60,
            open_duration_secs: 30,
            half_open_test_fraction: fraction,
            min_requests,
        }
    }

    async fn call(cb: &CircuitBreaker, ok: bool) -> Result<(), BreakerError<&'static str>> {
        cb.execute(|| async move { if ok { Ok(()) } else { Err("boom") } }).await
    }

    async fn open_breaker(cb: &CircuitBreaker) {
        while cb.state() != CircuitState::Open {
            let _ = call(cb, false).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rolling_error_rate_scenario() {
        let cb = CircuitBreaker::new("scenario", config(0.5, 10, 0.1));

        for _ in 0..10 {
            call(&cb, true).await.unwrap();
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.metrics().error_rate, 0.0);

        for i in 0..10 {
            let _ = call(&cb, i >= 6).await;
        }
        let m = cb.metrics();
        assert_eq!(m.state, CircuitState::Closed);
        assert!((m.error_rate - 0.3).abs() < 1e-9);

        // Opens exactly when (6 + k) / (20 + k) reaches 0.5, at k = 8.
        for k in 1..=10 {
            let result = call(&cb, false).await;
            if k <= 8 {
                assert_eq!(result, Err(BreakerError::Inner("boom")), "call {} should run", k);
            } else {
                assert!(matches!(result, Err(BreakerError::Open { .. })));
            }
            let expected = if k >= 8 { CircuitState::Open } else { CircuitState::Closed };
            assert_eq!(cb.state(), expected, "after failure {}", k);
        }

        // The snapshot still shows the window that tripped the breaker.
        let m = cb.metrics();
        assert_eq!(m.state, CircuitState::Open);
        assert_eq!(m.recent_requests, 28);
        assert_eq!(m.recent_failures, 14);
        assert!(m.error_rate >= 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_requests_gate() {
        let cb = CircuitBreaker::new("gate", config(0.5, 10, 0.1));
        for _ in 0..9 {
            let _ = call(&cb, false).await;
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        let _ = call(&cb, false).await;
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_rejects_without_calling() {
        let cb = CircuitBreaker::new("open", config(0.5, 2, 0.1));
        open_breaker(&cb).await;

        let calls = AtomicUsize::new(0);
        for _ in 0..20 {
            let result = cb
                .execute(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, &str>(())
                })
                .await;
            assert_eq!(result, Err(BreakerError::Open { name: "open".into() }));
        }
        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_half_open_transition_is_idempotent() {
        let cb = CircuitBreaker::new("lazy", config(0.5, 2, 0.1));
        open_breaker(&cb).await;

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(cb.metrics().half_open_tests, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_round_robin_sampling() {
        let cb = CircuitBreaker::new("sampling", config(0.5, 2, 0.1));
        open_breaker(&cb).await;
        tokio::time::advance(Duration::from_secs(30)).await;

        let forwarded = AtomicUsize::new(0);
        for round in 0..3 {
            for _ in 0..10 {
                let _ = cb
                    .execute(|| async {
                        forwarded.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, &str>(())
                    })
                    .await;
            }
            assert_eq!(forwarded.load(Ordering::SeqCst), round + 1);
        }
        assert_eq!(cb.metrics().half_open_tests, 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_closes_on_three_of_five() {
        let cb = CircuitBreaker::new("close", config(0.5, 2, 1.0));
        open_breaker(&cb).await;
        tokio::time::advance(Duration::from_secs(30)).await;

        for ok in [true, false, true, false] {
            let _ = call(&cb, ok).await;
            assert_eq!(cb.state(), CircuitState::HalfOpen);
        }
        call(&cb, true).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.metrics().recent_requests, 0);
        assert!(cb.metrics().opened_at_unix_secs.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_reopens_and_resets_timer() {
        let cb = CircuitBreaker::new("reopen", config(0.5, 2, 1.0));
        open_breaker(&cb).await;
        tokio::time::advance(Duration::from_secs(30)).await;

        for ok in [false, true, false, true, false] {
            let _ = call(&cb, ok).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(cb.state(), CircuitState::Open);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_pruning() {
        let cb = CircuitBreaker::new("window", config(0.5, 4, 0.1));
        for _ in 0..3 {
            let _ = call(&cb, false).await;
        }
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cb.metrics().recent_requests, 0);

        let _ = call(&cb, false).await;
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_call_counts_as_failure() {
        let cb = CircuitBreaker::new("cancel", config(0.5, 10, 0.1));
        let pending = cb.execute(|| std::future::pending::<Result<(), &str>>());
        let timed_out = tokio::time::timeout(Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());

        let m = cb.metrics();
        assert_eq!(m.recent_requests, 1);
        assert_eq!(m.recent_failures, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_failures_open_once_and_lose_no_records() {
        let cb = Arc::new(CircuitBreaker::new("parallel", config(0.5, 10, 0.1)));
        let forwarded = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..200)
            .map(|_| {
                let (cb, forwarded) = (cb.clone(), forwarded.clone());
                tokio::spawn(async move {
                    cb.execute(|| async {
                        forwarded.fetch_add(1, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        Err::<(), _>("boom")
                    })
                    .await
                })
            })
            .collect();

        let mut rejected = 0;
        for task in tasks {
            match task.await.unwrap() {
                Err(BreakerError::Inner("boom")) => {}
                Err(BreakerError::Open { .. }) => rejected += 1,
                other => panic!("unexpected result {:?}", other),
            }
        }

        let forwarded = forwarded.load(Ordering::SeqCst);
        assert!(forwarded >= 10);
        assert_eq!(forwarded + rejected, 200);

        let m = cb.metrics();
        assert_eq!(m.state, CircuitState::Open);
        assert_eq!(m.recent_requests, forwarded);
        assert_eq!(m.recent_failures, forwarded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_concurrent_arrivals() {
        let cb = Arc::new(CircuitBreaker::new("arrivals", config(0.5, 2, 0.1)));
        open_breaker(&cb).await;
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let forwarded = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<_> = (0..100)
            .map(|_| {
                let (cb, gate, forwarded) = (cb.clone(), gate.clone(), forwarded.clone());
                tokio::spawn(async move {
                    cb.execute(|| async {
                        forwarded.fetch_add(1, Ordering::SeqCst);
                        let _permit = gate.acquire().await.map_err(|_| "gate closed")?;
                        Ok::<(), &'static str>(())
                    })
                    .await
                })
            })
            .collect();

        while cb.metrics().half_open_tests < 100 {
            tokio::task::yield_now().await;
        }
        // All probes are still in flight.
        assert_eq!(forwarded.load(Ordering::SeqCst), 10);
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        gate.add_permits(100);
        let mut passed = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                passed += 1;
            }
        }
        assert_eq!(passed, 10);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.metrics().recent_requests, 5);
    }

    #[test]
    fn test_error_display() {
        let err: BreakerError<std::io::Error> = BreakerError::Open { name: "cache".into() };
        assert_eq!(err.to_string(), "circuit breaker 'cache' is open");
        assert_eq!(CircuitState::HalfOpen.to_string(), "half_open");
    }
}
