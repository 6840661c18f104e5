//! Shared utilities for integration tests.

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use serving_guard::config::GuardConfig;
use serving_guard::http::{echo_router, HttpServer};
use serving_guard::lifecycle::{Services, Shutdown};
use serving_guard::store::{ExternalStore, MemoryStore, StoreError, StoreResult};

/// How the [`FlakyStore`] answers calls.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Healthy,
    /// Every call fails with a connection error.
    Failing,
    /// Every call blocks forever.
    Hanging,
}

/// A store that can be switched between healthy, failing and hanging.
#[derive(Debug)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    mode: Mutex<Mode>,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn new(mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::new(),
            mode: Mutex::new(mode),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_mode(&self, mode: Mode) {
        *self.mode.lock() = mode;
    }

    /// Number of calls that reached the store.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn gate(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mode = *self.mode.lock();
        match mode {
            Mode::Healthy => Ok(()),
            Mode::Failing => Err(StoreError::Unavailable("connection refused".into())),
            Mode::Hanging => std::future::pending().await,
        }
    }
}

#[async_trait]
impl ExternalStore for FlakyStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.gate().await?;
        self.inner.get(key).await
    }

    async fn set_with_ttl(&self, key: &str, ttl: Duration, value: &str) -> StoreResult<()> {
        self.gate().await?;
        self.inner.set_with_ttl(key, ttl, value).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.gate().await?;
        self.inner.delete(key).await
    }

    fn scan_match<'a>(&'a self, pattern: &'a str) -> BoxStream<'a, StoreResult<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mode = *self.mode.lock();
        match mode {
            Mode::Healthy => self.inner.scan_match(pattern),
            Mode::Failing => stream::once(async {
                Err(StoreError::Unavailable("connection refused".into()))
            })
            .boxed(),
            Mode::Hanging => stream::pending().boxed(),
        }
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.gate().await?;
        self.inner.exists(key).await
    }

    async fn sorted_add(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        self.gate().await?;
        self.inner.sorted_add(key, member, score).await
    }

    async fn prune_by_score(&self, key: &str, min: f64, max: f64) -> StoreResult<u64> {
        self.gate().await?;
        self.inner.prune_by_score(key, min, max).await
    }

    async fn count(&self, key: &str) -> StoreResult<u64> {
        self.gate().await?;
        self.inner.count(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        self.gate().await?;
        self.inner.expire(key, ttl).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.gate().await
    }
}

/// A guard server running the echo application on an ephemeral port.
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub services: Services,
    pub shutdown: Shutdown,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a guard server over `store`.
#[allow(dead_code)]
pub async fn spawn_guard(config: GuardConfig, store: Arc<dyn ExternalStore>) -> TestServer {
    let services = Services::init(&config, store).await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, services.clone(), echo_router(services.query_cache()));
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestServer {
        addr,
        services,
        shutdown,
    }
}

/// HTTP client without connection pooling or system proxies.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
