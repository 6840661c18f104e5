//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Assemble the application router behind the protective layers
//! - Wire up middleware (request ID, tracing, timeout, metrics, rate limit)
//! - Serve with graceful shutdown
//! - Run the abuse tracker sweep in the background

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GuardConfig;
use crate::lifecycle::{shutdown_signal, Services};
use crate::observability::metrics;
use crate::resilience::circuit_breaker::CircuitState;
use crate::security::{rate_limit_middleware, RateLimiter};

#[derive(Serialize)]
struct HealthStatus {
    status: &'static str,
    cache: CircuitState,
    cache_configured: bool,
}

/// HTTP server fronting the application with the guard layers.
pub struct HttpServer {
    router: Router,
    config: GuardConfig,
    limiter: Arc<RateLimiter>,
}

impl HttpServer {
    /// Wrap `app` (already carrying its own state) with health, rate limiting
    /// and the standard middleware stack.
    pub fn new(config: GuardConfig, services: Services, app: Router) -> Self {
        let limiter = services.limiter.clone();
        let router = Self::build_router(&config, services, app);
        Self {
            router,
            config,
            limiter,
        }
    }

    #[allow(deprecated)]
    fn build_router(config: &GuardConfig, services: Services, app: Router) -> Router {
        let limiter = services.limiter.clone();
        Router::new()
            .route("/health", get(health))
            .with_state(services)
            .merge(app)
            .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
            .layer(middleware::from_fn(record_request))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Serve on `listener` until `shutdown` fires or the process is signalled.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let sweeper = self.limiter.abuse_tracker();
        tokio::spawn(sweeper.run_sweeper(shutdown.resubscribe()));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown.recv() => {}
                    _ = shutdown_signal() => {}
                }
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }
}

async fn health(State(services): State<Services>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy",
        cache: services.cache.breaker().state(),
        cache_configured: services.cache.is_configured(),
    })
}

async fn record_request(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let response = next.run(request).await;
    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}
