//! Administrative HTTP surface.
//!
//! Served on its own listener, behind a bearer token:
//! - `GET /admin/status`
//! - `PUT|DELETE /admin/whitelist/{id}`
//! - `PUT|DELETE /admin/blacklist/{id}`

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, routing::put, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::lifecycle::Services;

#[derive(Clone)]
pub struct AdminState {
    pub services: Services,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/whitelist/{id}", put(add_whitelist).delete(remove_whitelist))
        .route("/admin/blacklist/{id}", put(add_blacklist).delete(remove_blacklist))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin router until shutdown.
pub async fn run_admin(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Admin API starting");
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
