//! serving-guard binary.
//!
//! Loads configuration, builds the protective layers over an in-process
//! store and serves the echo application behind them. An optional admin
//! listener manages the access lists.

use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;

use serving_guard::admin::{run_admin, AdminState};
use serving_guard::config::{load_config, GuardConfig};
use serving_guard::http::{echo_router, HttpServer};
use serving_guard::lifecycle::{Services, Shutdown};
use serving_guard::observability::{logging, metrics};
use serving_guard::store::{ExternalStore, MemoryStore};

const DEFAULT_CONFIG_PATH: &str = "serving-guard.toml";

fn resolve_config() -> Result<GuardConfig, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => Ok(load_config(Path::new(&path))?),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            Ok(load_config(Path::new(DEFAULT_CONFIG_PATH))?)
        }
        None => Ok(GuardConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config()?;
    logging::init_logging(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "serving-guard starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        store_timeout_ms = config.store.op_timeout_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store: Arc<dyn ExternalStore> = Arc::new(MemoryStore::new());
    let services = Services::init(&config, store).await;
    let shutdown = Shutdown::new();

    if config.admin.enabled {
        if config.admin.api_key == GuardConfig::default().admin.api_key {
            tracing::warn!("Admin API is using the placeholder API key");
        }
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState {
            services: services.clone(),
            api_key: Arc::from(config.admin.api_key.as_str()),
        };
        let admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = run_admin(admin_listener, state, admin_shutdown).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let app = echo_router(services.query_cache());
    let server = HttpServer::new(config, services, app);
    server.run(listener, shutdown.subscribe()).await?;

    shutdown.trigger();
    tracing::info!("Shutdown complete");
    Ok(())
}
