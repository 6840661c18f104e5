use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use super::AdminState;
use crate::config::EndpointPolicy;
use crate::resilience::circuit_breaker::BreakerMetrics;
use crate::security::AccessListStatus;

const SAMPLE_SIZE: usize = 10;

#[derive(Serialize)]
pub struct RateLimitStatus {
    pub enabled: bool,
    #[serde(flatten)]
    pub lists: AccessListStatus,
    pub policies: Vec<EndpointPolicy>,
    pub abuse_tracked_ips: usize,
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub cache_configured: bool,
    pub cache_breaker: BreakerMetrics,
    pub rate_limit: RateLimitStatus,
}

#[derive(Serialize)]
pub struct ListUpdate {
    pub list: &'static str,
    pub identifier: String,
    pub action: &'static str,
    pub changed: bool,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let limiter = &state.services.limiter;
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        cache_configured: state.services.cache.is_configured(),
        cache_breaker: state.services.cache.breaker_metrics(),
        rate_limit: RateLimitStatus {
            enabled: limiter.is_enabled(),
            lists: limiter.access_lists().status(SAMPLE_SIZE),
            policies: limiter.policies().to_vec(),
            abuse_tracked_ips: limiter.abuse_tracker().tracked_ips(),
        },
    })
}

pub async fn add_whitelist(State(state): State<AdminState>, Path(id): Path<String>) -> Json<ListUpdate> {
    let changed = state.services.limiter.access_lists().add_to_whitelist(&id);
    Json(ListUpdate { list: "whitelist", identifier: id, action: "added", changed })
}

pub async fn remove_whitelist(State(state): State<AdminState>, Path(id): Path<String>) -> Json<ListUpdate> {
    let changed = state.services.limiter.access_lists().remove_from_whitelist(&id);
    Json(ListUpdate { list: "whitelist", identifier: id, action: "removed", changed })
}

pub async fn add_blacklist(State(state): State<AdminState>, Path(id): Path<String>) -> Json<ListUpdate> {
    let changed = state.services.limiter.access_lists().add_to_blacklist(&id);
    Json(ListUpdate { list: "blacklist", identifier: id, action: "added", changed })
}

pub async fn remove_blacklist(State(state): State<AdminState>, Path(id): Path<String>) -> Json<ListUpdate> {
    let changed = state.services.limiter.access_lists().remove_from_blacklist(&id);
    Json(ListUpdate { list: "blacklist", identifier: id, action: "removed", changed })
}
