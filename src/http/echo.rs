//! Echo application showing the cache-aside request flow.
//!
//! Results are placeholders derived from the request; what matters is the
//! order: the limiter has already admitted the request, then the cache is
//! consulted, then the result is computed and written back on a miss.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::cache::QueryCache;

const DEFAULT_K: usize = 10;
const MAX_K: usize = 100;

fn default_k() -> usize {
    DEFAULT_K
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub user_id: Option<String>,
    #[serde(default = "default_k")]
    pub k: usize,
}

#[derive(Debug, Deserialize)]
pub struct RecommendParams {
    pub category: Option<String>,
    #[serde(default = "default_k")]
    pub k: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct EchoResponse {
    pub subject: String,
    pub results: Vec<String>,
    pub cached: bool,
}

pub fn echo_router(cache: QueryCache) -> Router {
    Router::new()
        .route("/search", get(search))
        .route("/recommend/{*path}", get(recommend))
        .with_state(cache)
}

async fn search(State(cache): State<QueryCache>, Query(params): Query<SearchParams>) -> Json<EchoResponse> {
    let k = params.k.min(MAX_K);
    let user = params.user_id.as_deref();
    if let Some(results) = cache.search_results(&params.q, user, k).await {
        return Json(EchoResponse { subject: params.q, results, cached: true });
    }

    let results = placeholder_results(&params.q, k);
    cache.set_search_results(&params.q, user, k, &results).await;
    Json(EchoResponse { subject: params.q, results, cached: false })
}

async fn recommend(
    State(cache): State<QueryCache>,
    Path(path): Path<String>,
    Query(params): Query<RecommendParams>,
) -> Json<EchoResponse> {
    let k = params.k.min(MAX_K);
    let category = params.category.as_deref();
    if let Some(results) = cache.recommendations(&path, category, k).await {
        return Json(EchoResponse { subject: path, results, cached: true });
    }

    let results = placeholder_results(&path, k);
    cache.set_recommendations(&path, category, k, &results).await;
    Json(EchoResponse { subject: path, results, cached: false })
}

fn placeholder_results(seed: &str, k: usize) -> Vec<String> {
    (1..=k).map(|i| format!("{}#{}", seed, i)).collect()
}
