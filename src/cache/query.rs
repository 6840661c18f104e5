//! Search, recommendation and popular-list result cache.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use super::client::CacheClient;
use super::keys;
use super::record_lookup;

#[derive(Debug, Clone)]
pub struct QueryCache {
    client: Arc<CacheClient>,
}

impl QueryCache {
    pub fn new(client: Arc<CacheClient>) -> Self {
        Self { client }
    }

    pub async fn search_results<T: DeserializeOwned>(
        &self,
        query: &str,
        user_id: Option<&str>,
        k: usize,
    ) -> Option<T> {
        let value = self.client.get_as(&keys::search_key(query, user_id, k)).await;
        record_lookup("search", "query_result", &value);
        value
    }

    pub async fn set_search_results<T: Serialize + ?Sized>(
        &self,
        query: &str,
        user_id: Option<&str>,
        k: usize,
        results: &T,
    ) -> bool {
        self.client
            .set(&keys::search_key(query, user_id, k), results, keys::QUERY_RESULT_TTL)
            .await
    }

    pub async fn recommendations<T: DeserializeOwned>(
        &self,
        user_id: &str,
        category: Option<&str>,
        k: usize,
    ) -> Option<T> {
        let value = self.client.get_as(&keys::recommend_key(user_id, category, k)).await;
        record_lookup("recommendation", "query_result", &value);
        value
    }

    pub async fn set_recommendations<T: Serialize + ?Sized>(
        &self,
        user_id: &str,
        category: Option<&str>,
        k: usize,
        results: &T,
    ) -> bool {
        self.client
            .set(&keys::recommend_key(user_id, category, k), results, keys::QUERY_RESULT_TTL)
            .await
    }

    pub async fn popular<T: DeserializeOwned>(&self, category: Option<&str>, k: usize) -> Option<T> {
        let value = self.client.get_as(&keys::popular_key(category, k)).await;
        record_lookup("popular", "popular_list", &value);
        value
    }

    pub async fn set_popular<T: Serialize + ?Sized>(
        &self,
        category: Option<&str>,
        k: usize,
        products: &T,
    ) -> bool {
        self.client
            .set(&keys::popular_key(category, k), products, keys::POPULAR_LIST_TTL)
            .await
    }

    /// Drop cached search results for one query, or all of them.
    pub async fn invalidate_search(&self, query: Option<&str>) -> u64 {
        self.client.delete(&keys::search_pattern(query)).await
    }

    /// Drop cached recommendations for one user, or all of them.
    pub async fn invalidate_recommendations(&self, user_id: Option<&str>) -> u64 {
        self.client.delete(&keys::recommend_pattern(user_id)).await
    }

    pub async fn invalidate_popular(&self, category: Option<&str>) -> u64 {
        self.client.delete(&keys::popular_pattern(category)).await
    }
}
