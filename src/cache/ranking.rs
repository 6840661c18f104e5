//! Ranking weights, ranking config and query-understanding cache.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::client::CacheClient;
use super::keys;
use super::record_lookup;

/// Named ranking signals and their weights.
pub type RankingWeights = HashMap<String, f64>;

#[derive(Debug, Clone)]
pub struct RankingCache {
    client: Arc<CacheClient>,
}

impl RankingCache {
    pub fn new(client: Arc<CacheClient>) -> Self {
        Self { client }
    }

    pub async fn weights(&self, category: Option<&str>) -> Option<RankingWeights> {
        let value = self.client.get_as(&keys::ranking_weights_key(category)).await;
        record_lookup("ranking", "weights", &value);
        value
    }

    pub async fn set_weights(&self, category: Option<&str>, weights: &RankingWeights) -> bool {
        self.client
            .set(&keys::ranking_weights_key(category), weights, keys::RANKING_TTL)
            .await
    }

    pub async fn config(&self) -> Option<Value> {
        let value = self.client.get(&keys::ranking_config_key()).await;
        record_lookup("ranking", "config", &value);
        value
    }

    pub async fn set_config(&self, config: &Value) -> bool {
        self.client
            .set(&keys::ranking_config_key(), config, keys::RANKING_TTL)
            .await
    }

    /// Cached intent classification for a query.
    pub async fn intent(&self, query: &str) -> Option<Value> {
        let value = self.client.get(&keys::intent_key(query)).await;
        record_lookup("intent", "query_understanding", &value);
        value
    }

    pub async fn set_intent(&self, query: &str, intent: &Value) -> bool {
        self.client
            .set(&keys::intent_key(query), intent, keys::INTENT_TTL)
            .await
    }

    /// Cached rewrite of a query.
    pub async fn rewrite(&self, query: &str) -> Option<String> {
        let value = self.client.get_as(&keys::rewrite_key(query)).await;
        record_lookup("rewrite", "query_understanding", &value);
        value
    }

    /// Cache a rewrite. The text is stored raw, so a rewrite that is itself
    /// a JSON string literal (`"\"hi\""`) reads back unquoted.
    pub async fn set_rewrite(&self, query: &str, rewritten: &str) -> bool {
        self.client
            .set(&keys::rewrite_key(query), rewritten, keys::REWRITE_TTL)
            .await
    }

    /// Drop all cached ranking weights and config.
    pub async fn invalidate(&self) -> u64 {
        self.client.delete("ranking:*").await
    }
}
