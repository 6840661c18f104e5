//! Product and user feature cache.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::client::CacheClient;
use super::keys::{self, POPULARITY_FEATURE};
use super::record_lookup;

const CACHE_TYPE: &str = "feature";

#[derive(Debug, Clone)]
pub struct FeatureCache {
    client: Arc<CacheClient>,
}

impl FeatureCache {
    pub fn new(client: Arc<CacheClient>) -> Self {
        Self { client }
    }

    pub async fn product_feature(&self, product_id: &str, feature_name: &str) -> Option<Value> {
        let value = self.client.get(&keys::feature_key(product_id, feature_name)).await;
        record_lookup(CACHE_TYPE, "product", &value);
        value
    }

    /// Cache a product feature. `popularity_score` always uses its short TTL.
    pub async fn set_product_feature<V: Serialize + ?Sized>(
        &self,
        product_id: &str,
        feature_name: &str,
        value: &V,
        ttl: Option<Duration>,
    ) -> bool {
        let ttl = if feature_name == POPULARITY_FEATURE {
            keys::POPULARITY_FEATURE_TTL
        } else {
            ttl.unwrap_or(keys::PRODUCT_FEATURE_TTL)
        };
        self.client
            .set(&keys::feature_key(product_id, feature_name), value, ttl)
            .await
    }

    pub async fn user_feature(&self, user_id: &str, feature_name: &str) -> Option<Value> {
        let value = self.client.get(&keys::feature_key(user_id, feature_name)).await;
        record_lookup(CACHE_TYPE, "user", &value);
        value
    }

    pub async fn set_user_feature<V: Serialize + ?Sized>(
        &self,
        user_id: &str,
        feature_name: &str,
        value: &V,
        ttl: Option<Duration>,
    ) -> bool {
        self.client
            .set(
                &keys::feature_key(user_id, feature_name),
                value,
                ttl.unwrap_or(keys::USER_FEATURE_TTL),
            )
            .await
    }

    /// Drop every cached feature for a product or user id.
    pub async fn invalidate(&self, owner_id: &str) -> u64 {
        self.client.delete(&keys::feature_pattern(owner_id)).await
    }
}
