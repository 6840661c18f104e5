//! Cache key-space and TTLs.
//!
//! Key formats are shared with other services reading the same store and
//! must not change:
//!
//! | family | key | TTL |
//! |---|---|---|
//! | product feature | `feature:{product_id}:{name}` | 1 h (5 min for `popularity_score`) |
//! | user feature | `feature:{user_id}:{name}` | 24 h |
//! | popular list | `popular:{category\|global}:{k}` | 5 min |
//! | search result | `search:{md5(query)}:{user\|anonymous}:{k}` | 5 min |
//! | recommendation | `recommend:{user}:{category\|global}:{k}` | 5 min |
//! | ranking weights | `ranking:weights:{category\|global}` | 24 h |
//! | ranking config | `ranking:config:global` | 24 h |
//! | intent / rewrite | `intent:{md5(query)}` / `rewrite:{md5(query)}` | 24 h |

use md5::{Digest, Md5};
use std::time::Duration;

pub const PRODUCT_FEATURE_TTL: Duration = Duration::from_secs(3600);
pub const USER_FEATURE_TTL: Duration = Duration::from_secs(86_400);
pub const POPULARITY_FEATURE_TTL: Duration = Duration::from_secs(300);
pub const POPULAR_LIST_TTL: Duration = Duration::from_secs(300);
pub const QUERY_RESULT_TTL: Duration = Duration::from_secs(300);
pub const RANKING_TTL: Duration = Duration::from_secs(86_400);
pub const INTENT_TTL: Duration = Duration::from_secs(86_400);
pub const REWRITE_TTL: Duration = Duration::from_secs(86_400);

/// Product feature that refreshes on the popularity TTL.
pub const POPULARITY_FEATURE: &str = "popularity_score";

const GLOBAL: &str = "global";
const ANONYMOUS: &str = "anonymous";

/// Hex MD5 of a query string.
pub fn hash_query(query: &str) -> String {
    format!("{:x}", Md5::digest(query.as_bytes()))
}

pub fn feature_key(owner_id: &str, feature_name: &str) -> String {
    format!("feature:{}:{}", owner_id, feature_name)
}

pub fn feature_pattern(owner_id: &str) -> String {
    format!("feature:{}:*", owner_id)
}

pub fn popular_key(category: Option<&str>, k: usize) -> String {
    format!("popular:{}:{}", category.unwrap_or(GLOBAL), k)
}

pub fn popular_pattern(category: Option<&str>) -> String {
    match category {
        Some(c) => format!("popular:{}:*", c),
        None => "popular:*".to_string(),
    }
}

pub fn search_key(query: &str, user_id: Option<&str>, k: usize) -> String {
    format!("search:{}:{}:{}", hash_query(query), user_id.unwrap_or(ANONYMOUS), k)
}

pub fn search_pattern(query: Option<&str>) -> String {
    match query {
        Some(q) => format!("search:{}:*", hash_query(q)),
        None => "search:*".to_string(),
    }
}

pub fn recommend_key(user_id: &str, category: Option<&str>, k: usize) -> String {
    format!("recommend:{}:{}:{}", user_id, category.unwrap_or(GLOBAL), k)
}

pub fn recommend_pattern(user_id: Option<&str>) -> String {
    match user_id {
        Some(u) => format!("recommend:{}:*", u),
        None => "recommend:*".to_string(),
    }
}

pub fn ranking_weights_key(category: Option<&str>) -> String {
    format!("ranking:weights:{}", category.unwrap_or(GLOBAL))
}

pub fn ranking_config_key() -> String {
    "ranking:config:global".to_string()
}

pub fn intent_key(query: &str) -> String {
    format!("intent:{}", hash_query(query))
}

pub fn rewrite_key(query: &str) -> String {
    format!("rewrite:{}", hash_query(query))
}

/// Key family (text before the first `:`), used as the `cache_type` label.
pub fn family_of(key: &str) -> &str {
    match key.split(':').next() {
        Some(family) if !family.is_empty() && !family.contains(['*', '?']) => family,
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_query() {
        assert_eq!(hash_query(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(hash_query("hello"), "5d41402abc4b2a76b9719d911017c592");
    }

    #[test]
    fn test_search_key_deterministic() {
        let a = search_key("shoes", Some("u1"), 10);
        assert_eq!(a, search_key("shoes", Some("u1"), 10));
        assert_ne!(a, search_key("boots", Some("u1"), 10));
        assert!(a.starts_with("search:") && a.ends_with(":u1:10"));
        assert!(search_key("shoes", None, 10).ends_with(":anonymous:10"));
    }

    #[test]
    fn test_key_formats() {
        assert_eq!(feature_key("p42", "price"), "feature:p42:price");
        assert_eq!(popular_key(None, 20), "popular:global:20");
        assert_eq!(popular_key(Some("shoes"), 5), "popular:shoes:5");
        assert_eq!(recommend_key("u1", None, 10), "recommend:u1:global:10");
        assert_eq!(ranking_weights_key(None), "ranking:weights:global");
        assert_eq!(ranking_weights_key(Some("books")), "ranking:weights:books");
        assert_eq!(intent_key("hello"), "intent:5d41402abc4b2a76b9719d911017c592");
        assert_eq!(rewrite_key("hello"), "rewrite:5d41402abc4b2a76b9719d911017c592");
    }

    #[test]
    fn test_patterns() {
        assert_eq!(feature_pattern("u7"), "feature:u7:*");
        assert_eq!(search_pattern(None), "search:*");
        assert_eq!(search_pattern(Some("hello")), "search:5d41402abc4b2a76b9719d911017c592:*");
        assert_eq!(recommend_pattern(Some("u1")), "recommend:u1:*");
        assert_eq!(popular_pattern(None), "popular:*");
    }

    #[test]
    fn test_family_of() {
        assert_eq!(family_of("search:abc:u1:10"), "search");
        assert_eq!(family_of("feature:*"), "feature");
        assert_eq!(family_of("*"), "unknown");
        assert_eq!(family_of(""), "unknown");
    }
}
