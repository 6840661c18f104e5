//! In-process store backed by a concurrent map.
//!
//! # Responsibilities
//! - String values with optional expiry
//! - Sorted sets (member → score) for sliding-window counters
//! - Glob pattern scans over live keys
//!
//! # Design Decisions
//! - Expired entries are removed lazily when touched or scanned
//! - Clock is `tokio::time::Instant` so paused-time tests drive expiry
//! - State is ephemeral and lost on restart

use async_trait::async_trait;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use futures_util::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::store::{ExternalStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Sorted(HashMap<String, f64>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// A thread-safe in-memory implementation of [`ExternalStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Entry>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| !e.value().is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_expired(&self, key: &str) {
        let now = Instant::now();
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
    }
}

#[async_trait]
impl ExternalStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.purge_expired(key);
        match self.entries.get(key) {
            Some(entry) => match &entry.value {
                Value::Str(s) => Ok(Some(s.clone())),
                Value::Sorted(_) => Err(StoreError::WrongType(key.to_string())),
            },
            None => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, ttl: Duration, value: &str) -> StoreResult<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.purge_expired(key);
        Ok(self.entries.remove(key).is_some())
    }

    fn scan_match<'a>(&'a self, pattern: &'a str) -> BoxStream<'a, StoreResult<String>> {
        let now = Instant::now();
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| !e.value().is_expired(now) && glob_match(pattern, e.key()))
            .map(|e| e.key().clone())
            .collect();
        stream::iter(keys.into_iter().map(Ok)).boxed()
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.purge_expired(key);
        Ok(self.entries.contains_key(key))
    }

    async fn sorted_add(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(Entry {
                        value: Value::Sorted(HashMap::new()),
                        expires_at: None,
                    });
                }
                match &mut occupied.get_mut().value {
                    Value::Sorted(set) => {
                        set.insert(member.to_string(), score);
                        Ok(())
                    }
                    Value::Str(_) => Err(StoreError::WrongType(key.to_string())),
                }
            }
            MapEntry::Vacant(vacant) => {
                let mut set = HashMap::new();
                set.insert(member.to_string(), score);
                vacant.insert(Entry {
                    value: Value::Sorted(set),
                    expires_at: None,
                });
                Ok(())
            }
        }
    }

    async fn prune_by_score(&self, key: &str, min: f64, max: f64) -> StoreResult<u64> {
        self.purge_expired(key);
        let (removed, now_empty) = match self.entries.get_mut(key) {
            Some(mut entry) => match &mut entry.value {
                Value::Sorted(set) => {
                    let before = set.len();
                    set.retain(|_, score| *score < min || *score > max);
                    ((before - set.len()) as u64, set.is_empty())
                }
                Value::Str(_) => return Err(StoreError::WrongType(key.to_string())),
            },
            None => return Ok(0),
        };
        if now_empty {
            self.entries
                .remove_if(key, |_, e| matches!(&e.value, Value::Sorted(s) if s.is_empty()));
        }
        Ok(removed)
    }

    async fn count(&self, key: &str) -> StoreResult<u64> {
        self.purge_expired(key);
        match self.entries.get(key) {
            Some(entry) => match &entry.value {
                Value::Sorted(set) => Ok(set.len() as u64),
                Value::Str(_) => Err(StoreError::WrongType(key.to_string())),
            },
            None => Ok(0),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        self.purge_expired(key);
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Glob matching with `*` (any run) and `?` (any single character).
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
