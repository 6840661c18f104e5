//! Heuristic abuse detection.
//!
//! # Responsibilities
//! - Flag an IP repeating the same search query too often
//! - Flag an IP walking through many distinct recommendation ids
//! - Periodically forget IPs with no recent activity
//!
//! # Design Decisions
//! - Detection is a side channel: it logs and counts, never blocks
//! - Per-IP logs are pruned on access and swept on an interval, so memory
//!   is bounded by the number of IPs active within one lookback
//! - Distinct-id counting is a coarse proxy for sequential enumeration

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{self, Instant};

use crate::cache::keys::hash_query;
use crate::config::AbuseConfig;
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbusePattern {
    SameQuery,
    SequentialEnumeration,
}

impl AbusePattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbusePattern::SameQuery => "same_query",
            AbusePattern::SequentialEnumeration => "sequential_enumeration",
        }
    }
}

type ActivityLog = HashMap<String, VecDeque<(Instant, String)>>;

#[derive(Debug)]
pub struct AbuseTracker {
    config: AbuseConfig,
    lookback: Duration,
    queries: Mutex<ActivityLog>,
    paths: Mutex<ActivityLog>,
}

impl AbuseTracker {
    pub fn new(config: AbuseConfig) -> Self {
        Self {
            lookback: Duration::from_secs(config.lookback_secs),
            config,
            queries: Mutex::new(HashMap::new()),
            paths: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Record a search query from `ip`.
    pub fn observe_query(&self, ip: &str, query: &str) -> Option<AbusePattern> {
        let hash = hash_query(query);
        let repeats = {
            let mut logs = self.queries.lock();
            let log = self.append(&mut logs, ip, hash.clone());
            log.iter().filter(|(_, h)| *h == hash).count()
        };

        if repeats > self.config.same_query_threshold {
            metrics::record_abuse_detected(AbusePattern::SameQuery.as_str());
            tracing::warn!(ip = %ip, query_hash = %hash, count = repeats, "Abuse detected: repeated query");
            return Some(AbusePattern::SameQuery);
        }
        None
    }

    /// Record the last segment of a recommendation path from `ip`.
    pub fn observe_path(&self, ip: &str, segment: &str) -> Option<AbusePattern> {
        let distinct = {
            let mut logs = self.paths.lock();
            let log = self.append(&mut logs, ip, segment.to_string());
            log.iter().map(|(_, s)| s.as_str()).collect::<HashSet<_>>().len()
        };

        if distinct > self.config.enumeration_threshold {
            metrics::record_abuse_detected(AbusePattern::SequentialEnumeration.as_str());
            tracing::warn!(ip = %ip, unique_ids = distinct, "Abuse detected: id enumeration");
            return Some(AbusePattern::SequentialEnumeration);
        }
        None
    }

    /// Drop expired entries and IPs with no activity left in the lookback.
    /// Returns the number of IPs forgotten.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut forgotten = 0;
        for logs in [&self.queries, &self.paths] {
            let mut logs = logs.lock();
            let before = logs.len();
            logs.retain(|_, log| {
                prune(log, now, self.lookback);
                !log.is_empty()
            });
            forgotten += before - logs.len();
        }
        forgotten
    }

    /// Number of IPs currently tracked by either detector.
    pub fn tracked_ips(&self) -> usize {
        let queries = self.queries.lock();
        let paths = self.paths.lock();
        queries.keys().chain(paths.keys()).collect::<HashSet<_>>().len()
    }

    /// Sweep on an interval until shutdown.
    pub async fn run_sweeper(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            return;
        }

        let mut ticker = time::interval(Duration::from_secs(self.config.sweep_interval_secs));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let forgotten = self.sweep();
                    if forgotten > 0 {
                        tracing::debug!(forgotten, "Abuse tracker swept idle clients");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Abuse sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    fn append<'a>(&self, logs: &'a mut ActivityLog, ip: &str, value: String) -> &'a VecDeque<(Instant, String)> {
        let now = Instant::now();
        let log = logs.entry(ip.to_string()).or_default();
        prune(log, now, self.lookback);
        log.push_back((now, value));
        log
    }
}

fn prune(log: &mut VecDeque<(Instant, String)>, now: Instant, lookback: Duration) {
    while log.front().is_some_and(|(at, _)| now.duration_since(*at) >= lookback) {
        log.pop_front();
    }
}
