//! Whitelist and blacklist of client identifiers.
//!
//! Read on every request, written only through the admin surface, so both
//! sets live behind `ArcSwap` and are replaced wholesale on change.

use arc_swap::ArcSwap;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::observability::logging::redact;
use crate::observability::metrics;

/// Sizes and a sample of members, for the status endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AccessListStatus {
    pub whitelist_size: usize,
    pub blacklist_size: usize,
    pub whitelist_sample: Vec<String>,
    pub blacklist_sample: Vec<String>,
}

#[derive(Debug)]
pub struct AccessLists {
    whitelist: ArcSwap<HashSet<String>>,
    blacklist: ArcSwap<HashSet<String>>,
}

impl AccessLists {
    pub fn new<W, B>(whitelist: W, blacklist: B) -> Self
    where
        W: IntoIterator<Item = String>,
        B: IntoIterator<Item = String>,
    {
        let lists = Self {
            whitelist: ArcSwap::from_pointee(whitelist.into_iter().collect()),
            blacklist: ArcSwap::from_pointee(blacklist.into_iter().collect()),
        };
        lists.publish_sizes();
        lists
    }

    pub fn is_whitelisted(&self, identifier: &str) -> bool {
        self.whitelist.load().contains(identifier)
    }

    pub fn is_blacklisted(&self, identifier: &str) -> bool {
        self.blacklist.load().contains(identifier)
    }

    /// Returns `true` if the identifier was not already listed.
    pub fn add_to_whitelist(&self, identifier: &str) -> bool {
        let added = update(&self.whitelist, |set| set.insert(identifier.to_string()));
        self.log_change("whitelist", "added", identifier, added)
    }

    /// Returns `true` if the identifier was listed.
    pub fn remove_from_whitelist(&self, identifier: &str) -> bool {
        let removed = update(&self.whitelist, |set| set.remove(identifier));
        self.log_change("whitelist", "removed", identifier, removed)
    }

    pub fn add_to_blacklist(&self, identifier: &str) -> bool {
        let added = update(&self.blacklist, |set| set.insert(identifier.to_string()));
        self.log_change("blacklist", "added", identifier, added)
    }

    pub fn remove_from_blacklist(&self, identifier: &str) -> bool {
        let removed = update(&self.blacklist, |set| set.remove(identifier));
        self.log_change("blacklist", "removed", identifier, removed)
    }

    /// Sizes plus up to `sample` members of each list, sorted.
    pub fn status(&self, sample: usize) -> AccessListStatus {
        let whitelist = self.whitelist.load();
        let blacklist = self.blacklist.load();
        AccessListStatus {
            whitelist_size: whitelist.len(),
            blacklist_size: blacklist.len(),
            whitelist_sample: sample_of(&whitelist, sample),
            blacklist_sample: sample_of(&blacklist, sample),
        }
    }

    fn log_change(&self, list: &'static str, action: &'static str, identifier: &str, changed: bool) -> bool {
        self.publish_sizes();
        if changed {
            tracing::info!(list, action, identifier = %redact(identifier), "Access list updated");
        }
        changed
    }

    fn publish_sizes(&self) {
        metrics::record_access_list_sizes(self.whitelist.load().len(), self.blacklist.load().len());
    }
}

impl Default for AccessLists {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

fn update(list: &ArcSwap<HashSet<String>>, mut change: impl FnMut(&mut HashSet<String>) -> bool) -> bool {
    let mut changed = false;
    list.rcu(|current| {
        let mut next = HashSet::clone(current);
        changed = change(&mut next);
        Arc::new(next)
    });
    changed
}

fn sample_of(set: &HashSet<String>, n: usize) -> Vec<String> {
    let mut members: Vec<String> = set.iter().cloned().collect();
    members.sort();
    members.truncate(n);
    members
}
