//! Response Cache Module
//!
//! Stale-while-revalidate store keyed by normalized request URL.
//!
//! The store is a plain single-owner value: every method runs to completion
//! without suspending and there is no internal locking. Callers that share
//! it across tasks wrap it themselves (the API layer uses `Arc<RwLock<_>>`).

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use crate::cache::{CacheEntry, CacheStats, Clock, Freshness, LruTracker, SystemClock};

// == Lookup ==
/// A servable cache hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup<T> {
    /// Copy of the stored payload
    pub data: T,
    /// False when the caller should refresh the key in the background
    pub fresh: bool,
}

// == Response Cache ==
/// In-memory response cache with freshness-graded reads.
pub struct ResponseCache<T = Value> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<T>>,
    /// Keys with a background refresh in flight
    pending_revalidations: HashSet<String>,
    /// Source of "now"
    clock: Arc<dyn Clock>,
    /// Running counters
    stats: CacheStats,
    /// Optional entry bound; `None` means unbounded
    max_entries: Option<usize>,
    /// Recency order, only maintained when bounded
    lru: LruTracker,
}

impl<T: Clone> ResponseCache<T> {
    // == Constructors ==
    /// Creates an unbounded cache reading the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an unbounded cache reading the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            pending_revalidations: HashSet::new(),
            clock,
            stats: CacheStats::new(),
            max_entries: None,
            lru: LruTracker::new(),
        }
    }

    /// Bounds the cache to `max_entries`, evicting least recently used keys.
    ///
    /// Zero leaves the cache unbounded.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = (max_entries > 0).then_some(max_entries);
        self
    }

    // == Lookup ==
    /// Returns the stored data and whether it is still fresh.
    ///
    /// An entry past the stale window is removed and reported as a miss.
    pub fn lookup(&mut self, key: &str) -> Option<Lookup<T>> {
        let now = self.clock.now_ms();

        let freshness = match self.entries.get(key) {
            Some(entry) => entry.freshness(now),
            None => {
                self.stats.record_miss();
                trace!(key, "cache miss");
                return None;
            }
        };

        if freshness == Freshness::Expired {
            self.entries.remove(key);
            self.lru_remove(key);
            self.stats.record_expiration();
            self.stats.record_miss();
            debug!(key, "cache entry expired");
            return None;
        }

        let fresh = freshness == Freshness::Fresh;
        if fresh {
            self.stats.record_fresh_hit();
        } else {
            self.stats.record_stale_hit();
        }
        self.lru_touch(key);

        self.entries.get(key).map(|entry| Lookup {
            data: entry.data.clone(),
            fresh,
        })
    }

    // == Store ==
    /// Inserts or overwrites `key`, resetting its age to zero.
    pub fn store(&mut self, key: impl Into<String>, data: T) {
        let key = key.into();
        let now = self.clock.now_ms();

        if let Some(max) = self.max_entries {
            if !self.entries.contains_key(&key) && self.entries.len() >= max {
                if let Some(evicted) = self.lru.evict_oldest() {
                    self.entries.remove(&evicted);
                    self.stats.record_eviction();
                    debug!(key = %evicted, "evicted least recently used entry");
                }
            }
            self.lru.touch(&key);
        }

        self.entries.insert(key, CacheEntry::new(data, now));
    }

    // == Is Revalidating ==
    /// Returns true while a background refresh of `key` is in flight.
    pub fn is_revalidating(&self, key: &str) -> bool {
        self.pending_revalidations.contains(key)
    }

    // == Mark Revalidating ==
    /// Records that a background refresh of `key` has started.
    pub fn mark_revalidating(&mut self, key: &str) {
        self.pending_revalidations.insert(key.to_string());
    }

    // == Clear Revalidating ==
    /// Records that the refresh of `key` finished, whatever its outcome.
    pub fn clear_revalidating(&mut self, key: &str) {
        self.pending_revalidations.remove(key);
    }

    // == Invalidate By Prefix ==
    /// Removes every entry whose key starts with `prefix`.
    ///
    /// Plain string matching: `/event` also drops `/events`.
    /// Returns the number of entries removed.
    pub fn invalidate_by_prefix(&mut self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - self.entries.len();

        if self.max_entries.is_some() {
            self.lru.remove_prefix(prefix);
        }
        self.stats.record_invalidations(removed);
        debug!(prefix, removed, "invalidated cache entries");
        removed
    }

    // == Clear ==
    /// Drops every entry and every revalidation marker.
    pub fn clear(&mut self) {
        let dropped = self.entries.len();
        self.entries.clear();
        self.pending_revalidations.clear();
        self.lru.clear();
        self.stats.record_clear();
        debug!(dropped, "cache cleared");
    }

    // == Stats ==
    /// Returns a snapshot of the counters with current sizes filled in.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.total_entries = self.entries.len();
        stats.pending_revalidations = self.pending_revalidations.len();
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lru_touch(&mut self, key: &str) {
        if self.max_entries.is_some() {
            self.lru.touch(key);
        }
    }

    fn lru_remove(&mut self, key: &str) {
        if self.max_entries.is_some() {
            self.lru.remove(key);
        }
    }
}

impl<T: Clone> Default for ResponseCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ResponseCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.entries.len())
            .field("pending_revalidations", &self.pending_revalidations.len())
            .field("max_entries", &self.max_entries)
            .finish()
    }
}
