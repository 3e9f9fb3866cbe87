//! Cache Statistics Module
//!
//! Counters for how lookups were served and how entries left the cache.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Lookups served within the fresh window
    pub fresh_hits: u64,
    /// Lookups served within the stale window
    pub stale_hits: u64,
    /// Lookups that found nothing servable
    pub misses: u64,
    /// Entries removed lazily because they outlived the stale window
    pub expirations: u64,
    /// Entries evicted by the optional LRU bound
    pub evictions: u64,
    /// Entries removed by prefix invalidation
    pub invalidations: u64,
    /// Number of full clears
    pub clears: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
    /// Keys currently marked as revalidating
    pub pending_revalidations: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Share of lookups served from memory, fresh or stale.
    ///
    /// Returns 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.fresh_hits + self.stale_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    pub fn record_fresh_hit(&mut self) {
        self.fresh_hits += 1;
    }

    pub fn record_stale_hit(&mut self) {
        self.stale_hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_expiration(&mut self) {
        self.expirations += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_invalidations(&mut self, count: usize) {
        self.invalidations += count as u64;
    }

    pub fn record_clear(&mut self) {
        self.clears += 1;
    }

    // == Absorb ==
    /// Adds another snapshot's counters into this one.
    ///
    /// Sizes (`total_entries`, `pending_revalidations`) are left alone; they
    /// describe live state, not history.
    pub fn absorb(&mut self, other: &CacheStats) {
        self.fresh_hits += other.fresh_hits;
        self.stale_hits += other.stale_hits;
        self.misses += other.misses;
        self.expirations += other.expirations;
        self.evictions += other.evictions;
        self.invalidations += other.invalidations;
        self.clears += other.clears;
    }
}
