//! LRU Tracker Module
//!
//! Access-order bookkeeping for the optional entry bound on the response
//! cache. Unused when the cache is unbounded.

use std::collections::VecDeque;

// == LRU Tracker ==
/// Tracks key recency for eviction.
///
/// Keys are stored in a VecDeque where:
/// - Front = Most recently used
/// - Back = Least recently used
#[derive(Debug, Default)]
pub struct LruTracker {
    order: VecDeque<String>,
}

impl LruTracker {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    // == Touch ==
    /// Marks a key as most recently used.
    pub fn touch(&mut self, key: &str) {
        self.remove(key);
        self.order.push_front(key.to_string());
    }

    // == Remove ==
    /// Stops tracking a key.
    pub fn remove(&mut self, key: &str) {
        self.order.retain(|k| k != key);
    }

    /// Stops tracking every key that starts with `prefix`.
    pub fn remove_prefix(&mut self, prefix: &str) {
        self.order.retain(|k| !k.starts_with(prefix));
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    pub fn evict_oldest(&mut self) -> Option<String> {
        self.order.pop_back()
    }

    /// Forgets every key.
    pub fn clear(&mut self) {
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[cfg(test)]
    fn contains(&self, key: &str) -> bool {
        self.order.iter().any(|k| k == key)
    }
}
