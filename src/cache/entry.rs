//! Cache Entry Module
//!
//! Defines a single cached response and how its age maps onto freshness.

use crate::cache::{FRESH_TTL_MS, STALE_TTL_MS};

// == Freshness ==
/// Where an entry sits in its lifecycle at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Age within `FRESH_TTL`; serve with no refresh.
    Fresh,
    /// Past `FRESH_TTL` but within `STALE_TTL`; serve and refresh in background.
    Stale,
    /// Past `STALE_TTL`; treat as absent.
    Expired,
}

// == Cache Entry ==
/// Represents one cached response payload and when it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The stored payload
    pub data: T,
    /// Store time (Unix milliseconds)
    pub timestamp: u64,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates a new cache entry stamped at `now_ms`.
    pub fn new(data: T, now_ms: u64) -> Self {
        Self {
            data,
            timestamp: now_ms,
        }
    }

    // == Age ==
    /// Milliseconds elapsed since the entry was stored.
    ///
    /// A clock that stepped backwards yields age 0, never an underflow.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.timestamp)
    }

    // == Freshness ==
    /// Classifies the entry at `now_ms`.
    ///
    /// Both windows are inclusive: an entry exactly `FRESH_TTL` old is still
    /// fresh, and one exactly `STALE_TTL` old is still servable.
    pub fn freshness(&self, now_ms: u64) -> Freshness {
        let age = self.age_ms(now_ms);
        if age <= FRESH_TTL_MS {
            Freshness::Fresh
        } else if age <= STALE_TTL_MS {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }
}
