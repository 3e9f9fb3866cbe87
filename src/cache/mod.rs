//! Cache Module
//!
//! Stale-while-revalidate response cache with sensitivity-aware exclusion and
//! prefix invalidation, partitioned per caller credential.

mod clock;
mod entry;
mod key;
mod lru;
mod policy;
mod sessions;
mod stats;
mod store;


// Re-export public types
pub use clock::{current_timestamp_ms, Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, Freshness};
pub use key::{build_key, build_key_from_json, query_pairs, resource_prefix};
pub use lru::LruTracker;
pub use policy::{is_cacheable, UNCACHEABLE_PREFIXES};
pub use sessions::{session_id, SessionCaches};
pub use stats::CacheStats;
pub use store::{Lookup, ResponseCache};

// == Public Constants ==
/// Entries at or below this age are served with no refresh.
pub const FRESH_TTL_MS: u64 = 30 * 1000;

/// Entries past `FRESH_TTL_MS` and at or below this age are served stale;
/// older entries are a miss.
pub const STALE_TTL_MS: u64 = 90 * 1000;
