//! Session Caches Module
//!
//! One [`ResponseCache`] per caller credential, so a response fetched with
//! one caller's authorization is never served to another. Sessions are
//! keyed by a SHA-256 fingerprint of the credential; raw tokens are never
//! held.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::cache::{CacheStats, Clock, ResponseCache, SystemClock};

// == Session Id ==
/// Fingerprints a credential (e.g. an `Authorization` header value).
///
/// Returns `None` for an empty credential: anonymous callers get no session.
pub fn session_id(credential: &[u8]) -> Option<String> {
    if credential.iter().all(|b| b.is_ascii_whitespace()) {
        return None;
    }
    let mut hasher = Sha256::new();
    hasher.update(credential);
    Some(hex::encode(hasher.finalize()))
}

struct Session {
    cache: ResponseCache<Value>,
    last_seen: u64,
}

// == Session Caches ==
/// Per-credential response caches sharing one clock and entry bound.
pub struct SessionCaches {
    sessions: HashMap<String, Session>,
    clock: Arc<dyn Clock>,
    /// Entry bound applied to each session cache (0 = unbounded)
    max_entries: usize,
    /// Counters of sessions that have ended
    retired: CacheStats,
}

impl SessionCaches {
    // == Constructors ==
    /// Creates an empty registry reading the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty registry reading the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: HashMap::new(),
            clock,
            max_entries: 0,
            retired: CacheStats::new(),
        }
    }

    /// Bounds every session cache to `max_entries` (0 = unbounded).
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    // == Session ==
    /// Returns the cache for `id`, creating it on first use, and records
    /// the session as active.
    pub fn session(&mut self, id: &str) -> &mut ResponseCache<Value> {
        let now = self.clock.now_ms();
        let clock = &self.clock;
        let max_entries = self.max_entries;

        let session = self.sessions.entry(id.to_string()).or_insert_with(|| {
            debug!(session = %short(id), "session cache created");
            Session {
                cache: ResponseCache::with_clock(clock.clone()).with_max_entries(max_entries),
                last_seen: now,
            }
        });
        session.last_seen = now;
        &mut session.cache
    }

    /// Returns an existing session cache without marking it active.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut ResponseCache<Value>> {
        self.sessions.get_mut(id).map(|s| &mut s.cache)
    }

    pub fn get(&self, id: &str) -> Option<&ResponseCache<Value>> {
        self.sessions.get(id).map(|s| &s.cache)
    }

    /// Marks an existing session as active.
    pub fn touch(&mut self, id: &str) {
        let now = self.clock.now_ms();
        if let Some(session) = self.sessions.get_mut(id) {
            session.last_seen = now;
        }
    }

    // == Invalidate By Prefix ==
    /// Invalidates `prefix` in every session: backend data changed for all
    /// callers, not only the one who mutated it.
    pub fn invalidate_by_prefix(&mut self, prefix: &str) -> usize {
        self.sessions
            .values_mut()
            .map(|s| s.cache.invalidate_by_prefix(prefix))
            .sum()
    }

    // == End Session ==
    /// Clears and forgets one session. Returns the number of entries dropped.
    pub fn end_session(&mut self, id: &str) -> usize {
        match self.sessions.remove(id) {
            Some(session) => self.retire(session),
            None => 0,
        }
    }

    /// Clears and forgets every session. Returns the number of entries dropped.
    pub fn clear_all(&mut self) -> usize {
        let sessions: Vec<Session> = self.sessions.drain().map(|(_, s)| s).collect();
        sessions.into_iter().map(|s| self.retire(s)).sum()
    }

    // == Evict Idle ==
    /// Ends every session not seen for more than `idle_ms`.
    ///
    /// Returns the number of entries dropped.
    pub fn evict_idle(&mut self, idle_ms: u64) -> usize {
        let now = self.clock.now_ms();
        let idle: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, s)| now.saturating_sub(s.last_seen) > idle_ms)
            .map(|(id, _)| id.clone())
            .collect();

        idle.iter().map(|id| self.end_session(id)).sum()
    }

    fn retire(&mut self, mut session: Session) -> usize {
        let dropped = session.cache.len();
        session.cache.clear();
        self.retired.absorb(&session.cache.stats());
        dropped
    }

    // == Stats ==
    /// Counters summed over live and ended sessions; sizes cover live ones.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.retired.clone();
        for session in self.sessions.values() {
            let live = session.cache.stats();
            stats.absorb(&live);
            stats.total_entries += live.total_entries;
            stats.pending_revalidations += live.pending_revalidations;
        }
        stats
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Total entries across all sessions.
    pub fn len(&self) -> usize {
        self.sessions.values().map(|s| s.cache.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.values().all(|s| s.cache.is_empty())
    }
}

impl Default for SessionCaches {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionCaches {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCaches")
            .field("sessions", &self.sessions.len())
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

fn short(id: &str) -> &str {
    &id[..id.len().min(8)]
}
