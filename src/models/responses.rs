//! Response DTOs for the cache admin API

use serde::Serialize;

use crate::cache::CacheStats;

/// Response body for the stats endpoint (GET /_cache/stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Share of lookups served from memory
    pub hit_rate: f64,
    /// Live session caches
    pub sessions: usize,
}

impl StatsResponse {
    /// Creates a new StatsResponse from a cache statistics snapshot
    pub fn new(stats: CacheStats, sessions: usize) -> Self {
        let hit_rate = stats.hit_rate();
        Self {
            stats,
            hit_rate,
            sessions,
        }
    }
}

/// Response body for prefix invalidation (DELETE /_cache)
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub prefix: String,
    /// Number of entries removed
    pub removed: usize,
}

impl InvalidateResponse {
    pub fn new(prefix: impl Into<String>, removed: usize) -> Self {
        Self {
            prefix: prefix.into(),
            removed,
        }
    }
}

/// Response body for a session clear (POST /_cache/clear)
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
    /// Number of entries dropped
    pub dropped: usize,
}

impl ClearResponse {
    pub fn new(dropped: usize) -> Self {
        Self {
            message: format!("Cache cleared, {} entries dropped", dropped),
            dropped,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
