//! Configuration Module
//!
//! Handles loading and managing proxy configuration from environment variables.

use std::env;
use std::str::FromStr;

/// Proxy configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the REST backend every request is forwarded to
    pub upstream_url: String,
    /// HTTP server port
    pub server_port: u16,
    /// Optional entry bound for the cache (0 = unbounded)
    pub max_entries: usize,
    /// Seconds without traffic before the cache is cleared (0 = never)
    pub idle_timeout: u64,
    /// Interval in seconds between idle checks
    pub idle_check_interval: u64,
    /// Timeout in seconds for a single upstream request
    pub upstream_timeout: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `UPSTREAM_URL` - Backend base URL (default: http://127.0.0.1:8000)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `MAX_ENTRIES` - Cache entry bound, 0 for unbounded (default: 0)
    /// - `IDLE_TIMEOUT` - Idle seconds before clearing, 0 to disable (default: 900)
    /// - `IDLE_CHECK_INTERVAL` - Idle check frequency in seconds (default: 30)
    /// - `UPSTREAM_TIMEOUT` - Upstream request timeout in seconds (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            upstream_url: env::var("UPSTREAM_URL")
                .ok()
                .map(|v| v.trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.upstream_url),
            server_port: parse_env("SERVER_PORT").unwrap_or(defaults.server_port),
            max_entries: parse_env("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            idle_timeout: parse_env("IDLE_TIMEOUT").unwrap_or(defaults.idle_timeout),
            idle_check_interval: parse_env("IDLE_CHECK_INTERVAL")
                .filter(|v| *v > 0)
                .unwrap_or(defaults.idle_check_interval),
            upstream_timeout: parse_env("UPSTREAM_TIMEOUT")
                .filter(|v| *v > 0)
                .unwrap_or(defaults.upstream_timeout),
        }
    }
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream_url: "http://127.0.0.1:8000".to_string(),
            server_port: 3000,
            max_entries: 0,
            idle_timeout: 900,
            idle_check_interval: 30,
            upstream_timeout: 30,
        }
    }
}
