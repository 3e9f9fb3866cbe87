//! Request DTOs for the cache admin API

use serde::Deserialize;

/// Query string for prefix invalidation (`DELETE /_cache?prefix=/events`)
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateQuery {
    /// Key prefix to drop
    pub prefix: String,
}

impl InvalidateQuery {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.prefix.is_empty() {
            return Some("Prefix cannot be empty".to_string());
        }
        if !self.prefix.starts_with('/') {
            return Some("Prefix must start with '/'".to_string());
        }
        None
    }
}

/// Query string for `POST /_cache/clear`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClearQuery {
    /// Drop every session instead of only the caller's
    #[serde(default)]
    pub all: bool,
}
