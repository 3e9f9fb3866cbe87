//! Cacheability Policy
//!
//! Path prefixes whose responses carry credentials, personal, health or
//! audit data. Callers check [`is_cacheable`] before any lookup or store;
//! the store itself does not filter.
//!
//! The table is maintained by hand and must track which backend routes
//! return sensitive data.

/// Request paths that must never be served from or written to the cache.
pub const UNCACHEABLE_PREFIXES: &[&str] = &[
    // Authentication and session
    "/auth",
    // Per-user profile, audit and account records
    "/users/",
    // Security alerts
    "/security",
    // The caller's own roles and permissions
    "/roles/me",
    "/permissions/me",
    // Per-user notification state
    "/notifications",
    // Health waivers
    "/health-waivers",
    "/medical",
    // Per-user training records
    "/training/submissions",
    "/training/shift-reports",
    "/training/stats",
    "/training/reports",
    "/training/me",
    // Emergency contacts
    "/emergency-contacts",
];

// == Is Cacheable ==
/// Returns false when `url` starts with any entry of [`UNCACHEABLE_PREFIXES`].
pub fn is_cacheable(url: &str) -> bool {
    !UNCACHEABLE_PREFIXES
        .iter()
        .any(|prefix| url.starts_with(prefix))
}
