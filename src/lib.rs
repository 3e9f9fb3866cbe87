//! swr_proxy - A caching read-through HTTP proxy
//!
//! Serves JSON reads from a stale-while-revalidate response cache, refreshes
//! stale entries in the background, bypasses the cache for sensitive paths,
//! and invalidates by resource prefix after mutations.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;
pub mod upstream;

pub use api::AppState;
pub use cache::{ResponseCache, SessionCaches};
pub use config::Config;
pub use tasks::spawn_idle_clear_task;
