//! Request and Response models for the cache admin API
//!
//! This module defines the DTOs used for serializing/deserializing
//! HTTP request and response bodies of the `/_cache` and `/health` endpoints.
//! Proxied traffic passes through untouched.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{ClearQuery, InvalidateQuery};
pub use responses::{ClearResponse, HealthResponse, InvalidateResponse, StatsResponse};
