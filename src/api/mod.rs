//! API Module
//!
//! The request layer in front of the response cache: a read-through proxy
//! plus admin endpoints.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /_cache/stats` - Cache statistics
//! - `DELETE /_cache?prefix=/x` - Invalidate by key prefix
//! - `POST /_cache/clear` - Clear the cache (logout hook)
//! - everything else - Proxied upstream

pub mod handlers;
pub mod revalidate;
pub mod routes;

pub use handlers::*;
pub use revalidate::schedule_revalidation;
pub use routes::create_router;
