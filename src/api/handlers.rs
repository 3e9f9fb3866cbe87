//! API Handlers
//!
//! The read-through proxy handler plus the `/_cache` admin endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use super::revalidate::schedule_revalidation;
use crate::cache::{
    build_key, is_cacheable, query_pairs, resource_prefix, session_id, Lookup, SessionCaches,
};
use crate::config::Config;
use crate::error::{ProxyError, Result};
use crate::models::{
    ClearQuery, ClearResponse, HealthResponse, InvalidateQuery, InvalidateResponse, StatsResponse,
};
use crate::upstream::{UpstreamClient, UpstreamResponse};

/// Response header reporting how the cache handled a request.
pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Value of [`X_CACHE`] for each cache decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from memory, fresh
    Hit,
    /// Served from memory while a refresh runs
    Stale,
    /// Fetched upstream, stored when cacheable
    Miss,
    /// Never consulted the cache
    Bypass,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Stale => "STALE",
            CacheStatus::Miss => "MISS",
            CacheStatus::Bypass => "BYPASS",
        }
    }
}

/// Application state shared across all handlers.
///
/// Each response cache is single-owner by contract, so the per-session
/// registry sits behind one `Arc<RwLock<>>` and is never locked across an
/// upstream call.
#[derive(Clone)]
pub struct AppState {
    /// Response caches, one per caller credential
    pub sessions: Arc<RwLock<SessionCaches>>,
    /// Backend client
    pub upstream: UpstreamClient,
}

impl AppState {
    /// Creates a new AppState around an existing session registry.
    pub fn new(sessions: SessionCaches, upstream: UpstreamClient) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(sessions)),
            upstream,
        }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let sessions = SessionCaches::new().with_max_entries(config.max_entries);
        let upstream = UpstreamClient::new(
            config.upstream_url.clone(),
            Duration::from_secs(config.upstream_timeout),
        )?;
        Ok(Self::new(sessions, upstream))
    }
}

/// Session fingerprint of the request's `Authorization` header, if any.
fn request_session(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| session_id(value.as_bytes()))
}

/// Fallback handler: every path not claimed by the admin routes.
///
/// `GET` and `HEAD` go through the caller's session cache; mutating methods
/// are forwarded and then invalidate their resource family in every session.
pub async fn proxy_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let path = uri.path();
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or(path);
    let session = request_session(&headers);

    if method == Method::GET || method == Method::HEAD {
        let request = ReadRequest {
            method: &method,
            path,
            query: uri.query().unwrap_or(""),
            path_and_query,
            headers: &headers,
        };
        return read_through(&state, session.as_deref(), request).await;
    }

    let upstream = state
        .upstream
        .send(method.clone(), path_and_query, &headers, body)
        .await?;

    if is_mutating(&method) && upstream.status.is_success() {
        let prefix = resource_prefix(path);
        let mut sessions = state.sessions.write().await;
        if let Some(id) = &session {
            sessions.touch(id);
        }
        let removed = sessions.invalidate_by_prefix(prefix);
        debug!(%method, path, prefix, removed, "invalidated after mutation");
    }

    Ok(upstream_response(upstream, CacheStatus::Bypass))
}

struct ReadRequest<'a> {
    method: &'a Method,
    path: &'a str,
    query: &'a str,
    path_and_query: &'a str,
    headers: &'a HeaderMap,
}

async fn read_through(
    state: &AppState,
    session: Option<&str>,
    request: ReadRequest<'_>,
) -> Result<Response> {
    let head = *request.method == Method::HEAD;

    // Anonymous callers and sensitive paths never touch a cache.
    let Some(session) = session.filter(|_| is_cacheable(request.path)) else {
        debug!(path = request.path, "bypassing cache");
        let upstream = state
            .upstream
            .send(
                request.method.clone(),
                request.path_and_query,
                request.headers,
                Bytes::new(),
            )
            .await?;
        return Ok(upstream_response(upstream, CacheStatus::Bypass));
    };

    let key = build_key(request.path, query_pairs(request.query));
    let hit = state.sessions.write().await.session(session).lookup(&key);

    match hit {
        Some(Lookup { data, fresh: true }) => Ok(cached_response(&data, CacheStatus::Hit, head)),
        Some(Lookup { data, fresh: false }) => {
            schedule_revalidation(
                state,
                session.to_string(),
                key,
                request.path_and_query.to_string(),
                request.headers.clone(),
            )
            .await;
            Ok(cached_response(&data, CacheStatus::Stale, head))
        }
        None if head => {
            let upstream = state
                .upstream
                .send(Method::HEAD, request.path_and_query, request.headers, Bytes::new())
                .await?;
            Ok(upstream_response(upstream, CacheStatus::Miss))
        }
        None => {
            let upstream = state
                .upstream
                .get(request.path_and_query, request.headers)
                .await?;
            if let Some(data) = upstream.cacheable_json() {
                // A session ended while the fetch was in flight stays ended.
                if let Some(cache) = state.sessions.write().await.get_mut(session) {
                    cache.store(key, data);
                }
            }
            Ok(upstream_response(upstream, CacheStatus::Miss))
        }
    }
}

fn is_mutating(method: &Method) -> bool {
    *method == Method::POST
        || *method == Method::PUT
        || *method == Method::PATCH
        || *method == Method::DELETE
}

fn cached_response(data: &Value, status: CacheStatus, head: bool) -> Response {
    let mut response = Json(data).into_response();
    response
        .headers_mut()
        .insert(X_CACHE, HeaderValue::from_static(status.as_str()));
    if head {
        let (parts, _) = response.into_parts();
        return Response::from_parts(parts, Body::empty());
    }
    response
}

fn upstream_response(upstream: UpstreamResponse, status: CacheStatus) -> Response {
    let mut response = (upstream.status, upstream.body).into_response();
    let headers = response.headers_mut();
    match upstream.content_type {
        Some(content_type) => {
            headers.insert(header::CONTENT_TYPE, content_type);
        }
        None => {
            headers.remove(header::CONTENT_TYPE);
        }
    }
    headers.insert(X_CACHE, HeaderValue::from_static(status.as_str()));
    response
}

/// Handler for GET /_cache/stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let sessions = state.sessions.read().await;
    Json(StatsResponse::new(sessions.stats(), sessions.session_count()))
}

/// Handler for DELETE /_cache?prefix=...
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Query(query): Query<InvalidateQuery>,
) -> Result<Json<InvalidateResponse>> {
    if let Some(error_msg) = query.validate() {
        return Err(ProxyError::InvalidRequest(error_msg));
    }

    let removed = state
        .sessions
        .write()
        .await
        .invalidate_by_prefix(&query.prefix);
    Ok(Json(InvalidateResponse::new(query.prefix, removed)))
}

/// Handler for POST /_cache/clear
///
/// Session boundary hook: called on logout with the caller's credentials,
/// it drops that session's cache and leaves other callers alone.
/// `?all=true` drops every session.
pub async fn clear_handler(
    State(state): State<AppState>,
    Query(query): Query<ClearQuery>,
    headers: HeaderMap,
) -> Result<Json<ClearResponse>> {
    let mut sessions = state.sessions.write().await;

    if query.all {
        let dropped = sessions.clear_all();
        return Ok(Json(ClearResponse::new(dropped)));
    }

    let session = request_session(&headers).ok_or_else(|| {
        ProxyError::InvalidRequest("Authorization header required to end a session".to_string())
    })?;
    let dropped = sessions.end_session(&session);
    Ok(Json(ClearResponse::new(dropped)))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
