//! Integration Tests for the Caching Proxy
//!
//! Drives the router end to end against a mock upstream bound to an
//! ephemeral port. A manual clock moves entries across the fresh and stale
//! windows without sleeping. Requests carry `Bearer alice` unless a test
//! says otherwise.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, Request, StatusCode, Uri},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use swr_proxy::{
    api::{create_router, X_CACHE},
    cache::{session_id, ManualClock, ResponseCache, SessionCaches},
    upstream::UpstreamClient,
    AppState,
};
use tower::ServiceExt;

// == Mock Upstream ==

#[derive(Clone, Default)]
struct Backend {
    hits: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl Backend {
    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn next(&self) -> usize {
        self.hits.fetch_add(1, Ordering::SeqCst) + 1
    }
}

async fn versioned(State(backend): State<Backend>) -> impl IntoResponse {
    if backend.failing.load(Ordering::SeqCst) {
        backend.next();
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "boom"})));
    }
    let version = backend.next();
    (StatusCode::OK, Json(json!({"version": version})))
}

async fn created(State(backend): State<Backend>) -> impl IntoResponse {
    backend.next();
    (StatusCode::CREATED, Json(json!({"status": "going"})))
}

async fn whoami(State(backend): State<Backend>, headers: HeaderMap) -> impl IntoResponse {
    let Some(token) = headers.get(header::AUTHORIZATION) else {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "login required"})));
    };
    let version = backend.next();
    let token = token.to_str().unwrap().to_string();
    (StatusCode::OK, Json(json!({"token": token, "version": version})))
}

async fn echo_query(State(backend): State<Backend>, uri: Uri) -> Json<Value> {
    backend.next();
    Json(json!({"query": uri.query().unwrap_or("")}))
}

async fn html(State(backend): State<Backend>) -> impl IntoResponse {
    backend.next();
    ([(header::CONTENT_TYPE, "text/html")], "<h1>roster</h1>")
}

async fn spawn_backend() -> (String, Backend) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/events", get(versioned))
        .route("/events/:id/rsvp", post(created))
        .route("/inventory", get(versioned))
        .route("/users/:id/audit", get(versioned))
        .route("/roster", get(html))
        .route("/whoami", get(whoami))
        .route("/echo", get(echo_query))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), backend)
}

struct Harness {
    app: Router,
    state: AppState,
    clock: ManualClock,
    backend: Backend,
}

async fn harness() -> Harness {
    let (base_url, backend) = spawn_backend().await;
    let clock = ManualClock::new(1_700_000_000_000);
    let sessions = SessionCaches::with_clock(Arc::new(clock.clone()));
    let upstream = UpstreamClient::new(base_url, Duration::from_secs(5)).unwrap();
    let state = AppState::new(sessions, upstream);

    Harness {
        app: create_router(state.clone()),
        state,
        clock,
        backend,
    }
}

const ALICE: &str = "Bearer alice";
const BOB: &str = "Bearer bob";

fn session_of(authorization: &str) -> String {
    session_id(authorization.as_bytes()).unwrap()
}

impl Harness {
    async fn request(
        &self,
        method: &str,
        uri: &str,
        authorization: Option<&str>,
    ) -> (StatusCode, String, Bytes) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(authorization) = authorization {
            builder = builder.header(header::AUTHORIZATION, authorization);
        }
        let response = self
            .app
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let cache = response
            .headers()
            .get(X_CACHE)
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, cache, bytes)
    }

    async fn send_as(
        &self,
        method: &str,
        uri: &str,
        authorization: Option<&str>,
    ) -> (StatusCode, String, Value) {
        let (status, cache, bytes) = self.request(method, uri, authorization).await;
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, cache, body)
    }

    async fn send(&self, method: &str, uri: &str) -> (StatusCode, String, Value) {
        self.send_as(method, uri, Some(ALICE)).await
    }

    async fn get(&self, uri: &str) -> (StatusCode, String, Value) {
        self.send("GET", uri).await
    }

    /// Entries cached across every session.
    async fn cached(&self) -> usize {
        self.state.sessions.read().await.len()
    }

    async fn wait_for_revalidations(&self) {
        for _ in 0..200 {
            if self.state.sessions.read().await.stats().pending_revalidations == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("background revalidation did not finish");
    }
}

// == Read-through ==

#[tokio::test]
async fn test_miss_then_fresh_hit() {
    let h = harness().await;

    let (status, cache, body) = h.get("/events").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache, "MISS");
    assert_eq!(body, json!({"version": 1}));

    h.clock.advance_secs(10);
    let (status, cache, body) = h.get("/events").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache, "HIT");
    assert_eq!(body, json!({"version": 1}));

    assert_eq!(h.backend.hits(), 1);
}

#[tokio::test]
async fn test_stale_served_while_revalidating() {
    let h = harness().await;
    h.get("/events").await;

    h.clock.advance_secs(45);
    let (_, cache, body) = h.get("/events").await;
    assert_eq!(cache, "STALE");
    assert_eq!(body, json!({"version": 1}));

    h.wait_for_revalidations().await;
    assert_eq!(h.backend.hits(), 2);

    // The refresh was stored at the current instant, so it is fresh again.
    let (_, cache, body) = h.get("/events").await;
    assert_eq!(cache, "HIT");
    assert_eq!(body, json!({"version": 2}));
}

#[tokio::test]
async fn test_expired_entry_refetched() {
    let h = harness().await;
    h.get("/events").await;

    h.clock.advance_secs(91);
    let (_, cache, body) = h.get("/events").await;
    assert_eq!(cache, "MISS");
    assert_eq!(body, json!({"version": 2}));

    let stats = h.state.sessions.read().await.stats();
    assert_eq!(stats.expirations, 1);
}

#[tokio::test]
async fn test_query_order_shares_entry() {
    let h = harness().await;

    let (_, cache, _) = h.get("/events?b=2&a=1").await;
    assert_eq!(cache, "MISS");
    let (_, cache, _) = h.get("/events?a=1&b=2").await;
    assert_eq!(cache, "HIT");

    let mut sessions = h.state.sessions.write().await;
    let cache: &mut ResponseCache = sessions.get_mut(&session_of(ALICE)).unwrap();
    assert!(cache.lookup("/events?a=1&b=2").is_some());
    drop(sessions);
    assert_eq!(h.backend.hits(), 1);
}

#[tokio::test]
async fn test_encoded_query_does_not_collide() {
    let h = harness().await;

    let (_, cache, body) = h.get("/echo?a=1%26b%3D2").await;
    assert_eq!(cache, "MISS");
    assert_eq!(body["query"], "a=1%26b%3D2");

    let (_, cache, body) = h.get("/echo?a=1&b=2").await;
    assert_eq!(cache, "MISS");
    assert_eq!(body["query"], "a=1&b=2");

    let (_, cache, body) = h.get("/echo?a=1%26b%3D2").await;
    assert_eq!(cache, "HIT");
    assert_eq!(body["query"], "a=1%26b%3D2");
    assert_eq!(h.backend.hits(), 2);
}

#[tokio::test]
async fn test_sensitive_path_bypasses_cache() {
    let h = harness().await;

    let (status, cache, _) = h.get("/users/42/audit").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache, "BYPASS");
    let (_, cache, _) = h.get("/users/42/audit").await;
    assert_eq!(cache, "BYPASS");

    assert_eq!(h.backend.hits(), 2);
    assert_eq!(h.cached().await, 0);
}

#[tokio::test]
async fn test_non_json_response_not_cached() {
    let h = harness().await;

    let (status, cache, _) = h.get("/roster").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache, "MISS");
    let (_, cache, _) = h.get("/roster").await;
    assert_eq!(cache, "MISS");

    assert_eq!(h.backend.hits(), 2);
}

#[tokio::test]
async fn test_upstream_error_passes_through_uncached() {
    let h = harness().await;
    h.backend.failing.store(true, Ordering::SeqCst);

    let (status, cache, _) = h.get("/events").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(cache, "MISS");
    assert_eq!(h.cached().await, 0);
}

// == Per-caller isolation ==

#[tokio::test]
async fn test_callers_never_share_entries() {
    let h = harness().await;

    let (status, cache, body) = h.send_as("GET", "/whoami", Some(ALICE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache, "MISS");
    assert_eq!(body["token"], ALICE);

    // Anonymous callers reach upstream directly, never a cached copy.
    let (status, cache, body) = h.send_as("GET", "/whoami", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(cache, "BYPASS");
    assert_ne!(body["token"], ALICE);

    let (status, cache, body) = h.send_as("GET", "/whoami", Some(BOB)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache, "MISS");
    assert_eq!(body["token"], BOB);

    let (_, cache, body) = h.send_as("GET", "/whoami", Some(ALICE)).await;
    assert_eq!(cache, "HIT");
    assert_eq!(body["token"], ALICE);
    let (_, cache, body) = h.send_as("GET", "/whoami", Some(BOB)).await;
    assert_eq!(cache, "HIT");
    assert_eq!(body["token"], BOB);

    assert_eq!(h.state.sessions.read().await.session_count(), 2);
}

#[tokio::test]
async fn test_logout_clears_only_that_caller() {
    let h = harness().await;
    h.send_as("GET", "/whoami", Some(ALICE)).await;
    h.send_as("GET", "/whoami", Some(BOB)).await;

    let (status, _, body) = h.send_as("POST", "/_cache/clear", Some(ALICE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dropped"], 1);

    let (_, cache, body) = h.send_as("GET", "/whoami", Some(BOB)).await;
    assert_eq!(cache, "HIT");
    assert_eq!(body["token"], BOB);
    let (_, cache, body) = h.send_as("GET", "/whoami", Some(ALICE)).await;
    assert_eq!(cache, "MISS");
    assert_eq!(body["token"], ALICE);
}

#[tokio::test]
async fn test_mutation_invalidates_every_caller() {
    let h = harness().await;
    h.send_as("GET", "/events", Some(ALICE)).await;
    h.send_as("GET", "/events", Some(BOB)).await;

    let (status, _, _) = h.send_as("POST", "/events/5/rsvp", Some(BOB)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, cache, _) = h.send_as("GET", "/events", Some(ALICE)).await;
    assert_eq!(cache, "MISS");
}

// == HEAD ==

#[tokio::test]
async fn test_head_served_from_cache_without_body() {
    let h = harness().await;
    h.get("/events").await;

    let (status, cache, bytes) = h.request("HEAD", "/events", Some(ALICE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache, "HIT");
    assert!(bytes.is_empty());
    assert_eq!(h.backend.hits(), 1);
}

#[tokio::test]
async fn test_head_miss_is_forwarded_and_not_stored() {
    let h = harness().await;

    let (status, cache, bytes) = h.request("HEAD", "/inventory", Some(ALICE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache, "MISS");
    assert!(bytes.is_empty());
    assert_eq!(h.cached().await, 0);

    let (_, cache, body) = h.get("/inventory").await;
    assert_eq!(cache, "MISS");
    assert_eq!(body, json!({"version": 2}));
}

#[tokio::test]
async fn test_stale_head_schedules_refresh() {
    let h = harness().await;
    h.get("/events").await;
    h.clock.advance_secs(45);

    let (_, cache, bytes) = h.request("HEAD", "/events", Some(ALICE)).await;
    assert_eq!(cache, "STALE");
    assert!(bytes.is_empty());
    h.wait_for_revalidations().await;

    let (_, cache, body) = h.get("/events").await;
    assert_eq!(cache, "HIT");
    assert_eq!(body, json!({"version": 2}));
}

// == Revalidation failure ==

#[tokio::test]
async fn test_failed_refresh_keeps_entry_and_allows_retry() {
    let h = harness().await;
    h.get("/events").await;

    h.backend.failing.store(true, Ordering::SeqCst);
    h.clock.advance_secs(45);

    let (_, cache, body) = h.get("/events").await;
    assert_eq!(cache, "STALE");
    assert_eq!(body, json!({"version": 1}));
    h.wait_for_revalidations().await;
    assert_eq!(h.backend.hits(), 2);

    // Not poisoned: the old entry stays and the next reader retries.
    let (_, cache, body) = h.get("/events").await;
    assert_eq!(cache, "STALE");
    assert_eq!(body, json!({"version": 1}));
    h.wait_for_revalidations().await;
    assert_eq!(h.backend.hits(), 3);
}

// == Mutations ==

#[tokio::test]
async fn test_mutation_invalidates_resource_family() {
    let h = harness().await;
    h.get("/events").await;
    h.get("/events?page=2").await;
    h.get("/inventory").await;
    assert_eq!(h.cached().await, 3);

    let (status, cache, body) = h.send("POST", "/events/5/rsvp").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(cache, "BYPASS");
    assert_eq!(body, json!({"status": "going"}));

    assert_eq!(h.cached().await, 1);
    let (_, cache, _) = h.get("/inventory").await;
    assert_eq!(cache, "HIT");
    let (_, cache, _) = h.get("/events").await;
    assert_eq!(cache, "MISS");
}

#[tokio::test]
async fn test_failed_mutation_keeps_cache() {
    let h = harness().await;
    h.get("/events").await;

    // No PUT route on the mock: upstream answers 405.
    let (status, _, _) = h.send("PUT", "/events").await;
    assert!(!status.is_success());

    let (_, cache, _) = h.get("/events").await;
    assert_eq!(cache, "HIT");
}

// == Admin endpoints ==

#[tokio::test]
async fn test_clear_endpoint_drops_callers_session() {
    let h = harness().await;
    h.get("/events").await;
    h.get("/inventory").await;

    let (status, _, body) = h.send("POST", "/_cache/clear").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dropped"], 2);
    assert_eq!(h.state.sessions.read().await.session_count(), 0);

    let (_, cache, _) = h.get("/events").await;
    assert_eq!(cache, "MISS");
}

#[tokio::test]
async fn test_clear_all_endpoint() {
    let h = harness().await;
    h.send_as("GET", "/events", Some(ALICE)).await;
    h.send_as("GET", "/events", Some(BOB)).await;

    let (status, _, body) = h.send_as("POST", "/_cache/clear?all=true", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dropped"], 2);
    assert_eq!(h.cached().await, 0);
}

#[tokio::test]
async fn test_invalidate_endpoint() {
    let h = harness().await;
    h.get("/events").await;
    h.get("/inventory").await;

    let (status, _, body) = h.send("DELETE", "/_cache?prefix=/inv").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);

    let (_, cache, _) = h.get("/events").await;
    assert_eq!(cache, "HIT");
}

#[tokio::test]
async fn test_stats_endpoint_counts_lookups() {
    let h = harness().await;
    h.get("/events").await;
    h.get("/events").await;
    h.clock.advance_secs(40);
    h.get("/events").await;
    h.wait_for_revalidations().await;

    let (status, _, body) = h.get("/_cache/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["misses"], 1);
    assert_eq!(body["fresh_hits"], 1);
    assert_eq!(body["stale_hits"], 1);
    assert_eq!(body["total_entries"], 1);
    assert_eq!(body["pending_revalidations"], 0);
    assert_eq!(body["sessions"], 1);
}

#[tokio::test]
async fn test_health_endpoint() {
    let h = harness().await;
    let (status, _, body) = h.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}
