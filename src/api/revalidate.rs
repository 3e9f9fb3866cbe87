//! Background Revalidation
//!
//! Refreshes stale keys without blocking the request that observed them.
//! At most one refresh per key runs at a time within a session, and the
//! key's marker is released on every exit path: success, upstream failure,
//! or the task being dropped mid-flight.

use std::sync::Arc;

use axum::http::HeaderMap;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::handlers::AppState;
use crate::cache::SessionCaches;

// == Revalidation Guard ==
/// Holds a session key's revalidation marker until released.
///
/// Dropping an unreleased guard schedules the marker's removal on the
/// current runtime, so a cancelled or panicking refresh cannot leave the key
/// marked forever.
struct RevalidationGuard {
    sessions: Arc<RwLock<SessionCaches>>,
    session: String,
    key: Option<String>,
}

impl RevalidationGuard {
    fn new(sessions: Arc<RwLock<SessionCaches>>, session: String, key: String) -> Self {
        Self {
            sessions,
            session,
            key: Some(key),
        }
    }

    /// Releases the marker using a lock the caller already holds.
    ///
    /// A session that ended meanwhile took its markers with it.
    fn release(mut self, sessions: &mut SessionCaches) {
        if let Some(key) = self.key.take() {
            if let Some(cache) = sessions.get_mut(&self.session) {
                cache.clear_revalidating(&key);
            }
        }
    }
}

impl Drop for RevalidationGuard {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };
        let sessions = self.sessions.clone();
        let session = std::mem::take(&mut self.session);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Some(cache) = sessions.write().await.get_mut(&session) {
                        cache.clear_revalidating(&key);
                    }
                });
            }
            Err(_) => {
                if let Ok(mut sessions) = sessions.try_write() {
                    if let Some(cache) = sessions.get_mut(&session) {
                        cache.clear_revalidating(&key);
                    }
                }
            }
        }
    }
}

// == Schedule Revalidation ==
/// Starts a background refresh of `key` in `session` unless one is already
/// running.
///
/// `path_and_query` is the original request target; the key itself is a
/// normalized form and is not sent upstream. `headers` are the observing
/// request's, so the refresh runs with the same credentials that own the
/// session. Returns the task handle when a refresh was started.
pub async fn schedule_revalidation(
    state: &AppState,
    session: String,
    key: String,
    path_and_query: String,
    headers: HeaderMap,
) -> Option<JoinHandle<()>> {
    {
        let mut sessions = state.sessions.write().await;
        let cache = sessions.get_mut(&session)?;
        if cache.is_revalidating(&key) {
            debug!(key = %key, "revalidation already in flight");
            return None;
        }
        cache.mark_revalidating(&key);
    }

    let guard = RevalidationGuard::new(state.sessions.clone(), session.clone(), key.clone());
    let state = state.clone();

    Some(tokio::spawn(async move {
        let outcome = state.upstream.get(&path_and_query, &headers).await;

        let mut sessions = state.sessions.write().await;
        match (outcome, sessions.get_mut(&session)) {
            (_, None) => {
                debug!(key = %key, "session ended during revalidation; result dropped");
            }
            (Ok(response), Some(cache)) => match response.cacheable_json() {
                Some(data) => {
                    // A refresh that began before a mutation can land
                    // pre-mutation data here as fresh; last writer wins.
                    cache.store(key.clone(), data);
                    debug!(key = %key, "revalidated cache entry");
                }
                None => {
                    warn!(key = %key, status = %response.status, "revalidation returned uncacheable response");
                }
            },
            (Err(e), Some(_)) => {
                warn!(key = %key, error = %e, "revalidation failed");
            }
        }
        guard.release(&mut sessions);
    }))
}
