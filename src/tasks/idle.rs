//! Idle Clear Task
//!
//! Background task that ends session caches once their caller has been quiet
//! for a while, so cached data does not outlive an abandoned session.
//! Expired entries are otherwise only dropped lazily on lookup.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::AppState;

/// Spawns a task that ends every session idle for longer than `idle_timeout`.
///
/// Every `check_interval` the task asks the session registry to drop
/// sessions whose last request is older than `idle_timeout`. Active
/// sessions are untouched.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let handle = spawn_idle_clear_task(state.clone(), Duration::from_secs(900), Duration::from_secs(30));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_idle_clear_task(
    state: AppState,
    idle_timeout: Duration,
    check_interval: Duration,
) -> JoinHandle<()> {
    let idle_timeout_ms = idle_timeout.as_millis() as u64;

    tokio::spawn(async move {
        info!(
            "Starting idle clear task: timeout {:?}, check interval {:?}",
            idle_timeout, check_interval
        );

        loop {
            tokio::time::sleep(check_interval).await;

            let (ended, dropped) = {
                let mut sessions = state.sessions.write().await;
                let before = sessions.session_count();
                let dropped = sessions.evict_idle(idle_timeout_ms);
                (before - sessions.session_count(), dropped)
            };

            if ended > 0 {
                info!(
                    "Ended {} idle sessions: cleared {} cached responses",
                    ended, dropped
                );
            } else {
                debug!("No idle sessions");
            }
        }
    })
}
