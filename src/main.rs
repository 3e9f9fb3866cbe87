//! swr_proxy - A caching read-through HTTP proxy
//!
//! Sits between a browser front-end and its REST backend, serving reads from
//! a stale-while-revalidate response cache.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use swr_proxy::api::create_router;
use swr_proxy::{spawn_idle_clear_task, AppState, Config};

/// Main entry point for the proxy.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the session cache registry and upstream client
/// 4. Start the idle clear task (unless disabled)
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swr_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting swr_proxy");

    let config = Config::from_env();
    info!(
        "Configuration loaded: upstream={}, port={}, max_entries={}, idle_timeout={}s, upstream_timeout={}s",
        config.upstream_url,
        config.server_port,
        config.max_entries,
        config.idle_timeout,
        config.upstream_timeout
    );

    let state = AppState::from_config(&config).context("failed to initialize proxy state")?;
    info!("Session caches initialized");

    let idle_handle = if config.idle_timeout > 0 {
        let handle = spawn_idle_clear_task(
            state.clone(),
            Duration::from_secs(config.idle_timeout),
            Duration::from_secs(config.idle_check_interval),
        );
        info!("Idle clear task started");
        Some(handle)
    } else {
        info!("Idle clear disabled");
        None
    };

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Proxy listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(idle_handle))
        .await
        .context("server error")?;

    info!("Proxy shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the idle task and allows graceful shutdown.
async fn shutdown_signal(idle_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = idle_handle {
        handle.abort();
        warn!("Idle clear task aborted");
    }
}
