//! Graceful shutdown on Ctrl+C or SIGTERM.

use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Resolve on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}

/// Wait for the signal, then tell every background task to stop.
pub async fn broadcast_on_signal(shutdown: broadcast::Sender<()>) {
    shutdown_signal().await;
    // No receivers left means everything already stopped.
    let _ = shutdown.send(());
}

/// Join background tasks, giving up after `timeout`.
pub async fn join_all(handles: Vec<JoinHandle<()>>, timeout: Duration) {
    let joined = tokio::time::timeout(timeout, async {
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
    })
    .await;

    if joined.is_err() {
        warn!(timeout_secs = timeout.as_secs(), "Background tasks did not stop before the shutdown timeout");
    }
}
