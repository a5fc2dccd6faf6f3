//! Tracing and metrics setup shared by the binaries.

use axum::{Router, routing::get};
use boxoffice_runtime::metrics::MetricsServer;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides `default_filter`.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Install the Prometheus recorder and serve `GET /metrics` until shutdown.
///
/// # Errors
///
/// Returns an error if the recorder cannot be installed or the address
/// cannot be bound.
pub async fn spawn_metrics_endpoint(
    addr: &str,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let mut server = MetricsServer::new(listener.local_addr()?);
    server.start()?;
    let server = Arc::new(server);

    let app = Router::new().route(
        "/metrics",
        get(move || {
            let server = Arc::clone(&server);
            async move { server.render().unwrap_or_default() }
        }),
    );

    tracing::info!(address = %addr, "Prometheus metrics available at /metrics");

    Ok(tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "Metrics endpoint failed");
        }
    }))
}
