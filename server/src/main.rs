//! Box Office HTTP server.
//!
//! Serves the reservation API. With `EMBEDDED_WORKER=true` (the default) it
//! also runs the finalization consumer and the pending sweeper.

use boxoffice_core::queue::FinalizationQueue;
use boxoffice_server::{Config, shutdown, telemetry, wiring};
use boxoffice_web::{AppState, build_router};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing("boxoffice=info,tower_http=debug");

    info!("Starting Box Office HTTP server");

    let config = Config::from_env();
    info!(
        redis_url = %config.lock.redis_url,
        redpanda_brokers = %config.queue.brokers,
        embedded_worker = config.worker.embedded,
        "Configuration loaded"
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let store = wiring::connect_store(&config).await?;
    let lock = Arc::new(wiring::connect_lock(&config).await?);
    let queue: Arc<dyn FinalizationQueue> = Arc::new(wiring::connect_queue(&config)?);

    let mut background =
        vec![telemetry::spawn_metrics_endpoint(&config.metrics_addr(), shutdown_tx.subscribe()).await?];
    if config.worker.embedded {
        background.extend(wiring::spawn_finalization(&config, &store, queue.clone(), &shutdown_tx));
    }

    let service = wiring::reservation_service(&config, &store, lock, queue);
    let app = build_router(AppState::new(service));

    let addr = config.http_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Server listening");

    let mut http_shutdown = shutdown_tx.subscribe();
    tokio::spawn(shutdown::broadcast_on_signal(shutdown_tx));

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = http_shutdown.recv().await;
        })
        .await?;

    shutdown::join_all(background, Duration::from_secs(config.server.shutdown_timeout)).await;
    info!("Server stopped");
    Ok(())
}
