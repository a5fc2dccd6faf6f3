//! Box Office finalization worker.
//!
//! Consumes finalization jobs and sweeps stale PENDING reservations. Run as
//! many copies as needed; they share partitions through the consumer group.

use boxoffice_core::queue::FinalizationQueue;
use boxoffice_server::{Config, shutdown, telemetry, wiring};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing("boxoffice=info");

    info!("Starting Box Office finalization worker");

    let config = Config::from_env();
    info!(
        redpanda_brokers = %config.queue.brokers,
        topic = %config.queue.topic,
        consumer_group = %config.queue.consumer_group,
        "Configuration loaded"
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let store = wiring::connect_store(&config).await?;
    let queue: Arc<dyn FinalizationQueue> = Arc::new(wiring::connect_queue(&config)?);

    let mut background =
        vec![telemetry::spawn_metrics_endpoint(&config.metrics_addr(), shutdown_tx.subscribe()).await?];
    background.extend(wiring::spawn_finalization(&config, &store, queue, &shutdown_tx));

    shutdown::broadcast_on_signal(shutdown_tx).await;

    shutdown::join_all(background, Duration::from_secs(config.server.shutdown_timeout)).await;
    info!("Worker stopped");
    Ok(())
}
