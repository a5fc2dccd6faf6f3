//! Builds the production collaborators from [`Config`].

use crate::config::Config;
use boxoffice_core::environment::{Clock, SystemClock};
use boxoffice_core::queue::FinalizationQueue;
use boxoffice_postgres::PostgresReservationStore;
use boxoffice_redis::RedisAdmissionLock;
use boxoffice_redpanda::RedpandaFinalizationQueue;
use boxoffice_runtime::{
    AdmissionController, FinalizationConsumer, FinalizationDispatcher, FinalizationWorker,
    PendingSweeper, ReservationService, RetryPolicy, SimulatedIssuer,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

/// Connect to `PostgreSQL` and apply migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn connect_store(config: &Config) -> anyhow::Result<PostgresReservationStore> {
    info!("Connecting to PostgreSQL...");
    let store = PostgresReservationStore::connect(
        &config.database.url,
        config.database.max_connections,
        Duration::from_secs(config.database.connect_timeout),
    )
    .await?;
    store.migrate().await?;
    Ok(store)
}

/// Connect to Redis for the admission lock.
///
/// # Errors
///
/// Returns an error if Redis is unreachable.
pub async fn connect_lock(config: &Config) -> anyhow::Result<RedisAdmissionLock> {
    info!("Connecting to Redis admission lock...");
    let lock = RedisAdmissionLock::new(&config.lock.redis_url)
        .await?
        .with_retry_interval(config.lock.retry_interval());
    Ok(lock)
}

/// Create the Redpanda producer and consumer factory.
///
/// # Errors
///
/// Returns an error if the producer cannot be created.
pub fn connect_queue(config: &Config) -> anyhow::Result<RedpandaFinalizationQueue> {
    info!("Connecting to Redpanda finalization queue...");
    let queue = RedpandaFinalizationQueue::builder()
        .brokers(&config.queue.brokers)
        .topic(&config.queue.topic)
        .consumer_group(&config.queue.consumer_group)
        .build()?;
    Ok(queue)
}

/// Wire the service the HTTP layer calls.
#[must_use]
pub fn reservation_service(
    config: &Config,
    store: &PostgresReservationStore,
    lock: Arc<RedisAdmissionLock>,
    queue: Arc<dyn FinalizationQueue>,
) -> ReservationService {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(store.clone());
    let admission = AdmissionController::new(store.clone(), lock, clock.clone())
        .with_settings(config.lock.settings());
    let dispatcher = FinalizationDispatcher::new(queue, clock);
    ReservationService::new(store.clone(), store.clone(), store, admission, dispatcher)
}

/// Start the finalization consumer and the pending sweeper.
///
/// Both stop when `shutdown` fires.
#[must_use]
pub fn spawn_finalization(
    config: &Config,
    store: &PostgresReservationStore,
    queue: Arc<dyn FinalizationQueue>,
    shutdown: &broadcast::Sender<()>,
) -> Vec<JoinHandle<()>> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ledger = Arc::new(store.clone());

    let issuer = Arc::new(SimulatedIssuer::new(Duration::from_millis(
        config.worker.issuance_delay_ms,
    )));
    let retry = RetryPolicy::builder()
        .max_retries(config.worker.max_retries)
        .jitter(true)
        .build();
    let worker = FinalizationWorker::new(ledger.clone(), issuer, clock.clone()).with_retry_policy(retry);

    let consumer = FinalizationConsumer::new("finalization", queue.clone(), worker, shutdown.subscribe());

    let sweeper = PendingSweeper::new(
        ledger,
        FinalizationDispatcher::new(queue, clock.clone()),
        clock,
        config.sweeper.settings(),
    );

    info!(
        max_retries = config.worker.max_retries,
        sweep_interval_secs = config.sweeper.interval_secs,
        "Finalization worker and sweeper started"
    );

    vec![consumer.spawn(), sweeper.spawn(shutdown.subscribe())]
}
