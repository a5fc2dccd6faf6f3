//! Periodic re-enqueue of PENDING reservations whose job was lost.
//!
//! A reservation can stay PENDING forever if the dispatcher's enqueue failed
//! or the broker dropped the message. The sweeper finds reservations that
//! have been PENDING longer than `stale_after` and dispatches them again. The
//! worker's idempotence makes duplicate jobs harmless.

use crate::dispatcher::FinalizationDispatcher;
use crate::metrics::FinalizationMetrics;
use boxoffice_core::environment::Clock;
use boxoffice_core::ledger::ReservationLedger;
use boxoffice_core::{DateTime, StoreError, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Sweeper tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweeperSettings {
    /// Time between sweeps
    pub interval: Duration,
    /// Minimum age of a PENDING reservation before it is re-enqueued
    pub stale_after: Duration,
    /// Maximum reservations re-enqueued per sweep
    pub batch_size: u32,
}

impl Default for SweeperSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            stale_after: Duration::from_secs(300),
            batch_size: 100,
        }
    }
}

/// Re-enqueues stale PENDING reservations.
pub struct PendingSweeper {
    ledger: Arc<dyn ReservationLedger>,
    dispatcher: FinalizationDispatcher,
    clock: Arc<dyn Clock>,
    settings: SweeperSettings,
}

impl PendingSweeper {
    /// Create a sweeper.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn ReservationLedger>,
        dispatcher: FinalizationDispatcher,
        clock: Arc<dyn Clock>,
        settings: SweeperSettings,
    ) -> Self {
        Self {
            ledger,
            dispatcher,
            clock,
            settings,
        }
    }

    fn cutoff(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        chrono::Duration::from_std(self.settings.stale_after)
            .ok()
            .and_then(|age| now.checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Run one sweep. Returns how many jobs the queue accepted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if stale reservations cannot be listed.
    pub async fn sweep_once(&self) -> Result<usize, StoreError> {
        let stale = self
            .ledger
            .list_stale_pending(self.cutoff(), self.settings.batch_size)
            .await?;
        if stale.is_empty() {
            debug!("No stale PENDING reservations");
            return Ok(0);
        }

        let mut requeued = 0;
        for reservation_id in &stale {
            if self.dispatcher.dispatch(*reservation_id).await {
                requeued += 1;
            }
        }
        FinalizationMetrics::record_requeued(requeued);
        info!(found = stale.len(), requeued, "Re-enqueued stale PENDING reservations");
        Ok(requeued)
    }

    /// Run the sweeper on a background task.
    #[must_use]
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run(shutdown).await;
        })
    }

    /// Sweep every `interval` until shutdown.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.settings.interval.as_secs(),
            stale_after_secs = self.settings.stale_after.as_secs(),
            "Pending sweeper started"
        );
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        error!(error = %e, "Sweep failed");
                    }
                }
            }
        }

        info!("Pending sweeper stopped");
    }
}
