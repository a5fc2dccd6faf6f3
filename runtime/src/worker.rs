//! Finalization worker and its queue consumer.
//!
//! [`FinalizationWorker::process`] is idempotent: a reservation that is absent
//! or already FINALIZED is acknowledged without issuing again. Failures leave
//! the reservation PENDING and the delivery is nacked for redelivery.
//!
//! # Pattern: Subscribe-Process-Reconnect Loop
//!
//! ```text
//! loop {
//!     subscribe
//!     for each delivery:
//!         process → ack | nack
//!     stream ended or subscribe failed → sleep(retry_delay)
//! } until shutdown
//! ```

use crate::metrics::FinalizationMetrics;
use crate::retry::{RetryPolicy, retry_with_backoff};
use boxoffice_core::environment::Clock;
use boxoffice_core::issuance::{IssuanceError, TicketIssuer};
use boxoffice_core::ledger::ReservationLedger;
use boxoffice_core::queue::{FinalizationQueue, JobStream};
use boxoffice_core::{ReservationId, StoreError};
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Errors that leave a reservation PENDING.
///
/// Never surfaced to the reservation caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FinalizationError {
    /// Ledger read or update failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Issuance failed after retries
    #[error(transparent)]
    Issuance(#[from] IssuanceError),
}

/// What `process` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Issued and moved to FINALIZED
    Finalized,
    /// Already FINALIZED; nothing issued
    AlreadyFinalized,
    /// No such reservation; nothing created
    Missing,
}

impl FinalizeOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Finalized => "finalized",
            Self::AlreadyFinalized => "already_finalized",
            Self::Missing => "missing",
        }
    }
}

/// Performs issuance and the PENDING → FINALIZED transition.
#[derive(Clone)]
pub struct FinalizationWorker {
    ledger: Arc<dyn ReservationLedger>,
    issuer: Arc<dyn TicketIssuer>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl FinalizationWorker {
    /// Create a worker with the default issuance retry policy.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn ReservationLedger>,
        issuer: Arc<dyn TicketIssuer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            issuer,
            clock,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the issuance retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Finalize one reservation.
    ///
    /// # Errors
    ///
    /// Returns [`FinalizationError`] if the ledger fails or issuance keeps
    /// failing after retries. The reservation stays PENDING.
    pub async fn process(&self, reservation_id: ReservationId) -> Result<FinalizeOutcome, FinalizationError> {
        let result = self.finalize(reservation_id).await;
        match &result {
            Ok(outcome) => {
                FinalizationMetrics::record_outcome(outcome.as_str());
                debug!(reservation_id = %reservation_id, outcome = outcome.as_str(), "Finalization processed");
            }
            Err(e) => {
                FinalizationMetrics::record_outcome("failed");
                error!(reservation_id = %reservation_id, error = %e, "Finalization failed");
            }
        }
        result
    }

    async fn finalize(&self, reservation_id: ReservationId) -> Result<FinalizeOutcome, FinalizationError> {
        let Some(reservation) = self.ledger.get(reservation_id).await? else {
            return Ok(FinalizeOutcome::Missing);
        };
        if reservation.is_finalized() {
            return Ok(FinalizeOutcome::AlreadyFinalized);
        }

        let started = Instant::now();
        retry_with_backoff(&self.retry, || self.issuer.issue(&reservation)).await?;
        FinalizationMetrics::record_issuance(started.elapsed());

        if self.ledger.set_finalized(reservation_id, self.clock.now()).await? {
            info!(reservation_id = %reservation_id, "Reservation finalized");
            Ok(FinalizeOutcome::Finalized)
        } else {
            // Another worker finished the same reservation first.
            Ok(FinalizeOutcome::AlreadyFinalized)
        }
    }
}

/// Consumes the finalization queue and drives a [`FinalizationWorker`].
pub struct FinalizationConsumer {
    name: String,
    queue: Arc<dyn FinalizationQueue>,
    worker: FinalizationWorker,
    shutdown: broadcast::Receiver<()>,
    retry_delay: Duration,
}

impl FinalizationConsumer {
    /// Create a consumer with a 5 second reconnect delay.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        queue: Arc<dyn FinalizationQueue>,
        worker: FinalizationWorker,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            name: name.into(),
            queue,
            worker,
            shutdown,
            retry_delay: Duration::from_secs(5),
        }
    }

    /// Set the delay before resubscribing.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Run the consumer on a background task.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run until a shutdown signal is received.
    pub async fn run(&mut self) {
        info!(consumer = %self.name, "Finalization consumer started");

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Finalization consumer received shutdown signal");
                    break;
                }
                subscribe_result = self.queue.subscribe() => {
                    match subscribe_result {
                        Ok(mut stream) => {
                            info!(consumer = %self.name, "Subscribed to finalization queue");
                            if self.process_stream(&mut stream).await {
                                break;
                            }
                            warn!(consumer = %self.name, "Job stream ended, reconnecting in {:?}", self.retry_delay);
                        }
                        Err(e) => {
                            error!(
                                consumer = %self.name,
                                error = %e,
                                "Failed to subscribe to finalization queue, retrying in {:?}",
                                self.retry_delay
                            );
                        }
                    }
                }
            }

            tokio::select! {
                _ = self.shutdown.recv() => break,
                () = tokio::time::sleep(self.retry_delay) => {}
            }
        }

        info!(consumer = %self.name, "Finalization consumer stopped");
    }

    /// Returns `true` if shutdown was requested.
    async fn process_stream(&mut self, stream: &mut JobStream) -> bool {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Shutdown requested during processing");
                    return true;
                }
                next = stream.next() => {
                    match next {
                        Some(Ok(delivery)) => {
                            let reservation_id = delivery.job().reservation_id;
                            match self.worker.process(reservation_id).await {
                                Ok(_) => delivery.ack(),
                                Err(_) => delivery.nack(),
                            }
                        }
                        Some(Err(e)) => {
                            error!(consumer = %self.name, error = %e, "Error receiving job from queue");
                        }
                        None => return false,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use boxoffice_core::capacity::CapacityStore;
    use boxoffice_core::{NewResource, RequesterId};
    use boxoffice_testing::{InMemoryReservationStore, RecordingIssuer, test_clock};
    use crate::AdmissionController;
    use boxoffice_testing::PassthroughLock;

    async fn pending_reservation(store: &InMemoryReservationStore) -> ReservationId {
        let resource = store.create_resource(NewResource::new("Gig", 3)).await.unwrap();
        AdmissionController::new(Arc::new(store.clone()), Arc::new(PassthroughLock), Arc::new(test_clock()))
            .reserve(resource.id, RequesterId::new())
            .await
            .unwrap()
            .id
    }

    fn worker(store: &InMemoryReservationStore, issuer: &RecordingIssuer) -> FinalizationWorker {
        FinalizationWorker::new(Arc::new(store.clone()), Arc::new(issuer.clone()), Arc::new(test_clock()))
            .with_retry_policy(RetryPolicy::builder().max_retries(2).initial_delay(Duration::ZERO).build())
    }

    #[tokio::test]
    async fn issuance_retries_before_failing() {
        let store = InMemoryReservationStore::new();
        let issuer = RecordingIssuer::new();
        let id = pending_reservation(&store).await;
        issuer.fail_next(2);

        let outcome = worker(&store, &issuer).process(id).await.unwrap();

        assert_eq!(outcome, FinalizeOutcome::Finalized);
        assert_eq!(issuer.issued_count(id), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_leave_reservation_pending() {
        let store = InMemoryReservationStore::new();
        let issuer = RecordingIssuer::new();
        let id = pending_reservation(&store).await;
        issuer.fail_next(10);

        let err = worker(&store, &issuer).process(id).await.unwrap_err();

        assert!(matches!(err, FinalizationError::Issuance(_)));
        let reservation = store.get(id).await.unwrap().unwrap();
        assert!(!reservation.is_finalized());
        assert!(reservation.finalized_at.is_none());
    }

    #[tokio::test]
    async fn finalized_at_comes_from_the_clock() {
        let store = InMemoryReservationStore::new();
        let issuer = RecordingIssuer::new();
        let id = pending_reservation(&store).await;

        worker(&store, &issuer).process(id).await.unwrap();

        let reservation = store.get(id).await.unwrap().unwrap();
        assert_eq!(reservation.finalized_at, Some(test_clock().now()));
    }
}
