//! Finalization queue abstraction.
//!
//! At-least-once delivery of [`FinalizationJob`]s from the dispatcher to the
//! worker pool. A consumer must settle every [`Delivery`] with
//! [`ack`](Delivery::ack) or [`nack`](Delivery::nack); a nacked (or dropped)
//! delivery is redelivered, so consumers must be idempotent.
//!
//! # Implementations
//!
//! - `InMemoryFinalizationQueue` in `boxoffice-testing`
//! - `RedpandaFinalizationQueue` in `boxoffice-redpanda`

use crate::BoxFuture;
use crate::types::ReservationId;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;
use tokio::sync::oneshot;

/// Errors that can occur during queue operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Failed to connect to the broker
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish a job
    #[error("Enqueue failed for reservation {reservation_id}: {reason}")]
    EnqueueFailed {
        /// Reservation the job was for
        reservation_id: ReservationId,
        /// The reason for failure
        reason: String,
    },

    /// Failed to subscribe
    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),

    /// A message could not be decoded into a job
    #[error("Malformed job payload: {0}")]
    MalformedPayload(String),

    /// Network or transport error
    #[error("Transport error: {0}")]
    TransportError(String),
}

/// One unit of finalization work.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizationJob {
    /// Reservation to finalize
    pub reservation_id: ReservationId,
    /// When the dispatcher (or sweeper) enqueued it
    pub enqueued_at: DateTime<Utc>,
}

impl FinalizationJob {
    /// Create a job for a reservation.
    #[must_use]
    pub const fn new(reservation_id: ReservationId, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            reservation_id,
            enqueued_at,
        }
    }
}

/// How a delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Processed; do not deliver again
    Ack,
    /// Not processed; deliver again
    Nack,
}

/// A job handed to a consumer, plus the channel used to settle it.
#[derive(Debug)]
pub struct Delivery {
    job: FinalizationJob,
    settle: Option<oneshot::Sender<AckOutcome>>,
}

impl Delivery {
    /// Wrap a job with its settle channel.
    #[must_use]
    pub const fn new(job: FinalizationJob, settle: oneshot::Sender<AckOutcome>) -> Self {
        Self {
            job,
            settle: Some(settle),
        }
    }

    /// The delivered job.
    #[must_use]
    pub const fn job(&self) -> &FinalizationJob {
        &self.job
    }

    /// Mark the job processed.
    pub fn ack(mut self) {
        self.settle_with(AckOutcome::Ack);
    }

    /// Ask for redelivery.
    pub fn nack(mut self) {
        self.settle_with(AckOutcome::Nack);
    }

    fn settle_with(&mut self, outcome: AckOutcome) {
        if let Some(tx) = self.settle.take() {
            // The queue may have shut down; nothing left to settle then.
            let _ = tx.send(outcome);
        }
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        self.settle_with(AckOutcome::Nack);
    }
}

/// Stream of deliveries from a subscription.
pub type JobStream = Pin<Box<dyn Stream<Item = Result<Delivery, QueueError>> + Send>>;

/// Durable at-least-once job queue.
pub trait FinalizationQueue: Send + Sync {
    /// Publish a job.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::EnqueueFailed`] if the broker rejects the job.
    fn enqueue<'a>(&'a self, job: &'a FinalizationJob) -> BoxFuture<'a, Result<(), QueueError>>;

    /// Subscribe to jobs.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::SubscriptionFailed`] if the subscription cannot be set up.
    fn subscribe(&self) -> BoxFuture<'_, Result<JobStream, QueueError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> FinalizationJob {
        FinalizationJob::new(ReservationId::new(), Utc::now())
    }

    #[tokio::test]
    async fn ack_reports_ack() {
        let (tx, rx) = oneshot::channel();
        Delivery::new(job(), tx).ack();
        assert_eq!(rx.await, Ok(AckOutcome::Ack));
    }

    #[tokio::test]
    async fn dropped_delivery_counts_as_nack() {
        let (tx, rx) = oneshot::channel();
        drop(Delivery::new(job(), tx));
        assert_eq!(rx.await, Ok(AckOutcome::Nack));
    }
}
