//! Finalization dispatcher: hands accepted reservations to the queue.

use crate::metrics::FinalizationMetrics;
use boxoffice_core::ReservationId;
use boxoffice_core::environment::Clock;
use boxoffice_core::queue::{FinalizationJob, FinalizationQueue};
use std::sync::Arc;
use tracing::{debug, warn};

/// Best-effort enqueue of finalization jobs.
///
/// A transport failure never reaches the caller and never undoes the
/// committed reservation; the sweeper picks the reservation up later.
#[derive(Clone)]
pub struct FinalizationDispatcher {
    queue: Arc<dyn FinalizationQueue>,
    clock: Arc<dyn Clock>,
}

impl FinalizationDispatcher {
    /// Create a dispatcher over `queue`.
    #[must_use]
    pub fn new(queue: Arc<dyn FinalizationQueue>, clock: Arc<dyn Clock>) -> Self {
        Self { queue, clock }
    }

    /// Enqueue one job. Returns whether the queue accepted it.
    pub async fn dispatch(&self, reservation_id: ReservationId) -> bool {
        let job = FinalizationJob::new(reservation_id, self.clock.now());
        match self.queue.enqueue(&job).await {
            Ok(()) => {
                FinalizationMetrics::record_dispatch("enqueued");
                debug!(reservation_id = %reservation_id, "Finalization job enqueued");
                true
            }
            Err(e) => {
                FinalizationMetrics::record_dispatch("failed");
                warn!(
                    reservation_id = %reservation_id,
                    error = %e,
                    "Failed to enqueue finalization job, reservation stays PENDING"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxoffice_testing::{InMemoryFinalizationQueue, test_clock};

    #[tokio::test]
    async fn enqueues_one_job_per_call() {
        let queue = InMemoryFinalizationQueue::new();
        let dispatcher = FinalizationDispatcher::new(Arc::new(queue.clone()), Arc::new(test_clock()));
        let id = ReservationId::new();

        assert!(dispatcher.dispatch(id).await);

        let jobs = queue.enqueued();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].reservation_id, id);
        assert_eq!(jobs[0].enqueued_at, test_clock().now());
    }

    #[tokio::test]
    async fn swallows_transport_failure() {
        let queue = InMemoryFinalizationQueue::new();
        queue.fail_enqueue(true);
        let dispatcher = FinalizationDispatcher::new(Arc::new(queue.clone()), Arc::new(test_clock()));

        assert!(!dispatcher.dispatch(ReservationId::new()).await);
        assert!(queue.enqueued().is_empty());
    }
}
