//! Admission controller: the single entry point for creating a reservation.
//!
//! ```text
//! acquire lock ─► BEGIN ─► try_reserve ─► insert PENDING ─► COMMIT ─► release lock
//! ```
//!
//! The conditional update inside the transaction is what prevents
//! overselling. The lock keeps contenders for one resource from piling up on
//! the same row; correctness does not depend on it.

use crate::lock_scope::LeaseGuard;
use crate::metrics::AdmissionMetrics;
use boxoffice_core::capacity::CapacityStore;
use boxoffice_core::environment::Clock;
use boxoffice_core::lock::{AdmissionLock, LockSettings, lock_key};
use boxoffice_core::{
    AdmissionError, NewReservation, RejectReason, RequesterId, Reservation, ReservationId,
    ResourceId,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Serializes admission per resource and commits accepted reservations.
#[derive(Clone)]
pub struct AdmissionController {
    store: Arc<dyn CapacityStore>,
    lock: Arc<dyn AdmissionLock>,
    clock: Arc<dyn Clock>,
    settings: LockSettings,
}

impl AdmissionController {
    /// Create a controller with the default lease (10s) and wait timeout (5s).
    #[must_use]
    pub fn new(
        store: Arc<dyn CapacityStore>,
        lock: Arc<dyn AdmissionLock>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            lock,
            clock,
            settings: LockSettings::default(),
        }
    }

    /// Override lease and wait durations.
    #[must_use]
    pub const fn with_settings(mut self, settings: LockSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Current lock settings.
    #[must_use]
    pub const fn settings(&self) -> LockSettings {
        self.settings
    }

    /// Admit one reservation for `resource_id`.
    ///
    /// The lock is released on every path before this returns, including when
    /// the store fails. No internal retry.
    ///
    /// # Errors
    ///
    /// - [`AdmissionError::Rejected`] with [`RejectReason::LockUnavailable`] if
    ///   the lock was not obtained within the wait timeout
    /// - [`AdmissionError::Rejected`] with [`RejectReason::SoldOut`] if no
    ///   capacity remains or the resource does not exist
    /// - [`AdmissionError::Store`] / [`AdmissionError::Lock`] on infrastructure failure
    pub async fn reserve(
        &self,
        resource_id: ResourceId,
        requester_id: RequesterId,
    ) -> Result<Reservation, AdmissionError> {
        let result = self.reserve_locked(resource_id, requester_id).await;
        match &result {
            Ok(reservation) => {
                AdmissionMetrics::record_outcome("accepted");
                info!(
                    resource_id = %resource_id,
                    reservation_id = %reservation.id,
                    requester_id = %requester_id,
                    "Reservation accepted"
                );
            }
            Err(e) => {
                AdmissionMetrics::record_outcome(outcome_label(e));
                match e {
                    AdmissionError::Store(_) | AdmissionError::Lock(_) => {
                        error!(resource_id = %resource_id, error = %e, "Admission failed");
                    }
                    AdmissionError::Rejected { .. } => {
                        debug!(resource_id = %resource_id, error = %e, "Reservation not admitted");
                    }
                }
            }
        }
        result
    }

    async fn reserve_locked(
        &self,
        resource_id: ResourceId,
        requester_id: RequesterId,
    ) -> Result<Reservation, AdmissionError> {
        let key = lock_key(resource_id);
        let started = Instant::now();
        let lease = self
            .lock
            .acquire(&key, self.settings.lease, self.settings.wait_timeout)
            .await?;
        AdmissionMetrics::record_lock_wait(started.elapsed());

        let Some(lease) = lease else {
            warn!(
                resource_id = %resource_id,
                wait_ms = self.settings.wait_timeout.as_millis(),
                "Timed out waiting for admission lock"
            );
            return Err(AdmissionError::lock_unavailable(resource_id));
        };

        let guard = LeaseGuard::new(Arc::clone(&self.lock), lease);
        let result = self.admit(resource_id, requester_id).await;
        guard.release().await;
        result
    }

    /// The critical section: one transaction covering increment and insert.
    async fn admit(
        &self,
        resource_id: ResourceId,
        requester_id: RequesterId,
    ) -> Result<Reservation, AdmissionError> {
        let mut tx = self.store.begin().await?;

        // Absent and full resources both fail the conditional update.
        if !tx.try_reserve(resource_id).await? {
            if let Err(e) = tx.rollback().await {
                warn!(resource_id = %resource_id, error = %e, "Rollback after rejection failed");
            }
            return Err(AdmissionError::sold_out(resource_id));
        }

        let new_reservation = NewReservation {
            id: ReservationId::new(),
            resource_id,
            requester_id,
            created_at: self.clock.now(),
        };
        // An error here drops `tx`, which rolls the increment back.
        let reservation = tx.insert_reservation(&new_reservation).await?;
        tx.commit().await?;

        Ok(reservation)
    }
}

const fn outcome_label(error: &AdmissionError) -> &'static str {
    match error {
        AdmissionError::Rejected { reason, .. } => match reason {
            RejectReason::SoldOut => "sold_out",
            RejectReason::LockUnavailable => "lock_unavailable",
        },
        AdmissionError::Store(_) | AdmissionError::Lock(_) => "error",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use boxoffice_core::{ErrorKind, NewResource};
    use boxoffice_core::StoreError;
    use boxoffice_testing::{
        InMemoryAdmissionLock, InMemoryReservationStore, TimeoutLock, UnavailableLock, test_clock,
    };

    fn controller(
        store: &InMemoryReservationStore,
        lock: Arc<dyn AdmissionLock>,
    ) -> AdmissionController {
        AdmissionController::new(Arc::new(store.clone()), lock, Arc::new(test_clock()))
    }

    #[tokio::test]
    async fn accepted_reservation_is_pending_and_stamped() {
        let store = InMemoryReservationStore::new();
        let resource = store.create_resource(NewResource::new("Gig", 1)).await.unwrap();
        let lock = InMemoryAdmissionLock::new();

        let reservation = controller(&store, Arc::new(lock.clone()))
            .reserve(resource.id, RequesterId::new())
            .await
            .unwrap();

        assert_eq!(reservation.resource_id, resource.id);
        assert!(!reservation.is_finalized());
        assert_eq!(reservation.created_at, test_clock().now());
        assert_eq!(lock.acquired(), 1);
        assert_eq!(lock.released(), 1);
    }

    #[tokio::test]
    async fn unknown_resource_is_rejected_like_a_full_one() {
        let store = InMemoryReservationStore::new();
        let lock = InMemoryAdmissionLock::new();
        let missing = ResourceId::new();

        let err = controller(&store, Arc::new(lock.clone()))
            .reserve(missing, RequesterId::new())
            .await
            .unwrap_err();

        assert_eq!(err, AdmissionError::sold_out(missing));
        assert_eq!(err.kind(), ErrorKind::Rejected);
        assert_eq!(lock.released(), 1);
        assert_eq!(store.reservation_count().await, 0);
    }

    #[tokio::test]
    async fn lock_timeout_is_rejected_not_infrastructure() {
        let store = InMemoryReservationStore::new();
        let resource = store.create_resource(NewResource::new("Gig", 5)).await.unwrap();

        let err = controller(&store, Arc::new(TimeoutLock))
            .reserve(resource.id, RequesterId::new())
            .await
            .unwrap_err();

        assert_eq!(err, AdmissionError::lock_unavailable(resource.id));
        assert_eq!(store.resource(resource.id).await.unwrap().reserved_count, 0);
    }

    #[tokio::test]
    async fn lock_backend_failure_is_infrastructure() {
        let store = InMemoryReservationStore::new();
        let resource = store.create_resource(NewResource::new("Gig", 5)).await.unwrap();

        let err = controller(&store, Arc::new(UnavailableLock))
            .reserve(resource.id, RequesterId::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AdmissionError::Lock(_)));
    }

    #[tokio::test]
    async fn store_failure_releases_lock_and_propagates() {
        let store = InMemoryReservationStore::new();
        let resource = store.create_resource(NewResource::new("Gig", 5)).await.unwrap();
        let lock = InMemoryAdmissionLock::new();
        store.set_unavailable(true);

        let err = controller(&store, Arc::new(lock.clone()))
            .reserve(resource.id, RequesterId::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AdmissionError::Store(StoreError::Unavailable(_))));
        assert_eq!(lock.acquired(), 1);
        assert_eq!(lock.released(), 1);
    }
}
