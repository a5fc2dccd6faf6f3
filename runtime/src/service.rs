//! Application service used by the transport layer.

use crate::admission::AdmissionController;
use crate::dispatcher::FinalizationDispatcher;
use boxoffice_core::capacity::CapacityStore;
use boxoffice_core::ledger::ReservationLedger;
use boxoffice_core::reporting::ReportingQuery;
use boxoffice_core::{
    AdmissionError, NewResource, OverallReport, RequesterId, Reservation, ReservationId, Resource,
    ResourceId, ResourceStats, StoreError,
};
use std::sync::Arc;
use tracing::info;

/// Facade over admission, dispatch and the read side.
#[derive(Clone)]
pub struct ReservationService {
    store: Arc<dyn CapacityStore>,
    ledger: Arc<dyn ReservationLedger>,
    reporting: Arc<dyn ReportingQuery>,
    admission: AdmissionController,
    dispatcher: FinalizationDispatcher,
}

impl ReservationService {
    /// Wire the service.
    #[must_use]
    pub fn new(
        store: Arc<dyn CapacityStore>,
        ledger: Arc<dyn ReservationLedger>,
        reporting: Arc<dyn ReportingQuery>,
        admission: AdmissionController,
        dispatcher: FinalizationDispatcher,
    ) -> Self {
        Self {
            store,
            ledger,
            reporting,
            admission,
            dispatcher,
        }
    }

    /// Create a resource.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the insert fails.
    pub async fn create_resource(&self, resource: NewResource) -> Result<Resource, StoreError> {
        let created = self.store.create_resource(resource).await?;
        info!(resource_id = %created.id, capacity = created.capacity, "Resource created");
        Ok(created)
    }

    /// Admit a reservation, then hand it to the finalization queue.
    ///
    /// The enqueue happens after the lock is released and cannot fail the call.
    ///
    /// # Errors
    ///
    /// See [`AdmissionController::reserve`].
    pub async fn reserve(
        &self,
        resource_id: ResourceId,
        requester_id: RequesterId,
    ) -> Result<Reservation, AdmissionError> {
        let reservation = self.admission.reserve(resource_id, requester_id).await?;
        self.dispatcher.dispatch(reservation.id).await;
        Ok(reservation)
    }

    /// Load a reservation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    pub async fn get_reservation(&self, id: ReservationId) -> Result<Option<Reservation>, StoreError> {
        self.ledger.get(id).await
    }

    /// Counters for one resource.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    pub async fn get_stats(&self, resource_id: ResourceId) -> Result<Option<ResourceStats>, StoreError> {
        self.reporting.stats(resource_id).await
    }

    /// Totals across every resource.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    pub async fn report(&self) -> Result<OverallReport, StoreError> {
        self.reporting.report().await
    }
}
