//! In-memory reservation store.
//!
//! Implements [`CapacityStore`], [`ReservationLedger`] and [`ReportingQuery`]
//! over one `HashMap` pair. Transactions take an exclusive guard on the tables
//! for their whole lifetime and keep a snapshot to restore on rollback, so
//! every transaction is serializable.

use boxoffice_core::capacity::{AdmissionTransaction, CapacityStore};
use boxoffice_core::ledger::ReservationLedger;
use boxoffice_core::reporting::ReportingQuery;
use boxoffice_core::{
    BoxFuture, DateTime, NewReservation, NewResource, OverallReport, Reservation, ReservationId,
    ReservationStatus, Resource, ResourceId, ResourceStats, StoreError, Utc,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone, Debug, Default)]
struct Tables {
    resources: HashMap<ResourceId, Resource>,
    reservations: HashMap<ReservationId, Reservation>,
}

impl Tables {
    fn finalized_count(&self, resource_id: ResourceId) -> u64 {
        self.reservations
            .values()
            .filter(|r| r.resource_id == resource_id && r.is_finalized())
            .count() as u64
    }
}

/// In-memory store for fast, deterministic tests.
///
/// Failure injection:
/// - [`fail_inserts`](Self::fail_inserts): `insert_reservation` returns an error
/// - [`set_unavailable`](Self::set_unavailable): every operation returns
///   [`StoreError::Unavailable`]
#[derive(Clone, Debug, Default)]
pub struct InMemoryReservationStore {
    tables: Arc<Mutex<Tables>>,
    fail_inserts: Arc<AtomicBool>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryReservationStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `insert_reservation` fail.
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Simulate a lost database connection.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Current committed state of a resource.
    pub async fn resource(&self, resource_id: ResourceId) -> Option<Resource> {
        self.tables.lock().await.resources.get(&resource_id).cloned()
    }

    /// All committed reservations for a resource.
    pub async fn reservations_for(&self, resource_id: ResourceId) -> Vec<Reservation> {
        self.tables
            .lock()
            .await
            .reservations
            .values()
            .filter(|r| r.resource_id == resource_id)
            .cloned()
            .collect()
    }

    /// Number of committed reservations across all resources.
    pub async fn reservation_count(&self) -> usize {
        self.tables.lock().await.reservations.len()
    }

    /// Seed a reservation directly, bypassing admission.
    ///
    /// Used to set up sweeper scenarios with arbitrary `created_at` values.
    pub async fn seed_reservation(&self, reservation: Reservation) {
        let mut tables = self.tables.lock().await;
        if let Some(resource) = tables.resources.get_mut(&reservation.resource_id) {
            resource.reserved_count += 1;
        }
        tables.reservations.insert(reservation.id, reservation);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("in-memory store marked unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Transaction over the in-memory tables.
struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    snapshot: Option<Tables>,
    fail_inserts: bool,
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.guard = snapshot;
        }
    }
}

impl AdmissionTransaction for InMemoryTransaction {
    fn try_reserve(&mut self, resource_id: ResourceId) -> BoxFuture<'_, Result<bool, StoreError>> {
        Box::pin(async move {
            match self.guard.resources.get_mut(&resource_id) {
                Some(resource) if resource.reserved_count < resource.capacity => {
                    resource.reserved_count += 1;
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    fn insert_reservation<'a>(
        &'a mut self,
        reservation: &'a NewReservation,
    ) -> BoxFuture<'a, Result<Reservation, StoreError>> {
        Box::pin(async move {
            if self.fail_inserts {
                return Err(StoreError::Query("injected insert failure".to_string()));
            }
            if !self.guard.resources.contains_key(&reservation.resource_id) {
                return Err(StoreError::Query(format!(
                    "foreign key violation: resource {} does not exist",
                    reservation.resource_id
                )));
            }
            let row = reservation.clone().into_pending();
            self.guard.reservations.insert(row.id, row.clone());
            Ok(row)
        })
    }

    fn commit(mut self: Box<Self>) -> BoxFuture<'static, Result<(), StoreError>> {
        self.snapshot = None;
        drop(self);
        Box::pin(async { Ok(()) })
    }

    fn rollback(self: Box<Self>) -> BoxFuture<'static, Result<(), StoreError>> {
        drop(self);
        Box::pin(async { Ok(()) })
    }
}

impl CapacityStore for InMemoryReservationStore {
    fn begin(&self) -> BoxFuture<'_, Result<Box<dyn AdmissionTransaction>, StoreError>> {
        Box::pin(async move {
            self.check_available()?;
            let guard = Arc::clone(&self.tables).lock_owned().await;
            let snapshot = guard.clone();
            let tx: Box<dyn AdmissionTransaction> = Box::new(InMemoryTransaction {
                guard,
                snapshot: Some(snapshot),
                fail_inserts: self.fail_inserts.load(Ordering::SeqCst),
            });
            Ok(tx)
        })
    }

    fn create_resource(&self, resource: NewResource) -> BoxFuture<'_, Result<Resource, StoreError>> {
        Box::pin(async move {
            self.check_available()?;
            if resource.capacity > NewResource::MAX_CAPACITY {
                return Err(StoreError::InvalidData(format!(
                    "capacity too large: {}",
                    resource.capacity
                )));
            }
            let created = Resource {
                id: ResourceId::new(),
                title: resource.title,
                capacity: resource.capacity,
                reserved_count: 0,
            };
            self.tables
                .lock()
                .await
                .resources
                .insert(created.id, created.clone());
            Ok(created)
        })
    }

    fn get_resource(&self, resource_id: ResourceId) -> BoxFuture<'_, Result<Option<Resource>, StoreError>> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.resource(resource_id).await)
        })
    }
}

impl ReservationLedger for InMemoryReservationStore {
    fn get(&self, id: ReservationId) -> BoxFuture<'_, Result<Option<Reservation>, StoreError>> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.tables.lock().await.reservations.get(&id).cloned())
        })
    }

    fn set_finalized(
        &self,
        id: ReservationId,
        finalized_at: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<bool, StoreError>> {
        Box::pin(async move {
            self.check_available()?;
            let mut tables = self.tables.lock().await;
            match tables.reservations.get_mut(&id) {
                Some(reservation) if reservation.status == ReservationStatus::Pending => {
                    reservation.status = ReservationStatus::Finalized;
                    reservation.finalized_at = Some(finalized_at);
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    fn list_stale_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: u32,
    ) -> BoxFuture<'_, Result<Vec<ReservationId>, StoreError>> {
        Box::pin(async move {
            self.check_available()?;
            let tables = self.tables.lock().await;
            let mut stale: Vec<&Reservation> = tables
                .reservations
                .values()
                .filter(|r| r.status == ReservationStatus::Pending && r.created_at < cutoff)
                .collect();
            stale.sort_by_key(|r| r.created_at);
            Ok(stale
                .into_iter()
                .take(limit as usize)
                .map(|r| r.id)
                .collect())
        })
    }
}

impl ReportingQuery for InMemoryReservationStore {
    fn stats(&self, resource_id: ResourceId) -> BoxFuture<'_, Result<Option<ResourceStats>, StoreError>> {
        Box::pin(async move {
            self.check_available()?;
            let tables = self.tables.lock().await;
            Ok(tables.resources.get(&resource_id).map(|resource| ResourceStats {
                resource_id,
                capacity: resource.capacity,
                reserved_count: resource.reserved_count,
                finalized_count: tables.finalized_count(resource_id),
            }))
        })
    }

    fn report(&self) -> BoxFuture<'_, Result<OverallReport, StoreError>> {
        Box::pin(async move {
            self.check_available()?;
            let tables = self.tables.lock().await;
            Ok(OverallReport {
                total_capacity: tables.resources.values().map(|r| u64::from(r.capacity)).sum(),
                total_reserved: tables
                    .resources
                    .values()
                    .map(|r| u64::from(r.reserved_count))
                    .sum(),
                total_finalized: tables
                    .reservations
                    .values()
                    .filter(|r| r.is_finalized())
                    .count() as u64,
            })
        })
    }
}
