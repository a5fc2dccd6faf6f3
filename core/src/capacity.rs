//! Capacity store abstraction.
//!
//! Resources and the conditional update that admits a reservation. The update
//! and the ledger insert always run inside one [`AdmissionTransaction`], so a
//! capacity increment can never be committed without its reservation row.

use crate::BoxFuture;
use crate::error::StoreError;
use crate::types::{NewReservation, NewResource, Reservation, Resource, ResourceId};

/// An open persistence transaction for one admission attempt.
///
/// Dropping the transaction without calling [`commit`](Self::commit) rolls it
/// back.
pub trait AdmissionTransaction: Send {
    /// Atomically increment `reserved_count` if `reserved_count < capacity`.
    ///
    /// Returns `true` iff exactly one row changed. `false` means the resource
    /// is at capacity or does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the statement cannot be executed.
    fn try_reserve(&mut self, resource_id: ResourceId) -> BoxFuture<'_, Result<bool, StoreError>>;

    /// Insert a PENDING reservation in this transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the insert fails. The caller must not commit.
    fn insert_reservation<'a>(
        &'a mut self,
        reservation: &'a NewReservation,
    ) -> BoxFuture<'a, Result<Reservation, StoreError>>;

    /// Make the increment and the insert durable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the commit fails; nothing is persisted.
    fn commit(self: Box<Self>) -> BoxFuture<'static, Result<(), StoreError>>;

    /// Discard all changes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend reports a rollback failure.
    fn rollback(self: Box<Self>) -> BoxFuture<'static, Result<(), StoreError>>;
}

/// Persistent `(id, title, capacity, reserved_count)` records.
pub trait CapacityStore: Send + Sync {
    /// Open a transaction for one admission attempt.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if no connection can be obtained.
    fn begin(&self) -> BoxFuture<'_, Result<Box<dyn AdmissionTransaction>, StoreError>>;

    /// Create a resource with `reserved_count = 0`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the insert fails.
    fn create_resource(&self, resource: NewResource) -> BoxFuture<'_, Result<Resource, StoreError>>;

    /// Load a resource.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn get_resource(&self, resource_id: ResourceId) -> BoxFuture<'_, Result<Option<Resource>, StoreError>>;
}
