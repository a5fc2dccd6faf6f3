//! Reservation ledger abstraction.
//!
//! Inserts happen through [`AdmissionTransaction`](crate::capacity::AdmissionTransaction);
//! this trait covers everything that happens after admission.

use crate::BoxFuture;
use crate::error::StoreError;
use crate::types::{Reservation, ReservationId};
use chrono::{DateTime, Utc};

/// Reads and the single PENDING → FINALIZED transition.
pub trait ReservationLedger: Send + Sync {
    /// Load a reservation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn get(&self, id: ReservationId) -> BoxFuture<'_, Result<Option<Reservation>, StoreError>>;

    /// Move a PENDING reservation to FINALIZED.
    ///
    /// Returns `true` if a transition happened. An absent or already finalized
    /// reservation is not an error; it returns `false`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the update fails.
    fn set_finalized(
        &self,
        id: ReservationId,
        finalized_at: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<bool, StoreError>>;

    /// PENDING reservations created before `cutoff`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn list_stale_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: u32,
    ) -> BoxFuture<'_, Result<Vec<ReservationId>, StoreError>>;
}
