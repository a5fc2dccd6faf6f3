//! Read-only aggregate queries.

use crate::BoxFuture;
use crate::error::StoreError;
use crate::types::{OverallReport, ResourceId, ResourceStats};

/// Stats projections over resources and reservations.
pub trait ReportingQuery: Send + Sync {
    /// Counters for one resource, `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn stats(&self, resource_id: ResourceId) -> BoxFuture<'_, Result<Option<ResourceStats>, StoreError>>;

    /// Totals across every resource.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn report(&self) -> BoxFuture<'_, Result<OverallReport, StoreError>>;
}
