//! `PostgreSQL` persistence for Box Office.
//!
//! [`PostgresReservationStore`] implements all three persistence traits from
//! `boxoffice-core` over one connection pool:
//!
//! - `CapacityStore`: resources and the admission transaction
//! - `ReservationLedger`: reservation reads, finalization, stale scan
//! - `ReportingQuery`: per-resource and overall counters
//!
//! The admission transaction runs the conditional update
//!
//! ```sql
//! UPDATE resources SET reserved_count = reserved_count + 1
//! WHERE id = $1 AND reserved_count < capacity
//! ```
//!
//! and the reservation insert on the same `sqlx::Transaction`. Under READ
//! COMMITTED a concurrent update on the same row blocks, then re-checks the
//! `WHERE` clause against the committed row, so the count can never pass
//! capacity.
//!
//! # Example
//!
//! ```ignore
//! use boxoffice_postgres::PostgresReservationStore;
//!
//! let store = PostgresReservationStore::connect("postgres://localhost/boxoffice", 10, Duration::from_secs(30)).await?;
//! store.migrate().await?;
//! ```

mod store;
mod transaction;

pub use store::PostgresReservationStore;

use boxoffice_core::StoreError;

/// Map a sqlx error onto the store taxonomy.
///
/// Connection-level failures become [`StoreError::Unavailable`] so callers can
/// tell "database down" from "statement failed".
pub(crate) fn map_sqlx(error: sqlx::Error) -> StoreError {
    match error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
            StoreError::Unavailable(error.to_string())
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::InvalidData(error.to_string())
        }
        other => StoreError::Query(other.to_string()),
    }
}

/// Convert a stored `INTEGER` count into `u32`.
pub(crate) fn to_u32(value: i32, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::InvalidData(format!("negative {column}: {value}")))
}

/// Convert a stored `BIGINT` count into `u64`.
pub(crate) fn to_u64(value: i64, column: &str) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::InvalidData(format!("negative {column}: {value}")))
}
