//! # Box Office Core
//!
//! Domain types and collaborator traits for overselling-safe ticket admission.
//!
//! This crate defines *what* the admission and finalization subsystem talks to,
//! never *how*. Every external collaborator is a trait:
//!
//! - [`capacity::CapacityStore`]: resources and the transactional conditional update
//! - [`ledger::ReservationLedger`]: reservation lookups and the finalize transition
//! - [`reporting::ReportingQuery`]: read-only stats projections
//! - [`lock::AdmissionLock`]: cross-process per-resource mutual exclusion
//! - [`queue::FinalizationQueue`]: at-least-once delivery of finalization jobs
//! - [`issuance::TicketIssuer`]: the slow post-acceptance work
//!
//! ## Admission Path
//!
//! ```text
//! reserve(resource, requester)
//!        │
//!        ▼
//! ┌─────────────────┐
//! │ AdmissionLock   │  acquire(key, lease, wait) ── timeout ──► Rejected(LockUnavailable)
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │ BEGIN           │
//! │ try_reserve     │  reserved_count < capacity ? +1 ── no ──► Rejected(SoldOut)
//! │ insert PENDING  │
//! │ COMMIT          │
//! └────────┬────────┘
//!          ▼
//!     release lease (every exit path)
//!          │
//!          ▼
//!  FinalizationQueue::enqueue (best effort)
//! ```
//!
//! The conditional update alone prevents overselling. The lock only serializes
//! contenders so at most one transaction per resource is in flight.

pub mod capacity;
pub mod error;
pub mod issuance;
pub mod ledger;
pub mod lock;
pub mod queue;
pub mod reporting;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use error::{AdmissionError, ErrorKind, RejectReason, StoreError};
pub use types::{
    NewReservation, NewResource, OverallReport, RequesterId, Reservation, ReservationId,
    ReservationStatus, Resource, ResourceId, ResourceStats,
};

/// Boxed, `Send` future returned by collaborator traits.
///
/// Traits return boxed futures instead of `async fn` so that they stay
/// dyn-compatible (`Arc<dyn CapacityStore>` and friends).
pub type BoxFuture<'a, T> = futures::future::BoxFuture<'a, T>;

/// Environment module - injected time source
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use boxoffice_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let _now = clock.now();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
