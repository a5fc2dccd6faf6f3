//! # Box Office Runtime
//!
//! The moving parts of admission and finalization, written against the
//! collaborator traits in `boxoffice-core`:
//!
//! - [`AdmissionController`]: lock → conditional update → ledger insert → release
//! - [`FinalizationDispatcher`]: best-effort enqueue of accepted reservations
//! - [`FinalizationWorker`] / [`FinalizationConsumer`]: idempotent issuance and
//!   the PENDING → FINALIZED transition, driven by the queue
//! - [`PendingSweeper`]: re-enqueues reservations whose job went missing
//! - [`ReservationService`]: the facade the HTTP layer calls
//!
//! ## Example
//!
//! ```ignore
//! let admission = AdmissionController::new(store.clone(), lock, clock.clone());
//! let dispatcher = FinalizationDispatcher::new(queue.clone(), clock.clone());
//! let service = ReservationService::new(store.clone(), store.clone(), store, admission, dispatcher);
//!
//! let reservation = service.reserve(resource_id, requester_id).await?;
//! ```

pub mod admission;
pub mod dispatcher;
pub mod issuer;
pub mod lock_scope;
pub mod metrics;
pub mod retry;
pub mod service;
pub mod sweeper;
pub mod worker;

pub use admission::AdmissionController;
pub use dispatcher::FinalizationDispatcher;
pub use issuer::SimulatedIssuer;
pub use lock_scope::LeaseGuard;
pub use retry::RetryPolicy;
pub use service::ReservationService;
pub use sweeper::{PendingSweeper, SweeperSettings};
pub use worker::{FinalizationConsumer, FinalizationError, FinalizationWorker, FinalizeOutcome};
