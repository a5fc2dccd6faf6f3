//! Ticket issuance: the slow work done after a reservation is accepted.

use crate::BoxFuture;
use crate::types::Reservation;
use thiserror::Error;

/// Issuance failure. Always treated as retryable by the worker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Ticket issuance failed: {0}")]
pub struct IssuanceError(pub String);

/// Performs ticket issuance for one reservation.
pub trait TicketIssuer: Send + Sync {
    /// Issue the ticket for `reservation`.
    ///
    /// May be invoked more than once for the same reservation if the worker
    /// crashes between issuing and recording FINALIZED.
    ///
    /// # Errors
    ///
    /// Returns [`IssuanceError`] if issuance fails.
    fn issue<'a>(&'a self, reservation: &'a Reservation) -> BoxFuture<'a, Result<(), IssuanceError>>;
}
