//! Simulated ticket issuance.

use boxoffice_core::issuance::{IssuanceError, TicketIssuer};
use boxoffice_core::{BoxFuture, Reservation};
use std::time::Duration;
use tracing::info;

/// Stands in for the slow external issuance step by sleeping.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedIssuer {
    delay: Duration,
}

impl SimulatedIssuer {
    /// Issuer that takes `delay` per ticket.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedIssuer {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl TicketIssuer for SimulatedIssuer {
    fn issue<'a>(&'a self, reservation: &'a Reservation) -> BoxFuture<'a, Result<(), IssuanceError>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            info!(
                reservation_id = %reservation.id,
                resource_id = %reservation.resource_id,
                "Ticket issued"
            );
            Ok(())
        })
    }
}
