//! Recording ticket issuer.

#![allow(clippy::unwrap_used)]

use boxoffice_core::issuance::{IssuanceError, TicketIssuer};
use boxoffice_core::{BoxFuture, Reservation, ReservationId};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Issuer that records every call and can be told to fail.
#[derive(Clone, Debug, Default)]
pub struct RecordingIssuer {
    issued: Arc<Mutex<Vec<ReservationId>>>,
    failures_left: Arc<AtomicU32>,
}

impl RecordingIssuer {
    /// Issuer that always succeeds immediately
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` calls.
    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Reservations issued successfully, in call order.
    #[must_use]
    pub fn issued(&self) -> Vec<ReservationId> {
        self.issued.lock().unwrap().clone()
    }

    /// How many times `id` was issued.
    #[must_use]
    pub fn issued_count(&self, id: ReservationId) -> usize {
        self.issued.lock().unwrap().iter().filter(|i| **i == id).count()
    }
}

impl TicketIssuer for RecordingIssuer {
    fn issue<'a>(&'a self, reservation: &'a Reservation) -> BoxFuture<'a, Result<(), IssuanceError>> {
        Box::pin(async move {
            let failed = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failed {
                return Err(IssuanceError(format!(
                    "injected failure for reservation {}",
                    reservation.id
                )));
            }
            self.issued.lock().unwrap().push(reservation.id);
            Ok(())
        })
    }
}
