//! The admission transaction.

use crate::map_sqlx;
use boxoffice_core::capacity::AdmissionTransaction;
use boxoffice_core::{BoxFuture, NewReservation, Reservation, ResourceId, StoreError};
use sqlx::{Postgres, Transaction};

/// Wraps one `sqlx` transaction. Dropping it without commit rolls back.
pub(crate) struct PgAdmissionTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PgAdmissionTransaction {
    pub(crate) const fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }
}

impl AdmissionTransaction for PgAdmissionTransaction {
    fn try_reserve(&mut self, resource_id: ResourceId) -> BoxFuture<'_, Result<bool, StoreError>> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                UPDATE resources
                SET reserved_count = reserved_count + 1
                WHERE id = $1 AND reserved_count < capacity
                ",
            )
            .bind(*resource_id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;

            Ok(result.rows_affected() == 1)
        })
    }

    fn insert_reservation<'a>(
        &'a mut self,
        reservation: &'a NewReservation,
    ) -> BoxFuture<'a, Result<Reservation, StoreError>> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO reservations (id, resource_id, requester_id, status, created_at)
                VALUES ($1, $2, $3, 'PENDING', $4)
                ",
            )
            .bind(*reservation.id.as_uuid())
            .bind(*reservation.resource_id.as_uuid())
            .bind(*reservation.requester_id.as_uuid())
            .bind(reservation.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;

            Ok(reservation.clone().into_pending())
        })
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, Result<(), StoreError>> {
        Box::pin(async move { self.tx.commit().await.map_err(map_sqlx) })
    }

    fn rollback(self: Box<Self>) -> BoxFuture<'static, Result<(), StoreError>> {
        Box::pin(async move { self.tx.rollback().await.map_err(map_sqlx) })
    }
}
