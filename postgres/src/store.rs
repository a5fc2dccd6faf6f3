//! Pool-backed store implementing the persistence traits.

use crate::transaction::PgAdmissionTransaction;
use crate::{map_sqlx, to_u32, to_u64};
use boxoffice_core::capacity::{AdmissionTransaction, CapacityStore};
use boxoffice_core::ledger::ReservationLedger;
use boxoffice_core::reporting::ReportingQuery;
use boxoffice_core::{
    BoxFuture, DateTime, NewResource, OverallReport, RequesterId, Reservation, ReservationId,
    ReservationStatus, Resource, ResourceId, ResourceStats, StoreError, Utc,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use uuid::Uuid;

type ResourceRow = (Uuid, String, i32, i32);
type ReservationRow = (Uuid, Uuid, Uuid, String, DateTime<Utc>, Option<DateTime<Utc>>);

fn resource_from_row((id, title, capacity, reserved_count): ResourceRow) -> Result<Resource, StoreError> {
    Ok(Resource {
        id: ResourceId::from_uuid(id),
        title,
        capacity: to_u32(capacity, "capacity")?,
        reserved_count: to_u32(reserved_count, "reserved_count")?,
    })
}

fn reservation_from_row(
    (id, resource_id, requester_id, status, created_at, finalized_at): ReservationRow,
) -> Result<Reservation, StoreError> {
    let status = ReservationStatus::parse(&status)
        .ok_or_else(|| StoreError::InvalidData(format!("Invalid reservation status: {status}")))?;
    Ok(Reservation {
        id: ReservationId::from_uuid(id),
        resource_id: ResourceId::from_uuid(resource_id),
        requester_id: RequesterId::from_uuid(requester_id),
        status,
        created_at,
        finalized_at,
    })
}

/// `PostgreSQL` implementation of [`CapacityStore`], [`ReservationLedger`]
/// and [`ReportingQuery`].
///
/// # Schema
///
/// See `migrations/`. `CHECK` constraints enforce
/// `0 <= reserved_count <= capacity` as a second line of defence.
#[derive(Clone, Debug)]
pub struct PostgresReservationStore {
    pool: PgPool,
}

impl PostgresReservationStore {
    /// Connect with a bounded pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the database cannot be reached.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Use an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Query(format!("Migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }
}

impl CapacityStore for PostgresReservationStore {
    fn begin(&self) -> BoxFuture<'_, Result<Box<dyn AdmissionTransaction>, StoreError>> {
        Box::pin(async move {
            let tx = self.pool.begin().await.map_err(map_sqlx)?;
            let tx: Box<dyn AdmissionTransaction> = Box::new(PgAdmissionTransaction::new(tx));
            Ok(tx)
        })
    }

    fn create_resource(&self, resource: NewResource) -> BoxFuture<'_, Result<Resource, StoreError>> {
        Box::pin(async move {
            let capacity = i32::try_from(resource.capacity)
                .map_err(|_| StoreError::InvalidData(format!("capacity too large: {}", resource.capacity)))?;
            let row: ResourceRow = sqlx::query_as(
                r"
                INSERT INTO resources (id, title, capacity, reserved_count)
                VALUES ($1, $2, $3, 0)
                RETURNING id, title, capacity, reserved_count
                ",
            )
            .bind(Uuid::new_v4())
            .bind(&resource.title)
            .bind(capacity)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;

            metrics::counter!("boxoffice_resources_created_total").increment(1);
            resource_from_row(row)
        })
    }

    fn get_resource(&self, resource_id: ResourceId) -> BoxFuture<'_, Result<Option<Resource>, StoreError>> {
        Box::pin(async move {
            let row: Option<ResourceRow> = sqlx::query_as(
                "SELECT id, title, capacity, reserved_count FROM resources WHERE id = $1",
            )
            .bind(*resource_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

            row.map(resource_from_row).transpose()
        })
    }
}

impl ReservationLedger for PostgresReservationStore {
    fn get(&self, id: ReservationId) -> BoxFuture<'_, Result<Option<Reservation>, StoreError>> {
        Box::pin(async move {
            let row: Option<ReservationRow> = sqlx::query_as(
                r"
                SELECT id, resource_id, requester_id, status, created_at, finalized_at
                FROM reservations
                WHERE id = $1
                ",
            )
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

            row.map(reservation_from_row).transpose()
        })
    }

    fn set_finalized(
        &self,
        id: ReservationId,
        finalized_at: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<bool, StoreError>> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                UPDATE reservations
                SET status = 'FINALIZED', finalized_at = $2
                WHERE id = $1 AND status = 'PENDING'
                ",
            )
            .bind(*id.as_uuid())
            .bind(finalized_at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

            Ok(result.rows_affected() == 1)
        })
    }

    fn list_stale_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: u32,
    ) -> BoxFuture<'_, Result<Vec<ReservationId>, StoreError>> {
        Box::pin(async move {
            let rows: Vec<(Uuid,)> = sqlx::query_as(
                r"
                SELECT id FROM reservations
                WHERE status = 'PENDING' AND created_at < $1
                ORDER BY created_at
                LIMIT $2
                ",
            )
            .bind(cutoff)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;

            Ok(rows.into_iter().map(|(id,)| ReservationId::from_uuid(id)).collect())
        })
    }
}

impl ReportingQuery for PostgresReservationStore {
    fn stats(&self, resource_id: ResourceId) -> BoxFuture<'_, Result<Option<ResourceStats>, StoreError>> {
        Box::pin(async move {
            let row: Option<(i32, i32, i64)> = sqlx::query_as(
                r"
                SELECT r.capacity, r.reserved_count,
                       (SELECT COUNT(*) FROM reservations b
                        WHERE b.resource_id = r.id AND b.status = 'FINALIZED')
                FROM resources r
                WHERE r.id = $1
                ",
            )
            .bind(*resource_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

            row.map(|(capacity, reserved_count, finalized_count)| {
                Ok(ResourceStats {
                    resource_id,
                    capacity: to_u32(capacity, "capacity")?,
                    reserved_count: to_u32(reserved_count, "reserved_count")?,
                    finalized_count: to_u64(finalized_count, "finalized_count")?,
                })
            })
            .transpose()
        })
    }

    fn report(&self) -> BoxFuture<'_, Result<OverallReport, StoreError>> {
        Box::pin(async move {
            let (total_capacity, total_reserved, total_finalized): (i64, i64, i64) = sqlx::query_as(
                r"
                SELECT COALESCE(SUM(capacity), 0)::BIGINT,
                       COALESCE(SUM(reserved_count), 0)::BIGINT,
                       (SELECT COUNT(*) FROM reservations WHERE status = 'FINALIZED')
                FROM resources
                ",
            )
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;

            Ok(OverallReport {
                total_capacity: to_u64(total_capacity, "total_capacity")?,
                total_reserved: to_u64(total_reserved, "total_reserved")?,
                total_finalized: to_u64(total_finalized, "total_finalized")?,
            })
        })
    }
}
