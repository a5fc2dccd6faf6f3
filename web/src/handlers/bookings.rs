//! Booking and reservation endpoints.
//!
//! - `POST /api/bookings` - admit one reservation against an event
//! - `GET /api/reservations/:id` - reservation status

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use boxoffice_core::{RequesterId, Reservation, ReservationId, ReservationStatus, ResourceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to book one ticket.
#[derive(Debug, Deserialize)]
pub struct BookRequest {
    /// Event to book
    pub event_id: Uuid,
    /// Who is booking
    pub requester_id: Uuid,
}

/// A reservation as seen by clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReservationResponse {
    /// Reservation ID
    pub id: Uuid,
    /// Booked event
    pub event_id: Uuid,
    /// Who booked it
    pub requester_id: Uuid,
    /// `PENDING` until the ticket is issued, then `FINALIZED`
    pub status: ReservationStatus,
    /// Acceptance time
    pub created_at: DateTime<Utc>,
    /// Issuance time
    pub finalized_at: Option<DateTime<Utc>>,
}

impl From<Reservation> for ReservationResponse {
    fn from(reservation: Reservation) -> Self {
        Self {
            id: *reservation.id.as_uuid(),
            event_id: *reservation.resource_id.as_uuid(),
            requester_id: *reservation.requester_id.as_uuid(),
            status: reservation.status,
            created_at: reservation.created_at,
            finalized_at: reservation.finalized_at,
        }
    }
}

/// Book one ticket.
///
/// Returns as soon as the reservation is durably PENDING. Ticket issuance
/// happens asynchronously; poll `GET /api/reservations/:id` for the outcome.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/bookings \
///   -H "Content-Type: application/json" \
///   -d '{"event_id": "…", "requester_id": "…"}'
/// ```
///
/// # Errors
///
/// - 409 if the event is sold out, busy or unknown
/// - 503 if storage or the lock backend is unavailable
pub async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<BookRequest>,
) -> Result<(StatusCode, Json<ReservationResponse>), AppError> {
    let reservation = state
        .service
        .reserve(
            ResourceId::from_uuid(request.event_id),
            RequesterId::from_uuid(request.requester_id),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(reservation.into())))
}

/// Look up one reservation.
///
/// # Errors
///
/// - 404 if the reservation does not exist
/// - 503 if storage is unavailable
pub async fn get_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<Uuid>,
) -> Result<Json<ReservationResponse>, AppError> {
    state
        .service
        .get_reservation(ReservationId::from_uuid(reservation_id))
        .await?
        .map(|reservation| Json(reservation.into()))
        .ok_or_else(|| AppError::not_found("Reservation", reservation_id))
}
