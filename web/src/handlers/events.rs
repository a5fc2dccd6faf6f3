//! Event endpoints.
//!
//! - `POST /api/events` - create an event with a fixed capacity
//! - `GET /api/events/:id/stats` - capacity and reservation counters

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use boxoffice_core::{NewResource, Resource, ResourceId, ResourceStats};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest accepted event title, in characters.
pub const MAX_TITLE_LEN: usize = 200;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to create a new event.
#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    /// Event title (1-200 characters)
    pub title: String,
    /// Number of reservations the event admits (1 to `i32::MAX`)
    pub capacity: u32,
}

impl CreateEventRequest {
    fn validate(self) -> Result<NewResource, AppError> {
        let title_len = self.title.trim().chars().count();
        if title_len == 0 {
            return Err(AppError::validation("title must not be empty"));
        }
        if self.title.chars().count() > MAX_TITLE_LEN {
            return Err(AppError::validation(format!(
                "title must be at most {MAX_TITLE_LEN} characters"
            )));
        }
        if self.capacity == 0 {
            return Err(AppError::validation("capacity must be at least 1"));
        }
        if self.capacity > NewResource::MAX_CAPACITY {
            return Err(AppError::validation(format!(
                "capacity must be at most {}",
                NewResource::MAX_CAPACITY
            )));
        }
        Ok(NewResource::new(self.title, self.capacity))
    }
}

/// Event details.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventResponse {
    /// Event ID
    pub id: Uuid,
    /// Event title
    pub title: String,
    /// Maximum number of reservations
    pub capacity: u32,
    /// Reservations accepted so far
    pub reserved_count: u32,
}

impl From<Resource> for EventResponse {
    fn from(resource: Resource) -> Self {
        Self {
            id: *resource.id.as_uuid(),
            title: resource.title,
            capacity: resource.capacity,
            reserved_count: resource.reserved_count,
        }
    }
}

/// Per-event counters.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    /// Event ID
    pub event_id: Uuid,
    /// Maximum number of reservations
    pub capacity: u32,
    /// Reservations accepted so far
    pub reserved_count: u32,
    /// Reservations whose ticket was issued
    pub finalized_count: u64,
}

impl From<ResourceStats> for StatsResponse {
    fn from(stats: ResourceStats) -> Self {
        Self {
            event_id: *stats.resource_id.as_uuid(),
            capacity: stats.capacity,
            reserved_count: stats.reserved_count,
            finalized_count: stats.finalized_count,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new event.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/events \
///   -H "Content-Type: application/json" \
///   -d '{"title": "Tech Conference", "capacity": 500}'
/// ```
///
/// # Errors
///
/// - 422 if the title or capacity is invalid
/// - 503 if storage is unavailable
pub async fn create_event(
    State(state): State<AppState>,
    Json(request): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventResponse>), AppError> {
    let new_resource = request.validate()?;
    let resource = state.service.create_resource(new_resource).await?;
    Ok((StatusCode::CREATED, Json(resource.into())))
}

/// Counters for one event.
///
/// # Errors
///
/// - 404 if the event does not exist
/// - 503 if storage is unavailable
pub async fn get_event_stats(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<StatsResponse>, AppError> {
    load_stats(&state, event_id).await.map(Json)
}

pub(crate) async fn load_stats(state: &AppState, event_id: Uuid) -> Result<StatsResponse, AppError> {
    state
        .service
        .get_stats(ResourceId::from_uuid(event_id))
        .await?
        .map(StatsResponse::from)
        .ok_or_else(|| AppError::not_found("Event", event_id))
}
