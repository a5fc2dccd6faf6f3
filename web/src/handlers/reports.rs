//! Reporting endpoints.
//!
//! - `GET /api/reports` - totals across all events
//! - `GET /api/reports/events/:id` - counters for one event

use super::events::{StatsResponse, load_stats};
use crate::WebResult;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use boxoffice_core::OverallReport;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Totals across every event.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReportResponse {
    /// Sum of capacities
    pub total_capacity: u64,
    /// Sum of reserved counts
    pub total_reserved: u64,
    /// Finalized reservations
    pub total_finalized: u64,
}

impl From<OverallReport> for ReportResponse {
    fn from(report: OverallReport) -> Self {
        Self {
            total_capacity: report.total_capacity,
            total_reserved: report.total_reserved,
            total_finalized: report.total_finalized,
        }
    }
}

/// Aggregate report.
///
/// # Errors
///
/// Returns 503 if storage is unavailable.
pub async fn overall_report(State(state): State<AppState>) -> WebResult<Json<ReportResponse>> {
    let report = state.service.report().await?;
    Ok(Json(report.into()))
}

/// Same counters as `GET /api/events/:id/stats`.
///
/// # Errors
///
/// - 404 if the event does not exist
/// - 503 if storage is unavailable
pub async fn event_report(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<StatsResponse>, AppError> {
    load_stats(&state, event_id).await.map(Json)
}
