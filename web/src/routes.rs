//! Router configuration.

use crate::handlers::{bookings, events, health_check, reports};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Build the complete router.
///
/// ```text
/// GET  /health
/// POST /api/events
/// GET  /api/events/:id/stats
/// POST /api/bookings
/// GET  /api/reservations/:id
/// GET  /api/reports
/// GET  /api/reports/events/:id
/// ```
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/events", post(events::create_event))
        .route("/events/:id/stats", get(events::get_event_stats))
        .route("/bookings", post(bookings::create_booking))
        .route("/reservations/:id", get(bookings::get_reservation))
        .route("/reports", get(reports::overall_report))
        .route("/reports/events/:id", get(reports::event_report));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
