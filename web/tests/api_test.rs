//! HTTP-level tests over in-memory collaborators.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use axum::http::StatusCode;
use axum_test::TestServer;
use boxoffice_core::ReservationId;
use boxoffice_core::lock::AdmissionLock;
use boxoffice_runtime::{
    AdmissionController, FinalizationDispatcher, FinalizationWorker, FinalizeOutcome,
    ReservationService, RetryPolicy,
};
use boxoffice_testing::{
    InMemoryFinalizationQueue, InMemoryReservationStore, PassthroughLock, RecordingIssuer,
    TimeoutLock, test_clock,
};
use boxoffice_web::handlers::bookings::ReservationResponse;
use boxoffice_web::handlers::events::{EventResponse, StatsResponse};
use boxoffice_web::handlers::reports::ReportResponse;
use boxoffice_web::{AppState, build_router};
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

struct Harness {
    server: TestServer,
    store: InMemoryReservationStore,
    queue: InMemoryFinalizationQueue,
}

fn harness_with_lock(lock: Arc<dyn AdmissionLock>) -> Harness {
    let store = InMemoryReservationStore::new();
    let queue = InMemoryFinalizationQueue::new();
    let store_arc = Arc::new(store.clone());
    let service = ReservationService::new(
        store_arc.clone(),
        store_arc.clone(),
        store_arc.clone(),
        AdmissionController::new(store_arc, lock, Arc::new(test_clock())),
        FinalizationDispatcher::new(Arc::new(queue.clone()), Arc::new(test_clock())),
    );
    let server = TestServer::new(build_router(AppState::new(service))).expect("test server");
    Harness { server, store, queue }
}

fn harness() -> Harness {
    harness_with_lock(Arc::new(PassthroughLock))
}

async fn create_event(server: &TestServer, title: &str, capacity: u32) -> EventResponse {
    let response = server
        .post("/api/events")
        .json(&json!({ "title": title, "capacity": capacity }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<EventResponse>()
}

async fn book(server: &TestServer, event_id: Uuid) -> axum_test::TestResponse {
    server
        .post("/api/bookings")
        .json(&json!({ "event_id": event_id, "requester_id": Uuid::new_v4() }))
        .await
}

#[tokio::test]
async fn health_is_ok() {
    let h = harness();
    let response = h.server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "ok");
}

#[tokio::test]
async fn create_event_validates_input() {
    let h = harness();

    let created = create_event(&h.server, "Concert", 2).await;
    assert_eq!(created.capacity, 2);
    assert_eq!(created.reserved_count, 0);

    let zero = h
        .server
        .post("/api/events")
        .json(&json!({ "title": "Concert", "capacity": 0 }))
        .await;
    zero.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(zero.json::<Value>()["code"], "VALIDATION_ERROR");

    let long_title = h
        .server
        .post("/api/events")
        .json(&json!({ "title": "x".repeat(201), "capacity": 1 }))
        .await;
    long_title.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let huge = h
        .server
        .post("/api/events")
        .json(&json!({ "title": "Stadium", "capacity": 3_000_000_000_u32 }))
        .await;
    huge.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(huge.json::<Value>()["code"], "VALIDATION_ERROR");

    let empty_title = h
        .server
        .post("/api/events")
        .json(&json!({ "title": "", "capacity": 1 }))
        .await;
    empty_title.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn booking_until_sold_out_returns_conflict() {
    let h = harness();
    let event = create_event(&h.server, "Play", 2).await;

    for _ in 0..2 {
        let response = book(&h.server, event.id).await;
        response.assert_status(StatusCode::CREATED);
        let reservation = response.json::<ReservationResponse>();
        assert_eq!(reservation.event_id, event.id);
        assert_eq!(reservation.status.as_str(), "PENDING");
        assert!(reservation.finalized_at.is_none());
    }

    let rejected = book(&h.server, event.id).await;
    rejected.assert_status(StatusCode::CONFLICT);
    assert_eq!(rejected.json::<Value>()["code"], "REJECTED");

    let stats = h
        .server
        .get(&format!("/api/events/{}/stats", event.id))
        .await
        .json::<StatsResponse>();
    assert_eq!(stats.event_id, event.id);
    assert_eq!(stats.capacity, 2);
    assert_eq!(stats.reserved_count, 2);
    assert_eq!(stats.finalized_count, 0);
    assert_eq!(h.queue.enqueued().len(), 2);
}

#[tokio::test]
async fn lock_timeout_is_a_conflict_not_an_outage() {
    let h = harness_with_lock(Arc::new(TimeoutLock));
    let event = create_event(&h.server, "Match", 5).await;

    let response = book(&h.server, event.id).await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(h.store.reservation_count().await, 0);
}

#[tokio::test]
async fn booking_unknown_event_is_rejected() {
    let h = harness();
    let response = book(&h.server, Uuid::new_v4()).await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["code"], "REJECTED");
    assert_eq!(h.store.reservation_count().await, 0);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let h = harness();
    let missing = Uuid::new_v4();

    h.server
        .get(&format!("/api/events/{missing}/stats"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    h.server
        .get(&format!("/api/reports/events/{missing}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    h.server
        .get(&format!("/api/reservations/{missing}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn store_outage_is_service_unavailable() {
    let h = harness();
    let event = create_event(&h.server, "Festival", 5).await;
    h.store.set_unavailable(true);

    let response = book(&h.server, event.id).await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.json::<Value>()["code"], "SERVICE_UNAVAILABLE");

    h.server.get("/api/reports").await.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn finalized_reservation_shows_in_status_and_reports() {
    let h = harness();
    let first = create_event(&h.server, "Opera", 3).await;
    let second = create_event(&h.server, "Ballet", 4).await;

    let reservation = book(&h.server, first.id).await.json::<ReservationResponse>();
    book(&h.server, second.id).await.assert_status(StatusCode::CREATED);

    let worker = FinalizationWorker::new(
        Arc::new(h.store.clone()),
        Arc::new(RecordingIssuer::new()),
        Arc::new(test_clock()),
    )
    .with_retry_policy(RetryPolicy::none());
    let outcome = worker
        .process(ReservationId::from_uuid(reservation.id))
        .await
        .unwrap();
    assert_eq!(outcome, FinalizeOutcome::Finalized);

    let fetched = h
        .server
        .get(&format!("/api/reservations/{}", reservation.id))
        .await
        .json::<ReservationResponse>();
    assert_eq!(fetched.status.as_str(), "FINALIZED");
    assert!(fetched.finalized_at.is_some());

    let report = h.server.get("/api/reports").await.json::<ReportResponse>();
    assert_eq!(report.total_capacity, 7);
    assert_eq!(report.total_reserved, 2);
    assert_eq!(report.total_finalized, 1);

    let event_report = h
        .server
        .get(&format!("/api/reports/events/{}", first.id))
        .await
        .json::<StatsResponse>();
    assert_eq!(event_report.finalized_count, 1);
}
