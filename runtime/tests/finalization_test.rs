//! Finalization worker, consumer loop and pending sweeper.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)] // Test code can use unwrap/expect

use boxoffice_core::capacity::CapacityStore;
use boxoffice_core::environment::Clock;
use boxoffice_core::ledger::ReservationLedger;
use boxoffice_core::reporting::ReportingQuery;
use boxoffice_core::{
    DateTime, NewResource, RequesterId, Reservation, ReservationId, ReservationStatus, ResourceId, Utc,
};
use boxoffice_runtime::{
    AdmissionController, FinalizationConsumer, FinalizationDispatcher, FinalizationWorker,
    FinalizeOutcome, PendingSweeper, ReservationService, RetryPolicy, SweeperSettings,
};
use boxoffice_testing::{
    InMemoryFinalizationQueue, InMemoryReservationStore, PassthroughLock, RecordingIssuer,
    test_clock,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

fn worker(store: &InMemoryReservationStore, issuer: &RecordingIssuer) -> FinalizationWorker {
    FinalizationWorker::new(Arc::new(store.clone()), Arc::new(issuer.clone()), Arc::new(test_clock()))
        .with_retry_policy(RetryPolicy::none())
}

fn service(store: &InMemoryReservationStore, queue: &InMemoryFinalizationQueue) -> ReservationService {
    let store_arc = Arc::new(store.clone());
    ReservationService::new(
        store_arc.clone(),
        store_arc.clone(),
        store_arc.clone(),
        AdmissionController::new(store_arc, Arc::new(PassthroughLock), Arc::new(test_clock())),
        FinalizationDispatcher::new(Arc::new(queue.clone()), Arc::new(test_clock())),
    )
}

async fn wait_for_status(store: &InMemoryReservationStore, id: ReservationId, status: ReservationStatus) {
    for _ in 0..200 {
        if store.get(id).await.unwrap().is_some_and(|r| r.status == status) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("reservation {id} never reached {status}");
}

fn pending(resource_id: ResourceId, created_at: DateTime<Utc>) -> Reservation {
    Reservation {
        id: ReservationId::new(),
        resource_id,
        requester_id: RequesterId::new(),
        status: ReservationStatus::Pending,
        created_at,
        finalized_at: None,
    }
}

#[tokio::test]
async fn finalizing_twice_issues_once() {
    let store = InMemoryReservationStore::new();
    let queue = InMemoryFinalizationQueue::new();
    let issuer = RecordingIssuer::new();
    let resource = store.create_resource(NewResource::new("Gig", 1)).await.unwrap();
    let reservation = service(&store, &queue)
        .reserve(resource.id, RequesterId::new())
        .await
        .unwrap();
    let worker = worker(&store, &issuer);

    assert_eq!(worker.process(reservation.id).await.unwrap(), FinalizeOutcome::Finalized);
    assert_eq!(
        worker.process(reservation.id).await.unwrap(),
        FinalizeOutcome::AlreadyFinalized
    );

    assert_eq!(issuer.issued_count(reservation.id), 1);
    let stored = store.get(reservation.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReservationStatus::Finalized);
}

#[tokio::test]
async fn finalizing_unknown_reservation_is_a_no_op() {
    let store = InMemoryReservationStore::new();
    let issuer = RecordingIssuer::new();

    let outcome = worker(&store, &issuer).process(ReservationId::new()).await.unwrap();

    assert_eq!(outcome, FinalizeOutcome::Missing);
    assert!(issuer.issued().is_empty());
    assert_eq!(store.reservation_count().await, 0);
}

#[tokio::test]
async fn consumer_finalizes_reserved_tickets() {
    boxoffice_testing::helpers::init_tracing();
    let store = InMemoryReservationStore::new();
    let queue = InMemoryFinalizationQueue::new();
    let issuer = RecordingIssuer::new();
    let resource = store.create_resource(NewResource::new("Gig", 3)).await.unwrap();
    let service = service(&store, &queue);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = FinalizationConsumer::new("test", Arc::new(queue.clone()), worker(&store, &issuer), shutdown_rx)
        .with_retry_delay(Duration::from_millis(10))
        .spawn();

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(service.reserve(resource.id, RequesterId::new()).await.unwrap().id);
    }
    for id in &ids {
        wait_for_status(&store, *id, ReservationStatus::Finalized).await;
    }

    let stats = store.stats(resource.id).await.unwrap().unwrap();
    assert_eq!(stats.reserved_count, 3);
    assert_eq!(stats.finalized_count, 3);
    let report = store.report().await.unwrap();
    assert_eq!(report.total_finalized, 3);

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn nacked_delivery_is_redelivered_until_finalized() {
    let store = InMemoryReservationStore::new();
    let queue = InMemoryFinalizationQueue::new();
    let issuer = RecordingIssuer::new();
    let resource = store.create_resource(NewResource::new("Gig", 1)).await.unwrap();
    let reservation = service(&store, &queue)
        .reserve(resource.id, RequesterId::new())
        .await
        .unwrap();
    issuer.fail_next(2);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = FinalizationConsumer::new("test", Arc::new(queue.clone()), worker(&store, &issuer), shutdown_rx)
        .spawn();

    wait_for_status(&store, reservation.id, ReservationStatus::Finalized).await;
    assert_eq!(issuer.issued_count(reservation.id), 1);
    assert_eq!(queue.nacked(), 2);

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn sweeper_requeues_only_stale_pending_reservations() {
    let store = InMemoryReservationStore::new();
    let queue = InMemoryFinalizationQueue::new();
    let resource = store.create_resource(NewResource::new("Gig", 10)).await.unwrap();
    let now = test_clock().now();

    let stale = pending(resource.id, now - chrono::Duration::minutes(10));
    let fresh = pending(resource.id, now - chrono::Duration::seconds(30));
    let mut done = pending(resource.id, now - chrono::Duration::minutes(10));
    done.status = ReservationStatus::Finalized;
    done.finalized_at = Some(now);
    for r in [&stale, &fresh, &done] {
        store.seed_reservation(r.clone()).await;
    }

    let sweeper = PendingSweeper::new(
        Arc::new(store.clone()),
        FinalizationDispatcher::new(Arc::new(queue.clone()), Arc::new(test_clock())),
        Arc::new(test_clock()),
        SweeperSettings {
            stale_after: Duration::from_secs(300),
            ..SweeperSettings::default()
        },
    );

    assert_eq!(sweeper.sweep_once().await.unwrap(), 1);
    let jobs = queue.enqueued();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].reservation_id, stale.id);
}

#[tokio::test]
async fn sweeper_respects_batch_size() {
    let store = InMemoryReservationStore::new();
    let queue = InMemoryFinalizationQueue::new();
    let resource = store.create_resource(NewResource::new("Gig", 10)).await.unwrap();
    let now = test_clock().now();
    for minutes in 10..15 {
        store
            .seed_reservation(pending(resource.id, now - chrono::Duration::minutes(minutes)))
            .await;
    }

    let sweeper = PendingSweeper::new(
        Arc::new(store.clone()),
        FinalizationDispatcher::new(Arc::new(queue.clone()), Arc::new(test_clock())),
        Arc::new(test_clock()),
        SweeperSettings {
            batch_size: 2,
            ..SweeperSettings::default()
        },
    );

    assert_eq!(sweeper.sweep_once().await.unwrap(), 2);
}
