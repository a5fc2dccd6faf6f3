//! Property tests: no overselling, exact saturation, with and without the lock.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use boxoffice_core::capacity::CapacityStore;
use boxoffice_core::lock::AdmissionLock;
use boxoffice_core::{ErrorKind, NewResource, RequesterId};
use boxoffice_runtime::AdmissionController;
use boxoffice_testing::properties::capacity_and_demand;
use boxoffice_testing::{InMemoryAdmissionLock, InMemoryReservationStore, PassthroughLock, test_clock};
use proptest::prelude::*;
use std::sync::Arc;

/// Fire `demand` concurrent reserves at one resource of `capacity`.
///
/// Returns `(accepted, rejected, reserved_count, ledger_rows)`.
async fn run_burst(capacity: u32, demand: usize, lock: Arc<dyn AdmissionLock>) -> (usize, usize, u32, usize) {
    let store = InMemoryReservationStore::new();
    let resource = store.create_resource(NewResource::new("Burst", capacity)).await.unwrap();
    let controller = AdmissionController::new(Arc::new(store.clone()), lock, Arc::new(test_clock()));

    let handles: Vec<_> = (0..demand)
        .map(|_| {
            let controller = controller.clone();
            tokio::spawn(async move { controller.reserve(resource.id, RequesterId::new()).await })
        })
        .collect();

    let mut accepted = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(e) => {
                assert_eq!(e.kind(), ErrorKind::Rejected);
                rejected += 1;
            }
        }
    }

    let reserved_count = store.resource(resource.id).await.unwrap().reserved_count;
    let rows = store.reservations_for(resource.id).await.len();
    (accepted, rejected, reserved_count, rows)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// The in-memory store holds its table mutex for the whole transaction,
    /// so transactions run one at a time here. This checks that the
    /// controller needs no lock for correctness; it cannot catch a
    /// non-atomic `try_reserve`. The real conditional update is exercised
    /// concurrently by `conditional_update_alone_prevents_overselling` in
    /// the postgres integration tests (Docker).
    #[test]
    fn never_oversells_without_a_lock((capacity, demand) in capacity_and_demand()) {
        let (accepted, rejected, reserved_count, rows) =
            runtime().block_on(run_burst(capacity, demand, Arc::new(PassthroughLock)));

        let expected = demand.min(capacity as usize);
        prop_assert_eq!(accepted, expected);
        prop_assert_eq!(rejected, demand - expected);
        prop_assert_eq!(reserved_count as usize, expected);
        prop_assert_eq!(rows, expected);
    }

    #[test]
    fn never_oversells_with_the_lock((capacity, demand) in capacity_and_demand()) {
        let (accepted, _, reserved_count, rows) =
            runtime().block_on(run_burst(capacity, demand, Arc::new(InMemoryAdmissionLock::new())));

        // Lock timeouts may turn some would-be acceptances into rejections,
        // but never push the count past capacity.
        prop_assert!(reserved_count <= capacity);
        prop_assert_eq!(accepted, reserved_count as usize);
        prop_assert_eq!(rows, accepted);
    }
}

#[test]
fn uncontended_lock_saturates_exactly() {
    let (accepted, rejected, reserved_count, _) =
        runtime().block_on(run_burst(7, 20, Arc::new(InMemoryAdmissionLock::new())));

    assert_eq!(accepted, 7);
    assert_eq!(rejected, 13);
    assert_eq!(reserved_count, 7);
}
