//! # Box Office Testing
//!
//! In-memory collaborators and helpers for testing admission and finalization
//! without Postgres, Redis or Redpanda.
//!
//! This crate provides:
//! - [`InMemoryReservationStore`]: capacity store, ledger and reporting in one
//! - Lock doubles: [`InMemoryAdmissionLock`], [`PassthroughLock`], [`TimeoutLock`], [`UnavailableLock`]
//! - [`InMemoryFinalizationQueue`]: at-least-once queue with redelivery on nack
//! - [`RecordingIssuer`]: records issuance calls, can be told to fail
//! - [`FixedClock`] / [`test_clock`]: deterministic time
//!
//! ## Example
//!
//! ```ignore
//! use boxoffice_testing::{InMemoryReservationStore, PassthroughLock, test_clock};
//!
//! #[tokio::test]
//! async fn admits_one() {
//!     let store = Arc::new(InMemoryReservationStore::new());
//!     let resource = store.create_resource(NewResource::new("Gig", 1)).await?;
//!     let controller = AdmissionController::new(store, Arc::new(PassthroughLock), Arc::new(test_clock()));
//!     controller.reserve(resource.id, RequesterId::new()).await?;
//! }
//! ```

use chrono::{DateTime, Utc};
use boxoffice_core::environment::Clock;

pub mod issuer;
pub mod lock;
pub mod queue;
pub mod store;

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use boxoffice_testing::mocks::FixedClock;
    /// use boxoffice_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Test helpers.
pub mod helpers {
    /// Install a test-writer tracing subscriber once per process.
    ///
    /// Safe to call from every test; later calls are ignored.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "boxoffice=debug".into()),
            )
            .try_init();
    }
}

/// Property-based testing strategies.
pub mod properties {
    use proptest::prelude::*;

    /// A resource capacity and a number of concurrent reserve calls against it.
    ///
    /// Demand ranges from zero up to well past capacity so that both the
    /// under-subscribed and the saturated cases are generated.
    pub fn capacity_and_demand() -> impl Strategy<Value = (u32, usize)> {
        (0u32..12).prop_flat_map(|capacity| (Just(capacity), 0usize..=(capacity as usize * 3 + 4)))
    }
}

// Re-export commonly used items
pub use issuer::RecordingIssuer;
pub use lock::{InMemoryAdmissionLock, PassthroughLock, TimeoutLock, UnavailableLock};
pub use mocks::{FixedClock, test_clock};
pub use queue::InMemoryFinalizationQueue;
pub use store::InMemoryReservationStore;
