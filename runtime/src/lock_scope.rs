//! Scoped ownership of an admission lock lease.

use crate::metrics::AdmissionMetrics;
use boxoffice_core::lock::{AdmissionLock, LockLease};
use std::sync::Arc;
use tracing::{debug, warn};

/// Holds a lease until [`release`](Self::release) is awaited or the guard is dropped.
///
/// The normal and error paths call `release` explicitly. If the owning future
/// is cancelled or panics, `Drop` spawns the release onto the current Tokio
/// runtime. Without a runtime the lease is left to expire.
pub struct LeaseGuard {
    lock: Arc<dyn AdmissionLock>,
    lease: Option<LockLease>,
}

impl LeaseGuard {
    /// Take ownership of a freshly acquired lease.
    #[must_use]
    pub fn new(lock: Arc<dyn AdmissionLock>, lease: LockLease) -> Self {
        Self {
            lock,
            lease: Some(lease),
        }
    }

    /// Release the lease now.
    ///
    /// Release is best effort: a failure is logged and counted, and the lease
    /// expires on its own.
    pub async fn release(mut self) {
        if let Some(lease) = self.lease.take() {
            release_lease(Arc::clone(&self.lock), lease).await;
        }
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        let Some(lease) = self.lease.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(key = %lease.key, "Releasing admission lock from drop guard");
                handle.spawn(release_lease(Arc::clone(&self.lock), lease));
            }
            Err(_) => {
                warn!(
                    key = %lease.key,
                    lease_ms = lease.lease.as_millis(),
                    "No runtime to release admission lock, lease will expire"
                );
            }
        }
    }
}

async fn release_lease(lock: Arc<dyn AdmissionLock>, lease: LockLease) {
    let key = lease.key.clone();
    if let Err(e) = lock.release(lease).await {
        AdmissionMetrics::record_release_failure();
        warn!(key = %key, error = %e, "Failed to release admission lock");
    }
}
