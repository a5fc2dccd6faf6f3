//! Distributed admission lock abstraction.
//!
//! A lease-based, per-resource mutex shared by every process that admits
//! reservations. Leases expire on their own, so a crashed holder blocks a
//! resource for at most one lease duration.

use crate::BoxFuture;
use crate::types::ResourceId;
use std::time::Duration;
use thiserror::Error;

/// Prefix for per-resource lock keys.
pub const LOCK_KEY_PREFIX: &str = "admission_lock";

/// Build the lock key for a resource.
#[must_use]
pub fn lock_key(resource_id: ResourceId) -> String {
    format!("{LOCK_KEY_PREFIX}:{resource_id}")
}

/// Errors from the lock backend.
///
/// A wait timeout is not an error: `acquire` returns `Ok(None)`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// Backend unreachable or returned an unexpected reply
    #[error("Lock backend error: {0}")]
    Backend(String),
}

/// A held lease.
///
/// The token identifies the holder so that release only deletes a lease this
/// holder still owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    /// Lock key
    pub key: String,
    /// Random owner token
    pub token: String,
    /// Lease duration requested at acquisition
    pub lease: Duration,
}

/// Lease and wait durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockSettings {
    /// How long a lease lives if never released
    pub lease: Duration,
    /// How long `acquire` may block
    pub wait_timeout: Duration,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(10),
            wait_timeout: Duration::from_secs(5),
        }
    }
}

/// Cross-process mutual exclusion with a bounded lease.
pub trait AdmissionLock: Send + Sync {
    /// Try to take the lock, blocking up to `wait_timeout`.
    ///
    /// Returns `Ok(None)` on timeout.
    ///
    /// # Errors
    ///
    /// Returns [`LockError`] if the backend fails.
    fn acquire<'a>(
        &'a self,
        key: &'a str,
        lease: Duration,
        wait_timeout: Duration,
    ) -> BoxFuture<'a, Result<Option<LockLease>, LockError>>;

    /// Release a lease if it is still owned by its token.
    ///
    /// Releasing an expired or foreign lease is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`LockError`] if the backend fails.
    fn release(&self, lease: LockLease) -> BoxFuture<'_, Result<(), LockError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_key_is_namespaced_by_resource() {
        let id = ResourceId::new();
        assert_eq!(lock_key(id), format!("admission_lock:{id}"));
    }

    #[test]
    fn default_settings() {
        let settings = LockSettings::default();
        assert_eq!(settings.lease, Duration::from_secs(10));
        assert_eq!(settings.wait_timeout, Duration::from_secs(5));
    }
}
