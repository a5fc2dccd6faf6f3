//! Admission lock doubles.

use boxoffice_core::BoxFuture;
use boxoffice_core::lock::{AdmissionLock, LockError, LockLease};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

const RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// In-process lease lock with expiry.
///
/// Mirrors the Redis lock semantics: one holder per key, leases expire after
/// their duration, release only deletes a lease whose token still matches.
/// Counts acquisitions and releases so tests can assert that every acquired
/// lease was given back.
#[derive(Clone, Debug, Default)]
pub struct InMemoryAdmissionLock {
    leases: Arc<Mutex<HashMap<String, (String, Instant)>>>,
    next_token: Arc<AtomicU64>,
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl InMemoryAdmissionLock {
    /// Create a lock with no leases held
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful acquisitions.
    #[must_use]
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Number of releases that deleted a lease.
    #[must_use]
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Whether a live lease exists for `key`.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn is_held(&self, key: &str) -> bool {
        let leases = self.leases.lock().unwrap();
        leases
            .get(key)
            .is_some_and(|(_, expires_at)| *expires_at > Instant::now())
    }

    #[allow(clippy::unwrap_used)]
    fn try_take(&self, key: &str, lease: Duration) -> Option<String> {
        let mut leases = self.leases.lock().unwrap();
        let now = Instant::now();
        if leases.get(key).is_some_and(|(_, expires_at)| *expires_at > now) {
            return None;
        }
        let token = self.next_token.fetch_add(1, Ordering::SeqCst).to_string();
        leases.insert(key.to_string(), (token.clone(), now + lease));
        Some(token)
    }
}

impl AdmissionLock for InMemoryAdmissionLock {
    fn acquire<'a>(
        &'a self,
        key: &'a str,
        lease: Duration,
        wait_timeout: Duration,
    ) -> BoxFuture<'a, Result<Option<LockLease>, LockError>> {
        Box::pin(async move {
            let deadline = Instant::now() + wait_timeout;
            loop {
                if let Some(token) = self.try_take(key, lease) {
                    self.acquired.fetch_add(1, Ordering::SeqCst);
                    return Ok(Some(LockLease {
                        key: key.to_string(),
                        token,
                        lease,
                    }));
                }
                if Instant::now() >= deadline {
                    return Ok(None);
                }
                tokio::time::sleep(RETRY_INTERVAL).await;
            }
        })
    }

    #[allow(clippy::unwrap_used)]
    fn release(&self, lease: LockLease) -> BoxFuture<'_, Result<(), LockError>> {
        Box::pin(async move {
            let mut leases = self.leases.lock().unwrap();
            if leases.get(&lease.key).is_some_and(|(token, _)| *token == lease.token) {
                leases.remove(&lease.key);
                self.released.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        })
    }
}

/// Lock that always grants immediately and never excludes anyone.
///
/// Admission must stay correct with this lock in place: the conditional
/// update alone prevents overselling.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughLock;

impl AdmissionLock for PassthroughLock {
    fn acquire<'a>(
        &'a self,
        key: &'a str,
        lease: Duration,
        _wait_timeout: Duration,
    ) -> BoxFuture<'a, Result<Option<LockLease>, LockError>> {
        Box::pin(async move {
            Ok(Some(LockLease {
                key: key.to_string(),
                token: "passthrough".to_string(),
                lease,
            }))
        })
    }

    fn release(&self, _lease: LockLease) -> BoxFuture<'_, Result<(), LockError>> {
        Box::pin(async { Ok(()) })
    }
}

/// Lock whose acquisition always times out.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimeoutLock;

impl AdmissionLock for TimeoutLock {
    fn acquire<'a>(
        &'a self,
        _key: &'a str,
        _lease: Duration,
        _wait_timeout: Duration,
    ) -> BoxFuture<'a, Result<Option<LockLease>, LockError>> {
        Box::pin(async { Ok(None) })
    }

    fn release(&self, _lease: LockLease) -> BoxFuture<'_, Result<(), LockError>> {
        Box::pin(async { Ok(()) })
    }
}

/// Lock whose backend is unreachable.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableLock;

impl AdmissionLock for UnavailableLock {
    fn acquire<'a>(
        &'a self,
        _key: &'a str,
        _lease: Duration,
        _wait_timeout: Duration,
    ) -> BoxFuture<'a, Result<Option<LockLease>, LockError>> {
        Box::pin(async { Err(LockError::Backend("connection refused".to_string())) })
    }

    fn release(&self, _lease: LockLease) -> BoxFuture<'_, Result<(), LockError>> {
        Box::pin(async { Err(LockError::Backend("connection refused".to_string())) })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const LEASE: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn second_holder_times_out() {
        let lock = InMemoryAdmissionLock::new();
        let first = lock.acquire("k", LEASE, Duration::ZERO).await.unwrap();
        assert!(first.is_some());

        let second = lock.acquire("k", LEASE, Duration::from_millis(5)).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn release_frees_the_key() {
        let lock = InMemoryAdmissionLock::new();
        let lease = lock.acquire("k", LEASE, Duration::ZERO).await.unwrap().unwrap();
        lock.release(lease).await.unwrap();

        assert!(!lock.is_held("k"));
        assert_eq!(lock.released(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_lease_cannot_release_new_holder() {
        let lock = InMemoryAdmissionLock::new();
        let stale = lock
            .acquire("k", Duration::from_millis(10), Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        tokio::time::advance(Duration::from_millis(20)).await;

        let fresh = lock.acquire("k", LEASE, Duration::ZERO).await.unwrap();
        assert!(fresh.is_some());

        lock.release(stale).await.unwrap();
        assert!(lock.is_held("k"));
    }
}
