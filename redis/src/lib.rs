//! Redis-backed distributed admission lock.
//!
//! # Algorithm
//!
//! Acquire:
//! 1. `SET key token NX PX lease_ms` with a fresh random token
//! 2. On `nil`, sleep `retry_interval` and try again until `wait_timeout`
//!
//! Release (Lua, atomic):
//!
//! ```lua
//! if redis.call("GET", KEYS[1]) == ARGV[1] then
//!     return redis.call("DEL", KEYS[1])
//! end
//! return 0
//! ```
//!
//! The token comparison stops a holder whose lease already expired from
//! deleting the lease of whoever took the key after it.

use boxoffice_core::BoxFuture;
use boxoffice_core::lock::{AdmissionLock, LockError, LockLease};
use redis::aio::ConnectionManager;
use redis::{Client, Script};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#;

/// `Redis` implementation of [`AdmissionLock`].
///
/// # Example
///
/// ```no_run
/// use boxoffice_core::lock::AdmissionLock;
/// use boxoffice_redis::RedisAdmissionLock;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let lock = RedisAdmissionLock::new("redis://127.0.0.1:6379").await?;
///
/// if let Some(lease) = lock
///     .acquire("admission_lock:42", Duration::from_secs(10), Duration::from_secs(5))
///     .await?
/// {
///     // critical section
///     lock.release(lease).await?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisAdmissionLock {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
    release_script: Script,
    retry_interval: Duration,
}

impl RedisAdmissionLock {
    /// Connect to `Redis`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Backend`] if the client cannot be created or the
    /// connection cannot be established.
    pub async fn new(redis_url: &str) -> Result<Self, LockError> {
        let client = Client::open(redis_url)
            .map_err(|e| LockError::Backend(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            LockError::Backend(format!("Failed to create Redis connection manager: {e}"))
        })?;

        tracing::info!("Connected to Redis admission lock backend");

        Ok(Self {
            conn_manager,
            release_script: Script::new(RELEASE_SCRIPT),
            retry_interval: Duration::from_millis(50),
        })
    }

    /// Set how often a blocked `acquire` retries (default 50ms).
    #[must_use]
    pub const fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    /// `PING` the server, for health checks.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Backend`] if `Redis` does not answer.
    pub async fn ping(&self) -> Result<(), LockError> {
        let mut conn = self.conn_manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError::Backend(format!("Redis ping failed: {e}")))?;
        Ok(())
    }

    async fn try_set(&self, key: &str, token: &str, lease: Duration) -> Result<bool, LockError> {
        let mut conn = self.conn_manager.clone();
        #[allow(clippy::cast_possible_truncation)] // Leases are seconds, far below u64::MAX ms
        let lease_ms = (lease.as_millis() as u64).max(1);

        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(lease_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError::Backend(format!("Failed to acquire lock {key}: {e}")))?;

        Ok(reply.is_some())
    }
}

impl AdmissionLock for RedisAdmissionLock {
    fn acquire<'a>(
        &'a self,
        key: &'a str,
        lease: Duration,
        wait_timeout: Duration,
    ) -> BoxFuture<'a, Result<Option<LockLease>, LockError>> {
        Box::pin(async move {
            let token = Uuid::new_v4().to_string();
            let deadline = Instant::now() + wait_timeout;

            loop {
                if self.try_set(key, &token, lease).await? {
                    tracing::debug!(key = %key, "Admission lock acquired");
                    return Ok(Some(LockLease {
                        key: key.to_string(),
                        token,
                        lease,
                    }));
                }

                let now = Instant::now();
                if now >= deadline {
                    tracing::debug!(key = %key, wait_ms = wait_timeout.as_millis(), "Admission lock wait timed out");
                    return Ok(None);
                }
                tokio::time::sleep(self.retry_interval.min(deadline - now)).await;
            }
        })
    }

    fn release(&self, lease: LockLease) -> BoxFuture<'_, Result<(), LockError>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let deleted: i64 = self
                .release_script
                .key(&lease.key)
                .arg(&lease.token)
                .invoke_async(&mut conn)
                .await
                .map_err(|e| LockError::Backend(format!("Failed to release lock {}: {e}", lease.key)))?;

            if deleted == 0 {
                tracing::warn!(
                    key = %lease.key,
                    "Admission lock already expired or taken over before release"
                );
            } else {
                tracing::debug!(key = %lease.key, "Admission lock released");
            }
            Ok(())
        })
    }
}
