//! Integration tests for `RedisAdmissionLock` using testcontainers.
//!
//! Run with: `cargo test -p boxoffice-redis -- --ignored`

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code uses expect for clear failure messages

use boxoffice_core::lock::{AdmissionLock, LockLease, lock_key};
use boxoffice_core::ResourceId;
use boxoffice_redis::RedisAdmissionLock;
use std::time::Duration;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;

async fn setup_lock() -> (ContainerAsync<Redis>, RedisAdmissionLock) {
    let container = Redis::default()
        .start()
        .await
        .expect("Failed to start redis container");
    let port = container
        .get_host_port_ipv4(6379)
        .await
        .expect("Failed to get redis port");

    let lock = RedisAdmissionLock::new(&format!("redis://127.0.0.1:{port}"))
        .await
        .expect("Failed to connect to redis")
        .with_retry_interval(Duration::from_millis(10));
    (container, lock)
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn second_acquirer_times_out_while_lease_is_held() {
    let (_container, lock) = setup_lock().await;
    let key = lock_key(ResourceId::new());

    let lease = lock
        .acquire(&key, Duration::from_secs(10), Duration::from_millis(100))
        .await
        .unwrap()
        .expect("first acquire");

    let blocked = lock
        .acquire(&key, Duration::from_secs(10), Duration::from_millis(100))
        .await
        .unwrap();
    assert!(blocked.is_none());

    lock.release(lease).await.unwrap();

    let after = lock
        .acquire(&key, Duration::from_secs(10), Duration::from_millis(100))
        .await
        .unwrap();
    assert!(after.is_some());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn lease_expires_without_release() {
    let (_container, lock) = setup_lock().await;
    let key = lock_key(ResourceId::new());

    let _abandoned = lock
        .acquire(&key, Duration::from_millis(200), Duration::from_millis(50))
        .await
        .unwrap()
        .expect("first acquire");

    let next = lock
        .acquire(&key, Duration::from_secs(10), Duration::from_secs(2))
        .await
        .unwrap();
    assert!(next.is_some(), "expired lease should be acquirable");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn release_with_foreign_token_keeps_current_holder() {
    let (_container, lock) = setup_lock().await;
    let key = lock_key(ResourceId::new());

    let holder = lock
        .acquire(&key, Duration::from_secs(10), Duration::from_millis(100))
        .await
        .unwrap()
        .expect("acquire");

    lock.release(LockLease {
        key: key.clone(),
        token: "someone-else".to_string(),
        lease: Duration::from_secs(10),
    })
    .await
    .unwrap();

    let blocked = lock
        .acquire(&key, Duration::from_secs(10), Duration::from_millis(50))
        .await
        .unwrap();
    assert!(blocked.is_none(), "foreign release must not free the key");

    lock.release(holder).await.unwrap();
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn ping_reports_healthy_backend() {
    let (_container, lock) = setup_lock().await;
    lock.ping().await.expect("ping");
}
