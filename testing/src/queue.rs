//! In-memory finalization queue.

#![allow(clippy::unwrap_used)] // Poisoned test mutexes should fail loudly

use boxoffice_core::BoxFuture;
use boxoffice_core::queue::{
    AckOutcome, Delivery, FinalizationJob, FinalizationQueue, JobStream, QueueError,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, oneshot};

#[derive(Debug, Default)]
struct Inner {
    ready: Mutex<VecDeque<FinalizationJob>>,
    notify: Notify,
    history: Mutex<Vec<FinalizationJob>>,
    acked: AtomicUsize,
    nacked: AtomicUsize,
    fail_enqueue: AtomicBool,
}

impl Inner {
    fn push(&self, job: FinalizationJob) {
        self.ready.lock().unwrap().push_back(job);
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<FinalizationJob> {
        self.ready.lock().unwrap().pop_front()
    }

    fn settle(&self, job: FinalizationJob, outcome: AckOutcome) {
        match outcome {
            AckOutcome::Ack => {
                self.acked.fetch_add(1, Ordering::SeqCst);
            }
            AckOutcome::Nack => {
                self.nacked.fetch_add(1, Ordering::SeqCst);
                self.push(job);
            }
        }
    }
}

/// At-least-once queue backed by a `VecDeque`.
///
/// Nacked (or dropped) deliveries go back to the end of the queue. Every
/// enqueued job is also kept in a history for assertions.
#[derive(Clone, Debug, Default)]
pub struct InMemoryFinalizationQueue {
    inner: Arc<Inner>,
}

impl InMemoryFinalizationQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `enqueue` fail.
    pub fn fail_enqueue(&self, fail: bool) {
        self.inner.fail_enqueue.store(fail, Ordering::SeqCst);
    }

    /// Every job ever accepted by `enqueue`, in order.
    #[must_use]
    pub fn enqueued(&self) -> Vec<FinalizationJob> {
        self.inner.history.lock().unwrap().clone()
    }

    /// Jobs waiting to be delivered.
    #[must_use]
    pub fn ready_len(&self) -> usize {
        self.inner.ready.lock().unwrap().len()
    }

    /// Deliveries settled with ack.
    #[must_use]
    pub fn acked(&self) -> usize {
        self.inner.acked.load(Ordering::SeqCst)
    }

    /// Deliveries settled with nack (including dropped ones).
    #[must_use]
    pub fn nacked(&self) -> usize {
        self.inner.nacked.load(Ordering::SeqCst)
    }
}

impl FinalizationQueue for InMemoryFinalizationQueue {
    fn enqueue<'a>(&'a self, job: &'a FinalizationJob) -> BoxFuture<'a, Result<(), QueueError>> {
        Box::pin(async move {
            if self.inner.fail_enqueue.load(Ordering::SeqCst) {
                return Err(QueueError::EnqueueFailed {
                    reservation_id: job.reservation_id,
                    reason: "broker unavailable".to_string(),
                });
            }
            self.inner.history.lock().unwrap().push(job.clone());
            self.inner.push(job.clone());
            Ok(())
        })
    }

    fn subscribe(&self) -> BoxFuture<'_, Result<JobStream, QueueError>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let stream = async_stream::stream! {
                loop {
                    let Some(job) = inner.pop() else {
                        inner.notify.notified().await;
                        continue;
                    };

                    let (tx, rx) = oneshot::channel();
                    let settle_inner = Arc::clone(&inner);
                    let redelivery = job.clone();
                    tokio::spawn(async move {
                        let outcome = rx.await.unwrap_or(AckOutcome::Nack);
                        settle_inner.settle(redelivery, outcome);
                    });

                    yield Ok(Delivery::new(job, tx));
                }
            };
            let stream: JobStream = Box::pin(stream);
            Ok(stream)
        })
    }
}
