//! Redpanda finalization queue for Box Office.
//!
//! Implements [`FinalizationQueue`] from `boxoffice-core` on top of rdkafka, so
//! any Kafka-compatible broker works (Redpanda, Apache Kafka, MSK).
//!
//! # Delivery Semantics
//!
//! **At-least-once** with manual offset commits:
//! - Jobs are keyed by reservation id, so every job for one reservation lands
//!   on the same partition
//! - The consumer task hands one [`Delivery`] at a time to the subscriber and
//!   waits for it to be settled
//! - `ack` commits the offset
//! - `nack` (or dropping the delivery) seeks back to the same offset, so the
//!   job is read again after `redelivery_delay`
//! - If the process crashes before commit, the job is redelivered to another
//!   member of the consumer group
//!
//! Undecodable payloads are committed (they can never succeed) and surfaced to
//! the subscriber as [`QueueError::MalformedPayload`].
//!
//! # Example
//!
//! ```no_run
//! use boxoffice_core::queue::{FinalizationJob, FinalizationQueue};
//! use boxoffice_core::{ReservationId, Utc};
//! use boxoffice_redpanda::RedpandaFinalizationQueue;
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let queue = RedpandaFinalizationQueue::builder()
//!     .brokers("localhost:9092")
//!     .topic("boxoffice-finalization")
//!     .consumer_group("boxoffice-finalizers")
//!     .build()?;
//!
//! queue.enqueue(&FinalizationJob::new(ReservationId::new(), Utc::now())).await?;
//!
//! let mut jobs = queue.subscribe().await?;
//! while let Some(delivery) = jobs.next().await {
//!     let delivery = delivery?;
//!     println!("finalize {}", delivery.job().reservation_id);
//!     delivery.ack();
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use boxoffice_core::BoxFuture;
use boxoffice_core::queue::{
    AckOutcome, Delivery, FinalizationJob, FinalizationQueue, JobStream, QueueError,
};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::Offset;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Default topic for finalization jobs.
pub const DEFAULT_TOPIC: &str = "boxoffice-finalization";

/// Default consumer group shared by all finalization workers.
pub const DEFAULT_CONSUMER_GROUP: &str = "boxoffice-finalizers";

/// Redpanda-backed [`FinalizationQueue`].
///
/// # Example
///
/// ```no_run
/// use boxoffice_redpanda::RedpandaFinalizationQueue;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// // Basic configuration
/// let queue = RedpandaFinalizationQueue::new("localhost:9092")?;
///
/// // Custom configuration
/// let queue = RedpandaFinalizationQueue::builder()
///     .brokers("localhost:9092,localhost:9093")
///     .producer_acks("all")
///     .redelivery_delay(std::time::Duration::from_secs(2))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RedpandaFinalizationQueue {
    /// Kafka producer for publishing jobs
    producer: FutureProducer,
    /// Broker addresses (for creating consumers)
    brokers: String,
    topic: String,
    consumer_group: String,
    /// Producer timeout
    timeout: Duration,
    auto_offset_reset: String,
    redelivery_delay: Duration,
}

impl RedpandaFinalizationQueue {
    /// Create a queue with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ConnectionFailed`] if the producer cannot be created.
    pub fn new(brokers: &str) -> Result<Self, QueueError> {
        Self::builder().brokers(brokers).build()
    }

    /// Create a new builder.
    #[must_use]
    pub fn builder() -> RedpandaFinalizationQueueBuilder {
        RedpandaFinalizationQueueBuilder::default()
    }

    /// Broker addresses.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }

    /// Topic jobs are published to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Consumer group used by `subscribe`.
    #[must_use]
    pub fn consumer_group(&self) -> &str {
        &self.consumer_group
    }
}

/// Builder for [`RedpandaFinalizationQueue`].
#[derive(Default)]
pub struct RedpandaFinalizationQueueBuilder {
    brokers: Option<String>,
    topic: Option<String>,
    consumer_group: Option<String>,
    producer_acks: Option<String>,
    timeout: Option<Duration>,
    auto_offset_reset: Option<String>,
    redelivery_delay: Option<Duration>,
}

impl RedpandaFinalizationQueueBuilder {
    /// Comma-separated broker addresses (e.g. `"localhost:9092"`).
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Topic name. Default: [`DEFAULT_TOPIC`].
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Consumer group. Workers sharing a group share the partitions.
    ///
    /// Default: [`DEFAULT_CONSUMER_GROUP`].
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Producer acknowledgment mode: `"0"`, `"1"` or `"all"`.
    ///
    /// Default: `"all"`. A job lost between accept and finalize only comes
    /// back through the sweeper.
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Producer send timeout. Default: 5 seconds.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Where a new consumer group starts reading. Default: `"earliest"`.
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Pause before a nacked job is read again. Default: 1 second.
    #[must_use]
    pub const fn redelivery_delay(mut self, delay: Duration) -> Self {
        self.redelivery_delay = Some(delay);
        self
    }

    /// Build the [`RedpandaFinalizationQueue`].
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ConnectionFailed`] if brokers are not set or the
    /// producer cannot be created.
    pub fn build(self) -> Result<RedpandaFinalizationQueue, QueueError> {
        let brokers = self
            .brokers
            .ok_or_else(|| QueueError::ConnectionFailed("Brokers not configured".to_string()))?;
        let acks = self.producer_acks.unwrap_or_else(|| "all".to_string());

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", &acks)
            .create()
            .map_err(|e| QueueError::ConnectionFailed(format!("Failed to create producer: {e}")))?;

        let queue = RedpandaFinalizationQueue {
            producer,
            brokers,
            topic: self.topic.unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
            consumer_group: self
                .consumer_group
                .unwrap_or_else(|| DEFAULT_CONSUMER_GROUP.to_string()),
            timeout: self.timeout.unwrap_or(Duration::from_secs(5)),
            auto_offset_reset: self
                .auto_offset_reset
                .unwrap_or_else(|| "earliest".to_string()),
            redelivery_delay: self.redelivery_delay.unwrap_or(Duration::from_secs(1)),
        };

        tracing::info!(
            brokers = %queue.brokers,
            topic = %queue.topic,
            consumer_group = %queue.consumer_group,
            acks = %acks,
            "RedpandaFinalizationQueue created"
        );

        Ok(queue)
    }
}

impl FinalizationQueue for RedpandaFinalizationQueue {
    fn enqueue<'a>(&'a self, job: &'a FinalizationJob) -> BoxFuture<'a, Result<(), QueueError>> {
        Box::pin(async move {
            let payload = bincode::serialize(job).map_err(|e| QueueError::EnqueueFailed {
                reservation_id: job.reservation_id,
                reason: format!("Failed to serialize job: {e}"),
            })?;
            let key = job.reservation_id.to_string();

            let record = FutureRecord::to(&self.topic).payload(&payload).key(&key);

            match self.producer.send(record, Timeout::After(self.timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %self.topic,
                        partition,
                        offset,
                        reservation_id = %job.reservation_id,
                        "Finalization job published"
                    );
                    Ok(())
                }
                Err((kafka_error, _)) => {
                    tracing::error!(
                        topic = %self.topic,
                        reservation_id = %job.reservation_id,
                        error = %kafka_error,
                        "Failed to publish finalization job"
                    );
                    Err(QueueError::EnqueueFailed {
                        reservation_id: job.reservation_id,
                        reason: kafka_error.to_string(),
                    })
                }
            }
        })
    }

    fn subscribe(&self) -> BoxFuture<'_, Result<JobStream, QueueError>> {
        let brokers = self.brokers.clone();
        let topic = self.topic.clone();
        let consumer_group = self.consumer_group.clone();
        let auto_offset_reset = self.auto_offset_reset.clone();
        let redelivery_delay = self.redelivery_delay;

        Box::pin(async move {
            let consumer: StreamConsumer = ClientConfig::new()
                .set("bootstrap.servers", &brokers)
                .set("group.id", &consumer_group)
                .set("enable.auto.commit", "false")
                .set("auto.offset.reset", &auto_offset_reset)
                .set("session.timeout.ms", "6000")
                .set("enable.partition.eof", "false")
                .create()
                .map_err(|e| {
                    QueueError::SubscriptionFailed(format!("Failed to create consumer: {e}"))
                })?;

            consumer.subscribe(&[topic.as_str()]).map_err(|e| {
                QueueError::SubscriptionFailed(format!("Failed to subscribe to {topic}: {e}"))
            })?;

            tracing::info!(
                topic = %topic,
                consumer_group = %consumer_group,
                auto_offset_reset = %auto_offset_reset,
                "Subscribed to finalization jobs"
            );

            // Capacity 1: the consumer task never reads ahead of the subscriber.
            let (tx, rx) = mpsc::channel(1);
            tokio::spawn(forward_deliveries(consumer, tx, redelivery_delay));

            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(result) = rx.recv().await {
                    yield result;
                }
            };

            Ok(Box::pin(stream) as JobStream)
        })
    }
}

/// Owns the consumer. Hands out one delivery at a time and settles it.
async fn forward_deliveries(
    consumer: StreamConsumer,
    tx: mpsc::Sender<Result<Delivery, QueueError>>,
    redelivery_delay: Duration,
) {
    use futures::StreamExt;

    let mut stream = consumer.stream();

    while let Some(msg_result) = stream.next().await {
        let message = match msg_result {
            Ok(message) => message,
            Err(e) => {
                let err = QueueError::TransportError(format!("Failed to receive message: {e}"));
                if tx.send(Err(err)).await.is_err() {
                    break;
                }
                continue;
            }
        };

        let job = match decode(&message) {
            Ok(job) => job,
            Err(err) => {
                tracing::warn!(
                    topic = message.topic(),
                    partition = message.partition(),
                    offset = message.offset(),
                    error = %err,
                    "Skipping malformed finalization job"
                );
                commit(&consumer, &message);
                if tx.send(Err(err)).await.is_err() {
                    break;
                }
                continue;
            }
        };

        let (settle_tx, settle_rx) = oneshot::channel();
        if tx.send(Ok(Delivery::new(job, settle_tx))).await.is_err() {
            tracing::debug!("Subscriber dropped, exiting consumer task");
            break;
        }

        // A dropped sender means the Delivery was dropped unsettled.
        match settle_rx.await.unwrap_or(AckOutcome::Nack) {
            AckOutcome::Ack => commit(&consumer, &message),
            AckOutcome::Nack => {
                tokio::time::sleep(redelivery_delay).await;
                if let Err(e) = consumer.seek(
                    message.topic(),
                    message.partition(),
                    Offset::Offset(message.offset()),
                    Timeout::After(Duration::from_secs(5)),
                ) {
                    tracing::warn!(
                        topic = message.topic(),
                        partition = message.partition(),
                        offset = message.offset(),
                        error = %e,
                        "Failed to seek back after nack (job returns on rebalance or sweep)"
                    );
                }
            }
        }
    }

    tracing::debug!("Finalization consumer task exiting");
}

fn decode(message: &BorrowedMessage<'_>) -> Result<FinalizationJob, QueueError> {
    let payload = message
        .payload()
        .ok_or_else(|| QueueError::MalformedPayload("Message has no payload".to_string()))?;
    bincode::deserialize::<FinalizationJob>(payload)
        .map_err(|e| QueueError::MalformedPayload(format!("Failed to deserialize job: {e}")))
}

fn commit(consumer: &StreamConsumer, message: &BorrowedMessage<'_>) {
    if let Err(e) = consumer.commit_message(message, CommitMode::Async) {
        tracing::warn!(
            topic = message.topic(),
            partition = message.partition(),
            offset = message.offset(),
            error = %e,
            "Failed to commit offset (job may be redelivered)"
        );
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn queue_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RedpandaFinalizationQueue>();
        assert_sync::<RedpandaFinalizationQueue>();
    }

    #[test]
    fn build_without_brokers_fails() {
        let result = RedpandaFinalizationQueue::builder().build();
        assert!(matches!(result, Err(QueueError::ConnectionFailed(_))));
    }

    #[test]
    fn builder_applies_defaults() {
        // Creating a producer does not contact the broker.
        let queue = RedpandaFinalizationQueue::new("localhost:9092").expect("producer");
        assert_eq!(queue.topic(), DEFAULT_TOPIC);
        assert_eq!(queue.consumer_group(), DEFAULT_CONSUMER_GROUP);
        assert_eq!(queue.brokers(), "localhost:9092");
    }
}
