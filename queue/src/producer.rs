//! Producer for the primary order stream.

use crate::error::QueueError;
use crate::{HEADER_CORRELATION_ID, HEADER_REQUEST_ID, ORDERS_TOPIC};
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;

/// Publishes serialized orders to the `orders` topic.
///
/// Messages carry no key: nothing downstream relies on cross-partition
/// ordering, and an unkeyed stream spreads a flash-sale burst across
/// partitions instead of hot-spotting one.
pub struct OrderProducer {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl OrderProducer {
    /// Create a producer with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ConnectionFailed`] if the producer cannot be
    /// created from the broker list.
    pub fn new(brokers: &str) -> Result<Self, QueueError> {
        Self::builder().brokers(brokers).build()
    }

    /// Create a builder for custom configuration.
    #[must_use]
    pub fn builder() -> OrderProducerBuilder {
        OrderProducerBuilder::default()
    }

    /// Publish one serialized order with its correlation headers.
    ///
    /// Returns the partition and offset the broker assigned.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::PublishFailed`] when the send is not
    /// acknowledged within the producer timeout.
    pub async fn publish(
        &self,
        payload: &[u8],
        correlation_id: &str,
        request_id: &str,
    ) -> Result<(i32, i64), QueueError> {
        let headers = OwnedHeaders::new()
            .insert(Header {
                key: HEADER_CORRELATION_ID,
                value: Some(correlation_id),
            })
            .insert(Header {
                key: HEADER_REQUEST_ID,
                value: Some(request_id),
            });

        let record = FutureRecord::<(), _>::to(&self.topic)
            .payload(payload)
            .headers(headers);

        match self.producer.send(record, Timeout::After(self.timeout)).await {
            Ok((partition, offset)) => {
                tracing::debug!(
                    topic = %self.topic,
                    partition = partition,
                    offset = offset,
                    correlation_id = %correlation_id,
                    request_id = %request_id,
                    "Order published"
                );
                Ok((partition, offset))
            }
            Err((kafka_error, _)) => {
                tracing::error!(
                    topic = %self.topic,
                    error = %kafka_error,
                    correlation_id = %correlation_id,
                    "Failed to publish order"
                );
                Err(QueueError::PublishFailed {
                    topic: self.topic.clone(),
                    reason: kafka_error.to_string(),
                })
            }
        }
    }
}

/// Builder for configuring an [`OrderProducer`].
#[derive(Default)]
pub struct OrderProducerBuilder {
    brokers: Option<String>,
    topic: Option<String>,
    acks: Option<String>,
    timeout: Option<Duration>,
}

impl OrderProducerBuilder {
    /// Comma-separated broker addresses.
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Target topic (default `orders`).
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Producer acknowledgment mode: "0", "1", or "all" (default "1").
    #[must_use]
    pub fn acks(mut self, acks: impl Into<String>) -> Self {
        self.acks = Some(acks.into());
        self
    }

    /// Send timeout (default 5 seconds).
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the producer.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ConnectionFailed`] if brokers are not set or
    /// the producer cannot be created.
    pub fn build(self) -> Result<OrderProducer, QueueError> {
        let brokers = self
            .brokers
            .ok_or_else(|| QueueError::ConnectionFailed("brokers not configured".to_string()))?;
        let timeout = self.timeout.unwrap_or(Duration::from_secs(5));

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .set("acks", self.acks.as_deref().unwrap_or("1"))
            .create()
            .map_err(|e| {
                QueueError::ConnectionFailed(format!("failed to create producer: {e}"))
            })?;

        let topic = self.topic.unwrap_or_else(|| ORDERS_TOPIC.to_string());
        tracing::info!(brokers = %brokers, topic = %topic, "Order producer created");

        Ok(OrderProducer {
            producer,
            topic,
            timeout,
        })
    }
}
