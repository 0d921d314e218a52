//! Consumer for the primary order stream.

use crate::error::QueueError;
use crate::{HEADER_CORRELATION_ID, HEADER_REQUEST_ID, ORDERS_TOPIC};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{Headers, Message};

/// One message taken off the order stream, with its headers decoded.
#[derive(Debug, Clone)]
pub struct OrderMessage {
    /// Raw payload bytes (JSON of the order on the happy path, arbitrary
    /// bytes for poison messages).
    pub payload: Vec<u8>,
    /// `correlation_id` header if the producer attached one.
    pub correlation_id: Option<String>,
    /// `request_id` header if the producer attached one.
    pub request_id: Option<String>,
    /// Partition the message arrived on.
    pub partition: i32,
    /// Offset within the partition.
    pub offset: i64,
}

/// Consumes the `orders` topic with at-least-once delivery.
///
/// Workers in the same consumer group split partitions between them;
/// within one partition delivery is sequential, so the worker processes one
/// message at a time per partition without further coordination.
pub struct OrderConsumer {
    consumer: StreamConsumer,
}

impl OrderConsumer {
    /// Create a consumer and subscribe to the order topic.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ConnectionFailed`] if the consumer cannot be
    /// created and [`QueueError::SubscriptionFailed`] if the subscription is
    /// rejected.
    pub fn new(brokers: &str, group_id: &str) -> Result<Self, QueueError> {
        Self::with_topic(brokers, group_id, ORDERS_TOPIC)
    }

    /// Create a consumer for a specific topic (tests use throwaway topics).
    ///
    /// # Errors
    ///
    /// Same failure modes as [`OrderConsumer::new`].
    pub fn with_topic(brokers: &str, group_id: &str, topic: &str) -> Result<Self, QueueError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| {
                QueueError::ConnectionFailed(format!("failed to create consumer: {e}"))
            })?;

        consumer
            .subscribe(&[topic])
            .map_err(|e| QueueError::SubscriptionFailed {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(brokers = %brokers, group = %group_id, topic = %topic, "Order consumer subscribed");
        Ok(Self { consumer })
    }

    /// Await the next message.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ReceiveFailed`] on transport errors and
    /// [`QueueError::EmptyPayload`] when the broker delivers a message with
    /// no value. Both are retryable from the caller's loop.
    pub async fn recv(&self) -> Result<OrderMessage, QueueError> {
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|e| QueueError::ReceiveFailed(e.to_string()))?;

        let payload = message.payload().ok_or(QueueError::EmptyPayload)?.to_vec();

        let mut correlation_id = None;
        let mut request_id = None;
        if let Some(headers) = message.headers() {
            for header in headers.iter() {
                let value = header
                    .value
                    .and_then(|v| std::str::from_utf8(v).ok())
                    .map(str::to_string);
                match header.key {
                    HEADER_CORRELATION_ID => correlation_id = value,
                    HEADER_REQUEST_ID => request_id = value,
                    _ => {}
                }
            }
        }

        Ok(OrderMessage {
            payload,
            correlation_id,
            request_id,
            partition: message.partition(),
            offset: message.offset(),
        })
    }
}
