//! Dead-letter publisher.
//!
//! Failed messages are republished byte-for-byte on `orders-dlq` so the
//! original payload survives for reconciliation, with the failure reason,
//! correlation id, and republish time attached as headers.

use crate::error::QueueError;
use crate::{HEADER_CORRELATION_ID, HEADER_ERROR, HEADER_TIMESTAMP, ORDERS_DLQ_TOPIC};
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;

/// Republishes failed order messages on the dead-letter topic.
pub struct DeadLetterPublisher {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl DeadLetterPublisher {
    /// Create a publisher targeting the default `orders-dlq` topic.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ConnectionFailed`] if the producer cannot be
    /// created.
    pub fn new(brokers: &str) -> Result<Self, QueueError> {
        Self::with_topic(brokers, ORDERS_DLQ_TOPIC)
    }

    /// Create a publisher targeting a specific topic (tests use throwaway
    /// topics).
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ConnectionFailed`] if the producer cannot be
    /// created.
    pub fn with_topic(brokers: &str, topic: &str) -> Result<Self, QueueError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "1")
            .create()
            .map_err(|e| {
                QueueError::ConnectionFailed(format!("failed to create DLQ producer: {e}"))
            })?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
            timeout: Duration::from_secs(5),
        })
    }

    /// Republish a failed message with its failure metadata.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::PublishFailed`] when the send is not
    /// acknowledged. Callers log and continue - losing a dead letter must
    /// never wedge the consumer loop.
    pub async fn publish(
        &self,
        payload: &[u8],
        reason: &str,
        correlation_id: &str,
    ) -> Result<(), QueueError> {
        let timestamp = chrono::Utc::now().to_rfc3339();
        let headers = OwnedHeaders::new()
            .insert(Header {
                key: HEADER_ERROR,
                value: Some(reason),
            })
            .insert(Header {
                key: HEADER_CORRELATION_ID,
                value: Some(correlation_id),
            })
            .insert(Header {
                key: HEADER_TIMESTAMP,
                value: Some(timestamp.as_str()),
            });

        let record = FutureRecord::<(), _>::to(&self.topic)
            .payload(payload)
            .headers(headers);

        match self.producer.send(record, Timeout::After(self.timeout)).await {
            Ok(_) => {
                tracing::warn!(
                    topic = %self.topic,
                    reason = %reason,
                    correlation_id = %correlation_id,
                    "Message moved to DLQ"
                );
                Ok(())
            }
            Err((kafka_error, _)) => Err(QueueError::PublishFailed {
                topic: self.topic.clone(),
                reason: kafka_error.to_string(),
            }),
        }
    }
}
