//! Error types for queue operations.

use thiserror::Error;

/// Errors surfaced by the Kafka transport.
#[derive(Debug, Error, Clone)]
pub enum QueueError {
    /// Could not create a producer or consumer.
    #[error("queue connection failed: {0}")]
    ConnectionFailed(String),

    /// A publish did not get acknowledged.
    #[error("publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// Topic the publish targeted.
        topic: String,
        /// Broker- or transport-level reason.
        reason: String,
    },

    /// Could not subscribe to a topic.
    #[error("subscription failed for topic '{topic}': {reason}")]
    SubscriptionFailed {
        /// Topic the subscription targeted.
        topic: String,
        /// Broker- or transport-level reason.
        reason: String,
    },

    /// Receiving the next message failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// A delivered message carried no payload.
    #[error("message has no payload")]
    EmptyPayload,
}
