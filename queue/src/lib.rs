//! Kafka transport for the flash-sale pipeline.
//!
//! This crate wraps rdkafka behind three narrow types:
//!
//! - [`OrderProducer`] - publishes admitted orders to the `orders` topic
//!   with `correlation_id` and `request_id` headers. The gateway drives it
//!   through the circuit breaker; this crate itself knows nothing about
//!   breaker state.
//! - [`OrderConsumer`] - consumes the `orders` topic with at-least-once
//!   delivery. One consumer per process; rdkafka serializes delivery within
//!   a partition, which is what the offset-commit semantics rely on.
//! - [`DeadLetterPublisher`] - republishes failed payloads byte-for-byte on
//!   the `orders-dlq` topic with `error`, `correlation_id`, and `timestamp`
//!   headers for out-of-band reconciliation.
//!
//! # Delivery semantics
//!
//! - **At-least-once**: a message may be redelivered after a worker crash;
//!   inventory safety comes from the store's atomic scripts, not from the
//!   queue.
//! - **Ordering within partition**: messages are processed in enqueue order
//!   per partition. Cross-partition ordering is not provided or needed.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod consumer;
pub mod dlq;
pub mod error;
pub mod producer;

pub use consumer::{OrderConsumer, OrderMessage};
pub use dlq::DeadLetterPublisher;
pub use error::QueueError;
pub use producer::OrderProducer;

/// Primary order stream.
pub const ORDERS_TOPIC: &str = "orders";

/// Failure stream for dead-lettered messages.
pub const ORDERS_DLQ_TOPIC: &str = "orders-dlq";

/// Header carrying the request-scoped correlation id.
pub const HEADER_CORRELATION_ID: &str = "correlation_id";

/// Header carrying the client's idempotency token.
pub const HEADER_REQUEST_ID: &str = "request_id";

/// Header carrying the dead-letter reason.
pub const HEADER_ERROR: &str = "error";

/// Header carrying the dead-letter republish time (RFC3339).
pub const HEADER_TIMESTAMP: &str = "timestamp";
