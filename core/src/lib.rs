//! Core domain types for the flash-sale order pipeline.
//!
//! This crate defines the vocabulary shared by the ingress gateway and the
//! fulfillment worker: the order request as it travels over HTTP and the
//! queue, field validation, the order status lifecycle, and the correlation
//! id that ties a request's log lines and queue headers together.
//!
//! Everything here is plain data - no I/O. The store and queue crates own
//! the Redis and Kafka representations of these types.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod correlation;
pub mod order;
pub mod validation;

pub use correlation::CorrelationId;
pub use order::{OrderRequest, OrderStatus, StatusParseError};
pub use validation::{validate_order, FieldError};
