//! Cross-cutting protection and observability for the flash-sale pipeline.
//!
//! - [`circuit_breaker`] - the three-state guard the gateway puts in front
//!   of the queue producer. The breaker is consulted before every enqueue
//!   and its state is readable without a lock, so the health endpoint and
//!   the admission path never race each other.
//! - [`metrics`] - Prometheus registry setup and typed recorders for the
//!   gateway and worker metric families, including the dead-letter
//!   statistics tracker.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod circuit_breaker;
pub mod metrics;

pub use circuit_breaker::{BreakerError, CircuitBreaker, CircuitBreakerConfig, State};
pub use metrics::{DlqStats, GatewayMetrics, MetricsError, WorkerMetrics};
