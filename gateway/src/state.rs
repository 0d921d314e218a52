//! Shared application state for the gateway.

use flashsale_queue::OrderProducer;
use flashsale_runtime::CircuitBreaker;
use flashsale_store::{FixedWindowLimiter, IdempotencyStore, OrderStatusStore};
use metrics_exporter_prometheus::PrometheusHandle;
use redis::aio::ConnectionManager;
use std::sync::Arc;

/// Everything a request handler needs, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    /// Idempotency key reservation.
    pub idempotency: IdempotencyStore,
    /// Order status records.
    pub statuses: OrderStatusStore,
    /// Per-user fixed-window rate limiter.
    pub limiter: FixedWindowLimiter,
    /// Raw store connection, used by the health probe.
    pub redis: ConnectionManager,
    /// Producer for the order topic.
    pub producer: Arc<OrderProducer>,
    /// Guard in front of the producer, shared with /health.
    pub breaker: CircuitBreaker,
    /// Render handle for /metrics.
    pub metrics: PrometheusHandle,
}
