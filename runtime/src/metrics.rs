//! Prometheus metrics for both pipeline services.
//!
//! Metric names keep the `gateway_` / `processor_` prefixes of the original
//! deployment so existing dashboards keep working. The gateway installs a
//! recorder and renders it from its own `/metrics` route; the worker runs
//! the exporter's standalone scrape listener.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::circuit_breaker::State;

/// Errors from metrics setup.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Failed to configure the exporter.
    #[error("failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install the exporter or bind its listener.
    #[error("failed to install metrics exporter: {0}")]
    Install(String),
}

const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

fn builder() -> Result<PrometheusBuilder, MetricsError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            DURATION_BUCKETS,
        )
        .map_err(|e| MetricsError::Build(e.to_string()))
}

/// Install the Prometheus recorder and return its render handle.
///
/// Used by the gateway, which serves the rendered exposition from its own
/// router. Call once at startup.
///
/// # Errors
///
/// Returns [`MetricsError::Install`] if a recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, MetricsError> {
    register_metrics();
    let handle = builder()?
        .install_recorder()
        .map_err(|e| MetricsError::Install(e.to_string()))?;
    Ok(handle)
}

/// Install the Prometheus recorder together with a scrape listener.
///
/// Used by the worker, which has no HTTP surface of its own. Call once at
/// startup from within a Tokio runtime.
///
/// # Errors
///
/// Returns [`MetricsError::Install`] if a recorder is already installed or
/// the listener cannot bind.
pub fn install_exporter(addr: SocketAddr) -> Result<(), MetricsError> {
    register_metrics();
    builder()?
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError::Install(e.to_string()))?;
    tracing::info!(addr = %addr, "Metrics exporter listening");
    Ok(())
}

fn register_metrics() {
    // Gateway
    describe_counter!(
        "gateway_orders_received_total",
        "Total orders received by the gateway"
    );
    describe_counter!(
        "gateway_orders_successful_total",
        "Total orders successfully queued"
    );
    describe_counter!(
        "gateway_orders_failed_total",
        "Total orders that failed to queue"
    );
    describe_counter!(
        "gateway_orders_validation_failed_total",
        "Total orders rejected by field validation"
    );
    describe_counter!(
        "gateway_orders_idempotency_rejected_total",
        "Total duplicate orders rejected"
    );
    describe_counter!(
        "gateway_orders_rate_limited_total",
        "Total orders rejected by the rate limiter"
    );
    describe_histogram!(
        "gateway_request_duration_seconds",
        "Admission request processing duration"
    );
    describe_gauge!(
        "gateway_circuit_breaker_state",
        "Producer circuit breaker state (0=closed, 1=open, 2=half-open)"
    );

    // Worker
    describe_counter!(
        "processor_orders_processed_total",
        "Total orders taken off the queue"
    );
    describe_counter!(
        "processor_orders_processed_success_total",
        "Total orders fulfilled successfully"
    );
    describe_counter!(
        "processor_orders_processed_failed_total",
        "Total orders that failed processing"
    );
    describe_counter!(
        "processor_orders_sold_out_total",
        "Total orders rejected because inventory was exhausted"
    );
    describe_counter!(
        "processor_orders_moved_to_dlq_total",
        "Total orders moved to the dead-letter queue"
    );
    describe_histogram!(
        "processor_order_processing_duration_seconds",
        "Order processing duration in the worker"
    );
    describe_gauge!(
        "processor_dlq_size",
        "Messages moved to the dead-letter queue since start"
    );
    describe_gauge!(
        "processor_dlq_oldest_message_age_seconds",
        "Seconds since the most recent dead-letter"
    );
    describe_gauge!(
        "processor_inventory_level",
        "Last observed inventory level per item"
    );
}

/// Recorders for the gateway metric family.
pub struct GatewayMetrics;

impl GatewayMetrics {
    /// Count an inbound order request.
    pub fn record_received() {
        metrics::counter!("gateway_orders_received_total").increment(1);
    }

    /// Count a successfully queued order and observe its latency.
    pub fn record_successful(duration: Duration) {
        metrics::counter!("gateway_orders_successful_total").increment(1);
        metrics::histogram!("gateway_request_duration_seconds").record(duration.as_secs_f64());
    }

    /// Count an order that failed to queue.
    pub fn record_failed() {
        metrics::counter!("gateway_orders_failed_total").increment(1);
    }

    /// Count a validation rejection.
    pub fn record_validation_failed() {
        metrics::counter!("gateway_orders_validation_failed_total").increment(1);
    }

    /// Count a duplicate-request rejection.
    pub fn record_idempotency_rejected() {
        metrics::counter!("gateway_orders_idempotency_rejected_total").increment(1);
    }

    /// Count a rate-limit rejection.
    pub fn record_rate_limited() {
        metrics::counter!("gateway_orders_rate_limited_total").increment(1);
    }

    /// Publish the breaker state gauge.
    pub fn record_breaker_state(state: State) {
        metrics::gauge!("gateway_circuit_breaker_state").set(state.as_gauge());
    }
}

/// Recorders for the worker metric family.
pub struct WorkerMetrics;

impl WorkerMetrics {
    /// Count a message taken off the queue.
    pub fn record_processed() {
        metrics::counter!("processor_orders_processed_total").increment(1);
    }

    /// Count a fulfilled order and observe its processing time.
    pub fn record_success(duration: Duration) {
        metrics::counter!("processor_orders_processed_success_total").increment(1);
        metrics::histogram!("processor_order_processing_duration_seconds")
            .record(duration.as_secs_f64());
    }

    /// Count a failed order.
    pub fn record_failed() {
        metrics::counter!("processor_orders_processed_failed_total").increment(1);
    }

    /// Count a sold-out rejection.
    pub fn record_sold_out() {
        metrics::counter!("processor_orders_sold_out_total").increment(1);
    }

    /// Publish the last observed stock level for an item.
    pub fn update_inventory_level(item_id: &str, level: i64) {
        metrics::gauge!("processor_inventory_level", "item_id" => item_id.to_owned())
            .set(level as f64);
    }
}

/// Dead-letter statistics: total, per-reason breakdown, and the simplified
/// oldest-age reading (seconds since the most recent failure).
///
/// The worker calls [`DlqStats::record`] after each successful dead-letter
/// publish and [`DlqStats::refresh_age`] on a periodic tick so the age gauge
/// keeps advancing between failures.
#[derive(Debug, Default)]
pub struct DlqStats {
    last_failure: RwLock<Option<Instant>>,
}

impl DlqStats {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one message moved to the DLQ for `reason`.
    pub fn record(&self, reason: &str) {
        metrics::counter!("processor_orders_moved_to_dlq_total", "reason" => reason.to_owned())
            .increment(1);
        metrics::gauge!("processor_dlq_size").increment(1.0);

        if let Ok(mut last) = self.last_failure.write() {
            *last = Some(Instant::now());
        }
        self.refresh_age();
    }

    /// Re-publish the age gauge from the last recorded failure.
    pub fn refresh_age(&self) {
        let age = self
            .last_failure
            .read()
            .ok()
            .and_then(|last| *last)
            .map_or(0.0, |at| at.elapsed().as_secs_f64());
        metrics::gauge!("processor_dlq_oldest_message_age_seconds").set(age);
    }

    /// Seconds since the last dead-letter, 0 before any failure.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.last_failure
            .read()
            .ok()
            .and_then(|last| *last)
            .map_or(Duration::ZERO, |at| at.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dlq_age_starts_at_zero() {
        let stats = DlqStats::new();
        assert_eq!(stats.age(), Duration::ZERO);
    }

    #[test]
    fn dlq_age_advances_after_record() {
        let stats = DlqStats::new();
        stats.record("Payment Timeout");
        std::thread::sleep(Duration::from_millis(10));
        assert!(stats.age() >= Duration::from_millis(10));
    }

    #[test]
    fn recorders_do_not_panic_without_exporter() {
        // The metrics facade no-ops when no recorder is installed; recording
        // must be safe in unit tests and before startup completes.
        GatewayMetrics::record_received();
        GatewayMetrics::record_successful(Duration::from_millis(5));
        GatewayMetrics::record_breaker_state(State::Open);
        WorkerMetrics::record_processed();
        WorkerMetrics::update_inventory_level("101", 3);
        DlqStats::new().record("Redis Failure");
    }
}
