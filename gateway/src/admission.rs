//! The admission pipeline for `POST /buy`.
//!
//! Each step short-circuits on failure, in this order: rate limit, field
//! validation, idempotency reservation, status initialization, breaker
//! precheck, enqueue. The idempotency key is reserved *before* the enqueue
//! so concurrent duplicates cannot both publish, and released on every
//! failure strictly between reservation and a committed publish. An enqueue
//! whose acknowledgement is lost leaves the key in place: refusing a
//! duplicate is the safer failure mode than accepting one.

use crate::state::AppState;
use flashsale_core::{validate_order, CorrelationId, FieldError, OrderRequest, OrderStatus};
use flashsale_queue::QueueError;
use flashsale_runtime::{BreakerError, GatewayMetrics, State as BreakerState};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Outcome of running one order through the admission pipeline.
#[derive(Debug)]
pub enum Admission {
    /// The order is queued; the client gets 202 with its correlation id.
    Accepted {
        /// Time spent admitting the order.
        elapsed: Duration,
    },
    /// The request id was already admitted.
    Duplicate,
    /// One or more fields failed validation.
    Invalid(Vec<FieldError>),
    /// The user is over quota for the current window.
    RateLimited {
        /// Window length, surfaced as `retry_after_seconds`.
        retry_after: Duration,
        /// Requests left in the window (zero when limited).
        remaining: u32,
    },
    /// The queue producer is unavailable (breaker open or publish failed).
    Unavailable,
    /// A store or serialization failure the client cannot repair.
    Internal,
}

/// Run the admission pipeline for one parsed order.
///
/// The caller has already assigned `correlation_id` and counted the request;
/// this function owns every store and queue interaction.
pub async fn admit(
    state: &AppState,
    correlation_id: &CorrelationId,
    order: &OrderRequest,
    started: Instant,
) -> Admission {
    // Rate limit first so abusive users cannot burn validation or store
    // work. Store failures fail open: briefly not limiting beats dropping
    // the sale.
    match state.limiter.allow(&order.user_id).await {
        Ok(decision) if !decision.allowed => {
            GatewayMetrics::record_rate_limited();
            info!(
                correlation_id = %correlation_id,
                service = "gateway",
                event = "rate_limited",
                user_id = %order.user_id,
                "Rate limit exceeded"
            );
            return Admission::RateLimited {
                retry_after: state.limiter.window(),
                remaining: decision.remaining,
            };
        }
        Ok(_) => {}
        Err(e) => {
            warn!(
                correlation_id = %correlation_id,
                service = "gateway",
                error = %e,
                "Rate limiter store failure, failing open"
            );
        }
    }

    let errors = validate_order(order);
    if !errors.is_empty() {
        GatewayMetrics::record_validation_failed();
        info!(
            correlation_id = %correlation_id,
            service = "gateway",
            event = "validation_failed",
            error_count = errors.len(),
            "Order rejected by validation"
        );
        return Admission::Invalid(errors);
    }

    // Idempotency reservation: exactly one admission per request id.
    match state.idempotency.try_reserve(&order.request_id).await {
        Ok(true) => {}
        Ok(false) => {
            GatewayMetrics::record_idempotency_rejected();
            info!(
                correlation_id = %correlation_id,
                service = "gateway",
                event = "duplicate_request",
                request_id = %order.request_id,
                "Duplicate request detected"
            );
            return Admission::Duplicate;
        }
        Err(e) => {
            GatewayMetrics::record_failed();
            error!(
                correlation_id = %correlation_id,
                service = "gateway",
                error = %e,
                "Idempotency reservation failed"
            );
            return Admission::Internal;
        }
    }

    // Status goes in before the enqueue so an accepted order always has an
    // observable record, even if the worker is slow. Best effort.
    if let Err(e) = state
        .statuses
        .set(&order.request_id, OrderStatus::Processing)
        .await
    {
        warn!(
            correlation_id = %correlation_id,
            service = "gateway",
            error = %e,
            "Failed to initialize order status"
        );
    }

    // Breaker precheck avoids reservation churn during an outage: the key
    // is rolled back before we even attempt the publish.
    if state.breaker.state() == BreakerState::Open {
        rollback_reservation(state, correlation_id, &order.request_id).await;
        GatewayMetrics::record_failed();
        GatewayMetrics::record_breaker_state(state.breaker.state());
        return Admission::Unavailable;
    }

    let payload = match serde_json::to_vec(order) {
        Ok(payload) => payload,
        Err(e) => {
            rollback_reservation(state, correlation_id, &order.request_id).await;
            GatewayMetrics::record_failed();
            error!(
                correlation_id = %correlation_id,
                service = "gateway",
                error = %e,
                "Failed to serialize order"
            );
            return Admission::Internal;
        }
    };

    let publish = state
        .breaker
        .call(|| {
            state
                .producer
                .publish(&payload, correlation_id.as_str(), &order.request_id)
        })
        .await;
    GatewayMetrics::record_breaker_state(state.breaker.state());

    match publish {
        Ok((partition, offset)) => {
            let elapsed = started.elapsed();
            GatewayMetrics::record_successful(elapsed);
            info!(
                correlation_id = %correlation_id,
                service = "gateway",
                event = "order_queued",
                request_id = %order.request_id,
                partition = partition,
                offset = offset,
                processing_time_ms = elapsed.as_millis() as u64,
                "Order queued"
            );
            Admission::Accepted { elapsed }
        }
        Err(BreakerError::Open) => {
            rollback_reservation(state, correlation_id, &order.request_id).await;
            GatewayMetrics::record_failed();
            Admission::Unavailable
        }
        Err(BreakerError::Inner(e)) => {
            rollback_reservation(state, correlation_id, &order.request_id).await;
            GatewayMetrics::record_failed();
            error!(
                correlation_id = %correlation_id,
                service = "gateway",
                event = "enqueue_failed",
                error = %e,
                "Failed to queue order"
            );
            match e {
                QueueError::PublishFailed { .. } => Admission::Unavailable,
                _ => Admission::Internal,
            }
        }
    }
}

/// Release the idempotency key after a post-reservation failure so the
/// client can retry with the same request id. Best effort: if the delete
/// itself fails the key expires by TTL and retries read as duplicates until
/// then.
async fn rollback_reservation(
    state: &AppState,
    correlation_id: &CorrelationId,
    request_id: &str,
) {
    if let Err(e) = state.idempotency.release(request_id).await {
        error!(
            correlation_id = %correlation_id,
            service = "gateway",
            request_id = %request_id,
            error = %e,
            "Failed to roll back idempotency reservation"
        );
    }
}
