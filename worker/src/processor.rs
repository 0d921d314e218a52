//! Per-message order processing.
//!
//! Each message drives the reserve/settle/refund saga:
//!
//! | event | compensation | final state |
//! |---|---|---|
//! | parse failure | none | DLQ `Invalid Order Format` |
//! | not initialized / sold out | inherent to script | `FAILED_SOLD_OUT` |
//! | store timeout on reserve | none | DLQ `Redis Timeout` |
//! | store error on reserve | none | DLQ `Redis Failure` |
//! | settlement failure | explicit refund | DLQ `Payment Timeout`, `FAILED_PAYMENT` |
//! | settlement success | - | `COMPLETED` |
//!
//! Sold-out is a business outcome, not an exception: no dead letter. Status
//! writes are best effort - the message's terminal record is the status
//! write *or* the dead letter, and the DLQ publish is the one we refuse to
//! lose silently.

use crate::settlement::SettlementGateway;
use flashsale_core::{CorrelationId, OrderRequest, OrderStatus};
use flashsale_queue::{DeadLetterPublisher, OrderMessage};
use flashsale_runtime::{DlqStats, WorkerMetrics};
use flashsale_store::{InventoryStore, OrderStatusStore, ReserveOutcome, StoreError};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

const REASON_INVALID_FORMAT: &str = "Invalid Order Format";
const REASON_REDIS_TIMEOUT: &str = "Redis Timeout";
const REASON_REDIS_FAILURE: &str = "Redis Failure";
const REASON_PAYMENT_TIMEOUT: &str = "Payment Timeout";

/// How one message ended. Returned for observability in tests and logs;
/// the consumer loop does not branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Reserved, settled, status `COMPLETED`.
    Completed,
    /// Inventory exhausted or never seeded; status `FAILED_SOLD_OUT`.
    SoldOut,
    /// Payload was not a valid order; dead-lettered.
    Poison,
    /// Reserve script missed its deadline; dead-lettered.
    ReserveTimeout,
    /// Reserve script failed; dead-lettered.
    ReserveFailed,
    /// Settlement failed after reservation; refunded and dead-lettered.
    SettlementFailed,
}

/// Processes order messages against the store and the dead-letter topic.
pub struct OrderProcessor<S> {
    inventory: InventoryStore,
    statuses: OrderStatusStore,
    dlq: DeadLetterPublisher,
    dlq_stats: Arc<DlqStats>,
    settlement: S,
}

impl<S: SettlementGateway> OrderProcessor<S> {
    /// Wire up a processor.
    pub fn new(
        inventory: InventoryStore,
        statuses: OrderStatusStore,
        dlq: DeadLetterPublisher,
        dlq_stats: Arc<DlqStats>,
        settlement: S,
    ) -> Self {
        Self {
            inventory,
            statuses,
            dlq,
            dlq_stats,
            settlement,
        }
    }

    /// Process one message to a terminal outcome.
    pub async fn process(&self, message: &OrderMessage) -> ProcessOutcome {
        let started = Instant::now();
        WorkerMetrics::record_processed();

        let correlation_id = message
            .correlation_id
            .as_deref()
            .map(CorrelationId::from_header)
            .unwrap_or_else(CorrelationId::generate);

        let order: OrderRequest = match serde_json::from_slice(&message.payload) {
            Ok(order) => order,
            Err(e) => {
                warn!(
                    correlation_id = %correlation_id,
                    service = "worker",
                    event = "invalid_payload",
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    "Message payload is not a valid order"
                );
                // The request id header, when present, lets us leave a
                // readable terminal status even for poison messages.
                if let Some(request_id) = message.request_id.as_deref() {
                    self.write_status(&correlation_id, request_id, OrderStatus::FailedInvalid)
                        .await;
                }
                self.dead_letter(message, REASON_INVALID_FORMAT, &correlation_id)
                    .await;
                WorkerMetrics::record_failed();
                return ProcessOutcome::Poison;
            }
        };

        match self.inventory.reserve(&order.item_id).await {
            Ok(ReserveOutcome::Reserved { remaining }) => {
                WorkerMetrics::update_inventory_level(&order.item_id, remaining);
            }
            Ok(ReserveOutcome::SoldOut { .. } | ReserveOutcome::NotInitialized) => {
                info!(
                    correlation_id = %correlation_id,
                    service = "worker",
                    event = "sold_out",
                    item_id = %order.item_id,
                    request_id = %order.request_id,
                    "Order rejected: inventory exhausted"
                );
                self.write_status(&correlation_id, &order.request_id, OrderStatus::FailedSoldOut)
                    .await;
                WorkerMetrics::record_sold_out();
                WorkerMetrics::record_failed();
                return ProcessOutcome::SoldOut;
            }
            Err(e) => {
                let reason = reserve_failure_reason(&e);
                let outcome = if e.is_timeout() {
                    ProcessOutcome::ReserveTimeout
                } else {
                    ProcessOutcome::ReserveFailed
                };
                error!(
                    correlation_id = %correlation_id,
                    service = "worker",
                    event = "reserve_failed",
                    item_id = %order.item_id,
                    error = %e,
                    "Inventory reservation failed"
                );
                self.dead_letter(message, reason, &correlation_id).await;
                WorkerMetrics::record_failed();
                return outcome;
            }
        }

        if let Err(e) = self.settlement.charge(&order) {
            warn!(
                correlation_id = %correlation_id,
                service = "worker",
                event = "settlement_failed",
                request_id = %order.request_id,
                error = %e,
                "Settlement failed, refunding reservation"
            );
            // Refund is logged but never blocks the dead letter: operators
            // reconcile from the DLQ if the refund itself failed.
            match self.inventory.refund(&order.item_id, 1).await {
                Ok(refund) => {
                    WorkerMetrics::update_inventory_level(&order.item_id, refund.stock);
                }
                Err(refund_err) => {
                    error!(
                        correlation_id = %correlation_id,
                        service = "worker",
                        item_id = %order.item_id,
                        error = %refund_err,
                        "Refund failed after settlement failure"
                    );
                }
            }
            self.write_status(&correlation_id, &order.request_id, OrderStatus::FailedPayment)
                .await;
            self.dead_letter(message, REASON_PAYMENT_TIMEOUT, &correlation_id)
                .await;
            WorkerMetrics::record_failed();
            return ProcessOutcome::SettlementFailed;
        }

        self.write_status(&correlation_id, &order.request_id, OrderStatus::Completed)
            .await;
        let elapsed = started.elapsed();
        WorkerMetrics::record_success(elapsed);
        info!(
            correlation_id = %correlation_id,
            service = "worker",
            event = "order_completed",
            user_id = %order.user_id,
            item_id = %order.item_id,
            request_id = %order.request_id,
            processing_time_ms = elapsed.as_millis() as u64,
            "Order processed successfully"
        );
        ProcessOutcome::Completed
    }

    async fn write_status(
        &self,
        correlation_id: &CorrelationId,
        request_id: &str,
        status: OrderStatus,
    ) {
        if let Err(e) = self.statuses.set(request_id, status).await {
            error!(
                correlation_id = %correlation_id,
                service = "worker",
                request_id = %request_id,
                status = %status,
                error = %e,
                "Failed to write order status"
            );
        }
    }

    async fn dead_letter(
        &self,
        message: &OrderMessage,
        reason: &str,
        correlation_id: &CorrelationId,
    ) {
        match self
            .dlq
            .publish(&message.payload, reason, correlation_id.as_str())
            .await
        {
            Ok(()) => self.dlq_stats.record(reason),
            Err(e) => {
                error!(
                    correlation_id = %correlation_id,
                    service = "worker",
                    reason = %reason,
                    error = %e,
                    "Failed to publish dead letter"
                );
            }
        }
    }
}

/// Map a reserve-path store error onto its dead-letter reason.
#[must_use]
pub fn reserve_failure_reason(error: &StoreError) -> &'static str {
    if error.is_timeout() {
        REASON_REDIS_TIMEOUT
    } else {
        REASON_REDIS_FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_maps_to_redis_timeout_reason() {
        let err = StoreError::Timeout { op: "reserve" };
        assert_eq!(reserve_failure_reason(&err), "Redis Timeout");
    }

    #[test]
    fn other_errors_map_to_redis_failure_reason() {
        let err = StoreError::Connection("down".to_string());
        assert_eq!(reserve_failure_reason(&err), "Redis Failure");
    }
}
