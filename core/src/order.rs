//! Order request and order status types.
//!
//! An [`OrderRequest`] is the unit of work for the whole pipeline: it arrives
//! as the JSON body of `POST /buy`, travels as the JSON payload of a queue
//! message, and is keyed throughout by its client-supplied `request_id`.
//!
//! [`OrderStatus`] is the lifecycle value written under
//! `order_status:<request_id>` in the store. The gateway writes
//! [`OrderStatus::Processing`] at admission; the worker writes exactly one
//! terminal value per order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A purchase request as supplied by the client.
///
/// `request_id` is the idempotency token: the system admits at most one
/// order per `request_id` within the idempotency TTL window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Identifier of the purchasing user.
    pub user_id: String,
    /// Identifier of the item being purchased.
    pub item_id: String,
    /// Requested quantity. Validated to [1, 1000]; one order reserves one unit.
    pub amount: u32,
    /// Client-supplied idempotency token.
    pub request_id: String,
}

/// Lifecycle status of an order, stored under `order_status:<request_id>`.
///
/// `Processing` is the only non-terminal value. The wire representation is
/// the upper-snake form (`PROCESSING`, `FAILED_SOLD_OUT`, ...) so that
/// operators reading the store see the same strings the original deployment
/// used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    /// Admitted and enqueued; the worker has not reached a terminal outcome.
    Processing,
    /// Reserved, settled, done.
    Completed,
    /// Inventory was exhausted (or never initialized) at reservation time.
    FailedSoldOut,
    /// Settlement failed after reservation; the unit was refunded.
    FailedPayment,
    /// The queued payload could not be parsed.
    FailedInvalid,
}

impl OrderStatus {
    /// Wire representation written to the store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::FailedSoldOut => "FAILED_SOLD_OUT",
            Self::FailedPayment => "FAILED_PAYMENT",
            Self::FailedInvalid => "FAILED_INVALID",
        }
    }

    /// Whether this status ends the order's lifecycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Processing)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored status string is not a known status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown order status: {0}")]
pub struct StatusParseError(pub String);

impl FromStr for OrderStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROCESSING" => Ok(Self::Processing),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED_SOLD_OUT" => Ok(Self::FailedSoldOut),
            "FAILED_PAYMENT" => Ok(Self::FailedPayment),
            "FAILED_INVALID" => Ok(Self::FailedInvalid),
            other => Err(StatusParseError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_request_json_round_trip() {
        let order = OrderRequest {
            user_id: "u1".to_string(),
            item_id: "101".to_string(),
            amount: 1,
            request_id: "r-42".to_string(),
        };

        let json = serde_json::to_string(&order).unwrap();
        let back: OrderRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(order, back);
    }

    #[test]
    fn order_request_uses_snake_case_fields() {
        let json = r#"{"user_id":"u1","item_id":"101","amount":2,"request_id":"r1"}"#;
        let order: OrderRequest = serde_json::from_str(json).unwrap();
        assert_eq!(order.user_id, "u1");
        assert_eq!(order.amount, 2);
    }

    #[test]
    fn status_round_trips_through_wire_form() {
        for status in [
            OrderStatus::Processing,
            OrderStatus::Completed,
            OrderStatus::FailedSoldOut,
            OrderStatus::FailedPayment,
            OrderStatus::FailedInvalid,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = "FAILED_WEATHER".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err, StatusParseError("FAILED_WEATHER".to_string()));
    }

    #[test]
    fn only_processing_is_non_terminal() {
        assert!(!OrderStatus::Processing.is_terminal());
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::FailedSoldOut.is_terminal());
        assert!(OrderStatus::FailedPayment.is_terminal());
        assert!(OrderStatus::FailedInvalid.is_terminal());
    }
}
