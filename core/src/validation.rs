//! Field validation for inbound order requests.
//!
//! Validation runs after rate limiting and before the idempotency
//! reservation, so an invalid request never mutates store state. All fields
//! are checked and every violation is reported - the gateway returns the
//! full list so clients can fix a request in one round trip.

use crate::order::OrderRequest;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

const MAX_USER_ID_LEN: usize = 100;
const MAX_ITEM_ID_LEN: usize = 100;
const MAX_REQUEST_ID_LEN: usize = 200;
const MIN_AMOUNT: u32 = 1;
const MAX_AMOUNT: u32 = 1000;

// user_id and item_id are embedded in store keys; constraining them to this
// alphabet keeps the keyspace clean and blocks delimiter injection.
static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[A-Za-z0-9_-]+$").expect("valid id pattern"));

/// A single field violation, serialized into 400 responses as
/// `{"field": ..., "message": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Name of the offending request field.
    pub field: &'static str,
    /// Human-readable description of the violation.
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate every field of an order request, returning all violations.
///
/// An empty vector means the request is admissible.
#[must_use]
pub fn validate_order(order: &OrderRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();

    validate_id("user_id", &order.user_id, MAX_USER_ID_LEN, &mut errors);
    validate_id("item_id", &order.item_id, MAX_ITEM_ID_LEN, &mut errors);

    if order.amount < MIN_AMOUNT {
        errors.push(FieldError::new(
            "amount",
            format!("amount must be at least {MIN_AMOUNT}"),
        ));
    } else if order.amount > MAX_AMOUNT {
        errors.push(FieldError::new(
            "amount",
            format!("amount must be at most {MAX_AMOUNT}"),
        ));
    }

    if order.request_id.is_empty() {
        errors.push(FieldError::new(
            "request_id",
            "request_id is required for idempotency",
        ));
    } else if order.request_id.len() > MAX_REQUEST_ID_LEN {
        errors.push(FieldError::new(
            "request_id",
            format!("request_id must be at most {MAX_REQUEST_ID_LEN} characters"),
        ));
    } else if order.request_id.trim().is_empty() {
        errors.push(FieldError::new(
            "request_id",
            "request_id cannot be whitespace only",
        ));
    }

    errors
}

fn validate_id(field: &'static str, value: &str, max_len: usize, errors: &mut Vec<FieldError>) {
    if value.is_empty() {
        errors.push(FieldError::new(field, format!("{field} is required")));
    } else if value.len() > max_len {
        errors.push(FieldError::new(
            field,
            format!("{field} must be at most {max_len} characters"),
        ));
    } else if !ID_PATTERN.is_match(value) {
        errors.push(FieldError::new(
            field,
            format!("{field} may only contain alphanumerics, underscore, and hyphen"),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_order() -> OrderRequest {
        OrderRequest {
            user_id: "user_1".to_string(),
            item_id: "item-101".to_string(),
            amount: 1,
            request_id: "req-001".to_string(),
        }
    }

    #[test]
    fn valid_order_has_no_errors() {
        assert!(validate_order(&valid_order()).is_empty());
    }

    #[test]
    fn empty_user_id_is_rejected() {
        let mut order = valid_order();
        order.user_id = String::new();
        let errors = validate_order(&order);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "user_id");
    }

    #[test]
    fn user_id_with_shell_metacharacter_is_rejected() {
        let mut order = valid_order();
        order.user_id = "user$1".to_string();
        let errors = validate_order(&order);
        assert_eq!(errors[0].field, "user_id");
        assert!(errors[0].message.contains("alphanumerics"));
    }

    #[test]
    fn overlong_ids_are_rejected() {
        let mut order = valid_order();
        order.user_id = "a".repeat(101);
        order.item_id = "b".repeat(101);
        let errors = validate_order(&order);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn max_length_ids_are_accepted() {
        let mut order = valid_order();
        order.user_id = "a".repeat(100);
        order.item_id = "b".repeat(100);
        assert!(validate_order(&order).is_empty());
    }

    #[test]
    fn amount_zero_is_rejected() {
        let mut order = valid_order();
        order.amount = 0;
        let errors = validate_order(&order);
        assert_eq!(errors[0].field, "amount");
    }

    #[test]
    fn amount_above_limit_is_rejected() {
        let mut order = valid_order();
        order.amount = 1001;
        let errors = validate_order(&order);
        assert_eq!(errors[0].field, "amount");
        assert!(errors[0].message.contains("1000"));
    }

    #[test]
    fn amount_bounds_are_inclusive() {
        let mut order = valid_order();
        order.amount = 1000;
        assert!(validate_order(&order).is_empty());
        order.amount = 1;
        assert!(validate_order(&order).is_empty());
    }

    #[test]
    fn whitespace_only_request_id_is_rejected() {
        let mut order = valid_order();
        order.request_id = "   ".to_string();
        let errors = validate_order(&order);
        assert_eq!(errors[0].field, "request_id");
        assert!(errors[0].message.contains("whitespace"));
    }

    #[test]
    fn overlong_request_id_is_rejected() {
        let mut order = valid_order();
        order.request_id = "r".repeat(201);
        let errors = validate_order(&order);
        assert_eq!(errors[0].field, "request_id");
    }

    #[test]
    fn request_id_format_is_unconstrained() {
        // UUIDs, timestamps, colons - anything non-empty within length.
        let mut order = valid_order();
        order.request_id = "2026-08-02T10:00:00Z:user:1".to_string();
        assert!(validate_order(&order).is_empty());
    }

    #[test]
    fn all_violations_are_reported_together() {
        let order = OrderRequest {
            user_id: String::new(),
            item_id: "item!".to_string(),
            amount: 0,
            request_id: String::new(),
        };
        let errors = validate_order(&order);
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["user_id", "item_id", "amount", "request_id"]);
    }
}
