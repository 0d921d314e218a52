//! The `POST /buy` handler.
//!
//! Parses the body, mints the correlation id, runs the admission pipeline,
//! and maps its outcome onto the wire responses. The mapping lives in a
//! pure function so the status codes and shapes are unit-testable without a
//! server.

use crate::admission::{admit, Admission};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use flashsale_core::{CorrelationId, FieldError, OrderRequest};
use flashsale_runtime::GatewayMetrics;
use serde::Serialize;
use std::time::Instant;
use tracing::info;

/// 202 body.
#[derive(Debug, Serialize)]
pub struct AcceptedBody {
    /// Fixed marker string.
    pub status: &'static str,
    /// Correlation id for tracing the order end to end.
    pub correlation_id: CorrelationId,
    /// Admission latency.
    pub processing_time_ms: u64,
}

/// Error body shared by every non-2xx response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable error message.
    pub error: &'static str,
    /// Correlation id for support lookups.
    pub correlation_id: CorrelationId,
    /// Per-field violations on 400.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    /// Seconds until the rate-limit window rolls over, on 429.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
    /// Requests left in the window, on 429.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_requests: Option<u32>,
}

impl ErrorBody {
    fn new(error: &'static str, correlation_id: CorrelationId) -> Self {
        Self {
            error,
            correlation_id,
            errors: None,
            retry_after_seconds: None,
            remaining_requests: None,
        }
    }
}

/// Handle `POST /buy`.
pub async fn buy(
    State(state): State<AppState>,
    payload: Result<Json<OrderRequest>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let correlation_id = CorrelationId::generate();

    let order = match payload {
        Ok(Json(order)) => order,
        Err(rejection) => {
            info!(
                correlation_id = %correlation_id,
                service = "gateway",
                event = "invalid_body",
                reason = %rejection,
                "Request body could not be parsed"
            );
            let mut body = ErrorBody::new("Validation failed", correlation_id);
            body.errors = Some(vec![FieldError {
                field: "body",
                message: "invalid body".to_string(),
            }]);
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };

    GatewayMetrics::record_received();
    let admission = admit(&state, &correlation_id, &order, started).await;
    admission_response(admission, correlation_id)
}

/// Map an admission outcome onto its HTTP response.
pub fn admission_response(admission: Admission, correlation_id: CorrelationId) -> Response {
    match admission {
        Admission::Accepted { elapsed } => (
            StatusCode::ACCEPTED,
            Json(AcceptedBody {
                status: "Order Queued",
                correlation_id,
                processing_time_ms: elapsed.as_millis() as u64,
            }),
        )
            .into_response(),
        Admission::Duplicate => (
            StatusCode::CONFLICT,
            Json(ErrorBody::new("Duplicate Request Detected", correlation_id)),
        )
            .into_response(),
        Admission::Invalid(errors) => {
            let mut body = ErrorBody::new("Validation failed", correlation_id);
            body.errors = Some(errors);
            (StatusCode::BAD_REQUEST, Json(body)).into_response()
        }
        Admission::RateLimited {
            retry_after,
            remaining,
        } => {
            let mut body = ErrorBody::new("Rate limit exceeded", correlation_id);
            body.retry_after_seconds = Some(retry_after.as_secs());
            body.remaining_requests = Some(remaining);
            (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response()
        }
        Admission::Unavailable => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorBody::new(
                "Service temporarily unavailable",
                correlation_id,
            )),
        )
            .into_response(),
        Admission::Internal => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody::new("Internal server error", correlation_id)),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn cid() -> CorrelationId {
        CorrelationId::from_header("test-cid")
    }

    #[test]
    fn accepted_maps_to_202() {
        let response = admission_response(
            Admission::Accepted {
                elapsed: Duration::from_millis(12),
            },
            cid(),
        );
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[test]
    fn duplicate_maps_to_409() {
        let response = admission_response(Admission::Duplicate, cid());
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn invalid_maps_to_400() {
        let response = admission_response(
            Admission::Invalid(vec![FieldError {
                field: "amount",
                message: "amount must be at least 1".to_string(),
            }]),
            cid(),
        );
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn rate_limited_maps_to_429() {
        let response = admission_response(
            Admission::RateLimited {
                retry_after: Duration::from_secs(60),
                remaining: 0,
            },
            cid(),
        );
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn unavailable_maps_to_503() {
        let response = admission_response(Admission::Unavailable, cid());
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn internal_maps_to_500() {
        let response = admission_response(Admission::Internal, cid());
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn error_body_omits_absent_fields() {
        let body = ErrorBody::new("Duplicate Request Detected", cid());
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("errors").is_none());
        assert!(json.get("retry_after_seconds").is_none());
        assert_eq!(json["error"], "Duplicate Request Detected");
    }

    #[test]
    fn rate_limit_body_carries_quota_fields() {
        let mut body = ErrorBody::new("Rate limit exceeded", cid());
        body.retry_after_seconds = Some(60);
        body.remaining_requests = Some(0);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["retry_after_seconds"], 60);
        assert_eq!(json["remaining_requests"], 0);
    }
}
