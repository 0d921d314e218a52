//! The `GET /health` handler.
//!
//! Readiness depends on both collaborators: Redis must answer a ping within
//! two seconds, and the producer breaker must not be open. The breaker state
//! is read from its lock-free snapshot, so health probes never contend with
//! the admission path.

use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::time::Duration;

const PING_DEADLINE: Duration = Duration::from_secs(2);

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `"ok"` when both checks pass, `"degraded"` otherwise.
    pub status: &'static str,
    /// Whether the store answered a ping within the deadline.
    pub redis: bool,
    /// Whether the queue producer is usable (breaker not open).
    pub kafka: bool,
    /// Current breaker state, for operators.
    pub circuit_breaker_state: String,
}

/// Handle `GET /health`.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let redis_ok = flashsale_store::ping(&state.redis, PING_DEADLINE).await;
    let breaker_state = state.breaker.state();
    let kafka_ok = breaker_state != flashsale_runtime::State::Open;

    let healthy = redis_ok && kafka_ok;
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: if healthy { "ok" } else { "degraded" },
            redis: redis_ok,
            kafka: kafka_ok,
            circuit_breaker_state: breaker_state.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_body_shape() {
        let body = HealthResponse {
            status: "degraded",
            redis: true,
            kafka: false,
            circuit_breaker_state: "open".to_string(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["redis"], true);
        assert_eq!(json["kafka"], false);
        assert_eq!(json["circuit_breaker_state"], "open");
    }
}
