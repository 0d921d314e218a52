//! Router configuration for the gateway.

use super::{buy, health, metrics};
use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Total deadline for one HTTP request, shared by every store call made
/// while handling it.
const REQUEST_DEADLINE: Duration = Duration::from_secs(30);

/// Build the gateway router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/buy", post(buy::buy))
        .route("/health", get(health::health))
        .route("/metrics", get(metrics::metrics))
        .layer(TimeoutLayer::new(REQUEST_DEADLINE))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
