//! The `GET /metrics` handler: Prometheus exposition rendered from the
//! process-wide recorder.

use crate::state::AppState;
use axum::extract::State;

/// Handle `GET /metrics`.
pub async fn metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}
