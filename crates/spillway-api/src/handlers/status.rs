//! /api/status handler.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::ApiState;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub sessions_started: u64,
    pub sessions_finished: u64,
    pub sessions_failed: u64,
    /// Started but neither finished nor failed yet.
    pub sessions_active: u64,
    pub default_timeout_ms: u64,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let (started, finished, failed) = state.counters.snapshot();
    Json(StatusResponse {
        sessions_started: started,
        sessions_finished: finished,
        sessions_failed: failed,
        sessions_active: started.saturating_sub(finished + failed),
        default_timeout_ms: state.render.default_timeout_ms,
    })
}
