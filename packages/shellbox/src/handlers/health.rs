use std::collections::HashMap;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use shellbox_session::extract_session_id_from_source;
use tracing::debug;

use crate::AppState;
use crate::container::{HealthOutcome, health::probe_health};
use crate::error::invalid_session_response;
use crate::metrics;

/// Health check endpoint - returns server status
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let metrics = state.metrics.snapshot();

    let status = if metrics.errors.proxy == 0 && metrics.errors.bucket_mismatch == 0 {
        "healthy"
    } else {
        "degraded"
    };

    Json(metrics::HealthStatus {
        status: status.to_string(),
        bucket: state.containers.bucket().to_string(),
        connections: metrics.connections.active,
        uptime_secs: metrics.uptime_secs,
    })
}

/// Metrics endpoint - returns detailed server metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

/// Single health probe against a session's container, `?sessionId=<id>`.
pub async fn container_health_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Ok(session) = extract_session_id_from_source(&params) else {
        return invalid_session_response();
    };

    let container = state.containers.resolve(&session);
    match probe_health(&container).await {
        Ok(snapshot) => Json(HealthOutcome::healthy(snapshot)).into_response(),
        Err(e) => {
            debug!(container_id = %container.id(), error = %e, "Container health probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthOutcome::exhausted()),
            )
                .into_response()
        }
    }
}
