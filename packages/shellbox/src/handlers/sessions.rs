use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use shellbox_session::SessionId;
use tracing::info;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSession {
    pub session_id: SessionId,
}

/// Allocate a fresh session id. Creating the container behind it is up to
/// whoever provisions containers.
pub async fn create_session() -> impl IntoResponse {
    let session_id = SessionId::generate();
    info!(%session_id, "Allocated session");
    (StatusCode::CREATED, Json(CreatedSession { session_id }))
}
