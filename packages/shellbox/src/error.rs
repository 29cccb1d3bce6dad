//! Container errors, error codes, and their HTTP translation.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use shellbox_session::ValidationError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A container endpoint could not be used. Messages are generic on purpose:
/// nothing from the container's response body ends up in them.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container request failed")]
    Transport(#[source] BoxError),

    #[error("container returned status {0}")]
    UnexpectedStatus(u16),

    #[error("container returned an unreadable body")]
    InvalidBody,

    #[error("failed to get container bucket name")]
    BucketNameUnavailable,
}

impl ContainerError {
    pub fn transport(err: impl Into<BoxError>) -> Self {
        Self::Transport(err.into())
    }
}

/// The container is bound to different storage than this deployment expects.
/// Both names come from operator configuration, so they are safe to report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "container bucket mismatch: expected `{expected}`, found `{}`",
    .actual.as_deref().unwrap_or("null")
)]
pub struct BucketMismatchError {
    pub expected: String,
    pub actual: Option<String>,
}

/// Why a container could not be handed a terminal connection.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    BucketMismatch(#[from] BucketMismatchError),
}

impl ReconcileError {
    pub fn error_code(&self) -> &str {
        match self {
            Self::Container(_) => "container_unavailable",
            Self::BucketMismatch(_) => "bucket_mismatch",
        }
    }

    /// A mismatch means the container serves the wrong storage; retrying
    /// against the same container can never fix it.
    pub fn retryable(&self) -> bool {
        match self {
            Self::Container(_) => true,
            Self::BucketMismatch(_) => false,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Container(_) => StatusCode::BAD_GATEWAY,
            Self::BucketMismatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON body for gate failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub retryable: bool,
}

impl From<&ReconcileError> for ErrorResponse {
    fn from(err: &ReconcileError) -> Self {
        Self {
            error: err.error_code().to_string(),
            message: err.to_string(),
            retryable: err.retryable(),
        }
    }
}

impl IntoResponse for ReconcileError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorResponse::from(&self))).into_response()
    }
}

/// The fixed 400 returned for any malformed session or terminal id.
pub fn invalid_session_response() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": ValidationError::InvalidSessionId.to_string() })),
    )
        .into_response()
}

/// Container has not reported healthy yet; the client should retry shortly.
pub fn starting_up_response(retry_after_secs: u64) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        [(
            axum::http::header::RETRY_AFTER,
            retry_after_secs.to_string(),
        )],
        Json(ErrorResponse {
            error: "starting_up".to_string(),
            message: "container is starting up".to_string(),
            retryable: true,
        }),
    )
        .into_response()
}
