//! Routing and readiness gate for container-backed terminal sessions.
//!
//! Terminal upgrades on `/api/terminal/<session>[-<tab>]/ws` are resolved to
//! a container, held until that container is healthy and bound to the
//! configured bucket, and then proxied to its terminal stream.

pub mod config;
pub mod container;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod route;
pub mod websocket_proxy;

#[cfg(test)]
mod test_helpers;

use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::{MakeSpan, TraceLayer};
use uuid::Uuid;

use crate::container::{ContainerDirectory, PollOptions};
use crate::metrics::ServerMetrics;

/// Custom span maker that adds a unique request ID to each incoming request.
/// The URI stays out of the span: it carries unvalidated session ids.
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            request_id = %request_id,
        )
    }
}

#[derive(Clone)]
pub struct AppState {
    pub containers: Arc<ContainerDirectory>,
    pub poll: PollOptions,
    pub metrics: Arc<ServerMetrics>,
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions", post(handlers::create_session))
        .route(
            "/api/container/health",
            get(handlers::container_health_handler),
        )
        // Health endpoints
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .fallback(not_found)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            handlers::terminal_route_middleware,
        ))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
