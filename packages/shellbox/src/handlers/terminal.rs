use axum::{
    extract::{FromRequestParts, Request, State, WebSocketUpgrade},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, info, warn};

use crate::AppState;
use crate::container::{await_healthy_with_progress, ensure_bucket_binding};
use crate::error::{ReconcileError, invalid_session_response, starting_up_response};
use crate::route::{RouteOutcome, TerminalRoute, resolve_route};
use crate::websocket_proxy::proxy_terminal;

/// Intercepts terminal upgrades ahead of the router; everything else passes
/// straight through to the next handler.
pub async fn terminal_route_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    match resolve_route(request.uri().path(), request.headers()) {
        RouteOutcome::NotRoute => next.run(request).await,
        RouteOutcome::Invalid => {
            state.metrics.route_rejected();
            warn!("Rejected terminal upgrade with malformed identifiers");
            invalid_session_response()
        }
        RouteOutcome::Matched(route) => open_terminal(state, route, request).await,
    }
}

/// Gate a terminal connection on container readiness and storage binding,
/// then upgrade and proxy it.
pub async fn open_terminal(state: AppState, route: TerminalRoute, request: Request) -> Response {
    let container = state.containers.resolve(route.session_id());
    let container_id = container.id().clone();
    let terminal = route.terminal_id();

    let health = await_healthy_with_progress(&container, &state.poll, |attempt, max| {
        debug!(%container_id, attempt, max, "Waiting for container health");
    })
    .await;
    if !health.ok {
        state.metrics.health_exhausted();
        warn!(%container_id, attempts = state.poll.max_attempts, "Container did not become healthy");
        return starting_up_response(state.poll.delay.as_secs().max(1));
    }
    state.metrics.health_ready();

    if let Err(e) = ensure_bucket_binding(&container, state.containers.bucket()).await {
        match &e {
            ReconcileError::BucketMismatch(_) => {
                state.metrics.bucket_mismatch();
                error!(%container_id, error = %e, "Refusing terminal on misbound container");
            }
            ReconcileError::Container(_) => {
                state.metrics.container_error();
                warn!(%container_id, error = %e, "Container binding check failed");
            }
        }
        return e.into_response();
    }

    let (mut parts, _body) = request.into_parts();
    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };

    info!(%container_id, %terminal, "Opening terminal stream");
    let upstream_url = container.terminal_url(terminal);
    let metrics = state.metrics.clone();
    upgrade.on_upgrade(move |socket| proxy_terminal(socket, upstream_url, metrics))
}
