//! Recognizes terminal upgrade requests.
//!
//! `/api/terminal/<sessionId>[-<terminalId>]/ws` with `Upgrade: websocket`.
//! Anything else is somebody else's request and must fall through untouched.

use axum::http::{HeaderMap, header};
use shellbox_session::{CompoundSessionKey, SessionId, TerminalId, parse_compound_key};

pub const TERMINAL_ROUTE_PREFIX: &str = "/api/terminal/";
pub const TERMINAL_ROUTE_SUFFIX: &str = "/ws";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalRoute {
    key: CompoundSessionKey,
}

impl TerminalRoute {
    pub fn compound_key(&self) -> &CompoundSessionKey {
        &self.key
    }

    pub fn session_id(&self) -> &SessionId {
        self.key.session_id()
    }

    /// Terminal tab addressed by the route, `1` when the key has no suffix.
    pub fn terminal_id(&self) -> TerminalId {
        self.key.terminal_id()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Not a terminal upgrade. The next handler gets the request.
    NotRoute,
    /// A terminal upgrade whose identifiers are malformed.
    Invalid,
    Matched(TerminalRoute),
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("websocket"))
}

fn terminal_segment(path: &str) -> Option<&str> {
    let segment = path
        .strip_prefix(TERMINAL_ROUTE_PREFIX)?
        .strip_suffix(TERMINAL_ROUTE_SUFFIX)?;
    if segment.is_empty() || segment.contains('/') {
        return None;
    }
    Some(segment)
}

pub fn resolve_route(path: &str, headers: &HeaderMap) -> RouteOutcome {
    let Some(segment) = terminal_segment(path) else {
        return RouteOutcome::NotRoute;
    };
    if !is_websocket_upgrade(headers) {
        return RouteOutcome::NotRoute;
    }
    match parse_compound_key(segment) {
        Ok(key) => RouteOutcome::Matched(TerminalRoute { key }),
        Err(_) => RouteOutcome::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn upgrade(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::UPGRADE, HeaderValue::from_static(value));
        headers
    }

    fn matched(outcome: RouteOutcome) -> TerminalRoute {
        match outcome {
            RouteOutcome::Matched(route) => route,
            other => panic!("expected a match, got {other:?}"),
        }
    }

    #[test]
    fn compound_route_resolves_terminal() {
        let route = matched(resolve_route(
            "/api/terminal/abcdef12-3/ws",
            &upgrade("websocket"),
        ));
        assert_eq!(route.session_id().as_str(), "abcdef12");
        assert_eq!(route.terminal_id().as_str(), "3");
        assert_eq!(route.compound_key().to_string(), "abcdef12-3");
    }

    #[test]
    fn bare_session_defaults_to_primary() {
        let route = matched(resolve_route("/api/terminal/abcdef12/ws", &upgrade("websocket")));
        assert_eq!(route.terminal_id(), TerminalId::PRIMARY);
        assert!(!route.compound_key().has_terminal_suffix());
    }

    #[test]
    fn upgrade_header_is_case_insensitive() {
        let route = matched(resolve_route("/api/terminal/abcdef12-2/ws", &upgrade("WebSocket")));
        assert_eq!(route.terminal_id().get(), 2);
    }

    #[test]
    fn missing_upgrade_is_not_route() {
        assert_eq!(
            resolve_route("/api/terminal/abcdef12-3/ws", &HeaderMap::new()),
            RouteOutcome::NotRoute
        );
        assert_eq!(
            resolve_route("/api/terminal/abcdef12-3/ws", &upgrade("h2c")),
            RouteOutcome::NotRoute
        );
    }

    #[test]
    fn missing_upgrade_wins_over_bad_id() {
        assert_eq!(
            resolve_route("/api/terminal/BAD-1/ws", &HeaderMap::new()),
            RouteOutcome::NotRoute
        );
    }

    #[test]
    fn other_paths_are_not_route() {
        let headers = upgrade("websocket");
        for path in [
            "/api/terminal//ws",
            "/api/terminal/ws",
            "/api/terminal/abcdef12",
            "/api/terminal/abcdef12/ws/extra",
            "/api/terminal/abc/def12/ws",
            "/api/other/abcdef12/ws",
            "/",
        ] {
            assert_eq!(resolve_route(path, &headers), RouteOutcome::NotRoute, "{path}");
        }
    }

    #[test]
    fn malformed_ids_are_invalid() {
        let headers = upgrade("websocket");
        for path in [
            "/api/terminal/BAD-1/ws",
            "/api/terminal/short/ws",
            "/api/terminal/abcdef12-7/ws",
            "/api/terminal/abcdef12-0/ws",
            "/api/terminal/abcdef12-/ws",
            "/api/terminal/abcdef12-1-2/ws",
            "/api/terminal/..%2F..%2Fetc/ws",
        ] {
            assert_eq!(resolve_route(path, &headers), RouteOutcome::Invalid, "{path}");
        }
    }
}
