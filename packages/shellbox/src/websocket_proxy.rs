//! Frame pump between a client WebSocket and a container's terminal stream.

use std::sync::Arc;

use axum::extract::ws::{self, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio_tungstenite::tungstenite::{self, protocol::frame::coding::CloseCode};
use tracing::{debug, info, warn};

use crate::metrics::ServerMetrics;

/// Which side ended the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyEnd {
    Client,
    Container,
    /// A send or receive failed on either side.
    Error,
}

pub fn to_container(msg: ws::Message) -> tungstenite::Message {
    match msg {
        ws::Message::Text(text) => tungstenite::Message::Text(text.as_str().into()),
        ws::Message::Binary(data) => tungstenite::Message::Binary(data),
        ws::Message::Ping(data) => tungstenite::Message::Ping(data),
        ws::Message::Pong(data) => tungstenite::Message::Pong(data),
        ws::Message::Close(frame) => {
            tungstenite::Message::Close(frame.map(|f| tungstenite::protocol::CloseFrame {
                code: CloseCode::from(f.code),
                reason: f.reason.as_str().into(),
            }))
        }
    }
}

/// Container frame to forward to the client. `None` for raw frames, which
/// never surface from a read.
pub fn to_client(msg: tungstenite::Message) -> Option<ws::Message> {
    Some(match msg {
        tungstenite::Message::Text(text) => ws::Message::Text(text.as_str().into()),
        tungstenite::Message::Binary(data) => ws::Message::Binary(data),
        tungstenite::Message::Ping(data) => ws::Message::Ping(data),
        tungstenite::Message::Pong(data) => ws::Message::Pong(data),
        tungstenite::Message::Close(frame) => ws::Message::Close(frame.map(|f| ws::CloseFrame {
            code: u16::from(f.code),
            reason: f.reason.as_str().into(),
        })),
        tungstenite::Message::Frame(_) => return None,
    })
}

/// Connect to `upstream_url` and shuttle frames both ways until either
/// side closes.
pub async fn proxy_terminal(mut client: WebSocket, upstream_url: String, metrics: Arc<ServerMetrics>) {
    let upstream = match tokio_tungstenite::connect_async(&upstream_url).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            warn!(error = %e, "failed to connect to container terminal stream");
            metrics.proxy_error();
            let _ = client
                .send(ws::Message::Close(Some(ws::CloseFrame {
                    code: 1011,
                    reason: "container terminal unavailable".into(),
                })))
                .await;
            return;
        }
    };

    metrics.connection_opened();
    debug!(url = %upstream_url, "terminal stream connected");

    let (mut client_tx, mut client_rx) = client.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    let upstream_metrics = metrics.clone();
    let client_to_container = async move {
        while let Some(msg) = client_rx.next().await {
            let Ok(msg) = msg else {
                return ProxyEnd::Error;
            };
            let closing = matches!(msg, ws::Message::Close(_));
            if upstream_tx.send(to_container(msg)).await.is_err() {
                return ProxyEnd::Error;
            }
            upstream_metrics.frame_upstream();
            if closing {
                break;
            }
        }
        ProxyEnd::Client
    };

    let downstream_metrics = metrics.clone();
    let container_to_client = async move {
        while let Some(msg) = upstream_rx.next().await {
            let Ok(msg) = msg else {
                return ProxyEnd::Error;
            };
            let closing = matches!(msg, tungstenite::Message::Close(_));
            if let Some(frame) = to_client(msg) {
                if client_tx.send(frame).await.is_err() {
                    return ProxyEnd::Error;
                }
                downstream_metrics.frame_downstream();
            }
            if closing {
                break;
            }
        }
        ProxyEnd::Container
    };

    let end = tokio::select! {
        end = client_to_container => end,
        end = container_to_client => end,
    };

    if end == ProxyEnd::Error {
        metrics.proxy_error();
    }
    metrics.connection_closed();
    info!(?end, "terminal stream closed");
}
