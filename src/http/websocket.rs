//! WebSocket proxy handling.
//!
//! # Responsibilities
//! - Complete upgrade handshake with client
//! - Establish WebSocket connection to backend
//! - Bidirectional frame forwarding
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Proxy ←──── WebSocket frames ────→ Backend
//! ```
//!
//! # Design Decisions
//! - The backend connection is opened before the client upgrade is accepted,
//!   so an unreachable backend is a plain 502
//! - Frame-level forwarding (no message buffering)
//! - Close frames propagated in both directions

use axum::body::Body;
use axum::extract::ws::{self, WebSocket, WebSocketUpgrade};
use axum::extract::FromRequestParts;
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::{frame::coding::CloseCode, CloseFrame};
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::http::request::X_REQUEST_ID;

type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upgrade the client connection and bridge it to `backend`.
pub async fn bridge(request: Request<Body>, backend: &str) -> Response {
    let (mut parts, _body) = request.into_parts();
    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };

    let path = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let url = format!("ws://{}{}", backend, path);
    let mut upstream_request = match url.as_str().into_client_request() {
        Ok(req) => req,
        Err(e) => {
            tracing::error!(backend = %backend, error = %e, "Invalid upstream WebSocket URL");
            return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
        }
    };
    for name in [header::SEC_WEBSOCKET_PROTOCOL, X_REQUEST_ID.clone()] {
        if let Some(value) = parts.headers.get(&name) {
            upstream_request.headers_mut().insert(name, value.clone());
        }
    }

    let (upstream, handshake) = match tokio_tungstenite::connect_async(upstream_request).await {
        Ok(pair) => pair,
        Err(e) => {
            tracing::error!(backend = %backend, error = %e, "Upstream WebSocket handshake failed");
            return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
        }
    };

    let protocol = handshake
        .headers()
        .get(header::SEC_WEBSOCKET_PROTOCOL)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let upgrade = match protocol {
        Some(protocol) => upgrade.protocols([protocol]),
        None => upgrade,
    };

    let backend = backend.to_string();
    upgrade.on_upgrade(move |client| async move {
        tracing::debug!(backend = %backend, "WebSocket bridge open");
        pump(client, upstream).await;
        tracing::debug!(backend = %backend, "WebSocket bridge closed");
    })
}

async fn pump(client: WebSocket, upstream: UpstreamSocket) {
    let (mut client_tx, mut client_rx) = client.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    let client_to_upstream = async {
        while let Some(Ok(message)) = client_rx.next().await {
            let closing = matches!(message, ws::Message::Close(_));
            if upstream_tx.send(to_upstream(message)).await.is_err() || closing {
                break;
            }
        }
        let _ = upstream_tx.close().await;
    };

    let upstream_to_client = async {
        while let Some(Ok(message)) = upstream_rx.next().await {
            let closing = matches!(message, UpstreamMessage::Close(_));
            let Some(message) = to_client(message) else { continue };
            if client_tx.send(message).await.is_err() || closing {
                break;
            }
        }
        let _ = client_tx.close().await;
    };

    tokio::select! {
        _ = client_to_upstream => {}
        _ = upstream_to_client => {}
    }
}

fn to_upstream(message: ws::Message) -> UpstreamMessage {
    match message {
        ws::Message::Text(text) => UpstreamMessage::Text(text.as_str().to_owned().into()),
        ws::Message::Binary(data) => UpstreamMessage::Binary(data),
        ws::Message::Ping(data) => UpstreamMessage::Ping(data),
        ws::Message::Pong(data) => UpstreamMessage::Pong(data),
        ws::Message::Close(frame) => UpstreamMessage::Close(frame.map(|f| CloseFrame {
            code: CloseCode::from(f.code),
            reason: f.reason.as_str().to_owned().into(),
        })),
    }
}

/// Raw frames never surface from a reading stream.
fn to_client(message: UpstreamMessage) -> Option<ws::Message> {
    Some(match message {
        UpstreamMessage::Text(text) => ws::Message::Text(text.as_str().to_owned().into()),
        UpstreamMessage::Binary(data) => ws::Message::Binary(data),
        UpstreamMessage::Ping(data) => ws::Message::Ping(data),
        UpstreamMessage::Pong(data) => ws::Message::Pong(data),
        UpstreamMessage::Close(frame) => ws::Message::Close(frame.map(|f| ws::CloseFrame {
            code: u16::from(f.code),
            reason: f.reason.as_str().to_owned().into(),
        })),
        UpstreamMessage::Frame(_) => return None,
    })
}
