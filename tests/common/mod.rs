//! Shared utilities for integration testing.

#![allow(dead_code)]

use axum::{
    body::Bytes,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    http::{HeaderMap, Method, StatusCode, Uri},
    routing::any,
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

use sequencer_router::config::ProxyConfig;
use sequencer_router::registry::{Registry, RegistryEntry, RegistryHandle};
use sequencer_router::{HttpServer, Shutdown};

/// Start a mock node that echoes who it is and what it received.
///
/// Plain requests get `{"backend", "method", "path", "body", ...}` back;
/// WebSocket clients on `/ws` get every text frame echoed, prefixed with
/// `name`.
pub async fn start_backend(name: &'static str) -> SocketAddr {
    let app = Router::new()
        .route(
            "/ws",
            any(move |ws: WebSocketUpgrade| async move { ws.on_upgrade(move |socket| echo_socket(socket, name)) }),
        )
        .fallback(move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| async move {
            Json(json!({
                "backend": name,
                "method": method.as_str(),
                "path": uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/"),
                "body": String::from_utf8_lossy(&body),
                "body_len": body.len(),
                "forwarded_for": headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()),
            }))
        });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn echo_socket(mut socket: WebSocket, name: &'static str) {
    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(text) => {
                let reply = format!("{}:{}", name, text.as_str());
                if socket.send(Message::Text(reply.into())).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

/// Start a mock node that always answers with `status`.
pub async fn start_failing_backend(status: StatusCode) -> SocketAddr {
    let app = Router::new().fallback(move || async move { (status, "backend failure") });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// An address nothing listens on.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Registry with a leader and numbered followers.
pub fn registry(leader: Option<SocketAddr>, followers: &[SocketAddr]) -> Registry {
    let mut entries: Vec<RegistryEntry> = followers
        .iter()
        .enumerate()
        .map(|(i, addr)| RegistryEntry::follower(i as u32 + 1, addr.to_string()))
        .collect();
    if let Some(leader) = leader {
        entries.push(RegistryEntry::leader(leader.to_string()));
    }
    Registry::from_entries(entries, 1).unwrap()
}

/// Running router under test.
pub struct TestRouter {
    pub addr: SocketAddr,
    pub registry: RegistryHandle,
    pub shutdown: Shutdown,
}

impl TestRouter {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestRouter {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the router on an ephemeral port with the given snapshot installed.
pub async fn start_router(snapshot: Registry) -> TestRouter {
    start_router_with(ProxyConfig::default(), snapshot).await
}

pub async fn start_router_with(mut config: ProxyConfig, snapshot: Registry) -> TestRouter {
    config.observability.metrics_enabled = false;
    config.timeouts.connect_secs = 1;

    let registry = RegistryHandle::with_registry(snapshot);
    let shutdown = Shutdown::new();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config, registry.clone());
    let signal = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, signal).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    TestRouter {
        addr,
        registry,
        shutdown,
    }
}

/// JSON-RPC envelope for `method`.
pub fn rpc_body(method: &str) -> String {
    format!(r#"{{"jsonrpc":"2.0","id":1,"method":"{}","params":[]}}"#, method)
}
