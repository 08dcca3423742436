//! Request classification: leader or follower.
//!
//! # Rules (first match wins)
//! 1. `POST /sequencer/txs` → leader
//! 2. `GET /sequencer/ready` → leader
//! 3. `Upgrade: websocket` on any path → leader
//! 4. `POST /rpc` whose body names a write method → leader
//! 5. anything else → follower
//!
//! An unreadable, oversized or slow `/rpc` body classifies as follower; it is
//! never an error for the client.

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request};
use serde::Serialize;
use std::time::Duration;

use crate::config::ClassifierConfig;
use crate::routing::body::sniff_body;
use crate::routing::rpc::RpcMethodSniffer;

pub const SUBMIT_TXS_PATH: &str = "/sequencer/txs";
pub const READY_PATH: &str = "/sequencer/ready";
pub const RPC_PATH: &str = "/rpc";

/// Which rule produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationRule {
    SubmitTxs,
    ReadyProbe,
    WebSocket,
    RpcWrite,
    Default,
}

/// Per-request routing directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub use_leader: bool,
    pub rule: ClassificationRule,
}

impl ClassificationResult {
    fn leader(rule: ClassificationRule) -> Self {
        Self { use_leader: true, rule }
    }

    fn follower() -> Self {
        Self {
            use_leader: false,
            rule: ClassificationRule::Default,
        }
    }
}

/// Stateless request classifier.
#[derive(Debug, Clone)]
pub struct Classifier {
    sniffer: RpcMethodSniffer,
    max_body_bytes: usize,
    body_read_timeout: Duration,
}

impl Classifier {
    pub fn from_config(config: &ClassifierConfig, body_read_timeout: Duration) -> Self {
        Self {
            sniffer: RpcMethodSniffer::new(config.write_methods.iter().cloned(), config.rpc_method_match),
            max_body_bytes: config.max_body_bytes,
            body_read_timeout,
        }
    }

    /// Classify from request head and an optional fully-buffered body.
    ///
    /// Pure: the same inputs always give the same answer.
    pub fn classify(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
        body: Option<&[u8]>,
    ) -> ClassificationResult {
        if path == SUBMIT_TXS_PATH && method == Method::POST {
            return ClassificationResult::leader(ClassificationRule::SubmitTxs);
        }
        if path == READY_PATH && method == Method::GET {
            return ClassificationResult::leader(ClassificationRule::ReadyProbe);
        }
        if is_websocket_upgrade(headers) {
            return ClassificationResult::leader(ClassificationRule::WebSocket);
        }
        if is_rpc_call(method, path) {
            if let Some(body) = body {
                if self.sniffer.is_write(body) {
                    return ClassificationResult::leader(ClassificationRule::RpcWrite);
                }
            }
        }
        ClassificationResult::follower()
    }

    /// True if classification depends on the request body.
    pub fn needs_body(&self, method: &Method, path: &str, headers: &HeaderMap) -> bool {
        is_rpc_call(method, path) && !is_websocket_upgrade(headers)
    }

    /// Classify a full request, buffering the body when rule 4 applies.
    ///
    /// The returned request carries a body equivalent to the original.
    pub async fn classify_request(&self, request: Request<Body>) -> (ClassificationResult, Request<Body>) {
        let path = request.uri().path();
        if !self.needs_body(request.method(), path, request.headers()) {
            let result = self.classify(request.method(), path, request.headers(), None);
            return (result, request);
        }

        let (parts, body) = request.into_parts();
        let declared_len = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let sniffed = sniff_body(body, declared_len, self.max_body_bytes, self.body_read_timeout).await;
        let result = self.classify(&parts.method, parts.uri.path(), &parts.headers, sniffed.bytes.as_deref());
        if sniffed.bytes.is_none() {
            tracing::debug!(outcome = ?sniffed.outcome, "RPC body not inspected, routing as read");
        }
        (result, Request::from_parts(parts, sniffed.body))
    }
}

/// `Upgrade: websocket`, compared case-insensitively.
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::UPGRADE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.trim().eq_ignore_ascii_case("websocket"))
}

fn is_rpc_call(method: &Method, path: &str) -> bool {
    path == RPC_PATH && method == Method::POST
}
