mod common;

use axum::http::StatusCode;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

use common::*;
use sequencer_router::config::ProxyConfig;
use sequencer_router::registry::Registry;

async fn backend_of(response: reqwest::Response) -> (reqwest::StatusCode, Value) {
    let status = response.status();
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_writes_and_ready_go_to_leader() {
    let leader = start_backend("leader").await;
    let follower = start_backend("follower_1").await;
    let router = start_router(registry(Some(leader), &[follower])).await;
    let client = reqwest::Client::new();

    let (status, body) = backend_of(
        client.post(router.url("/sequencer/txs")).body("0xdeadbeef").send().await.unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["backend"], "leader");
    assert_eq!(body["body"], "0xdeadbeef");

    let (_, body) = backend_of(client.get(router.url("/sequencer/ready")).send().await.unwrap()).await;
    assert_eq!(body["backend"], "leader");

    // Everything else reads from the follower.
    let (_, body) = backend_of(client.get(router.url("/health?verbose=1")).send().await.unwrap()).await;
    assert_eq!(body["backend"], "follower_1");
    assert_eq!(body["path"], "/health?verbose=1");
}

#[tokio::test]
async fn test_no_leader_returns_503_for_writes() {
    let follower = start_backend("follower_1").await;
    let router = start_router(registry(None, &[follower])).await;
    let client = reqwest::Client::new();

    let response = client.post(router.url("/sequencer/txs")).body("0x01").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.text().await.unwrap(), "No backend available");

    // Reads are unaffected.
    let (status, body) = backend_of(client.get(router.url("/health")).send().await.unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["backend"], "follower_1");
}

#[tokio::test]
async fn test_empty_registry_returns_503_for_reads() {
    let router = start_router(Registry::empty()).await;
    let response = reqwest::get(router.url("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_reads_fall_back_to_leader() {
    let leader = start_backend("leader").await;

    // No follower at all.
    let router = start_router(registry(Some(leader), &[])).await;
    let (_, body) = backend_of(reqwest::get(router.url("/status")).await.unwrap()).await;
    assert_eq!(body["backend"], "leader");

    // Follower key present but empty.
    let snapshot = Registry::from_map(
        [
            ("leader".to_string(), leader.to_string()),
            ("follower_1".to_string(), String::new()),
        ],
        3,
    )
    .unwrap();
    router.registry.install(snapshot);
    let (_, body) = backend_of(reqwest::get(router.url("/status")).await.unwrap()).await;
    assert_eq!(body["backend"], "leader");
}

#[tokio::test]
async fn test_only_first_follower_serves_reads() {
    let leader = start_backend("leader").await;
    let first = start_backend("follower_1").await;
    let second = start_backend("follower_2").await;
    let router = start_router(registry(Some(leader), &[first, second])).await;

    for _ in 0..5 {
        let (_, body) = backend_of(reqwest::get(router.url("/status")).await.unwrap()).await;
        assert_eq!(body["backend"], "follower_1");
    }
}

#[tokio::test]
async fn test_rpc_writes_go_to_leader_with_body_intact() {
    let leader = start_backend("leader").await;
    let follower = start_backend("follower_1").await;
    let router = start_router(registry(Some(leader), &[follower])).await;
    let client = reqwest::Client::new();

    let write = rpc_body("eth_sendRawTransaction");
    let (_, body) = backend_of(
        client
            .post(router.url("/rpc"))
            .header("content-type", "application/json")
            .body(write.clone())
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["backend"], "leader");
    assert_eq!(body["body"], write.as_str());

    let read = rpc_body("eth_blockNumber");
    let (_, body) = backend_of(client.post(router.url("/rpc")).body(read.clone()).send().await.unwrap()).await;
    assert_eq!(body["backend"], "follower_1");
    assert_eq!(body["body"], read.as_str());

    // Write method names are only honoured on /rpc.
    let (_, body) = backend_of(client.post(router.url("/other")).body(write).send().await.unwrap()).await;
    assert_eq!(body["backend"], "follower_1");
}

#[tokio::test]
async fn test_oversized_rpc_body_routes_as_read_and_is_replayed() {
    let leader = start_backend("leader").await;
    let follower = start_backend("follower_1").await;
    let mut config = ProxyConfig::default();
    config.classifier.max_body_bytes = 64;
    let router = start_router_with(config, registry(Some(leader), &[follower])).await;

    let padding = "0".repeat(4096);
    let payload = format!(
        r#"{{"jsonrpc":"2.0","id":1,"method":"eth_sendRawTransaction","params":["0x{}"]}}"#,
        padding
    );
    let (status, body) = backend_of(
        reqwest::Client::new()
            .post(router.url("/rpc"))
            .body(payload.clone())
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["backend"], "follower_1");
    assert_eq!(body["body_len"], payload.len());
    assert_eq!(body["body"], payload.as_str());
}

#[tokio::test]
async fn test_registry_swap_applies_to_next_request() {
    let old_leader = start_backend("old_leader").await;
    let new_leader = start_backend("new_leader").await;
    let router = start_router(registry(Some(old_leader), &[])).await;
    let client = reqwest::Client::new();

    let (_, body) = backend_of(client.post(router.url("/sequencer/txs")).send().await.unwrap()).await;
    assert_eq!(body["backend"], "old_leader");

    router.registry.install(registry(Some(new_leader), &[]).with_generation(2));

    let (_, body) = backend_of(client.post(router.url("/sequencer/txs")).send().await.unwrap()).await;
    assert_eq!(body["backend"], "new_leader");
}

#[tokio::test]
async fn test_unreachable_backend_returns_502() {
    let dead = dead_address().await;
    let router = start_router(registry(Some(dead), &[])).await;

    let response = reqwest::get(router.url("/sequencer/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_backend_errors_pass_through() {
    let leader = start_failing_backend(StatusCode::INTERNAL_SERVER_ERROR).await;
    let router = start_router(registry(Some(leader), &[])).await;

    let response = reqwest::get(router.url("/sequencer/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text().await.unwrap(), "backend failure");
}

#[tokio::test]
async fn test_request_id_and_forwarded_for() {
    let leader = start_backend("leader").await;
    let router = start_router(registry(Some(leader), &[])).await;
    let client = reqwest::Client::new();

    let response = client.get(router.url("/status")).send().await.unwrap();
    let generated = response.headers().get("x-request-id").cloned();
    assert!(generated.is_some());
    let (_, body) = backend_of(response).await;
    assert_eq!(body["forwarded_for"], "127.0.0.1");

    let response = client
        .get(router.url("/status"))
        .header("x-request-id", "trace-42")
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "trace-42");
}

#[tokio::test]
async fn test_websocket_bridged_to_leader() {
    let leader = start_backend("leader").await;
    let follower = start_backend("follower_1").await;
    let router = start_router(registry(Some(leader), &[follower])).await;

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", router.addr))
        .await
        .unwrap();
    socket.send(Message::Text("ping".to_string().into())).await.unwrap();

    let reply = loop {
        match socket.next().await.unwrap().unwrap() {
            Message::Text(text) => break text.as_str().to_owned(),
            _ => continue,
        }
    };
    assert_eq!(reply, "leader:ping");
    socket.close(None).await.unwrap();
}

#[tokio::test]
async fn test_websocket_without_leader_is_rejected() {
    let follower = start_backend("follower_1").await;
    let router = start_router(registry(None, &[follower])).await;

    let err = tokio_tungstenite::connect_async(format!("ws://{}/ws", router.addr))
        .await
        .unwrap_err();
    match err {
        tokio_tungstenite::tungstenite::Error::Http(response) => {
            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        }
        other => panic!("unexpected error {:?}", other),
    }
}
