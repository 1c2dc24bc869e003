use std::time::Duration;

use clap::Parser;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use broadcaster_daemon::{build, Args};
use futures::{SinkExt, StreamExt};

/// Spins up a full node (store + connection manager + dispatcher +
/// reaper + axum router) on an OS-assigned port and returns its base
/// HTTP/WS addresses plus a cancel handle for teardown.
struct TestNode {
    http_base: String,
    ws_base: String,
    cancel: tokio_util::sync::CancellationToken,
    server_task: tokio::task::JoinHandle<()>,
}

async fn start_node(extra_args: &[&str]) -> TestNode {
    let mut argv = vec!["broadcaster-node"];
    let has_countdown = extra_args.contains(&"--countdown-ms");
    if !has_countdown {
        argv.extend_from_slice(&["--countdown-ms", "50"]);
    }
    argv.extend_from_slice(extra_args);
    let args = Args::parse_from(argv);
    let node = build(&args).expect("node build");

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let cancel = node.cancel.clone();
    let shutdown_cancel = node.cancel.clone();
    let router = node.router;
    let server_task = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move { shutdown_cancel.cancelled().await })
            .await
            .expect("server");
    });

    TestNode {
        http_base: format!("http://{addr}"),
        ws_base: format!("ws://{addr}/ws"),
        cancel,
        server_task,
    }
}

impl TestNode {
    async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.server_task.await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn create_session_then_fetch_snapshot() {
    let node = start_node(&[]).await;
    let client = reqwest::Client::new();

    let create: Value = client
        .post(format!("{}/sessions", node.http_base))
        .json(&json!({"userId": "u1"}))
        .send()
        .await
        .expect("create request")
        .json()
        .await
        .expect("create body");

    let session_id = create["sessionId"].as_str().unwrap().to_string();
    assert!(create["tickMs"].as_u64().unwrap() > 0);

    let snapshot: Value = client
        .get(format!("{}/sessions/{session_id}", node.http_base))
        .send()
        .await
        .expect("get request")
        .json()
        .await
        .expect("get body");
    assert_eq!(snapshot["status"], "waiting");
    assert_eq!(snapshot["playerCount"], 0);

    node.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_user_id_is_rejected() {
    let node = start_node(&[]).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/sessions", node.http_base))
        .json(&json!({"userId": ""}))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 400);

    node.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_session_snapshot_is_404() {
    let node = start_node(&[]).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!(
            "{}/sessions/{}",
            node.http_base,
            uuid::Uuid::new_v4()
        ))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 404);

    node.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_session_is_idempotent() {
    let node = start_node(&[]).await;
    let client = reqwest::Client::new();

    let create: Value = client
        .post(format!("{}/sessions", node.http_base))
        .json(&json!({"userId": "u1"}))
        .send()
        .await
        .expect("create")
        .json()
        .await
        .expect("create body");
    let session_id = create["sessionId"].as_str().unwrap().to_string();

    for _ in 0..2 {
        let response = client
            .delete(format!("{}/sessions/{session_id}", node.http_base))
            .send()
            .await
            .expect("delete");
        assert_eq!(response.status(), 204);
    }

    let snapshot: Value = client
        .get(format!("{}/sessions/{session_id}", node.http_base))
        .send()
        .await
        .expect("get")
        .json()
        .await
        .expect("get body");
    assert_eq!(snapshot["status"], "stopped");

    node.shutdown().await;
}

/// End-to-end happy path over the real WebSocket: connect, join, and
/// observe a countdown followed by ticks (spec.md section 8).
#[tokio::test(flavor = "multi_thread")]
async fn websocket_join_then_receives_countdown_and_ticks() {
    // The dispatcher's first pass always finds an empty session cache
    // (the node boots before any session exists) and falls back to its
    // one-second idle poll, so the countdown window has to outlast that
    // poll for this test to reliably observe a `countdown` message.
    let node = start_node(&["--session-refresh-interval-ms", "50", "--countdown-ms", "3000"]).await;
    let client = reqwest::Client::new();

    let create: Value = client
        .post(format!("{}/sessions", node.http_base))
        .json(&json!({"userId": "u1"}))
        .send()
        .await
        .expect("create")
        .json()
        .await
        .expect("create body");
    let session_id = create["sessionId"].as_str().unwrap().to_string();

    let (mut ws, _) = connect_async(&node.ws_base).await.expect("ws connect");
    ws.send(Message::Text(
        json!({"action": "join", "sessionId": session_id, "userId": "u1"})
            .to_string()
            .into(),
    ))
    .await
    .expect("send join");

    let joined = next_json(&mut ws).await;
    assert_eq!(joined["type"], "session_joined");

    let mut saw_countdown = false;
    let mut saw_tick = false;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while tokio::time::Instant::now() < deadline && !(saw_countdown && saw_tick) {
        let Ok(Some(Ok(msg))) =
            tokio::time::timeout(Duration::from_millis(500), ws.next()).await
        else {
            continue;
        };
        let Message::Text(text) = msg else { continue };
        let value: Value = serde_json::from_str(&text).unwrap();
        match value["type"].as_str() {
            Some("countdown") => saw_countdown = true,
            Some("tick") => saw_tick = true,
            _ => {}
        }
    }
    assert!(saw_countdown, "expected at least one countdown message");
    assert!(saw_tick, "expected at least one tick message");

    node.shutdown().await;
}

/// Pings with a very stale clientTimestamp immediately breach the
/// default maxLatencyMs, driving the connection straight to `kicked`
/// (spec.md section 4.3.4/8).
#[tokio::test(flavor = "multi_thread")]
async fn sustained_high_latency_pings_trigger_a_kick() {
    let node = start_node(&[
        "--max-latency-ms",
        "50",
        "--latency-samples",
        "2",
        "--session-refresh-interval-ms",
        "50",
    ])
    .await;
    let client = reqwest::Client::new();

    let create: Value = client
        .post(format!("{}/sessions", node.http_base))
        .json(&json!({"userId": "u1"}))
        .send()
        .await
        .expect("create")
        .json()
        .await
        .expect("create body");
    let session_id = create["sessionId"].as_str().unwrap().to_string();

    let (mut ws, _) = connect_async(&node.ws_base).await.expect("ws connect");
    ws.send(Message::Text(
        json!({"action": "join", "sessionId": session_id, "userId": "u1"})
            .to_string()
            .into(),
    ))
    .await
    .expect("send join");
    let _joined = next_json(&mut ws).await;

    let mut kicked = false;
    for _ in 0..4 {
        ws.send(Message::Text(
            json!({"action": "ping", "clientTimestamp": 0_i64})
                .to_string()
                .into(),
        ))
        .await
        .expect("send ping");

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while tokio::time::Instant::now() < deadline {
            let Ok(Some(Ok(Message::Text(text)))) =
                tokio::time::timeout(Duration::from_millis(500), ws.next()).await
            else {
                break;
            };
            let value: Value = serde_json::from_str(&text).unwrap();
            if value["type"] == "kicked" {
                kicked = true;
            }
        }
        if kicked {
            break;
        }
    }
    assert!(kicked, "expected the connection to be kicked for sustained high latency");

    node.shutdown().await;
}

async fn next_json(
    ws: &mut (impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin),
) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a message")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}
