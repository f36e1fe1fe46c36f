use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use futures_util::StreamExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use api::{router, AppState};
use common::{Analysis, Analyzer, BotLog, BotLogKind, Error, Frame, Result};
use engine::{AnalysisGate, Cadence, CaptureSession, LatestFrame, Scheduler, SystemClock};
use paper::AutoTrader;

struct Unreachable;

#[async_trait]
impl Analyzer for Unreachable {
    async fn analyze(&self, _frame: &Frame) -> Result<Analysis> {
        Err(Error::Analyzer("offline".into()))
    }
}

fn app() -> Router {
    desk().0
}

fn desk() -> (Router, AutoTrader) {
    let trader = AutoTrader::new();
    let gate = AnalysisGate::new(Arc::new(Unreachable), trader.clone(), None);
    let scheduler = Scheduler::new(gate, Cadence::new(60_000), Arc::new(SystemClock));
    let session = CaptureSession::new(
        Arc::new(scheduler),
        trader.clone(),
        Arc::new(LatestFrame::new(Duration::from_secs(10))),
    );
    (router(AppState::new(Arc::new(session))), trader)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn healthz_reports_idle_desk() {
    let app = app();
    let (status, body) = call(&app, "GET", "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["bot"], "DISCONNECTED");
    assert_eq!(body["capturing"], false);
    assert_eq!(body["interval_ms"], 60_000);
}

#[tokio::test]
async fn fresh_desk_has_no_analysis_or_history() {
    let app = app();
    let (_, snapshot) = call(&app, "GET", "/api/analysis", None).await;
    assert!(snapshot["analysis"].is_null());
    assert!(snapshot["error"].is_null());

    let (_, history) = call(&app, "GET", "/api/history", None).await;
    assert_eq!(history, json!([]));
}

#[tokio::test]
async fn config_lists_presets_and_accepts_updates() {
    let app = app();
    let (_, body) = call(&app, "GET", "/api/config", None).await;
    assert_eq!(body["presets"], json!([60_000, 300_000, 900_000]));

    let (status, body) = call(
        &app,
        "POST",
        "/api/config",
        Some(json!({ "interval_ms": 300_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["restarted"], false);

    let (_, body) = call(&app, "GET", "/api/config", None).await;
    assert_eq!(body["interval_ms"], 300_000);
}

#[tokio::test]
async fn zero_interval_is_rejected() {
    let app = app();
    let (status, body) = call(
        &app,
        "POST",
        "/api/config",
        Some(json!({ "interval_ms": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("interval"));
}

#[tokio::test]
async fn frames_require_running_capture() {
    let app = app();
    let frame = json!({ "data_url": "data:image/png;base64,AAAA" });

    let (status, _) = call(&app, "POST", "/api/capture/frame", Some(frame.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(&app, "POST", "/api/capture/start", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_capturing"], true);

    let (status, _) = call(&app, "POST", "/api/capture/frame", Some(frame)).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, _) = call(
        &app,
        "POST",
        "/api/capture/frame",
        Some(json!({ "data_url": "not a data url" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn start_connects_bot_and_stop_disconnects() {
    let app = app();
    call(&app, "POST", "/api/capture/start", None).await;

    let (_, bot) = call(&app, "GET", "/api/bot", None).await;
    assert_eq!(bot["status"], "CONNECTING");
    assert_eq!(bot["logs"].as_array().unwrap().len(), 1);

    let (_, state) = call(&app, "POST", "/api/capture/stop", None).await;
    assert_eq!(state["is_capturing"], false);

    let (_, bot) = call(&app, "GET", "/api/bot", None).await;
    assert_eq!(bot["status"], "DISCONNECTED");
}

#[tokio::test]
async fn capture_error_is_surfaced() {
    let app = app();
    let (status, state) = call(
        &app,
        "POST",
        "/api/capture/error",
        Some(json!({ "title": "Screen permission denied", "message": "Allow screen sharing" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["error"]["title"], "Screen permission denied");

    let (_, bot) = call(&app, "GET", "/api/bot", None).await;
    assert_eq!(bot["status"], "ERROR");

    let (_, state) = call(&app, "GET", "/api/capture", None).await;
    assert_eq!(state["is_capturing"], false);
}

#[tokio::test]
async fn capture_error_without_title_is_a_device_failure() {
    let app = app();
    let (_, state) = call(
        &app,
        "POST",
        "/api/capture/error",
        Some(json!({ "message": "no display found" })),
    )
    .await;
    assert_eq!(state["error"]["title"], "Capture error");
    assert!(state["error"]["message"]
        .as_str()
        .unwrap()
        .contains("no display found"));

    let (_, state) = call(
        &app,
        "POST",
        "/api/capture/error",
        Some(json!({ "permission_denied": true })),
    )
    .await;
    assert_eq!(state["error"]["title"], "Screen permission denied");
}

#[tokio::test]
async fn log_stream_sends_snapshot_then_live_entries_once() {
    let (app, trader) = desk();
    // Logged before the client connects, so it is part of the snapshot.
    trader.connect().await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws/logs"))
        .await
        .unwrap();

    let mut received: Vec<BotLog> = Vec::new();
    while received.len() < 3 {
        let msg = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("log stream stalled")
            .unwrap()
            .unwrap();
        if msg.is_text() {
            received.push(serde_json::from_str(msg.to_text().unwrap()).unwrap());
        }
    }

    // Snapshot entry, then the handshake completing 1.5s later.
    assert_eq!(received[0].message, "Starting simulated connection...");
    assert_eq!(
        received.iter().map(|l| l.kind).collect::<Vec<_>>(),
        vec![BotLogKind::Info, BotLogKind::Success, BotLogKind::Info]
    );
    assert!(received.windows(2).all(|w| w[0].id < w[1].id));

    // Nothing is repeated afterwards.
    let extra = tokio::time::timeout(Duration::from_millis(300), socket.next()).await;
    assert!(extra.is_err());
}
