use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use common::{CaptureError, Frame};

use crate::AppState;

/// Lifecycle events and frames from the screen-capture client.
pub fn capture_router() -> Router<AppState> {
    Router::new()
        .route("/api/capture", get(get_capture))
        .route("/api/capture/start", post(start_capture))
        .route("/api/capture/stop", post(stop_capture))
        .route("/api/capture/error", post(report_error))
        .route("/api/capture/frame", post(push_frame))
}

async fn get_capture(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.session.state().await))
}

async fn start_capture(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    if let Err(e) = state.session.start().await {
        warn!(error = %e, "Capture start failed");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        );
    }
    (StatusCode::OK, Json(json!(state.session.state().await)))
}

async fn stop_capture(State(state): State<AppState>) -> Json<Value> {
    state.session.stop().await;
    Json(json!(state.session.state().await))
}

/// Failure report from the capture client. A denied permission prompt maps to
/// the standard message; anything else without a title is a device failure.
#[derive(Deserialize)]
struct ErrorReport {
    #[serde(default)]
    permission_denied: bool,
    title: Option<String>,
    #[serde(default)]
    message: String,
}

impl ErrorReport {
    fn into_capture_error(self) -> CaptureError {
        match (self.permission_denied, self.title) {
            (true, _) => CaptureError::permission_denied(),
            (false, Some(title)) => CaptureError::new(title, self.message),
            (false, None) => CaptureError::device(self.message),
        }
    }
}

async fn report_error(
    State(state): State<AppState>,
    Json(report): Json<ErrorReport>,
) -> Json<Value> {
    state.session.fail(report.into_capture_error()).await;
    Json(json!(state.session.state().await))
}

#[derive(Deserialize)]
struct FramePush {
    data_url: String,
}

async fn push_frame(
    State(state): State<AppState>,
    Json(body): Json<FramePush>,
) -> (StatusCode, Json<Value>) {
    let frame = match Frame::from_data_url(&body.data_url) {
        Ok(frame) => frame,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string() })),
            )
        }
    };

    if !state.session.push_frame(frame).await {
        debug!("Frame dropped, capture not running");
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "Screen capture is not running" })),
        );
    }
    (StatusCode::ACCEPTED, Json(json!({ "status": "accepted" })))
}
