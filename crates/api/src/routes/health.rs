use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::AppState;

pub fn health_router() -> Router<AppState> {
    Router::new().route("/healthz", get(healthz))
}

/// Liveness probe with a one-line view of the desk.
async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let capture = state.session.state().await;
    let bot = state.session.trader().status().await;
    Json(json!({
        "status": "ok",
        "bot": bot,
        "capturing": capture.is_capturing,
        "interval_ms": capture.interval_ms,
    }))
}
