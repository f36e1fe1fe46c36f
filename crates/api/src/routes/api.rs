use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use common::INTERVAL_PRESETS_MS;

use crate::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/analysis", get(get_analysis))
        .route("/api/history", get(get_history))
        .route("/api/bot", get(get_bot))
        .route("/api/config", get(get_config).post(post_config))
}

// ─── Analysis ─────────────────────────────────────────────────────────────────

async fn get_analysis(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.session.gate().snapshot().await))
}

async fn get_history(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.session.gate().history().await))
}

// ─── Auto-trader ──────────────────────────────────────────────────────────────

async fn get_bot(State(state): State<AppState>) -> Json<Value> {
    let trader = state.session.trader();
    Json(json!({
        "status": trader.status().await,
        "logs": trader.logs().await,
    }))
}

// ─── Config ───────────────────────────────────────────────────────────────────

async fn get_config(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "interval_ms": state.session.scheduler().interval_ms().await,
        "presets": INTERVAL_PRESETS_MS,
    }))
}

#[derive(Deserialize)]
struct ConfigUpdate {
    interval_ms: u64,
}

async fn post_config(
    State(state): State<AppState>,
    Json(body): Json<ConfigUpdate>,
) -> (StatusCode, Json<Value>) {
    match state.session.set_interval(body.interval_ms).await {
        Ok(restarted) => {
            info!(interval_ms = body.interval_ms, restarted, "Analysis interval updated");
            (
                StatusCode::OK,
                Json(json!({
                    "interval_ms": body.interval_ms,
                    "presets": INTERVAL_PRESETS_MS,
                    "restarted": restarted,
                })),
            )
        }
        Err(e) => {
            warn!(error = %e, "Rejected interval update");
            (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })))
        }
    }
}
