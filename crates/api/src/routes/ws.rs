use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use common::BotLog;

use crate::AppState;

pub fn ws_router() -> Router<AppState> {
    Router::new().route("/ws/logs", get(ws_logs_handler))
}

/// Streams the auto-trader activity log: current entries first, then live ones,
/// each as a JSON text frame.
async fn ws_logs_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    // Subscribe before the snapshot so nothing logged in between is lost.
    let log_rx = state.session.trader().subscribe();
    let history = state.session.trader().logs().await;
    ws.on_upgrade(move |socket| handle_ws(socket, log_rx, history))
}

async fn send_log(socket: &mut WebSocket, entry: &BotLog) -> bool {
    let text = match serde_json::to_string(entry) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Failed to encode bot log");
            return true;
        }
    };
    socket.send(Message::Text(text)).await.is_ok()
}

async fn handle_ws(
    mut socket: WebSocket,
    mut log_rx: broadcast::Receiver<BotLog>,
    history: Vec<BotLog>,
) {
    let mut last_id = 0;
    for entry in &history {
        if !send_log(&mut socket, entry).await {
            return;
        }
        last_id = entry.id;
    }

    loop {
        match log_rx.recv().await {
            // Already sent as part of the snapshot.
            Ok(entry) if entry.id <= last_id => continue,
            Ok(entry) => {
                if !send_log(&mut socket, &entry).await {
                    break;
                }
                last_id = entry.id;
            }
            Err(RecvError::Lagged(n)) => {
                warn!(dropped = n, "WebSocket log client lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
    debug!("WebSocket log client disconnected");
}
