use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::{BotLogKind, Config};
use engine::{AnalysisGate, Cadence, CaptureSession, GeminiClient, LatestFrame, Scheduler, SystemClock};
use paper::AutoTrader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("loading configuration")?;
    let schedule = cfg.schedule.clone();

    // ── Analyzer ──────────────────────────────────────────────────────────────
    let analyzer = GeminiClient::new(cfg.gemini_api_key.clone(), cfg.gemini_model.clone())
        .context("building Gemini client")?;
    info!(
        model = %analyzer.model(),
        interval_ms = schedule.interval_ms,
        port = cfg.dashboard_port,
        "PRISMA starting"
    );

    // ── Desk ──────────────────────────────────────────────────────────────────
    let trader = AutoTrader::new();
    let timeout = (schedule.analysis_timeout_ms > 0)
        .then(|| Duration::from_millis(schedule.analysis_timeout_ms));
    let gate = AnalysisGate::new(Arc::new(analyzer), trader.clone(), timeout);
    let scheduler = Scheduler::new(gate, Cadence::from_config(&schedule), Arc::new(SystemClock));
    let frames = Arc::new(LatestFrame::new(Duration::from_millis(schedule.frame_stale_ms)));
    let session = Arc::new(CaptureSession::new(Arc::new(scheduler), trader.clone(), frames));

    // ── Bot log forwarder ─────────────────────────────────────────────────────
    let mut log_rx = trader.subscribe();
    tokio::spawn(async move {
        loop {
            match log_rx.recv().await {
                Ok(entry) => match entry.kind {
                    BotLogKind::Error => error!(target: "bot", id = entry.id, "{}", entry.message),
                    BotLogKind::Signal => warn!(target: "bot", id = entry.id, "{}", entry.message),
                    BotLogKind::Info | BotLogKind::Success => {
                        info!(target: "bot", id = entry.id, "{}", entry.message)
                    }
                },
                Err(RecvError::Lagged(n)) => warn!(dropped = n, "Bot log forwarder lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    // ── Dashboard API ─────────────────────────────────────────────────────────
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Shutdown signal received");
    };
    api::serve(api::AppState::new(session.clone()), cfg.dashboard_port, shutdown)
        .await
        .context("running dashboard API")?;

    session.stop().await;
    info!("PRISMA stopped");
    Ok(())
}
