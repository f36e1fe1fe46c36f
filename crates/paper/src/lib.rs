pub mod log;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use common::{
    Analysis, BotLog, BotLogKind, BotStatus, MonotonicIds, SimulatedOrder, MAX_BOT_LOGS,
};

pub use log::BotLogBuffer;

/// Delay of both the simulated connection handshake and the simulated order fill.
pub const SIMULATION_DELAY: Duration = Duration::from_millis(1_500);

/// Simulated auto-trader.
///
/// Tracks a fictitious connection lifecycle and, while connected, echoes every
/// tradeable signal as a simulated order in its activity log. No order ever
/// leaves the process.
#[derive(Clone)]
pub struct AutoTrader {
    inner: Arc<Inner>,
}

struct Inner {
    status: RwLock<BotStatus>,
    logs: RwLock<BotLogBuffer>,
    ids: MonotonicIds,
    log_tx: broadcast::Sender<BotLog>,
    /// Deferred handshake and fill confirmations, aborted on disconnect.
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl Inner {
    /// Append an entry and broadcast it. Both happen under the log lock, so
    /// subscribers see entries in id order.
    async fn log(&self, kind: BotLogKind, message: impl Into<String>) {
        let mut logs = self.logs.write().await;
        let timestamp = Utc::now();
        let entry = BotLog {
            id: self.ids.next(timestamp.timestamp_millis().max(0) as u64),
            timestamp,
            message: message.into(),
            kind,
        };
        logs.push(entry.clone());
        debug!(kind = ?entry.kind, message = %entry.message, "Bot log");
        // Ignore send errors (no active subscribers)
        let _ = self.log_tx.send(entry);
    }

    /// Switch to `status` and cancel every deferred task.
    ///
    /// The status changes under the `pending` lock, so a signal handled
    /// concurrently either sees the new status or has already registered its
    /// fill confirmation, which is then aborted here.
    async fn halt(&self, status: BotStatus) -> usize {
        let handles: Vec<JoinHandle<()>> = {
            let mut pending = self.pending.lock().await;
            *self.status.write().await = status;
            pending.drain(..).collect()
        };

        let mut cancelled = 0;
        for handle in handles {
            if !handle.is_finished() {
                cancelled += 1;
            }
            handle.abort();
            let _ = handle.await;
        }
        cancelled
    }
}

fn track<F>(pending: &mut Vec<JoinHandle<()>>, task: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    pending.retain(|h| !h.is_finished());
    pending.push(tokio::spawn(task));
}

impl Default for AutoTrader {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoTrader {
    pub fn new() -> Self {
        Self::with_capacity(MAX_BOT_LOGS)
    }

    pub fn with_capacity(log_cap: usize) -> Self {
        let (log_tx, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Inner {
                status: RwLock::new(BotStatus::Disconnected),
                logs: RwLock::new(BotLogBuffer::new(log_cap)),
                ids: MonotonicIds::new(),
                log_tx,
                pending: Mutex::new(Vec::new()),
            }),
        }
    }

    pub async fn status(&self) -> BotStatus {
        *self.inner.status.read().await
    }

    /// Activity log, oldest first.
    pub async fn logs(&self) -> Vec<BotLog> {
        self.inner.logs.read().await.snapshot()
    }

    /// Subscribe to every log entry appended from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<BotLog> {
        self.inner.log_tx.subscribe()
    }

    /// Begin the simulated handshake. Settles to CONNECTED after `SIMULATION_DELAY`.
    pub async fn connect(&self) {
        {
            let mut status = self.inner.status.write().await;
            if matches!(*status, BotStatus::Connecting | BotStatus::Connected) {
                debug!(status = %*status, "Auto-trader already connecting");
                return;
            }
            *status = BotStatus::Connecting;
        }
        info!("Auto-trader connecting");
        self.inner
            .log(BotLogKind::Info, "Starting simulated connection...")
            .await;

        let inner = self.inner.clone();
        let mut pending = self.inner.pending.lock().await;
        track(&mut pending, async move {
            tokio::time::sleep(SIMULATION_DELAY).await;
            {
                let mut status = inner.status.write().await;
                if *status != BotStatus::Connecting {
                    return;
                }
                *status = BotStatus::Connected;
            }
            info!("Auto-trader connected");
            inner
                .log(BotLogKind::Success, "Connection established! Auto-trader active.")
                .await;
            inner
                .log(BotLogKind::Info, "Waiting for analysis signals...")
                .await;
        });
    }

    /// Drop the simulated connection. Pending handshakes and fill
    /// confirmations are cancelled.
    pub async fn disconnect(&self) {
        let cancelled = self.inner.halt(BotStatus::Disconnected).await;
        info!(cancelled, "Auto-trader disconnected");
        self.inner
            .log(
                BotLogKind::Info,
                "Auto-trader deactivated. Screen capture stopped.",
            )
            .await;
    }

    /// Enter the ERROR state, e.g. when screen capture could not be started.
    pub async fn fail(&self, reason: &str) {
        let cancelled = self.inner.halt(BotStatus::Error).await;
        warn!(reason, cancelled, "Auto-trader entered error state");
        self.inner
            .log(BotLogKind::Error, format!("Auto-trader unavailable: {reason}"))
            .await;
    }

    /// Echo a completed analysis as a simulated order.
    ///
    /// Only CONNECTED traders react, and only to CALL/PUT. The fill
    /// confirmation is logged `SIMULATION_DELAY` later without blocking the caller.
    pub async fn on_signal(&self, analysis: &Analysis) {
        // Held until the fill is tracked; see `Inner::halt`.
        let mut pending = self.inner.pending.lock().await;
        if self.status().await != BotStatus::Connected {
            return;
        }
        let Some(order) = SimulatedOrder::from_analysis(analysis) else {
            return;
        };

        let price = order
            .price
            .map(|p| format!("{p:.5}"))
            .unwrap_or_else(|| "market".to_string());
        self.inner
            .log(
                BotLogKind::Signal,
                format!(
                    "Signal received: {} for {} @ {} (confidence {}/10)",
                    order.side, order.asset, price, order.confidence
                ),
            )
            .await;
        self.inner
            .log(
                BotLogKind::Info,
                format!("Sending simulated {} order...", order.side),
            )
            .await;
        info!(order_id = %order.id, asset = %order.asset, side = %order.side, "Simulated order sent");

        let inner = self.inner.clone();
        track(&mut pending, async move {
            tokio::time::sleep(SIMULATION_DELAY).await;
            inner
                .log(
                    BotLogKind::Success,
                    format!(
                        "Simulated {} order {} executed successfully!",
                        order.side, order.id
                    ),
                )
                .await;
        });
    }
}
