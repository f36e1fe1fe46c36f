use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use common::{Analysis, Analyzer, Error, Frame, MonotonicIds, Result, SignalLog, TradeSignal};
use paper::AutoTrader;

use crate::history::SignalHistory;

/// What happened to one call of [`AnalysisGate::attempt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Another analysis was in flight; nothing was done.
    Busy,
    Completed(TradeSignal),
    Failed,
    /// Finished after the loop was stopped; the result was discarded.
    Stale,
}

/// What the dashboard shows in its analysis panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeskSnapshot {
    pub analysis: Option<Analysis>,
    pub error: Option<String>,
    pub is_loading: bool,
}

#[derive(Debug, Default)]
struct DeskState {
    /// Bumped by `reset`; completions from an older generation are dropped.
    generation: u64,
    in_flight: bool,
    analysis: Option<Analysis>,
    error: Option<String>,
}

/// Single-flight guard in front of the analyzer.
///
/// At most one analysis runs at a time. The analyzer call runs in its own
/// task, so a caller that goes away abandons the call without cancelling it.
#[derive(Clone)]
pub struct AnalysisGate {
    inner: Arc<GateInner>,
}

struct GateInner {
    analyzer: Arc<dyn Analyzer>,
    trader: AutoTrader,
    timeout: Option<Duration>,
    state: RwLock<DeskState>,
    history: RwLock<SignalHistory>,
    ids: MonotonicIds,
}

impl AnalysisGate {
    /// `timeout` bounds every analyzer call; `None` waits indefinitely.
    pub fn new(analyzer: Arc<dyn Analyzer>, trader: AutoTrader, timeout: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(GateInner {
                analyzer,
                trader,
                timeout,
                state: RwLock::new(DeskState::default()),
                history: RwLock::new(SignalHistory::default()),
                ids: MonotonicIds::new(),
            }),
        }
    }

    /// Run one analysis of `frame` unless another one is still in flight.
    pub async fn attempt(&self, frame: Frame) -> AttemptOutcome {
        let generation = {
            let mut state = self.inner.state.write().await;
            if state.in_flight {
                debug!("Analysis already in flight, skipping attempt");
                return AttemptOutcome::Busy;
            }
            state.in_flight = true;
            state.error = None;
            state.generation
        };

        let inner = self.inner.clone();
        let task = tokio::spawn(async move {
            let result = inner.run_analyzer(&frame).await;
            inner.complete(generation, result).await
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Analysis task ended abnormally");
                self.inner
                    .complete(generation, Err(Error::Other(e.to_string())))
                    .await
            }
        }
    }

    /// Empty the current-analysis slot, leaving error and history alone.
    pub async fn clear_analysis(&self) {
        self.inner.state.write().await.analysis = None;
    }

    /// Forget the in-flight analysis and clear the panel. A call still running
    /// keeps running, but its result will be discarded.
    pub async fn reset(&self) {
        let mut state = self.inner.state.write().await;
        if state.in_flight {
            info!("Abandoning in-flight analysis");
        }
        state.generation += 1;
        state.in_flight = false;
        state.analysis = None;
        state.error = None;
    }

    pub async fn is_busy(&self) -> bool {
        self.inner.state.read().await.in_flight
    }

    pub async fn snapshot(&self) -> DeskSnapshot {
        let state = self.inner.state.read().await;
        DeskSnapshot {
            analysis: state.analysis.clone(),
            error: state.error.clone(),
            is_loading: state.in_flight,
        }
    }

    /// Signal history, newest first.
    pub async fn history(&self) -> Vec<SignalLog> {
        self.inner.history.read().await.entries()
    }
}

impl GateInner {
    async fn run_analyzer(&self, frame: &Frame) -> Result<Analysis> {
        let started = tokio::time::Instant::now();
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.analyzer.analyze(frame))
                .await
                .unwrap_or_else(|_| Err(Error::Timeout(limit))),
            None => self.analyzer.analyze(frame).await,
        };
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Analyzer returned"
        );
        result
    }

    async fn complete(&self, generation: u64, result: Result<Analysis>) -> AttemptOutcome {
        let analysis = {
            let mut state = self.state.write().await;
            if state.generation != generation {
                debug!(
                    generation,
                    current = state.generation,
                    "Discarding analysis from a stopped loop"
                );
                return AttemptOutcome::Stale;
            }
            state.in_flight = false;

            match result {
                Ok(analysis) => {
                    info!(
                        asset = %analysis.asset,
                        signal = %analysis.signal,
                        confidence = analysis.confidence,
                        "Analysis completed"
                    );
                    state.analysis = Some(analysis.clone());
                    state.error = None;
                    if analysis.signal.is_tradeable() {
                        let timestamp = Utc::now();
                        let id = self.ids.next(timestamp.timestamp_millis().max(0) as u64);
                        self.history
                            .write()
                            .await
                            .record(analysis.clone(), id, timestamp);
                    }
                    analysis
                }
                Err(e) => {
                    warn!(error = %e, "Analysis failed");
                    state.analysis = None;
                    state.error = Some(format!("AI analysis failed. {e}"));
                    return AttemptOutcome::Failed;
                }
            }
        };

        // Bot logging happens outside the desk lock.
        self.trader.on_signal(&analysis).await;
        AttemptOutcome::Completed(analysis.signal)
    }
}
