use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use common::{Error, FrameSource, Result};

use crate::gate::AnalysisGate;
use crate::schedule::{Cadence, Clock};

/// The capture/analysis loop.
///
/// Owns the single pending timer. Every fire pulls a frame, runs it through
/// the gate, then recomputes the next delay from the current wall clock, so
/// skipped or slow cycles never shift later ones off their boundaries.
pub struct Scheduler {
    gate: AnalysisGate,
    clock: Arc<dyn Clock>,
    state: Mutex<LoopState>,
    /// Wall-clock millisecond at which the armed timer fires.
    next_fire_ms: Arc<RwLock<Option<u64>>>,
}

struct LoopState {
    cadence: Cadence,
    task: Option<JoinHandle<()>>,
    source: Option<Arc<dyn FrameSource>>,
}

impl Scheduler {
    pub fn new(gate: AnalysisGate, cadence: Cadence, clock: Arc<dyn Clock>) -> Self {
        Self {
            gate,
            clock,
            state: Mutex::new(LoopState {
                cadence,
                task: None,
                source: None,
            }),
            next_fire_ms: Arc::new(RwLock::new(None)),
        }
    }

    /// Arm the loop on `source`. Any running loop is stopped first.
    pub async fn start(&self, source: Arc<dyn FrameSource>, interval_ms: u64) -> Result<()> {
        check_interval(interval_ms)?;
        let mut state = self.state.lock().await;
        self.halt(&mut state).await;
        state.cadence = state.cadence.with_interval(interval_ms);
        self.arm(&mut state, source).await;
        Ok(())
    }

    /// Cancel the pending fire and clear the analysis panel. An analyzer call
    /// already in flight is abandoned, not cancelled.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        if self.halt(&mut state).await {
            info!("Analysis loop stopped");
        }
        state.source = None;
    }

    /// Change the interval. A running loop is restarted from now on the same
    /// frame source; returns whether that happened.
    pub async fn reconfigure(&self, interval_ms: u64) -> Result<bool> {
        check_interval(interval_ms)?;
        let mut state = self.state.lock().await;
        state.cadence = state.cadence.with_interval(interval_ms);

        let Some(source) = state.source.clone() else {
            info!(interval_ms, "Analysis interval updated (loop idle)");
            return Ok(false);
        };
        self.halt(&mut state).await;
        self.arm(&mut state, source).await;
        info!(interval_ms, "Analysis loop reconfigured");
        Ok(true)
    }

    pub async fn interval_ms(&self) -> u64 {
        self.state.lock().await.cadence.interval_ms
    }

    pub async fn is_armed(&self) -> bool {
        self.state.lock().await.task.is_some()
    }

    pub async fn next_fire_ms(&self) -> Option<u64> {
        *self.next_fire_ms.read().await
    }

    pub fn gate(&self) -> &AnalysisGate {
        &self.gate
    }

    async fn arm(&self, state: &mut LoopState, source: Arc<dyn FrameSource>) {
        let cadence = state.cadence;
        let now = self.clock.now_ms();
        let delay = cadence.delay_from(now);
        *self.next_fire_ms.write().await = Some(now + delay.as_millis() as u64);
        info!(
            interval_ms = cadence.interval_ms,
            delay_ms = delay.as_millis() as u64,
            "Analysis loop armed"
        );

        let cycle = Cycle {
            gate: self.gate.clone(),
            source: source.clone(),
            clock: self.clock.clone(),
            cadence,
            next_fire_ms: self.next_fire_ms.clone(),
        };
        state.task = Some(tokio::spawn(cycle.run(delay)));
        state.source = Some(source);
    }

    /// Abort the armed task and wait until it has really ended, then reset
    /// the gate. Returns whether a task was armed.
    async fn halt(&self, state: &mut LoopState) -> bool {
        let was_armed = match state.task.take() {
            Some(task) => {
                task.abort();
                let _ = task.await;
                true
            }
            None => false,
        };
        *self.next_fire_ms.write().await = None;
        self.gate.reset().await;
        was_armed
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(task) = self.state.get_mut().task.take() {
            task.abort();
        }
    }
}

fn check_interval(interval_ms: u64) -> Result<()> {
    if interval_ms == 0 {
        return Err(Error::Config("analysis interval must be positive".into()));
    }
    Ok(())
}

/// Everything the armed task needs, moved into it.
struct Cycle {
    gate: AnalysisGate,
    source: Arc<dyn FrameSource>,
    clock: Arc<dyn Clock>,
    cadence: Cadence,
    next_fire_ms: Arc<RwLock<Option<u64>>>,
}

impl Cycle {
    async fn run(self, first_delay: Duration) {
        let mut delay = first_delay;
        loop {
            tokio::time::sleep(delay).await;
            self.fire().await;

            let now = self.clock.now_ms();
            delay = self.cadence.delay_from(now);
            *self.next_fire_ms.write().await = Some(now + delay.as_millis() as u64);
            debug!(delay_ms = delay.as_millis() as u64, "Analysis loop re-armed");
        }
    }

    async fn fire(&self) {
        self.gate.clear_analysis().await;
        match self.source.frame() {
            Some(frame) => {
                let outcome = self.gate.attempt(frame).await;
                debug!(?outcome, "Analysis cycle finished");
            }
            None => debug!("No frame available, skipping cycle"),
        }
    }
}
