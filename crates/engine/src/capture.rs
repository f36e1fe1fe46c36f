use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use common::{CaptureError, Frame, FrameSource, Result};
use paper::AutoTrader;

use crate::gate::AnalysisGate;
use crate::lifecycle::Scheduler;

/// Holds the most recent frame pushed by the capture client.
///
/// Frames older than `stale_after` read as unavailable, so a client that
/// silently stops pushing does not get the same picture analysed forever.
pub struct LatestFrame {
    slot: StdRwLock<Option<(Frame, Instant)>>,
    stale_after: Duration,
}

impl LatestFrame {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            slot: StdRwLock::new(None),
            stale_after,
        }
    }

    pub fn store(&self, frame: Frame) {
        let mut slot = self.slot.write().unwrap_or_else(|p| p.into_inner());
        *slot = Some((frame, Instant::now()));
    }

    pub fn clear(&self) {
        let mut slot = self.slot.write().unwrap_or_else(|p| p.into_inner());
        *slot = None;
    }
}

impl FrameSource for LatestFrame {
    fn frame(&self) -> Option<Frame> {
        let slot = self.slot.read().unwrap_or_else(|p| p.into_inner());
        let (frame, stored_at) = slot.as_ref()?;
        (stored_at.elapsed() <= self.stale_after).then(|| frame.clone())
    }
}

/// Capture status reported to the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CaptureState {
    pub is_capturing: bool,
    pub error: Option<CaptureError>,
    pub interval_ms: u64,
}

#[derive(Debug, Default)]
struct SessionState {
    is_capturing: bool,
    error: Option<CaptureError>,
}

/// Screen-capture lifecycle: ties the capture client's start/stop events to
/// the auto-trader connection and the analysis loop.
pub struct CaptureSession {
    scheduler: Arc<Scheduler>,
    trader: AutoTrader,
    frames: Arc<LatestFrame>,
    state: RwLock<SessionState>,
}

impl CaptureSession {
    pub fn new(scheduler: Arc<Scheduler>, trader: AutoTrader, frames: Arc<LatestFrame>) -> Self {
        Self {
            scheduler,
            trader,
            frames,
            state: RwLock::new(SessionState::default()),
        }
    }

    /// Capture has started: connect the auto-trader and arm the loop.
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if state.is_capturing {
            debug!("Screen capture already running");
            return Ok(());
        }
        state.error = None;

        let interval_ms = self.scheduler.interval_ms().await;
        self.trader.connect().await;
        self.scheduler
            .start(self.frames.clone() as Arc<dyn FrameSource>, interval_ms)
            .await?;
        state.is_capturing = true;
        info!(interval_ms, "Screen capture started");
        Ok(())
    }

    /// Capture has ended, by request or because the stream went away.
    pub async fn stop(&self) {
        let mut state = self.state.write().await;
        state.error = None;
        if !state.is_capturing {
            debug!("Screen capture already stopped");
            return;
        }
        state.is_capturing = false;

        self.frames.clear();
        self.scheduler.stop().await;
        self.trader.disconnect().await;
        info!("Screen capture stopped");
    }

    /// Capture could not be started (or broke). The error stays visible until
    /// the next start or stop.
    pub async fn fail(&self, error: CaptureError) {
        self.stop().await;
        warn!(title = %error.title, message = %error.message, "Screen capture failed");
        self.trader.fail(&error.title).await;
        self.state.write().await.error = Some(error);
    }

    /// Accept a frame from the capture client. Ignored unless capturing.
    pub async fn push_frame(&self, frame: Frame) -> bool {
        if !self.state.read().await.is_capturing {
            return false;
        }
        self.frames.store(frame);
        true
    }

    /// Change the analysis interval; a running loop restarts from now.
    pub async fn set_interval(&self, interval_ms: u64) -> Result<bool> {
        self.scheduler.reconfigure(interval_ms).await
    }

    pub async fn state(&self) -> CaptureState {
        let state = self.state.read().await;
        CaptureState {
            is_capturing: state.is_capturing,
            error: state.error.clone(),
            interval_ms: self.scheduler.interval_ms().await,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn gate(&self) -> &AnalysisGate {
        self.scheduler.gate()
    }

    pub fn trader(&self) -> &AutoTrader {
        &self.trader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Cadence;
    use crate::testing::{frame, PausedClock, StubAnalyzer};
    use common::{BotStatus, TradeSignal};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn session(analyzer: Arc<StubAnalyzer>, now_ms: u64) -> CaptureSession {
        let trader = AutoTrader::new();
        let gate = AnalysisGate::new(analyzer, trader.clone(), None);
        let scheduler = Scheduler::new(
            gate,
            Cadence::new(60_000),
            Arc::new(PausedClock::starting_at(now_ms)),
        );
        CaptureSession::new(
            Arc::new(scheduler),
            trader,
            Arc::new(LatestFrame::new(ms(10_000))),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn latest_frame_goes_stale() {
        let frames = LatestFrame::new(ms(10_000));
        assert!(frames.frame().is_none());

        frames.store(frame());
        assert_eq!(frames.frame(), Some(frame()));

        tokio::time::sleep(ms(10_001)).await;
        assert!(frames.frame().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn start_connects_and_arms() {
        let session = session(Arc::new(StubAnalyzer::new(TradeSignal::Call)), 0);
        session.start().await.unwrap();

        let state = session.state().await;
        assert!(state.is_capturing);
        assert_eq!(state.interval_ms, 60_000);
        assert!(session.scheduler().is_armed().await);
        assert_eq!(session.trader().status().await, BotStatus::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn frames_are_refused_while_idle() {
        let session = session(Arc::new(StubAnalyzer::new(TradeSignal::Call)), 0);
        assert!(!session.push_frame(frame()).await);

        session.start().await.unwrap();
        assert!(session.push_frame(frame()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn pushed_frame_is_analysed_at_fire_time() {
        let analyzer = Arc::new(StubAnalyzer::new(TradeSignal::Put));
        let session = session(analyzer.clone(), 10_000);
        session.start().await.unwrap();

        // Fire is at +48s; a frame pushed at +40s is still fresh.
        tokio::time::sleep(ms(40_000)).await;
        session.push_frame(frame()).await;
        tokio::time::sleep(ms(8_001)).await;

        assert_eq!(analyzer.calls(), 1);
        assert_eq!(session.gate().history().await.len(), 1);
        // Connected by then, so the order echo was logged.
        assert_eq!(session.trader().status().await, BotStatus::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_frame_is_not_analysed() {
        let analyzer = Arc::new(StubAnalyzer::new(TradeSignal::Put));
        let session = session(analyzer.clone(), 10_000);
        session.start().await.unwrap();
        session.push_frame(frame()).await;

        tokio::time::sleep(ms(48_001)).await;
        assert_eq!(analyzer.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_disarms_and_disconnects() {
        let session = session(Arc::new(StubAnalyzer::new(TradeSignal::Call)), 0);
        session.start().await.unwrap();
        session.push_frame(frame()).await;
        session.stop().await;

        assert!(!session.state().await.is_capturing);
        assert!(!session.scheduler().is_armed().await);
        assert_eq!(session.trader().status().await, BotStatus::Disconnected);
        assert!(!session.push_frame(frame()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_reported_until_next_start() {
        let session = session(Arc::new(StubAnalyzer::new(TradeSignal::Call)), 0);
        session.fail(CaptureError::permission_denied()).await;

        let state = session.state().await;
        assert!(!state.is_capturing);
        assert_eq!(
            state.error.map(|e| e.title),
            Some("Screen permission denied".to_string())
        );
        assert_eq!(session.trader().status().await, BotStatus::Error);
        assert!(!session.scheduler().is_armed().await);

        session.start().await.unwrap();
        assert!(session.state().await.error.is_none());
        assert_eq!(session.trader().status().await, BotStatus::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_change_restarts_running_loop() {
        let session = session(Arc::new(StubAnalyzer::new(TradeSignal::Call)), 0);
        assert!(!session.set_interval(300_000).await.unwrap());

        session.start().await.unwrap();
        assert_eq!(session.scheduler().next_fire_ms().await, Some(298_000));
        assert!(session.set_interval(900_000).await.unwrap());
        assert_eq!(session.scheduler().next_fire_ms().await, Some(898_000));
    }
}
