//! Deterministic doubles shared by the engine's unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use common::{
    Analysis, Analyzer, Error, FractalBreakout, Frame, FrameSource, HeikinAshi, Indicators,
    Result, TradeSignal,
};

use crate::schedule::Clock;

pub(crate) fn analysis(signal: TradeSignal) -> Analysis {
    Analysis {
        asset: "EUR/USD".into(),
        price: 1.2345,
        signal,
        confidence: 8.0,
        reasoning: "WMA 8 above WMA 20, MACD rising, ADX 31".into(),
        indicators: Indicators {
            rsi: 61.0,
            macd: 0.0004,
            adx: 31.0,
            wma8: 1.2341,
            wma20: 1.2333,
            heikin_ashi: HeikinAshi::StrongBullish,
            fractal_breakout: FractalBreakout::Up,
            candlestick_pattern: "Bullish engulfing".into(),
            price_action_context: "Trend continuation".into(),
        },
    }
}

pub(crate) fn frame() -> Frame {
    Frame::new("image/jpeg", "/9j/4AAQSkZJRg==")
}

/// Returns `signal` for every call after `latency`; the n-th call reports
/// asset `ASSET<n>`.
pub(crate) struct StubAnalyzer {
    calls: AtomicUsize,
    signal: TradeSignal,
    latency: Duration,
    fail: bool,
}

impl StubAnalyzer {
    pub(crate) fn new(signal: TradeSignal) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            signal,
            latency: Duration::ZERO,
            fail: false,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(TradeSignal::Wait)
        }
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Analyzer for StubAnalyzer {
    async fn analyze(&self, _frame: &Frame) -> Result<Analysis> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail {
            return Err(Error::Analyzer("upstream unavailable".into()));
        }
        let mut result = analysis(self.signal);
        result.asset = format!("ASSET{n}");
        Ok(result)
    }
}

pub(crate) struct StaticFrames(pub(crate) Option<Frame>);

impl FrameSource for StaticFrames {
    fn frame(&self) -> Option<Frame> {
        self.0.clone()
    }
}

/// Wall clock that follows tokio's (pausable) clock from a fixed epoch offset.
pub(crate) struct PausedClock {
    base_ms: u64,
    origin: tokio::time::Instant,
}

impl PausedClock {
    pub(crate) fn starting_at(base_ms: u64) -> Self {
        Self {
            base_ms,
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Clock for PausedClock {
    fn now_ms(&self) -> u64 {
        self.base_ms + self.origin.elapsed().as_millis() as u64
    }
}
