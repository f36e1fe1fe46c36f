use std::time::Duration;

use chrono::Utc;

use common::ScheduleConfig;

/// Attempts fire this long before each interval boundary.
pub const LEAD_MS: u64 = 2_000;

/// Delays shorter than this are pushed to the following cycle.
pub const MIN_DELAY_MS: u64 = 500;

/// Source of wall-clock time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Wall-clock aligned firing pattern of the analysis loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub interval_ms: u64,
    pub lead_ms: u64,
    pub min_delay_ms: u64,
}

impl Cadence {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            lead_ms: LEAD_MS,
            min_delay_ms: MIN_DELAY_MS,
        }
    }

    pub fn from_config(cfg: &ScheduleConfig) -> Self {
        Self {
            interval_ms: cfg.interval_ms,
            lead_ms: cfg.lead_ms,
            min_delay_ms: cfg.min_delay_ms,
        }
    }

    pub fn with_interval(self, interval_ms: u64) -> Self {
        Self {
            interval_ms,
            ..self
        }
    }

    /// Delay from `now_ms` until `lead_ms` before the next interval boundary,
    /// never shorter than `min_delay_ms`.
    pub fn delay_from(&self, now_ms: u64) -> Duration {
        Duration::from_millis(delay_until_next(
            now_ms,
            self.interval_ms,
            self.lead_ms,
            self.min_delay_ms,
        ))
    }
}

/// `interval - (now mod interval) - lead`, pushed forward by whole intervals
/// until it reaches `min_delay`. `interval_ms` must be positive.
pub fn delay_until_next(now_ms: u64, interval_ms: u64, lead_ms: u64, min_delay_ms: u64) -> u64 {
    debug_assert!(interval_ms > 0, "interval must be positive");
    let interval = interval_ms.max(1) as i128;
    let mut delay = interval - (now_ms as i128 % interval) - lead_ms as i128;
    while delay < min_delay_ms as i128 {
        delay += interval;
    }
    delay as u64
}
