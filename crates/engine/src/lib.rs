pub mod capture;
pub mod gate;
pub mod gemini;
pub mod history;
pub mod lifecycle;
pub mod schedule;

#[cfg(test)]
mod testing;

pub use capture::{CaptureSession, CaptureState, LatestFrame};
pub use gate::{AnalysisGate, AttemptOutcome, DeskSnapshot};
pub use gemini::GeminiClient;
pub use history::SignalHistory;
pub use lifecycle::Scheduler;
pub use schedule::{delay_until_next, Cadence, Clock, SystemClock, LEAD_MS, MIN_DELAY_MS};
