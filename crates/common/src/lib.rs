pub mod config;
pub mod error;
pub mod ids;
pub mod types;
pub mod vision;

pub use config::{Config, ScheduleConfig, INTERVAL_PRESETS_MS, MAX_BOT_LOGS, MAX_HISTORY};
pub use error::{Error, Result};
pub use ids::MonotonicIds;
pub use types::*;
pub use vision::{Analyzer, Frame, FrameSource};
