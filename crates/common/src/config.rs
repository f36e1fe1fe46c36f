use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Interval choices offered by the dashboard (1, 5 and 15 minutes).
/// The scheduler itself accepts any positive interval.
pub const INTERVAL_PRESETS_MS: [u64; 3] = [60_000, 300_000, 900_000];

/// Signal history keeps this many tradeable analyses, newest first.
pub const MAX_HISTORY: usize = 10;

/// Bot activity log keeps this many entries.
pub const MAX_BOT_LOGS: usize = 100;

/// All configuration loaded from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // Vision model
    pub gemini_api_key: String,
    pub gemini_model: String,

    // Dashboard
    pub dashboard_port: u16,

    // Analysis loop
    pub schedule: ScheduleConfig,
}

/// Timing of the capture/analysis loop.
///
/// Example `config/schedule.toml`:
/// ```toml
/// interval_ms = 300000
/// analysis_timeout_ms = 45000
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Length of one analysis cycle; fires align to multiples of it.
    pub interval_ms: u64,
    /// How long before each boundary an attempt fires.
    pub lead_ms: u64,
    /// Shorter delays are pushed to the following cycle.
    pub min_delay_ms: u64,
    /// Upper bound on one analyzer call. `0` disables the bound.
    pub analysis_timeout_ms: u64,
    /// A pushed frame older than this reads as "no frame".
    pub frame_stale_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_ms: INTERVAL_PRESETS_MS[0],
            lead_ms: 2_000,
            min_delay_ms: 500,
            analysis_timeout_ms: 45_000,
            frame_stale_ms: 10_000,
        }
    }
}

impl ScheduleConfig {
    /// Load from a TOML file; missing keys keep their defaults.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read schedule config at '{path}': {e}")))?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("failed to parse schedule config at '{path}': {e}")))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()
    }

    pub fn validate(self) -> Result<Self> {
        if self.interval_ms == 0 {
            return Err(Error::Config("interval_ms must be positive".into()));
        }
        if self.min_delay_ms == 0 {
            return Err(Error::Config("min_delay_ms must be positive".into()));
        }
        Ok(self)
    }
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let gemini_api_key = optional_env("GEMINI_API_KEY")
            .or_else(|| optional_env("API_KEY"))
            .ok_or_else(|| {
                Error::Config(
                    "GEMINI_API_KEY (or API_KEY) is not set. Check your .env file.".into(),
                )
            })?;

        let mut schedule = match optional_env("SCHEDULE_CONFIG_PATH") {
            Some(path) => ScheduleConfig::load(&path)?,
            None => ScheduleConfig::default(),
        };
        if let Some(v) = optional_env("ANALYSIS_INTERVAL_MS") {
            schedule.interval_ms = parse_env("ANALYSIS_INTERVAL_MS", &v)?;
        }

        Ok(Config {
            gemini_api_key,
            gemini_model: optional_env("GEMINI_MODEL")
                .unwrap_or_else(|| "gemini-2.5-flash".to_string()),
            dashboard_port: match optional_env("DASHBOARD_PORT") {
                Some(v) => parse_env("DASHBOARD_PORT", &v)?,
                None => 8080,
            },
            schedule: schedule.validate()?,
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key} is not a valid number: '{value}'")))
}
