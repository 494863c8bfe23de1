use std::path::PathBuf;
use std::str::FromStr;

use chrono::Duration;

use crate::error::CareError;
use crate::models::enums::{SnoozePolicy, TransitionPolicy};
use crate::refill::RefillBounds;

/// Application-level constants
pub const APP_NAME: &str = "Carepath";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Messaging-platform freeform window after the last inbound message.
pub const FREEFORM_WINDOW_HOURS: i64 = 24;

pub const DEFAULT_MISSED_THRESHOLD: u32 = 2;
pub const DEFAULT_REMINDER_INTERVAL_SECS: u64 = 15 * 60;

const ENV_MISSED_THRESHOLD: &str = "CAREPATH_MISSED_THRESHOLD";
const ENV_SNOOZE_POLICY: &str = "CAREPATH_SNOOZE_POLICY";
const ENV_TRANSITION_POLICY: &str = "CAREPATH_TRANSITION_POLICY";
const ENV_REMINDER_INTERVAL: &str = "CAREPATH_REMINDER_INTERVAL_SECS";
const ENV_DB_PATH: &str = "CAREPATH_DB_PATH";

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> &'static str {
    "carepath=info,warn"
}

/// Per-user data directory, if the platform has one.
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("carepath"))
}

/// Default SQLite location under the data directory.
pub fn default_database_path() -> Option<PathBuf> {
    default_data_dir().map(|d| d.join("carepath.db"))
}

/// Construction-time configuration for the care core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CareConfig {
    /// Consecutive misses that open an alert. Must be at least 1.
    pub missed_threshold: u32,
    pub freeform_window: Duration,
    pub refill_bounds: RefillBounds,
    pub snooze_policy: SnoozePolicy,
    pub transition_policy: TransitionPolicy,
    pub reminder_interval_secs: u64,
    /// None keeps everything in memory.
    pub database_path: Option<PathBuf>,
}

impl Default for CareConfig {
    fn default() -> Self {
        Self {
            missed_threshold: DEFAULT_MISSED_THRESHOLD,
            freeform_window: Duration::hours(FREEFORM_WINDOW_HOURS),
            refill_bounds: RefillBounds::default(),
            snooze_policy: SnoozePolicy::default(),
            transition_policy: TransitionPolicy::default(),
            reminder_interval_secs: DEFAULT_REMINDER_INTERVAL_SECS,
            database_path: None,
        }
    }
}

impl CareConfig {
    /// Defaults overridden by `CAREPATH_*` environment variables.
    pub fn from_env() -> Result<Self, CareError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CareError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_MISSED_THRESHOLD) {
            config.missed_threshold = parse_number(ENV_MISSED_THRESHOLD, &raw)?;
        }
        if let Some(raw) = lookup(ENV_SNOOZE_POLICY) {
            config.snooze_policy = SnoozePolicy::from_str(raw.trim())?;
        }
        if let Some(raw) = lookup(ENV_TRANSITION_POLICY) {
            config.transition_policy = TransitionPolicy::from_str(raw.trim())?;
        }
        if let Some(raw) = lookup(ENV_REMINDER_INTERVAL) {
            config.reminder_interval_secs = parse_number(ENV_REMINDER_INTERVAL, &raw)?;
        }
        if let Some(raw) = lookup(ENV_DB_PATH) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                config.database_path = Some(PathBuf::from(trimmed));
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CareError> {
        if self.missed_threshold < 1 {
            return Err(CareError::invalid("missed_threshold", self.missed_threshold));
        }
        if self.freeform_window <= Duration::zero() {
            return Err(CareError::invalid(
                "freeform_window",
                self.freeform_window.num_seconds(),
            ));
        }
        if self.reminder_interval_secs == 0 {
            return Err(CareError::invalid("reminder_interval_secs", 0));
        }
        self.refill_bounds.validate()
    }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T, CareError> {
    raw.trim()
        .parse()
        .map_err(|_| CareError::invalid(key, raw))
}
