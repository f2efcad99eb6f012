//! Core runtime configuration.
//!
//! # Responsibility
//! - Describe tunables with defaults matching the shipped behaviour.
//! - Load them from JSON and validate ranges.
//!
//! # Invariants
//! - Every field has a default; an empty JSON object is a valid config.
//! - `purchase_history_days` stays within `0..=10`.

use crate::logging::default_log_level;
use crate::persistence::DEFAULT_SAVE_DELAY;
use crate::timer::{TimerPolicy, DEFAULT_TICK_INTERVAL};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Largest accepted purchase history window, in days.
pub const MAX_PURCHASE_HISTORY_DAYS: u32 = 10;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "cannot read config: {err}"),
            Self::Json(err) => write!(f, "cannot parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

/// Timer section of the config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    pub suspend_in_background: bool,
    pub count_background_time: bool,
    pub tick_interval_ms: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            suspend_in_background: false,
            count_background_time: false,
            tick_interval_ms: DEFAULT_TICK_INTERVAL.as_millis() as u64,
        }
    }
}

impl TimerConfig {
    pub fn policy(&self) -> TimerPolicy {
        TimerPolicy {
            suspend_in_background: self.suspend_in_background,
            count_background_time: self.count_background_time,
            tick_interval: Duration::from_millis(self.tick_interval_ms),
        }
    }
}

/// Top-level core configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Debounce delay for routine commits.
    pub save_delay_ms: u64,
    pub timer: TimerConfig,
    /// Days before today still counted as "recently purchased".
    pub purchase_history_days: u32,
    pub log_level: String,
    /// Absolute directory for rolling log files; logging stays off when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            save_delay_ms: DEFAULT_SAVE_DELAY.as_millis() as u64,
            timer: TimerConfig::default(),
            purchase_history_days: 3,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl CoreConfig {
    /// Parses and validates a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(ConfigError::Json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.purchase_history_days > MAX_PURCHASE_HISTORY_DAYS {
            return Err(ConfigError::Invalid(format!(
                "purchase_history_days must be within 0..={MAX_PURCHASE_HISTORY_DAYS}, got {}",
                self.purchase_history_days
            )));
        }
        if self.timer.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "timer.tick_interval_ms must be greater than zero".to_string(),
            ));
        }
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    pub fn save_delay(&self) -> Duration {
        Duration::from_millis(self.save_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig};
    use std::time::Duration;

    #[test]
    fn empty_object_yields_defaults() {
        let config = CoreConfig::from_json_str("{}").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.save_delay(), Duration::from_secs(5));
        assert!(!config.timer.policy().suspend_in_background);
    }

    #[test]
    fn partial_timer_section_keeps_other_defaults() {
        let config =
            CoreConfig::from_json_str(r#"{"timer": {"suspend_in_background": true}}"#).unwrap();
        assert!(config.timer.suspend_in_background);
        assert_eq!(config.timer.tick_interval_ms, 1_000);
    }

    #[test]
    fn out_of_range_history_is_rejected() {
        let err = CoreConfig::from_json_str(r#"{"purchase_history_days": 11}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn relative_log_dir_is_rejected() {
        let err = CoreConfig::from_json_str(r#"{"log_dir": "logs"}"#).unwrap_err();
        assert!(err.to_string().contains("absolute"));
    }
}
