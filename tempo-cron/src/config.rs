//! Scheduler configuration.
//!
//! Values come from, in increasing priority: [`Default`], a TOML document,
//! and `TEMPO_CRON_*` environment variables.
//!
//! ```toml
//! tick_interval_secs = 5
//! log_execution = true
//! timezone = "utc"
//! ```

use crate::clock::TimeZoneMode;
use crate::error::{CronError, CronResult};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// How often the scheduler looks at the clock. Each minute is still
    /// processed only once.
    pub tick_interval: Duration,

    /// Whether to log a line per tick that executed jobs
    pub log_execution: bool,

    /// Wall clock used to decide whether jobs are due
    pub timezone: TimeZoneMode,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            log_execution: true,
            timezone: TimeZoneMode::Local,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    tick_interval_secs: Option<u64>,
    log_execution: Option<bool>,
    timezone: Option<TimeZoneMode>,
}

impl SchedulerConfig {
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_log_execution(mut self, log_execution: bool) -> Self {
        self.log_execution = log_execution;
        self
    }

    pub fn with_timezone(mut self, timezone: TimeZoneMode) -> Self {
        self.timezone = timezone;
        self
    }

    /// Defaults overlaid with a TOML document. Missing keys keep defaults.
    pub fn from_toml_str(content: &str) -> CronResult<Self> {
        let file: FileConfig = toml::from_str(content)
            .map_err(|e| CronError::Config(format!("TOML parse error: {}", e)))?;

        let mut config = Self::default();
        if let Some(secs) = file.tick_interval_secs {
            config.tick_interval = tick_from_secs(secs)?;
        }
        if let Some(log_execution) = file.log_execution {
            config.log_execution = log_execution;
        }
        if let Some(timezone) = file.timezone {
            config.timezone = timezone;
        }
        Ok(config)
    }

    /// Read a TOML file, then apply the environment on top.
    pub fn from_file(path: impl AsRef<Path>) -> CronResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CronError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)?.apply_env()
    }

    /// Defaults with the environment applied.
    pub fn from_env() -> CronResult<Self> {
        Self::default().apply_env()
    }

    /// Override fields from `TEMPO_CRON_TICK_SECS`,
    /// `TEMPO_CRON_LOG_EXECUTION` and `TEMPO_CRON_TIMEZONE`.
    pub fn apply_env(self) -> CronResult<Self> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(mut self, var: impl Fn(&str) -> Option<String>) -> CronResult<Self> {
        if let Some(raw) = var("TEMPO_CRON_TICK_SECS") {
            let secs = raw.trim().parse::<u64>().map_err(|_| {
                CronError::Config(format!("TEMPO_CRON_TICK_SECS is not a number: {}", raw))
            })?;
            self.tick_interval = tick_from_secs(secs)?;
        }

        if let Some(raw) = var("TEMPO_CRON_LOG_EXECUTION") {
            self.log_execution = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(CronError::Config(format!(
                        "TEMPO_CRON_LOG_EXECUTION is not a boolean: {}",
                        raw
                    )));
                }
            };
        }

        if let Some(raw) = var("TEMPO_CRON_TIMEZONE") {
            self.timezone = TimeZoneMode::from_str(&raw).ok_or_else(|| {
                CronError::Config(format!("TEMPO_CRON_TIMEZONE must be local or utc: {}", raw))
            })?;
        }

        Ok(self)
    }
}

fn tick_from_secs(secs: u64) -> CronResult<Duration> {
    if secs == 0 {
        return Err(CronError::Config("tick interval must be at least one second".into()));
    }
    Ok(Duration::from_secs(secs))
}
