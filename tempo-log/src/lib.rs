//! Logging for the Tempo scheduler.
//!
//! Every line, whether it comes from the macros or from a job's
//! [`LogSink`], ends up as a [`Record`]. Records from the macros and from
//! [`GlobalSink`] pass the process-wide level filter and are written to the
//! installed output, which is stderr unless [`set_output`] replaced it.
//!
//! ```rust
//! use tempo_log::{debug, info};
//!
//! info!("Scheduler tick at minute {}", 15);
//! debug!(target: "tempo::cron::parser", "Parsing field '{}'", "*/5");
//! ```
//!
//! The first log call (or [`init`]) reads:
//!
//! - `TEMPO_DEBUG=1` - lower the level to `debug`
//! - `TEMPO_LOG_LEVEL=trace|debug|info|warn|error|off`
//! - `TEMPO_LOG_FORMAT=pretty|compact|json`
//! - `TEMPO_LOG_TIMESTAMPS=1|0`

mod output;
pub mod sink;

pub use output::StderrSink;
pub use sink::{GlobalSink, JOBS_TARGET, LogRecord, LogSink, MemorySink, NullSink, Record};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Severity of a log line. `Off` is only meaningful as a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

const LEVELS: [Level; 6] = [
    Level::Trace,
    Level::Debug,
    Level::Info,
    Level::Warn,
    Level::Error,
    Level::Off,
];

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Off => "OFF",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Level {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if name.eq_ignore_ascii_case("warning") {
            return Ok(Level::Warn);
        }
        if name.eq_ignore_ascii_case("none") {
            return Ok(Level::Off);
        }
        LEVELS
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| UnknownName::new("level", s))
    }
}

/// Line layout used by [`StderrSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Pretty,
    Compact,
    Json,
}

impl FromStr for Format {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Format::Pretty),
            "compact" => Ok(Format::Compact),
            "json" => Ok(Format::Json),
            _ => Err(UnknownName::new("format", s)),
        }
    }
}

/// A level or format name that is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownName {
    what: &'static str,
    value: String,
}

impl UnknownName {
    fn new(what: &'static str, value: &str) -> Self {
        Self {
            what,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for UnknownName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown log {} '{}'", self.what, self.value)
    }
}

impl std::error::Error for UnknownName {}

/// Settings read from `TEMPO_*` variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: Level,
    pub format: Format,
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            format: Format::Pretty,
            timestamps: true,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from any variable lookup. Unparseable values keep the default.
    /// An explicit `TEMPO_LOG_LEVEL` wins over `TEMPO_DEBUG`.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str| {
            var(key).map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        };
        let mut config = Self::default();

        if flag("TEMPO_DEBUG") == Some(true) {
            config.level = Level::Debug;
        }
        if let Some(level) = var("TEMPO_LOG_LEVEL").and_then(|v| v.parse().ok()) {
            config.level = level;
        }
        if let Some(format) = var("TEMPO_LOG_FORMAT").and_then(|v| v.parse().ok()) {
            config.format = format;
        }
        if let Some(timestamps) = flag("TEMPO_LOG_TIMESTAMPS") {
            config.timestamps = timestamps;
        }
        config
    }
}

static CONFIG: Lazy<LogConfig> = Lazy::new(LogConfig::from_env);

// Seeded from CONFIG, so the first level check reads the environment.
static THRESHOLD: Lazy<AtomicU8> = Lazy::new(|| AtomicU8::new(CONFIG.level as u8));

static OUTPUT: Lazy<RwLock<Arc<dyn LogSink>>> =
    Lazy::new(|| RwLock::new(Arc::new(StderrSink::from_config(&CONFIG))));

/// Read the environment now instead of on the first log call.
pub fn init() {
    Lazy::force(&THRESHOLD);
    Lazy::force(&OUTPUT);
}

/// Settings as read from the environment, ignoring later overrides.
pub fn config() -> &'static LogConfig {
    &CONFIG
}

pub fn current_level() -> Level {
    let raw = THRESHOLD.load(Ordering::Relaxed) as usize;
    LEVELS.get(raw).copied().unwrap_or(Level::Off)
}

#[inline]
pub fn is_level_enabled(level: Level) -> bool {
    level != Level::Off && level as u8 >= THRESHOLD.load(Ordering::Relaxed)
}

pub fn is_debug_enabled() -> bool {
    is_level_enabled(Level::Debug)
}

pub fn set_level(level: Level) {
    THRESHOLD.store(level as u8, Ordering::SeqCst);
}

/// Turning debug on lowers the threshold to `Debug`; turning it off raises
/// a `Trace`/`Debug` threshold back to `Info`.
pub fn set_debug(enabled: bool) {
    let level = current_level();
    if enabled && level > Level::Debug {
        set_level(Level::Debug);
    } else if !enabled && level < Level::Info {
        set_level(Level::Info);
    }
}

/// Replace where filtered records go. Returns the previous output.
///
/// Installing a [`GlobalSink`] here would loop back into this output.
pub fn set_output(output: Arc<dyn LogSink>) -> Arc<dyn LogSink> {
    std::mem::replace(&mut *OUTPUT.write(), output)
}

/// Filter by level and hand the record to the installed output.
pub fn dispatch(record: &Record<'_>) {
    if is_level_enabled(record.level) {
        let output = OUTPUT.read().clone();
        output.write(record);
    }
}

/// Entry point of the macros.
#[doc(hidden)]
pub fn log(level: Level, target: &str, message: &str) {
    dispatch(&Record {
        level,
        target,
        message,
    });
}

#[doc(hidden)]
#[macro_export]
macro_rules! __event {
    (target: $target:expr, $level:expr, $($arg:tt)+) => {{
        let level = $level;
        if $crate::is_level_enabled(level) {
            $crate::log(level, $target, &::std::format!($($arg)+));
        }
    }};
    ($level:expr, $($arg:tt)+) => {
        $crate::__event!(target: ::std::module_path!(), $level, $($arg)+)
    };
}

/// `trace!("...")` or `trace!(target: "...", "...")`; the same forms apply
/// to the other level macros.
#[macro_export]
macro_rules! trace {
    (target: $target:expr, $($arg:tt)+) => { $crate::__event!(target: $target, $crate::Level::Trace, $($arg)+) };
    ($($arg:tt)+) => { $crate::__event!($crate::Level::Trace, $($arg)+) };
}

#[macro_export]
macro_rules! debug {
    (target: $target:expr, $($arg:tt)+) => { $crate::__event!(target: $target, $crate::Level::Debug, $($arg)+) };
    ($($arg:tt)+) => { $crate::__event!($crate::Level::Debug, $($arg)+) };
}

#[macro_export]
macro_rules! info {
    (target: $target:expr, $($arg:tt)+) => { $crate::__event!(target: $target, $crate::Level::Info, $($arg)+) };
    ($($arg:tt)+) => { $crate::__event!($crate::Level::Info, $($arg)+) };
}

#[macro_export]
macro_rules! warn {
    (target: $target:expr, $($arg:tt)+) => { $crate::__event!(target: $target, $crate::Level::Warn, $($arg)+) };
    ($($arg:tt)+) => { $crate::__event!($crate::Level::Warn, $($arg)+) };
}

#[macro_export]
macro_rules! error {
    (target: $target:expr, $($arg:tt)+) => { $crate::__event!(target: $target, $crate::Level::Error, $($arg)+) };
    ($($arg:tt)+) => { $crate::__event!($crate::Level::Error, $($arg)+) };
}
