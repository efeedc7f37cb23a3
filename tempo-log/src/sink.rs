//! Log sinks handed to jobs by their registry.

use crate::Level;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

/// Target used for lines logged through [`LogSink::log`].
pub const JOBS_TARGET: &str = "tempo::jobs";

/// One line on its way to a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub level: Level,
    pub target: &'a str,
    pub message: &'a str,
}

/// Destination for log records.
pub trait LogSink: Send + Sync {
    fn write(&self, record: &Record<'_>);

    /// Write `message` under [`JOBS_TARGET`].
    fn log(&self, level: Level, message: &str) {
        self.write(&Record {
            level,
            target: JOBS_TARGET,
            message,
        });
    }
}

/// Sends records through the process-wide level filter and output, the
/// same path the macros take.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalSink;

impl LogSink for GlobalSink {
    fn write(&self, record: &Record<'_>) {
        crate::dispatch(record);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn write(&self, _record: &Record<'_>) {}
}

/// A captured log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Keeps every record in memory, in arrival order, with no level filter.
///
/// Status pages read it back to show recent activity; tests use it to assert
/// on what a job logged.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records.lock().iter().map(|r| r.message.clone()).collect()
    }

    /// Whether any message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.records.lock().iter().any(|r| r.message.contains(needle))
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn write(&self, record: &Record<'_>) {
        self.records.lock().push(LogRecord {
            level: record.level,
            target: record.target.to_string(),
            message: record.message.to_string(),
            at: Utc::now(),
        });
    }
}

impl<S: LogSink + ?Sized> LogSink for Arc<S> {
    fn write(&self, record: &Record<'_>) {
        (**self).write(record)
    }
}
