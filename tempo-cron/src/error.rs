//! Error types for cron operations.

use crate::field::FieldKind;
use std::borrow::Cow;
use std::fmt;
use std::panic::Location;
use thiserror::Error;

/// Result type for registry and scheduler operations.
pub type CronResult<T> = Result<T, CronError>;

/// Result type returned by job callbacks.
pub type JobResult = Result<(), JobError>;

/// Registry and scheduler errors.
#[derive(Debug, Error)]
pub enum CronError {
    /// The schedule could not be built
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// Job not found
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Scheduler not running
    #[error("Scheduler not running")]
    SchedulerNotRunning,

    /// Scheduler already running
    #[error("Scheduler already running")]
    SchedulerAlreadyRunning,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The blocking worker running a tick died
    #[error("Job worker failed: {0}")]
    Worker(String),
}

/// Why a cron expression (or a schedule builder argument) was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// Not exactly five space-separated, non-empty fields.
    #[error("Invalid cron expression '{expression}': expected 5 fields, found {found}")]
    FieldCount { expression: String, found: usize },

    /// A comma-separated token of a field failed validation.
    #[error("Invalid {field} field: token '{token}' {reason}")]
    InvalidToken {
        field: FieldKind,
        token: String,
        reason: &'static str,
    },

    /// A field contains an empty comma-separated token, as in `1,,2`.
    #[error("Invalid {field} field '{text}': empty token")]
    EmptyField { field: FieldKind, text: String },

    /// A builder was given an out-of-range or unknown argument.
    #[error("Invalid schedule argument: {0}")]
    InvalidArgument(String),
}

impl ScheduleError {
    pub(crate) fn token(field: FieldKind, token: &str, reason: &'static str) -> Self {
        ScheduleError::InvalidToken {
            field,
            token: token.to_string(),
            reason,
        }
    }
}

/// Source position a [`JobError`] points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    file: Cow<'static, str>,
    line: u32,
    column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<Cow<'static, str>>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }
}

impl From<&'static Location<'static>> for SourceLocation {
    fn from(location: &'static Location<'static>) -> Self {
        Self::new(location.file(), location.line(), location.column())
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Failure reported by, or captured from, a job callback.
///
/// Construct with [`JobError::new`] or [`JobError::declined`]; both record
/// the caller's source location so the failure log can point at it. Panics
/// caught by the job's failure boundary carry the location of the `panic!`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobError {
    kind: &'static str,
    message: String,
    location: Option<SourceLocation>,
}

impl JobError {
    /// A callback failed with an error message.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: "error",
            message: message.into(),
            location: Some(Location::caller().into()),
        }
    }

    /// The job ran but reports an unsuccessful outcome.
    #[track_caller]
    pub fn declined() -> Self {
        Self {
            kind: "declined",
            message: "job reported failure".to_string(),
            location: Some(Location::caller().into()),
        }
    }

    /// Wrap any error value.
    #[track_caller]
    pub fn from_error<E: std::error::Error>(error: E) -> Self {
        Self {
            kind: std::any::type_name::<E>(),
            message: error.to_string(),
            location: Some(Location::caller().into()),
        }
    }

    /// `Ok(())` for `true`, a declined failure for `false`.
    #[track_caller]
    pub fn check(success: bool) -> JobResult {
        if success { Ok(()) } else { Err(JobError::declined()) }
    }

    pub(crate) fn panicked(message: String, location: Option<SourceLocation>) -> Self {
        Self {
            kind: "panic",
            message,
            location,
        }
    }

    /// Short classification: `error`, `declined`, `panic`, or the wrapped
    /// error's type name.
    pub fn kind(&self) -> &str {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.location.as_ref()
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " at {}", location)?;
        }
        Ok(())
    }
}

impl std::error::Error for JobError {}
