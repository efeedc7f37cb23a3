//! Cron job scheduling for Tempo.
//!
//! - ⏰ Five-field cron expressions with per-field rules
//! - 🧭 Pure due-time matching against any clock
//! - 🪝 A fixed job lifecycle: `execute`, then `on_success` or `on_fail`,
//!   then `after_exec`
//! - 🛡️ Failure containment: errors and panics inside a job never reach the
//!   scheduler
//! - 📛 Unique job names within a registry
//!
//! ## Quick Start - Cron Expressions
//!
//! ```
//! use tempo_cron::{CronExpression, TimeComponents};
//!
//! let expr = CronExpression::parse("30 4 * * MON-FRI").unwrap();
//!
//! // 04:30 on Wednesday, 5 June
//! let now = TimeComponents::new(30, 4, 5, 6, 3);
//! assert!(expr.is_due(&now));
//!
//! // Builders produce the same schedules
//! let daily = CronExpression::daily_at(4, 30).unwrap();
//! assert_eq!(daily.expression(), "30 4 * * *");
//! ```
//!
//! ## Jobs and the Registry
//!
//! ```
//! use std::sync::Arc;
//! use tempo_cron::prelude::*;
//!
//! let registry = JobRegistry::new()
//!     .with_clock(Arc::new(FixedClock::new(TimeComponents::new(0, 12, 1, 6, 3))));
//!
//! let handler = FnHandler::new(|ctx| {
//!     let target = ctx.argument("target").unwrap_or_default();
//!     JobError::check(!target.is_empty())
//! })
//! .on_fail(|ctx| {
//!     ctx.log(tempo_log::Level::Warn, "no target given");
//!     Ok(())
//! });
//!
//! let job = Job::builder("backup", handler)
//!     .expression("0 12 * * *")
//!     .argument("target")
//!     .build(&registry)
//!     .unwrap();
//! registry.schedule(job);
//!
//! // Due at 12:00, but no argument value was supplied, so it fails.
//! let report = registry.run_due();
//! assert_eq!(report.executed, 1);
//! assert!(!registry.last_run_succeeded("backup").unwrap());
//! ```

pub mod arguments;
pub mod clock;
pub mod config;
pub mod error;
pub mod expression;
pub mod field;
pub mod job;
pub mod names;
pub mod registry;
pub mod scheduler;

pub use arguments::{
    ArgumentNames, ArgumentSource, CliArguments, NoArguments, is_valid_argument_name, resolve_value,
};
pub use clock::{Clock, FixedClock, SystemClock, TimeComponents, TimeZoneMode};
pub use config::SchedulerConfig;
pub use error::{CronError, CronResult, JobError, JobResult, ScheduleError, SourceLocation};
pub use expression::{CronExpression, CronPresets, parse_cron_expression};
pub use field::{FieldKind, FieldSpec, SubExpression, classify};
pub use job::{
    DEFAULT_JOB_NAME, FnHandler, Job, JobBuilder, JobContext, JobFn, JobHandler, JobStatus,
    LifecycleState, RunOutcome,
};
pub use registry::{JobRegistry, JobSummary, TickReport};
pub use scheduler::CronScheduler;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::arguments::{ArgumentSource, CliArguments, NoArguments};
    pub use crate::clock::{Clock, FixedClock, SystemClock, TimeComponents};
    pub use crate::config::SchedulerConfig;
    pub use crate::error::{CronError, CronResult, JobError, JobResult, ScheduleError};
    pub use crate::expression::{CronExpression, CronPresets};
    pub use crate::job::{FnHandler, Job, JobContext, JobHandler, JobStatus};
    pub use crate::registry::JobRegistry;
    pub use crate::scheduler::CronScheduler;
}
