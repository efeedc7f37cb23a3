//! Job definition and execution.
//!
//! A [`Job`] pairs a schedule with a [`JobHandler`] and drives it through a
//! fixed lifecycle on every invocation:
//!
//! ```text
//! Idle -> Evaluating -> Skipped                                  -> Idle
//!                    -> Running -> Succeeded | Failed -> Finalized -> Idle
//! ```
//!
//! `execute` runs inside a failure boundary: an `Err` or a panic marks the
//! run as failed. The verdict is recorded before `on_success` / `on_fail`
//! run, and those callbacks and `after_exec` each get their own boundary; a
//! failure there is logged without changing the verdict.

use crate::arguments::{ArgumentNames, ArgumentSource, NoArguments, resolve_value};
use crate::clock::{Clock, TimeComponents};
use crate::error::{CronResult, JobError, JobResult, ScheduleError, SourceLocation};
use crate::expression::CronExpression;
use crate::registry::JobRegistry;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Once};
use tempo_log::{Level, LogSink, trace};

/// Name used when a job is created with an empty name.
pub const DEFAULT_JOB_NAME: &str = "cron-job";

/// The four callbacks of a job.
///
/// Only `execute` is required. Return `Ok(())` for success and an error
/// (for instance [`JobError::declined`]) for failure.
pub trait JobHandler: Send {
    fn execute(&mut self, ctx: &JobContext<'_>) -> JobResult;

    fn on_success(&mut self, _ctx: &JobContext<'_>) -> JobResult {
        Ok(())
    }

    fn on_fail(&mut self, _ctx: &JobContext<'_>) -> JobResult {
        Ok(())
    }

    fn after_exec(&mut self, _ctx: &JobContext<'_>) -> JobResult {
        Ok(())
    }
}

/// Boxed callback used by [`FnHandler`].
pub type JobFn = Box<dyn FnMut(&JobContext<'_>) -> JobResult + Send>;

/// A [`JobHandler`] assembled from closures.
pub struct FnHandler {
    execute: JobFn,
    on_success: Option<JobFn>,
    on_fail: Option<JobFn>,
    after_exec: Option<JobFn>,
}

impl FnHandler {
    pub fn new<F>(execute: F) -> Self
    where
        F: FnMut(&JobContext<'_>) -> JobResult + Send + 'static,
    {
        Self {
            execute: Box::new(execute),
            on_success: None,
            on_fail: None,
            after_exec: None,
        }
    }

    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&JobContext<'_>) -> JobResult + Send + 'static,
    {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub fn on_fail<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&JobContext<'_>) -> JobResult + Send + 'static,
    {
        self.on_fail = Some(Box::new(callback));
        self
    }

    pub fn after_exec<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&JobContext<'_>) -> JobResult + Send + 'static,
    {
        self.after_exec = Some(Box::new(callback));
        self
    }
}

fn call_optional(callback: &mut Option<JobFn>, ctx: &JobContext<'_>) -> JobResult {
    match callback {
        Some(callback) => callback(ctx),
        None => Ok(()),
    }
}

impl JobHandler for FnHandler {
    fn execute(&mut self, ctx: &JobContext<'_>) -> JobResult {
        (self.execute)(ctx)
    }

    fn on_success(&mut self, ctx: &JobContext<'_>) -> JobResult {
        call_optional(&mut self.on_success, ctx)
    }

    fn on_fail(&mut self, ctx: &JobContext<'_>) -> JobResult {
        call_optional(&mut self.on_fail, ctx)
    }

    fn after_exec(&mut self, ctx: &JobContext<'_>) -> JobResult {
        call_optional(&mut self.after_exec, ctx)
    }
}

/// What a callback can see while it runs.
pub struct JobContext<'a> {
    name: &'a str,
    forced: bool,
    now: TimeComponents,
    execution_count: u64,
    succeeded: Option<bool>,
    argument_names: &'a ArgumentNames,
    arguments: &'a dyn ArgumentSource,
    sink: &'a dyn LogSink,
}

impl<'a> JobContext<'a> {
    pub fn name(&self) -> &str {
        self.name
    }

    /// Whether this run was forced rather than due.
    pub fn is_forced(&self) -> bool {
        self.forced
    }

    /// Time components the run was evaluated against.
    pub fn now(&self) -> TimeComponents {
        self.now
    }

    /// Completed runs before this one.
    pub fn execution_count(&self) -> u64 {
        self.execution_count
    }

    /// Verdict of the current run: `None` inside `execute`, then
    /// `Some(true)` or `Some(false)` for the remaining callbacks.
    pub fn succeeded(&self) -> Option<bool> {
        self.succeeded
    }

    pub fn argument_names(&self) -> &ArgumentNames {
        self.argument_names
    }

    /// Value of argument `name`, or `None` when unset.
    pub fn argument(&self, name: &str) -> Option<String> {
        resolve_value(self.arguments, name)
    }

    /// Write to the registry's log sink.
    pub fn log(&self, level: Level, message: &str) {
        self.sink.log(level, message);
    }
}

/// Where a job is within one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Evaluating,
    Skipped,
    Running,
    Succeeded,
    Failed,
    Finalized,
}

/// Result of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Not due and not forced; no callback ran.
    Skipped,
    Succeeded,
    Failed,
}

impl RunOutcome {
    /// Whether callbacks were invoked.
    pub fn ran(&self) -> bool {
        !matches!(self, RunOutcome::Skipped)
    }
}

/// Verdict of the most recent run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Never ran
    Scheduled,

    /// Last run succeeded
    Succeeded,

    /// Last run failed
    Failed(String),
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Execute,
    OnSuccess,
    OnFail,
    AfterExec,
}

impl Stage {
    fn as_str(&self) -> &'static str {
        match self {
            Stage::Execute => "execute",
            Stage::OnSuccess => "on_success",
            Stage::OnFail => "on_fail",
            Stage::AfterExec => "after_exec",
        }
    }
}

/// Scheduled job.
pub struct Job {
    name: String,
    expression: CronExpression,
    arguments: ArgumentNames,
    handler: Box<dyn JobHandler>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn LogSink>,
    state: LifecycleState,
    forced: bool,
    last_run_succeeded: bool,
    status: JobStatus,
    last_run: Option<DateTime<Utc>>,
    execution_count: u64,
}

impl Job {
    /// Create a job from an expression and a handler.
    ///
    /// The name is made unique against `registry`; the job is not added to
    /// it. Use [`JobRegistry::schedule`] for that.
    ///
    /// # Examples
    ///
    /// ```
    /// use tempo_cron::{FnHandler, Job, JobRegistry};
    ///
    /// let registry = JobRegistry::new();
    /// let job = Job::new("cleanup", "0 3 * * *", FnHandler::new(|_ctx| Ok(())), &registry).unwrap();
    /// assert_eq!(job.expression(), "0 3 * * *");
    /// ```
    pub fn new<H>(
        name: impl Into<String>,
        expression: &str,
        handler: H,
        registry: &JobRegistry,
    ) -> CronResult<Self>
    where
        H: JobHandler + 'static,
    {
        Self::builder(name, handler).expression(expression).build(registry)
    }

    /// Create a job that runs `execute` every minute.
    pub fn from_fn<F>(name: impl Into<String>, execute: F, registry: &JobRegistry) -> Self
    where
        F: FnMut(&JobContext<'_>) -> JobResult + Send + 'static,
    {
        let schedule = CronExpression::every_minute();
        Self::assemble(
            name.into(),
            schedule,
            ArgumentNames::new(),
            Box::new(FnHandler::new(execute)),
            registry,
        )
    }

    pub fn builder<H>(name: impl Into<String>, handler: H) -> JobBuilder
    where
        H: JobHandler + 'static,
    {
        JobBuilder {
            name: name.into(),
            expression: None,
            arguments: ArgumentNames::new(),
            handler: Box::new(handler),
        }
    }

    fn assemble(
        name: String,
        expression: CronExpression,
        arguments: ArgumentNames,
        handler: Box<dyn JobHandler>,
        registry: &JobRegistry,
    ) -> Self {
        let name = registry.unique_name(normalize_name(&name));
        Self {
            name,
            expression,
            arguments,
            handler,
            clock: registry.clock(),
            sink: registry.sink(),
            state: LifecycleState::Idle,
            forced: false,
            last_run_succeeded: false,
            status: JobStatus::Scheduled,
            last_run: None,
            execution_count: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the job, keeping the new name unique within `registry`.
    /// Returns the name actually stored.
    pub fn set_name(&mut self, name: &str, registry: &JobRegistry) -> &str {
        self.name = registry.unique_name(normalize_name(name));
        &self.name
    }

    /// Used by the registry, which has already checked uniqueness under its
    /// own lock.
    pub(crate) fn rename_unchecked(&mut self, name: String) {
        self.name = name;
    }

    /// The schedule's expression string.
    pub fn expression(&self) -> &str {
        self.expression.expression()
    }

    pub fn schedule(&self) -> &CronExpression {
        &self.expression
    }

    /// Replace the schedule. On error the current schedule is kept.
    pub fn set_schedule(&mut self, expression: &str) -> Result<(), ScheduleError> {
        self.expression = CronExpression::parse(expression)?;
        Ok(())
    }

    fn replace_schedule(
        &mut self,
        schedule: Result<CronExpression, ScheduleError>,
    ) -> Result<(), ScheduleError> {
        self.expression = schedule?;
        Ok(())
    }

    pub fn every_minute(&mut self) {
        self.expression = CronExpression::every_minute();
    }

    pub fn every_hour(&mut self) -> Result<(), ScheduleError> {
        self.replace_schedule(CronExpression::every_hour())
    }

    pub fn daily_at(&mut self, hour: u8, minute: u8) -> Result<(), ScheduleError> {
        self.replace_schedule(CronExpression::daily_at(hour, minute))
    }

    pub fn every_month_on(&mut self, day: u8, time: &str) -> Result<(), ScheduleError> {
        self.replace_schedule(CronExpression::every_month_on(day, time))
    }

    pub fn on_month(&mut self, month: &str, day: u8, time: &str) -> Result<(), ScheduleError> {
        self.replace_schedule(CronExpression::on_month(month, day, time))
    }

    pub fn weekly_on(&mut self, day: &str, time: &str) -> Result<(), ScheduleError> {
        self.replace_schedule(CronExpression::weekly_on(day, time))
    }

    /// Declare an execution argument. Invalid names and duplicates are
    /// ignored.
    pub fn add_argument(&mut self, name: &str) {
        self.arguments.add(name);
    }

    /// Declare several execution arguments at once.
    pub fn add_arguments<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.arguments.extend(names);
    }

    pub fn arguments(&self) -> &ArgumentNames {
        &self.arguments
    }

    /// Whether the schedule matches `now`.
    pub fn is_due(&self, now: &TimeComponents) -> bool {
        self.expression.is_due(now)
    }

    /// Whether the schedule matches the registry clock right now.
    pub fn is_due_now(&self) -> bool {
        self.is_due(&self.clock.now())
    }

    pub fn is_minute(&self) -> bool {
        self.expression.is_minute(self.clock.current_minute())
    }

    pub fn is_hour(&self) -> bool {
        self.expression.is_hour(self.clock.current_hour())
    }

    pub fn is_day_of_month(&self) -> bool {
        self.expression.is_day_of_month(self.clock.current_day_of_month())
    }

    pub fn is_month(&self) -> bool {
        self.expression.is_month(self.clock.current_month())
    }

    pub fn is_day_of_week(&self) -> bool {
        self.expression.is_day_of_week(self.clock.current_day_of_week())
    }

    /// Only true while a forced run is in progress.
    pub fn is_forced(&self) -> bool {
        self.forced
    }

    pub fn last_run_succeeded(&self) -> bool {
        self.last_run_succeeded
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn status(&self) -> &JobStatus {
        &self.status
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.last_run
    }

    pub fn execution_count(&self) -> u64 {
        self.execution_count
    }

    /// Run against the registry clock with no argument values.
    ///
    /// Returns `true` when callbacks were invoked, `false` when the job was
    /// not due and not forced. Use [`last_run_succeeded`](Self::last_run_succeeded)
    /// for the verdict.
    pub fn run(&mut self, force: bool) -> bool {
        self.run_with(force, &NoArguments)
    }

    /// Run against the registry clock, resolving arguments from `arguments`.
    pub fn run_with(&mut self, force: bool, arguments: &dyn ArgumentSource) -> bool {
        let now = self.clock.now();
        self.run_at(force, &now, arguments).ran()
    }

    /// Run the full lifecycle against explicit time components.
    pub fn run_at(
        &mut self,
        force: bool,
        now: &TimeComponents,
        arguments: &dyn ArgumentSource,
    ) -> RunOutcome {
        self.forced = force;
        self.transition(LifecycleState::Evaluating);

        if !(self.forced || self.expression.is_due(now)) {
            self.transition(LifecycleState::Skipped);
            self.reset();
            return RunOutcome::Skipped;
        }

        self.transition(LifecycleState::Running);

        let mut ctx = JobContext {
            name: &self.name,
            forced: self.forced,
            now: *now,
            execution_count: self.execution_count,
            succeeded: None,
            argument_names: &self.arguments,
            arguments,
            sink: self.sink.as_ref(),
        };
        let handler = self.handler.as_mut();

        let verdict = contain(Stage::Execute, handler, &ctx);
        if let Err(err) = &verdict {
            report(&ctx, Stage::Execute, err);
        }

        let succeeded = verdict.is_ok();
        self.last_run_succeeded = succeeded;
        self.last_run = Some(Utc::now());
        self.status = match verdict {
            Ok(()) => JobStatus::Succeeded,
            Err(err) => JobStatus::Failed(err.to_string()),
        };
        ctx.succeeded = Some(succeeded);

        let (state, follow_up, outcome) = if succeeded {
            (LifecycleState::Succeeded, Stage::OnSuccess, RunOutcome::Succeeded)
        } else {
            (LifecycleState::Failed, Stage::OnFail, RunOutcome::Failed)
        };
        advance(&self.name, &mut self.state, state);
        if let Err(err) = contain(follow_up, handler, &ctx) {
            report(&ctx, follow_up, &err);
        }

        advance(&self.name, &mut self.state, LifecycleState::Finalized);
        if let Err(err) = contain(Stage::AfterExec, handler, &ctx) {
            report(&ctx, Stage::AfterExec, &err);
        }

        self.execution_count += 1;
        self.reset();
        outcome
    }

    fn transition(&mut self, state: LifecycleState) {
        advance(&self.name, &mut self.state, state);
    }

    fn reset(&mut self) {
        self.forced = false;
        self.transition(LifecycleState::Idle);
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("expression", &self.expression.expression())
            .field("arguments", &self.arguments)
            .field("state", &self.state)
            .field("status", &self.status)
            .field("execution_count", &self.execution_count)
            .finish_non_exhaustive()
    }
}

fn advance(name: &str, state: &mut LifecycleState, next: LifecycleState) {
    trace!("Job '{}': {:?} -> {:?}", name, state, next);
    *state = next;
}

fn normalize_name(name: &str) -> &str {
    let name = name.trim();
    if name.is_empty() { DEFAULT_JOB_NAME } else { name }
}

thread_local! {
    static CONTAINING: Cell<bool> = const { Cell::new(false) };
    static PANIC_SITE: RefCell<Option<SourceLocation>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Chain a hook in front of the current one. Panics raised inside a failure
/// boundary only have their location recorded; all others reach the
/// previous hook untouched.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if CONTAINING.with(Cell::get) {
                let site = info
                    .location()
                    .map(|l| SourceLocation::new(l.file().to_string(), l.line(), l.column()));
                PANIC_SITE.with(|slot| *slot.borrow_mut() = site);
            } else {
                previous(info);
            }
        }));
    });
}

/// Run one callback, converting a panic into a `JobError`.
fn contain(stage: Stage, handler: &mut dyn JobHandler, ctx: &JobContext<'_>) -> JobResult {
    install_panic_hook();
    let outer = CONTAINING.with(|flag| flag.replace(true));

    let result = panic::catch_unwind(AssertUnwindSafe(|| match stage {
        Stage::Execute => handler.execute(ctx),
        Stage::OnSuccess => handler.on_success(ctx),
        Stage::OnFail => handler.on_fail(ctx),
        Stage::AfterExec => handler.after_exec(ctx),
    }));

    CONTAINING.with(|flag| flag.set(outer));
    result.unwrap_or_else(|payload| {
        let site = PANIC_SITE.with(|slot| slot.borrow_mut().take());
        Err(JobError::panicked(panic_message(payload.as_ref()), site))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn report(ctx: &JobContext<'_>, stage: Stage, err: &JobError) {
    let location = err
        .location()
        .map(ToString::to_string)
        .unwrap_or_else(|| "unknown".to_string());
    ctx.log(
        Level::Error,
        &format!(
            "Job '{}' failed in {}: kind={} message={} location={}",
            ctx.name(),
            stage.as_str(),
            err.kind(),
            err.message(),
            location
        ),
    );
}

/// Step-by-step construction of a [`Job`].
pub struct JobBuilder {
    name: String,
    expression: Option<String>,
    arguments: ArgumentNames,
    handler: Box<dyn JobHandler>,
}

impl JobBuilder {
    /// Cron expression; every minute when not given.
    pub fn expression(mut self, expression: &str) -> Self {
        self.expression = Some(expression.to_string());
        self
    }

    pub fn argument(mut self, name: &str) -> Self {
        self.arguments.add(name);
        self
    }

    pub fn arguments<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.arguments.extend(names);
        self
    }

    /// Parse the expression and reserve a unique name in `registry`.
    pub fn build(self, registry: &JobRegistry) -> CronResult<Job> {
        let schedule = match &self.expression {
            Some(expression) => CronExpression::parse(expression)?,
            None => CronExpression::every_minute(),
        };
        Ok(Job::assemble(
            self.name,
            schedule,
            self.arguments,
            self.handler,
            registry,
        ))
    }
}
