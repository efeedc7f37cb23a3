//! The job registry: a FIFO queue of jobs plus the clock and log sink the
//! jobs share.

use crate::arguments::{ArgumentSource, NoArguments};
use crate::clock::{Clock, SystemClock, TimeComponents};
use crate::config::SchedulerConfig;
use crate::error::{CronError, CronResult};
use crate::job::{Job, JobStatus, RunOutcome};
use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tempo_log::{GlobalSink, LogSink, debug, info};

/// Upper bound of the random suffix appended to a colliding job name.
const NAME_SUFFIX_MAX: u32 = 9999;

/// Holds every scheduled job.
///
/// All queue access goes through one lock, so the name-uniqueness check
/// (which drains and restores the whole queue) cannot interleave with other
/// registry operations. Job callbacks run while that lock is held and must
/// not call back into the same registry.
pub struct JobRegistry {
    queue: Mutex<VecDeque<Job>>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn LogSink>,
}

/// Counts from one pass over the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub evaluated: usize,
    pub executed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// One row of the job table shown by status views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub name: String,
    pub expression: String,
    pub arguments: Vec<String>,
    pub last_run_succeeded: bool,
    pub due: bool,
    pub execution_count: u64,
    pub status: String,
}

impl JobRegistry {
    /// Empty registry reading the local clock and logging globally.
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            clock: Arc::new(SystemClock::local()),
            sink: Arc::new(GlobalSink),
        }
    }

    /// Empty registry whose clock follows `config.timezone`.
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new().with_clock(Arc::new(SystemClock::new(config.timezone)))
    }

    /// Replace the clock. Jobs built afterwards pick it up.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the log sink. Jobs built afterwards pick it up.
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn sink(&self) -> Arc<dyn LogSink> {
        self.sink.clone()
    }

    /// Current time components from the registry clock.
    pub fn now(&self) -> TimeComponents {
        self.clock.now()
    }

    /// Append a job as is.
    pub fn enqueue(&self, job: Job) {
        self.queue.lock().push_back(job);
    }

    /// Remove and return the oldest job.
    pub fn dequeue(&self) -> Option<Job> {
        self.queue.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Job names in queue order.
    pub fn names(&self) -> Vec<String> {
        self.queue.lock().iter().map(|job| job.name().to_string()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        let name = name.trim();
        self.queue.lock().iter().any(|job| job.name() == name)
    }

    /// Return `requested`, or `requested` with a random `-N` suffix when a
    /// queued job already has that name.
    pub fn unique_name(&self, requested: &str) -> String {
        let mut queue = self.queue.lock();
        resolve_unique_name(&mut queue, requested.to_string())
    }

    /// Make the job's name unique, then enqueue it. Returns the stored name.
    pub fn schedule(&self, mut job: Job) -> String {
        let mut queue = self.queue.lock();
        let name = resolve_unique_name(&mut queue, job.name().to_string());
        if name != job.name() {
            debug!("Renaming job '{}' to '{}' on schedule", job.name(), name);
            job.rename_unchecked(name.clone());
        }
        info!("Scheduled job '{}' with expression '{}'", name, job.expression());
        queue.push_back(job);
        name
    }

    /// Take a job out of the registry.
    pub fn remove(&self, name: &str) -> Option<Job> {
        let name = name.trim();
        let mut queue = self.queue.lock();
        let index = queue.iter().position(|job| job.name() == name)?;
        queue.remove(index)
    }

    /// One scheduler tick: evaluate every job against the registry clock.
    pub fn run_due(&self) -> TickReport {
        let now = self.now();
        self.run_at(&now)
    }

    /// Evaluate every job against `now`, in queue order.
    pub fn run_at(&self, now: &TimeComponents) -> TickReport {
        self.run_each(false, now, &NoArguments)
    }

    /// Run every job, forced or not, with argument values from `arguments`.
    pub fn run_all(&self, force: bool, arguments: &dyn ArgumentSource) -> TickReport {
        let now = self.now();
        self.run_each(force, &now, arguments)
    }

    fn run_each(
        &self,
        force: bool,
        now: &TimeComponents,
        arguments: &dyn ArgumentSource,
    ) -> TickReport {
        let mut report = TickReport::default();
        let mut queue = self.queue.lock();

        for job in queue.iter_mut() {
            report.evaluated += 1;
            match job.run_at(force, now, arguments) {
                RunOutcome::Skipped => {}
                RunOutcome::Succeeded => {
                    report.executed += 1;
                    report.succeeded += 1;
                }
                RunOutcome::Failed => {
                    report.executed += 1;
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Run one job by name. Returns whether its callbacks were invoked.
    pub fn run_job(
        &self,
        name: &str,
        force: bool,
        arguments: &dyn ArgumentSource,
    ) -> CronResult<bool> {
        let name = name.trim();
        let now = self.now();
        let mut queue = self.queue.lock();
        let job = queue
            .iter_mut()
            .find(|job| job.name() == name)
            .ok_or_else(|| CronError::JobNotFound(name.to_string()))?;
        Ok(job.run_at(force, &now, arguments).ran())
    }

    /// Verdict of the last run of a job.
    pub fn last_run_succeeded(&self, name: &str) -> CronResult<bool> {
        let name = name.trim();
        self.queue
            .lock()
            .iter()
            .find(|job| job.name() == name)
            .map(Job::last_run_succeeded)
            .ok_or_else(|| CronError::JobNotFound(name.to_string()))
    }

    /// Job table rows, due-ness evaluated against the registry clock.
    pub fn summaries(&self) -> Vec<JobSummary> {
        let now = self.now();
        self.queue
            .lock()
            .iter()
            .map(|job| JobSummary {
                name: job.name().to_string(),
                expression: job.expression().to_string(),
                arguments: job.arguments().iter().map(String::from).collect(),
                last_run_succeeded: job.last_run_succeeded(),
                due: job.is_due(&now),
                execution_count: job.execution_count(),
                status: match job.status() {
                    JobStatus::Scheduled => "scheduled".to_string(),
                    JobStatus::Succeeded => "succeeded".to_string(),
                    JobStatus::Failed(reason) => format!("failed: {}", reason),
                },
            })
            .collect()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("jobs", &self.names())
            .finish_non_exhaustive()
    }
}

/// Drain the queue into a holding list while looking for `candidate`, put
/// every job back in its original order, and retry with a suffixed name on a
/// collision.
fn resolve_unique_name(queue: &mut VecDeque<Job>, candidate: String) -> String {
    let mut holding = Vec::with_capacity(queue.len());
    let mut taken = false;

    while let Some(job) = queue.pop_front() {
        if job.name() == candidate {
            taken = true;
        }
        holding.push(job);
    }
    queue.extend(holding);

    if !taken {
        return candidate;
    }

    let suffix = rand::rng().random_range(1..=NAME_SUFFIX_MAX);
    let next = format!("{}-{}", candidate, suffix);
    debug!("Job name '{}' is taken, trying '{}'", candidate, next);
    resolve_unique_name(queue, next)
}
