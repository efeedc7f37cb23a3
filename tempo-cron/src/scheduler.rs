//! Background scheduler loop.

use crate::clock::TimeComponents;
use crate::config::SchedulerConfig;
use crate::error::{CronError, CronResult};
use crate::registry::{JobRegistry, TickReport};
use std::sync::Arc;
use tempo_log::{debug, error, info, warn};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Drives a [`JobRegistry`] from the wall clock.
///
/// Every `tick_interval` the loop reads the registry clock; the first tick
/// that sees a new minute runs one registry pass. Jobs execute one after the
/// other on a blocking thread, so a slow job delays the next job but never
/// the async runtime.
pub struct CronScheduler {
    registry: Arc<JobRegistry>,
    config: SchedulerConfig,
    running: Arc<RwLock<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl CronScheduler {
    /// Create a scheduler with default configuration.
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        Self::with_config(registry, SchedulerConfig::default())
    }

    /// Create a scheduler with custom configuration.
    pub fn with_config(registry: Arc<JobRegistry>, config: SchedulerConfig) -> Self {
        info!("Initializing cron scheduler");
        debug!(
            "Scheduler config - tick_interval: {:?}, timezone: {:?}",
            config.tick_interval, config.timezone
        );
        Self {
            registry,
            config,
            running: Arc::new(RwLock::new(false)),
            handle: None,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Start the background loop.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use tempo_cron::*;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), CronError> {
    /// let registry = Arc::new(JobRegistry::new());
    /// registry.schedule(Job::new(
    ///     "cleanup",
    ///     "0 0 * * *",
    ///     FnHandler::new(|_ctx| Ok(())),
    ///     &registry,
    /// )?);
    ///
    /// let mut scheduler = CronScheduler::new(registry);
    /// scheduler.start().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn start(&mut self) -> CronResult<()> {
        let mut running = self.running.write().await;
        if *running {
            warn!("Cron scheduler already running");
            return Err(CronError::SchedulerAlreadyRunning);
        }
        *running = true;
        drop(running);

        info!("Cron scheduler started");

        let registry = self.registry.clone();
        let running = self.running.clone();
        let tick_interval = self.config.tick_interval;
        let log_execution = self.config.log_execution;

        let handle = tokio::spawn(async move {
            let mut last_minute: Option<TimeComponents> = None;

            while *running.read().await {
                let now = registry.now();
                if last_minute != Some(now) {
                    last_minute = Some(now);
                    match run_pass(registry.clone(), now).await {
                        Ok(report) if log_execution && report.executed > 0 => {
                            info!(
                                "Cron tick ran {} of {} jobs ({} succeeded, {} failed)",
                                report.executed, report.evaluated, report.succeeded, report.failed
                            );
                        }
                        Ok(_) => {}
                        Err(e) => error!("Cron tick aborted: {}", e),
                    }
                }

                tokio::time::sleep(tick_interval).await;
            }
        });

        self.handle = Some(handle);
        Ok(())
    }

    /// Stop the background loop.
    pub async fn stop(&mut self) -> CronResult<()> {
        let mut running = self.running.write().await;
        if !*running {
            return Err(CronError::SchedulerNotRunning);
        }
        *running = false;
        drop(running);

        if let Some(handle) = self.handle.take() {
            handle.abort();
        }

        info!("Cron scheduler stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Run one registry pass now, independent of the loop.
    pub async fn tick_now(&self) -> CronResult<TickReport> {
        let now = self.registry.now();
        run_pass(self.registry.clone(), now).await
    }
}

/// Evaluate every job against the minute the caller observed. The clock is
/// not read again on the blocking thread.
async fn run_pass(registry: Arc<JobRegistry>, now: TimeComponents) -> CronResult<TickReport> {
    tokio::task::spawn_blocking(move || registry.run_at(&now))
        .await
        .map_err(|e| CronError::Worker(e.to_string()))
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
