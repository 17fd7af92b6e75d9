//! Cron-driven job scheduler
//!
//! Every enabled job gets its own timer task. A trigger starts a run only if
//! the job has no run in flight; otherwise it is skipped and logged, never
//! queued. The in-flight flag is released by a guard owned by the run task,
//! so it is cleared on completion, panic and cancellation alike.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::cron::CronSchedule;
use super::models::Job;
use super::registry::JobRegistry;
use crate::caching::models::CachingResult;
use crate::error::AppError;

/// Source of wall-clock time for cron evaluation.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Executes one run of a job.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: &Job) -> CachingResult;
}

/// What happened to a trigger.
#[derive(Debug)]
pub enum TriggerOutcome {
    /// A run was spawned; the handle yields its result
    Started(JoinHandle<CachingResult>),
    /// The previous run of the job is still in progress
    Skipped,
    Disabled,
    UnknownJob,
}

impl TriggerOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, TriggerOutcome::Started(_))
    }
}

struct TimerHandle {
    cron_expression: String,
    task: JoinHandle<()>,
}

struct SchedulerInner {
    registry: Arc<dyn JobRegistry>,
    runner: Arc<dyn JobRunner>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    running: Mutex<HashSet<String>>,
    timers: Mutex<HashMap<String, TimerHandle>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks a job as running for as long as it lives.
struct RunGuard {
    inner: Arc<SchedulerInner>,
    job_id: String,
}

impl RunGuard {
    fn acquire(inner: &Arc<SchedulerInner>, job_id: &str) -> Option<Self> {
        if !lock(&inner.running).insert(job_id.to_string()) {
            return None;
        }
        Some(Self {
            inner: Arc::clone(inner),
            job_id: job_id.to_string(),
        })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        lock(&self.inner.running).remove(&self.job_id);
        debug!("Job {} is idle", self.job_id);
    }
}

/// Drives jobs from the registry on their cron schedules.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(
        registry: Arc<dyn JobRegistry>,
        runner: Arc<dyn JobRunner>,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                registry,
                runner,
                clock,
                poll_interval,
                running: Mutex::new(HashSet::new()),
                timers: Mutex::new(HashMap::new()),
                supervisor: Mutex::new(None),
            }),
        }
    }

    /// Starts timers for every enabled job and a supervisor that picks up
    /// registry changes every poll interval.
    pub async fn start(&self) -> Result<(), AppError> {
        sync_timers(&self.inner).await?;

        let inner = Arc::clone(&self.inner);
        let supervisor = tokio::spawn(async move {
            loop {
                tokio::time::sleep(inner.poll_interval).await;
                if let Err(e) = sync_timers(&inner).await {
                    error!("Failed to refresh job timers: {}", e);
                }
            }
        });
        if let Some(previous) = lock(&self.inner.supervisor).replace(supervisor) {
            previous.abort();
        }

        info!("Scheduler started");
        Ok(())
    }

    /// Re-reads the registry now instead of waiting for the next poll.
    pub async fn refresh(&self) -> Result<(), AppError> {
        sync_timers(&self.inner).await
    }

    /// Triggers `job_id` immediately, subject to the same rules as a timer.
    pub async fn trigger(&self, job_id: &str) -> Result<TriggerOutcome, AppError> {
        trigger(&self.inner, job_id).await
    }

    /// Ids of jobs with a run in flight.
    pub fn running_jobs(&self) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.inner.running).iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Ids of jobs that currently have a timer.
    pub fn scheduled_jobs(&self) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.inner.timers).keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Stops all timers and the supervisor. Runs in flight continue.
    pub fn shutdown(&self) {
        if let Some(supervisor) = lock(&self.inner.supervisor).take() {
            supervisor.abort();
        }
        for (_, timer) in lock(&self.inner.timers).drain() {
            timer.task.abort();
        }
        info!("Scheduler stopped");
    }
}

async fn trigger(inner: &Arc<SchedulerInner>, job_id: &str) -> Result<TriggerOutcome, AppError> {
    reload_registry(inner).await;
    let Some(job) = inner.registry.get(job_id).await? else {
        warn!("Trigger for unknown job {}", job_id);
        return Ok(TriggerOutcome::UnknownJob);
    };
    if job.disabled {
        debug!("Job {} is disabled, not starting", job_id);
        return Ok(TriggerOutcome::Disabled);
    }

    let Some(guard) = RunGuard::acquire(inner, job_id) else {
        info!(
            "Schedule conflict: job {} is still running, skipping this trigger",
            job_id
        );
        return Ok(TriggerOutcome::Skipped);
    };

    let runner = Arc::clone(&inner.runner);
    let handle = tokio::spawn(async move {
        let _guard = guard;
        runner.run(&job).await
    });
    Ok(TriggerOutcome::Started(handle))
}

/// Pulls in registry edits made outside this process. Failures keep the
/// jobs already known.
async fn reload_registry(inner: &SchedulerInner) {
    match inner.registry.reload().await {
        Ok(true) => info!("Job registry changed, applying new definitions"),
        Ok(false) => {}
        Err(e) => warn!("Failed to reload job registry: {}", e),
    }
}

/// Aligns the set of timer tasks with the enabled jobs in the registry.
async fn sync_timers(inner: &Arc<SchedulerInner>) -> Result<(), AppError> {
    reload_registry(inner).await;
    let jobs = inner.registry.list().await?;
    let enabled: HashMap<String, Job> = jobs
        .into_iter()
        .filter(|job| job.is_enabled())
        .map(|job| (job.id.clone(), job))
        .collect();

    let mut timers = lock(&inner.timers);

    let stale: Vec<String> = timers
        .iter()
        .filter(|(id, timer)| {
            enabled
                .get(*id)
                .is_none_or(|job| job.cron_expression != timer.cron_expression)
        })
        .map(|(id, _)| id.clone())
        .collect();
    for id in stale {
        if let Some(timer) = timers.remove(&id) {
            debug!("Stopping timer for job {}", id);
            timer.task.abort();
        }
    }

    for (id, job) in enabled {
        if timers.contains_key(&id) {
            continue;
        }
        debug!("Starting timer for job {} ({})", id, job.cron_expression);
        let task = tokio::spawn(run_timer(Arc::clone(inner), id.clone()));
        timers.insert(
            id,
            TimerHandle {
                cron_expression: job.cron_expression,
                task,
            },
        );
    }
    Ok(())
}

async fn run_timer(inner: Arc<SchedulerInner>, job_id: String) {
    let mut last_fire: Option<DateTime<Utc>> = None;

    loop {
        let job = match inner.registry.get(&job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                debug!("Job {} was removed, timer exits", job_id);
                return;
            }
            Err(e) => {
                error!("Failed to read job {}: {}", job_id, e);
                tokio::time::sleep(inner.poll_interval).await;
                continue;
            }
        };

        let schedule = match CronSchedule::parse(&job.cron_expression) {
            Ok(schedule) => schedule,
            Err(e) => {
                error!("Job {} has an invalid schedule: {}", job_id, e);
                return;
            }
        };

        let now = inner.clock.now();
        // Never fire the same slot twice if the clock lags the timer
        let from = last_fire.map_or(now, |last| last.max(now));
        let Some(next) = schedule.next_after(from) else {
            warn!("Job {} will never fire ({})", job_id, job.cron_expression);
            return;
        };

        let wait = (next - now).to_std().unwrap_or_default();
        debug!("Job {} fires next at {} (in {:?})", job_id, next, wait);
        tokio::time::sleep(wait).await;
        last_fire = Some(next);

        match trigger(&inner, &job_id).await {
            Ok(TriggerOutcome::Started(_)) => debug!("Job {} started by schedule", job_id),
            Ok(TriggerOutcome::UnknownJob) => return,
            Ok(_) => {}
            Err(e) => error!("Failed to trigger job {}: {}", job_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caching::models::RunStatus;
    use crate::jobs::models::CachingType;
    use crate::jobs::registry::InMemoryJobRegistry;
    use crate::testing_utils::{CountingRunner, TokioClock};
    use chrono::TimeZone;

    fn registry_with(jobs: Vec<Job>) -> Arc<InMemoryJobRegistry> {
        Arc::new(InMemoryJobRegistry::with_jobs(jobs).unwrap())
    }

    fn tables_job() -> Job {
        Job::new("tables", "Tables", CachingType::Table, "0 * * * *")
    }

    fn scheduler(registry: Arc<InMemoryJobRegistry>, runner: Arc<CountingRunner>) -> Scheduler {
        Scheduler::new(
            registry,
            runner,
            Arc::new(SystemClock),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_trigger_while_running_is_skipped() {
        let runner = Arc::new(CountingRunner::blocking());
        let scheduler = scheduler(registry_with(vec![tables_job()]), runner.clone());

        let first = scheduler.trigger("tables").await.unwrap();
        let TriggerOutcome::Started(handle) = first else {
            panic!("first trigger should start a run");
        };
        runner.wait_until_started(1).await;

        let second = scheduler.trigger("tables").await.unwrap();
        assert!(matches!(second, TriggerOutcome::Skipped));
        assert_eq!(scheduler.running_jobs(), vec!["tables".to_string()]);

        runner.release();
        let result = handle.await.unwrap();
        assert_eq!(result.status, RunStatus::Success);
        assert_eq!(runner.calls(), 1);
        assert!(scheduler.running_jobs().is_empty());

        // Idle again, so the next trigger starts
        runner.release();
        let third = scheduler.trigger("tables").await.unwrap();
        assert!(third.is_started());
    }

    #[tokio::test]
    async fn test_disabled_and_unknown_jobs_do_not_run() {
        let mut job = tables_job();
        job.disabled = true;
        let runner = Arc::new(CountingRunner::new());
        let scheduler = scheduler(registry_with(vec![job]), runner.clone());

        assert!(matches!(
            scheduler.trigger("tables").await.unwrap(),
            TriggerOutcome::Disabled
        ));
        assert!(matches!(
            scheduler.trigger("ghost").await.unwrap(),
            TriggerOutcome::UnknownJob
        ));
        assert_eq!(runner.calls(), 0);
    }

    #[tokio::test]
    async fn test_panicking_run_releases_the_job() {
        let runner = Arc::new(CountingRunner::panicking());
        let scheduler = scheduler(registry_with(vec![tables_job()]), runner.clone());

        let TriggerOutcome::Started(handle) = scheduler.trigger("tables").await.unwrap() else {
            panic!("trigger should start a run");
        };
        assert!(handle.await.is_err());
        assert!(scheduler.running_jobs().is_empty());
        assert!(scheduler.trigger("tables").await.unwrap().is_started());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_on_schedule() {
        let start = Utc.with_ymd_and_hms(2024, 9, 16, 10, 15, 0).unwrap();
        let runner = Arc::new(CountingRunner::new());
        let registry = registry_with(vec![tables_job()]);
        let scheduler = Scheduler::new(
            registry,
            runner.clone(),
            Arc::new(TokioClock::starting_at(start)),
            Duration::from_secs(3600 * 24),
        );
        scheduler.start().await.unwrap();
        assert_eq!(scheduler.scheduled_jobs(), vec!["tables".to_string()]);

        // 10:15 -> 10:59, nothing yet
        tokio::time::sleep(Duration::from_secs(44 * 60)).await;
        assert_eq!(runner.calls(), 0);

        // 11:00 fires
        tokio::time::sleep(Duration::from_secs(2 * 60)).await;
        assert_eq!(runner.calls(), 1);

        // 12:00 fires once more
        tokio::time::sleep(Duration::from_secs(60 * 60)).await;
        assert_eq!(runner.calls(), 2);

        scheduler.shutdown();
        assert!(scheduler.scheduled_jobs().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabling_stops_future_triggers() {
        let start = Utc.with_ymd_and_hms(2024, 9, 16, 10, 15, 0).unwrap();
        let runner = Arc::new(CountingRunner::new());
        let registry = registry_with(vec![tables_job()]);
        let scheduler = Scheduler::new(
            registry.clone(),
            runner.clone(),
            Arc::new(TokioClock::starting_at(start)),
            Duration::from_secs(3600 * 24),
        );
        scheduler.start().await.unwrap();

        registry.set_disabled("tables", true).await.unwrap();
        scheduler.refresh().await.unwrap();
        assert!(scheduler.scheduled_jobs().is_empty());

        tokio::time::sleep(Duration::from_secs(2 * 3600)).await;
        assert_eq!(runner.calls(), 0);

        // Re-enabling does not replay the missed triggers
        registry.set_disabled("tables", false).await.unwrap();
        scheduler.refresh().await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(runner.calls(), 0);

        scheduler.shutdown();
    }

    #[tokio::test]
    async fn test_jobs_file_edits_reach_running_scheduler() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.toml");
        let registry = Arc::new(InMemoryJobRegistry::open(&path).await.unwrap());
        registry.create(tables_job()).await.unwrap();
        let runner = Arc::new(CountingRunner::new());
        let scheduler = scheduler(registry, runner.clone());
        scheduler.start().await.unwrap();
        assert_eq!(scheduler.scheduled_jobs(), vec!["tables".to_string()]);

        // Another process edits the same file
        let operator = InMemoryJobRegistry::open(&path).await.unwrap();
        operator.set_disabled("tables", true).await.unwrap();

        assert!(matches!(
            scheduler.trigger("tables").await.unwrap(),
            TriggerOutcome::Disabled
        ));
        scheduler.refresh().await.unwrap();
        assert!(scheduler.scheduled_jobs().is_empty());

        operator
            .create(Job::new("games", "Games", CachingType::Games, "*/15 * * * *"))
            .await
            .unwrap();
        scheduler.refresh().await.unwrap();
        assert_eq!(scheduler.scheduled_jobs(), vec!["games".to_string()]);
        assert_eq!(runner.calls(), 0);

        scheduler.shutdown();
    }
}
