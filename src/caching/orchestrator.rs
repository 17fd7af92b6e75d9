use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::models::{CachingResult, CachingUnit, RunStatus};
use super::result_log::ResultLog;
use crate::config::Config;
use crate::constants::results::MAX_ERROR_SUMMARIES;
use crate::data_fetcher::api::LeagueSource;
use crate::data_fetcher::cache::CacheStore;
use crate::data_fetcher::models::{Class, WeekId};
use crate::data_fetcher::processors::{describe_skipped, parse_games, parse_index, parse_table};
use crate::error::UnitError;
use crate::jobs::models::{CachingType, Job};
use crate::jobs::registry::JobRegistry;
use crate::jobs::scheduler::JobRunner;

/// Tuning knobs of a caching run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Units processed at the same time within one run
    pub max_concurrent_units: usize,
    /// Wall-clock budget of a run; unfinished units fail with `RunTimeout`
    pub run_timeout: Duration,
    /// When set, FULL runs also refresh every stored week besides the
    /// current one.
    pub include_history_weeks: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_concurrent_units: crate::constants::DEFAULT_MAX_CONCURRENT_UNITS,
            run_timeout: Duration::from_secs(crate::constants::DEFAULT_RUN_TIMEOUT_SECONDS),
            include_history_weeks: false,
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrent_units: config.max_concurrent_units.max(1),
            run_timeout: Duration::from_secs(config.run_timeout_seconds),
            include_history_weeks: config.full_includes_history_weeks,
        }
    }
}

/// Drives source client, normalizer and cache store for one job and records
/// exactly one [`CachingResult`] per run.
pub struct Orchestrator {
    source: Arc<dyn LeagueSource>,
    store: Arc<dyn CacheStore>,
    results: Arc<dyn ResultLog>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn LeagueSource>,
        store: Arc<dyn CacheStore>,
        results: Arc<dyn ResultLog>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            source,
            store,
            results,
            settings,
        }
    }

    /// Runs `job` to completion or until the run timeout expires, appends the
    /// result to the result log and returns it.
    #[instrument(skip(self, job), fields(job_id = %job.id, caching_type = %job.caching_type))]
    pub async fn run(&self, job: &Job) -> CachingResult {
        let started_at = Utc::now();
        info!("Starting caching run for job {}", job.id);
        let result = self.execute(job, started_at).await;
        self.record(result).await
    }

    /// Resolves `job_id` in `registry` and runs it. An unknown job yields a
    /// FAILURE result with zero units.
    pub async fn run_by_id(&self, registry: &dyn JobRegistry, job_id: &str) -> CachingResult {
        let started_at = Utc::now();
        match registry.get(job_id).await {
            Ok(Some(job)) => self.run(&job).await,
            Ok(None) => {
                let result = CachingResult::precondition_failure(
                    job_id,
                    None,
                    started_at,
                    format!("unknown job '{job_id}'"),
                );
                self.record(result).await
            }
            Err(e) => {
                let result = CachingResult::precondition_failure(
                    job_id,
                    None,
                    started_at,
                    format!("failed to load job '{job_id}': {e}"),
                );
                self.record(result).await
            }
        }
    }

    async fn execute(&self, job: &Job, started_at: DateTime<Utc>) -> CachingResult {
        let deadline = Instant::now() + self.settings.run_timeout;
        let mut summaries = Vec::new();
        let mut discovery_failed = false;

        if job.caching_type == CachingType::Full {
            match tokio::time::timeout_at(deadline, self.discover()).await {
                Ok(Ok(notes)) => summaries.extend(notes),
                Ok(Err(e)) => {
                    warn!("Discovery failed for job {}: {}", job.id, e);
                    summaries.push(format!("discovery: {e}"));
                    discovery_failed = true;
                }
                Err(_) => {
                    warn!("Discovery for job {} hit the run timeout", job.id);
                    summaries.push(format!("discovery: {}", UnitError::RunTimeout));
                    discovery_failed = true;
                }
            }
        }

        let units = match self.resolve_units(job.caching_type).await {
            Ok(units) => units,
            Err(reason) => {
                warn!("Job {} cannot run: {}", job.id, reason);
                summaries.push(reason);
                return finalize(job, started_at, RunStatus::Failure, 0, 0, summaries);
            }
        };

        info!("Job {} resolved {} unit(s)", job.id, units.len());
        let outcomes = self.process_units(&units, deadline).await;

        let mut units_failed = 0;
        for (unit, outcome) in units.iter().zip(outcomes) {
            match outcome {
                Some(Ok(notes)) => summaries.extend(notes),
                Some(Err(e)) => {
                    units_failed += 1;
                    error!("Unit {} failed: {}", unit, e);
                    summaries.push(format!("{unit}: {e}"));
                }
                None => {
                    units_failed += 1;
                    error!("Unit {} did not finish before the run timeout", unit);
                    summaries.push(format!("{unit}: {}", UnitError::RunTimeout));
                }
            }
        }

        let status = if units.is_empty() && discovery_failed {
            RunStatus::Failure
        } else {
            RunStatus::from_counts(units.len(), units_failed)
        };

        finalize(job, started_at, status, units.len(), units_failed, summaries)
    }

    /// Refreshes the class catalogue and the current week from the source.
    async fn discover(&self) -> Result<Vec<String>, UnitError> {
        let payload = self.source.fetch_index().await?;
        let parsed = parse_index(&payload)?;

        let mut changed = 0;
        for class in parsed.classes {
            if self.store.upsert_class(class).await? {
                changed += 1;
            }
        }
        match parsed.current_week {
            Some(week) => {
                self.store.upsert_week(week).await?;
            }
            None => debug!("Source did not report an active round"),
        }
        debug!("Discovery updated {} class(es)", changed);

        Ok(describe_skipped("class", &parsed.skipped)
            .map(|note| vec![format!("discovery: {note}")])
            .unwrap_or_default())
    }

    async fn resolve_units(&self, caching_type: CachingType) -> Result<Vec<CachingUnit>, String> {
        let classes: Vec<Class> = self
            .store
            .list_classes()
            .await
            .map_err(|e| format!("failed to list classes: {e}"))?;

        if !caching_type.needs_current_week() {
            return Ok(classes
                .into_iter()
                .map(|class| CachingUnit::Table { class_id: class.id })
                .collect());
        }

        let current = self
            .store
            .get_current_week()
            .await
            .map_err(|e| format!("failed to read current week: {e}"))?
            .ok_or_else(|| "no current week".to_string())?;

        let mut weeks: Vec<WeekId> = vec![current.date];
        if caching_type == CachingType::Full && self.settings.include_history_weeks {
            let stored = self
                .store
                .list_weeks()
                .await
                .map_err(|e| format!("failed to list weeks: {e}"))?;
            weeks.extend(stored.into_iter().map(|w| w.date).filter(|d| *d != current.date));
        }

        let mut units = Vec::with_capacity(classes.len() * weeks.len());
        for class in &classes {
            for week_id in &weeks {
                let class_id = class.id.clone();
                let week_id = *week_id;
                units.push(match caching_type {
                    CachingType::Games => CachingUnit::Games { class_id, week_id },
                    _ => CachingUnit::Full { class_id, week_id },
                });
            }
        }
        Ok(units)
    }

    /// Processes units concurrently. Entries left `None` did not finish
    /// before the deadline; their in-flight work is dropped.
    async fn process_units(
        &self,
        units: &[CachingUnit],
        deadline: Instant,
    ) -> Vec<Option<Result<Vec<String>, UnitError>>> {
        let mut outcomes: Vec<Option<Result<Vec<String>, UnitError>>> =
            units.iter().map(|_| None).collect();
        if units.is_empty() {
            return outcomes;
        }

        let stream = futures::stream::iter(units.to_vec().into_iter().enumerate())
            .map(|(index, unit)| async move { (index, self.process_unit(&unit).await) })
            .buffer_unordered(self.settings.max_concurrent_units.max(1));
        tokio::pin!(stream);

        let timeout = tokio::time::sleep_until(deadline);
        tokio::pin!(timeout);

        loop {
            tokio::select! {
                next = stream.next() => match next {
                    Some((index, outcome)) => outcomes[index] = Some(outcome),
                    None => break,
                },
                _ = &mut timeout => {
                    warn!("Run timeout reached with units still pending");
                    break;
                }
            }
        }

        outcomes
    }

    /// Fetch, normalize and store one unit. Returns notes about skipped rows.
    #[instrument(skip(self, unit), fields(unit = %unit))]
    async fn process_unit(&self, unit: &CachingUnit) -> Result<Vec<String>, UnitError> {
        let mut notes = Vec::new();

        match unit {
            CachingUnit::Table { class_id } => {
                let payload = self.source.fetch_class(class_id, None).await?;
                let parsed = parse_table(&payload, class_id)?;
                notes.extend(describe_skipped("score", &parsed.skipped));
                self.store.upsert_table(class_id, parsed.scores).await?;
            }
            CachingUnit::Games { class_id, week_id } => {
                let payload = self.source.fetch_class(class_id, Some(*week_id)).await?;
                let parsed = parse_games(&payload, class_id, *week_id)?;
                notes.extend(describe_skipped("game", &parsed.skipped));
                self.store
                    .upsert_games(class_id, *week_id, parsed.games)
                    .await?;
            }
            CachingUnit::Full { class_id, week_id } => {
                let payload = self.source.fetch_class(class_id, Some(*week_id)).await?;
                let table = parse_table(&payload, class_id)?;
                let games = parse_games(&payload, class_id, *week_id)?;
                notes.extend(describe_skipped("score", &table.skipped));
                notes.extend(describe_skipped("game", &games.skipped));
                self.store.upsert_table(class_id, table.scores).await?;
                self.store
                    .upsert_games(class_id, *week_id, games.games)
                    .await?;
            }
        }

        debug!("Unit {} stored", unit);
        Ok(notes.into_iter().map(|note| format!("{unit}: {note}")).collect())
    }

    async fn record(&self, result: CachingResult) -> CachingResult {
        match result.status {
            RunStatus::Success => info!(
                "Job {} finished: {} ({} unit(s), {} ms)",
                result.job_id,
                result.status,
                result.units_attempted,
                result.duration_ms()
            ),
            RunStatus::Partial => warn!(
                "Job {} finished: {} ({} of {} unit(s) failed)",
                result.job_id, result.status, result.units_failed, result.units_attempted
            ),
            RunStatus::Failure => error!(
                "Job {} finished: {} ({} of {} unit(s) failed): {}",
                result.job_id,
                result.status,
                result.units_failed,
                result.units_attempted,
                result.error_summaries.join("; ")
            ),
        }

        if let Err(e) = self.results.append(result.clone()).await {
            error!("Failed to record caching result {}: {}", result.id, e);
        }
        result
    }
}

#[async_trait]
impl JobRunner for Orchestrator {
    async fn run(&self, job: &Job) -> CachingResult {
        Orchestrator::run(self, job).await
    }
}

fn finalize(
    job: &Job,
    started_at: DateTime<Utc>,
    status: RunStatus,
    units_attempted: usize,
    units_failed: usize,
    summaries: Vec<String>,
) -> CachingResult {
    CachingResult {
        id: CachingResult::generate_id(started_at),
        job_id: job.id.clone(),
        caching_type: Some(job.caching_type),
        started_at,
        finished_at: Utc::now(),
        status,
        units_attempted,
        units_failed,
        error_summaries: cap_summaries(summaries),
    }
}

fn cap_summaries(mut summaries: Vec<String>) -> Vec<String> {
    if summaries.len() > MAX_ERROR_SUMMARIES {
        let dropped = summaries.len() - MAX_ERROR_SUMMARIES;
        summaries.truncate(MAX_ERROR_SUMMARIES);
        summaries.push(format!("... and {dropped} more"));
    }
    summaries
}
