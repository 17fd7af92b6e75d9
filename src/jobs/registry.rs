//! Job definitions and their CRUD surface

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::cron::CronSchedule;
use super::models::Job;
use crate::error::{AppError, ValidationErrors};

/// Checks operator input before it reaches the registry.
///
/// # Returns
/// * `Ok(CronSchedule)` - the parsed schedule of a valid job
/// * `Err(ValidationErrors)` - one entry per invalid field
pub fn validate_job(job: &Job) -> Result<CronSchedule, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if job.id.trim().is_empty() {
        errors.push("id", "must not be empty");
    } else if job.id.chars().any(char::is_whitespace) {
        errors.push("id", "must not contain whitespace");
    }
    if job.name.trim().is_empty() {
        errors.push("name", "must not be empty");
    }

    match CronSchedule::parse(&job.cron_expression) {
        Ok(schedule) => errors.into_result(schedule),
        Err(e) => {
            errors.push("cron_expression", e.message);
            Err(errors)
        }
    }
}

/// Holds job definitions. The scheduler only reads; operators mutate.
#[async_trait]
pub trait JobRegistry: Send + Sync {
    /// All jobs ordered by id.
    async fn list(&self) -> Result<Vec<Job>, AppError>;

    async fn get(&self, id: &str) -> Result<Option<Job>, AppError>;

    /// Adds a job. Fails on validation errors or a duplicate id.
    async fn create(&self, job: Job) -> Result<Job, AppError>;

    /// Replaces an existing job definition.
    async fn update(&self, job: Job) -> Result<Job, AppError>;

    async fn set_disabled(&self, id: &str, disabled: bool) -> Result<Job, AppError>;

    async fn delete(&self, id: &str) -> Result<(), AppError>;

    /// Picks up changes made by other processes to the backing storage.
    /// Returns whether the jobs changed.
    async fn reload(&self) -> Result<bool, AppError> {
        Ok(false)
    }
}

/// On-disk layout of the jobs file (`[[jobs]]` tables).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobsFile {
    #[serde(default)]
    pub jobs: Vec<Job>,
}

impl JobsFile {
    pub async fn load_from_path(path: &Path) -> Result<Self, AppError> {
        let content = fs::read_to_string(path).await?;
        Ok(toml::from_str(&content)?)
    }

    pub async fn save_to_path(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }
}

/// In-memory [`JobRegistry`], optionally persisted to a TOML jobs file after
/// every mutation.
#[derive(Debug, Default)]
pub struct InMemoryJobRegistry {
    jobs: RwLock<BTreeMap<String, Job>>,
    path: Option<PathBuf>,
}

impl InMemoryJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry from already known jobs. Every job is validated.
    pub fn with_jobs(jobs: Vec<Job>) -> Result<Self, AppError> {
        Ok(Self {
            jobs: RwLock::new(index_jobs(jobs)?),
            path: None,
        })
    }

    /// Loads the jobs file at `path`; a missing file yields an empty registry
    /// that will create the file on the first mutation.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();
        let jobs = if path.exists() {
            let file = JobsFile::load_from_path(&path).await?;
            info!("Loaded {} job(s) from {}", file.jobs.len(), path.display());
            index_jobs(file.jobs)?
        } else {
            debug!("No jobs file at {}", path.display());
            BTreeMap::new()
        };
        Ok(Self {
            jobs: RwLock::new(jobs),
            path: Some(path),
        })
    }

    async fn persist(&self, jobs: &BTreeMap<String, Job>) -> Result<(), AppError> {
        match &self.path {
            Some(path) => {
                JobsFile {
                    jobs: jobs.values().cloned().collect(),
                }
                .save_to_path(path)
                .await
            }
            None => Ok(()),
        }
    }
}

fn index_jobs(jobs: Vec<Job>) -> Result<BTreeMap<String, Job>, AppError> {
    let mut indexed = BTreeMap::new();
    for job in jobs {
        validate_job(&job)?;
        if indexed.contains_key(&job.id) {
            let mut errors = ValidationErrors::new();
            errors.push("id", format!("duplicate job id '{}'", job.id));
            return Err(errors.into());
        }
        indexed.insert(job.id.clone(), job);
    }
    Ok(indexed)
}

#[async_trait]
impl JobRegistry for InMemoryJobRegistry {
    async fn list(&self) -> Result<Vec<Job>, AppError> {
        Ok(self.jobs.read().await.values().cloned().collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Job>, AppError> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn create(&self, job: Job) -> Result<Job, AppError> {
        validate_job(&job)?;
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            let mut errors = ValidationErrors::new();
            errors.push("id", format!("job '{}' already exists", job.id));
            return Err(errors.into());
        }
        jobs.insert(job.id.clone(), job.clone());
        self.persist(&jobs).await?;
        info!("Created job {} ({})", job.id, job.caching_type);
        Ok(job)
    }

    async fn update(&self, job: Job) -> Result<Job, AppError> {
        validate_job(&job)?;
        let mut jobs = self.jobs.write().await;
        if !jobs.contains_key(&job.id) {
            return Err(AppError::job_not_found(&job.id));
        }
        jobs.insert(job.id.clone(), job.clone());
        self.persist(&jobs).await?;
        info!("Updated job {}", job.id);
        Ok(job)
    }

    async fn set_disabled(&self, id: &str, disabled: bool) -> Result<Job, AppError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(id).ok_or_else(|| AppError::job_not_found(id))?;
        job.disabled = disabled;
        let job = job.clone();
        self.persist(&jobs).await?;
        info!(
            "Job {} {}",
            id,
            if disabled { "disabled" } else { "enabled" }
        );
        Ok(job)
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let mut jobs = self.jobs.write().await;
        if jobs.remove(id).is_none() {
            return Err(AppError::job_not_found(id));
        }
        self.persist(&jobs).await?;
        info!("Deleted job {}", id);
        Ok(())
    }

    /// Re-reads the jobs file. A missing file keeps the current jobs; an
    /// invalid one is reported and leaves them untouched as well.
    async fn reload(&self) -> Result<bool, AppError> {
        let Some(path) = &self.path else {
            return Ok(false);
        };
        if !path.exists() {
            return Ok(false);
        }
        let file = JobsFile::load_from_path(path).await?;
        let reloaded = index_jobs(file.jobs)?;

        let mut jobs = self.jobs.write().await;
        if *jobs == reloaded {
            return Ok(false);
        }
        info!("Reloaded {} job(s) from {}", reloaded.len(), path.display());
        *jobs = reloaded;
        Ok(true)
    }
}
