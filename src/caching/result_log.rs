//! Append-only audit trail of caching runs.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::models::CachingResult;
use crate::error::StoreError;

/// Storage interface for caching results. There is no update or delete path.
#[async_trait]
pub trait ResultLog: Send + Sync {
    async fn append(&self, result: CachingResult) -> Result<(), StoreError>;

    /// Returns at most `limit` results of `job_id`, newest first.
    async fn list_recent(&self, job_id: &str, limit: usize)
    -> Result<Vec<CachingResult>, StoreError>;
}

/// In-memory [`ResultLog`], optionally mirrored to a JSON Lines file.
#[derive(Debug, Default)]
pub struct InMemoryResultLog {
    results: RwLock<Vec<CachingResult>>,
    path: Option<PathBuf>,
}

impl InMemoryResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the log at `path`, loading existing records. Lines that do not
    /// decode are skipped with a warning.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let path_str = path.display().to_string();
        let mut results = Vec::new();

        if path.exists() {
            let content = fs::read_to_string(&path)
                .await
                .map_err(|e| StoreError::load(&path_str, e.to_string()))?;
            for (line_no, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<CachingResult>(line) {
                    Ok(result) => results.push(result),
                    Err(e) => warn!(
                        "Skipping corrupt result record at {}:{}: {}",
                        path_str,
                        line_no + 1,
                        e
                    ),
                }
            }
            info!("Loaded {} caching result(s) from {}", results.len(), path_str);
        }

        Ok(Self {
            results: RwLock::new(results),
            path: Some(path),
        })
    }

    async fn write_line(path: &Path, result: &CachingResult) -> Result<(), StoreError> {
        let path_str = path.display().to_string();
        let persist_err = |e: std::io::Error| StoreError::persist(&path_str, e.to_string());

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.map_err(persist_err)?;
        }

        let mut line = serde_json::to_string(result)
            .map_err(|e| StoreError::persist(&path_str, e.to_string()))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(persist_err)?;
        file.write_all(line.as_bytes()).await.map_err(persist_err)?;
        file.flush().await.map_err(persist_err)?;
        Ok(())
    }
}

#[async_trait]
impl ResultLog for InMemoryResultLog {
    /// The record is kept in memory even when the file write fails; the
    /// error is still returned so the caller can report it.
    async fn append(&self, result: CachingResult) -> Result<(), StoreError> {
        let mut results = self.results.write().await;
        debug!("Recorded caching result {} for job {}", result.id, result.job_id);
        results.push(result);
        match (&self.path, results.last()) {
            (Some(path), Some(result)) => Self::write_line(path, result).await,
            _ => Ok(()),
        }
    }

    async fn list_recent(
        &self,
        job_id: &str,
        limit: usize,
    ) -> Result<Vec<CachingResult>, StoreError> {
        let results = self.results.read().await;
        let mut matching: Vec<CachingResult> = results
            .iter()
            .filter(|r| r.job_id == job_id)
            .cloned()
            .collect();
        // Stable sort keeps append order for equal start times
        matching.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        matching.truncate(limit);
        Ok(matching)
    }
}
