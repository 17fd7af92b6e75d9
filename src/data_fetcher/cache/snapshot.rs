//! JSON snapshot of the cache store

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::data_fetcher::models::{Class, Game, Table, Week};
use crate::error::StoreError;

/// Serialized form of the whole store. Lists keep the file stable and easy
/// to diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    #[serde(default)]
    pub classes: Vec<Class>,
    #[serde(default)]
    pub weeks: Vec<Week>,
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub games: Vec<Game>,
}

impl CacheSnapshot {
    /// Reads a snapshot. A missing file yields `Ok(None)`.
    pub async fn load(path: &Path) -> Result<Option<Self>, StoreError> {
        let path_str = path.display().to_string();
        if !path.exists() {
            debug!("No cache snapshot at {}", path_str);
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::load(&path_str, e.to_string()))?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        let snapshot: CacheSnapshot = serde_json::from_str(&content)
            .map_err(|e| StoreError::load(&path_str, e.to_string()))?;
        info!(
            "Loaded cache snapshot from {}: {} classes, {} weeks, {} tables, {} games",
            path_str,
            snapshot.classes.len(),
            snapshot.weeks.len(),
            snapshot.tables.len(),
            snapshot.games.len()
        );
        Ok(Some(snapshot))
    }

    /// Writes the snapshot to a temporary sibling file and renames it over
    /// `path`, so readers never observe a half-written file.
    pub async fn save(&self, path: &Path) -> Result<(), StoreError> {
        let path_str = path.display().to_string();
        let persist_err = |e: std::io::Error| StoreError::persist(&path_str, e.to_string());

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.map_err(persist_err)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| StoreError::persist(&path_str, e.to_string()))?;

        let tmp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp_path).await.map_err(persist_err)?;
        file.write_all(content.as_bytes())
            .await
            .map_err(persist_err)?;
        file.flush().await.map_err(persist_err)?;
        drop(file);

        fs::rename(&tmp_path, path).await.map_err(persist_err)?;
        debug!("Wrote cache snapshot to {}", path_str);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_snapshot_is_none() {
        let dir = tempdir().unwrap();
        let loaded = CacheSnapshot::load(&dir.path().join("absent.json"))
            .await
            .unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("snapshot.json");
        let snapshot = CacheSnapshot {
            classes: vec![Class::new("1", "M-LL", "Männer Landesliga")],
            weeks: vec![Week::new(NaiveDate::from_ymd_opt(2024, 9, 16).unwrap(), true)],
            ..Default::default()
        };

        snapshot.save(&path).await.unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = CacheSnapshot::load(&path).await.unwrap();
        assert_eq!(loaded, Some(snapshot));
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        assert!(matches!(
            CacheSnapshot::load(&path).await,
            Err(StoreError::Load { .. })
        ));
    }
}
