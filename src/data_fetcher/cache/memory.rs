use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use super::snapshot::CacheSnapshot;
use super::{CacheStats, CacheStore, UpsertSummary};
use crate::data_fetcher::models::{
    Class, ClassId, Game, GameKey, Table, TableScore, Week, WeekId,
};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct StoreState {
    classes: BTreeMap<ClassId, Class>,
    weeks: BTreeMap<WeekId, Week>,
    tables: BTreeMap<ClassId, Table>,
    games: BTreeMap<GameKey, Game>,
    /// Bumped on every change; compared against the last saved generation
    generation: u64,
}

impl StoreState {
    fn from_snapshot(snapshot: CacheSnapshot) -> Self {
        let mut state = StoreState::default();
        for class in snapshot.classes {
            state.classes.insert(class.id.clone(), class);
        }
        for week in snapshot.weeks {
            state.weeks.insert(week.date, week);
        }
        for table in snapshot.tables {
            state.tables.insert(table.class_id.clone(), table);
        }
        for game in snapshot.games {
            state.games.insert(game.key(), game);
        }

        // A hand-edited snapshot may flag several weeks; the latest one wins.
        let current: Vec<WeekId> = state
            .weeks
            .values()
            .filter(|w| w.current)
            .map(|w| w.date)
            .collect();
        if current.len() > 1 {
            warn!(
                "Snapshot flags {} weeks as current, keeping only the latest",
                current.len()
            );
            let latest = current.iter().max().copied();
            for week in state.weeks.values_mut() {
                week.current = Some(week.date) == latest;
            }
        }
        state
    }

    /// Applies `week`, clearing `current` on every other week when it is set.
    fn apply_week(&mut self, week: Week) -> bool {
        let mut changed = false;

        if week.current {
            for other in self.weeks.values_mut() {
                if other.date != week.date && other.current {
                    info!("Week {} is no longer current", other.date);
                    other.current = false;
                    changed = true;
                }
            }
        }

        if self.weeks.get(&week.date) != Some(&week) {
            if week.current {
                info!("Week {} is now current", week.date);
            }
            self.weeks.insert(week.date, week);
            changed = true;
        }

        if changed {
            self.generation += 1;
        }
        changed
    }

    fn apply_games(
        &mut self,
        class_id: &str,
        week_id: WeekId,
        games: Vec<Game>,
    ) -> Result<UpsertSummary, StoreError> {
        if !self.classes.contains_key(class_id) {
            return Err(StoreError::UnknownClass(class_id.to_string()));
        }
        if !self.weeks.contains_key(&week_id) {
            return Err(StoreError::UnknownWeek(week_id));
        }

        let mut summary = UpsertSummary::default();
        for mut game in games {
            game.class_id = class_id.to_string();
            game.week_id = week_id;
            let key = game.key();
            match self.games.get(&key) {
                Some(existing) if *existing == game => summary.unchanged += 1,
                Some(_) => {
                    self.games.insert(key, game);
                    summary.updated += 1;
                }
                None => {
                    self.games.insert(key, game);
                    summary.inserted += 1;
                }
            }
        }

        debug!(
            "Games for class {} week {}: {} inserted, {} updated, {} unchanged",
            class_id, week_id, summary.inserted, summary.updated, summary.unchanged
        );
        if summary.changed() {
            self.generation += 1;
        }
        Ok(summary)
    }

    fn to_snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            classes: self.classes.values().cloned().collect(),
            weeks: self.weeks.values().copied().collect(),
            tables: self.tables.values().cloned().collect(),
            games: self.games.values().cloned().collect(),
        }
    }
}

/// In-memory [`CacheStore`] guarded by a single `RwLock`, optionally mirrored
/// to a JSON snapshot file after every change.
///
/// The snapshot is written outside the state lock. Writers queued behind a
/// save find their change already on disk and return without writing again.
/// A failed save leaves the store dirty, and the next call retries it even
/// when that call changes nothing.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    state: RwLock<StoreState>,
    snapshot_path: Option<PathBuf>,
    saved_generation: Mutex<u64>,
}

impl InMemoryCacheStore {
    /// Creates an empty store without persistence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store bound to `path`, loading the snapshot if one exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let state = match CacheSnapshot::load(&path).await? {
            Some(snapshot) => StoreState::from_snapshot(snapshot),
            None => StoreState::default(),
        };
        Ok(Self {
            state: RwLock::new(state),
            snapshot_path: Some(path),
            saved_generation: Mutex::new(0),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Writes pending changes to the snapshot file, if any.
    pub async fn flush(&self) -> Result<(), StoreError> {
        self.persist().await
    }

    /// Saves the current state if it is newer than the last saved snapshot.
    /// Must be called without holding the state lock.
    async fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let mut saved = self.saved_generation.lock().await;
        let (generation, snapshot) = {
            let state = self.state.read().await;
            if state.generation == *saved {
                return Ok(());
            }
            (state.generation, state.to_snapshot())
        };
        snapshot.save(path).await?;
        debug!("Snapshot generation {} saved", generation);
        *saved = generation;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    #[instrument(skip(self, class), fields(class_id = %class.id))]
    async fn upsert_class(&self, class: Class) -> Result<bool, StoreError> {
        let changed = {
            let mut state = self.state.write().await;
            if state.classes.get(&class.id) == Some(&class) {
                false
            } else {
                debug!("Storing class {} ({})", class.id, class.short_name);
                state.classes.insert(class.id.clone(), class);
                state.generation += 1;
                true
            }
        };
        self.persist().await?;
        Ok(changed)
    }

    #[instrument(skip(self), fields(date = %week.date, current = week.current))]
    async fn upsert_week(&self, week: Week) -> Result<bool, StoreError> {
        let changed = self.state.write().await.apply_week(week);
        self.persist().await?;
        Ok(changed)
    }

    #[instrument(skip(self, scores), fields(rows = scores.len()))]
    async fn upsert_table(
        &self,
        class_id: &str,
        scores: Vec<TableScore>,
    ) -> Result<bool, StoreError> {
        let changed = {
            let mut state = self.state.write().await;
            if !state.classes.contains_key(class_id) {
                return Err(StoreError::UnknownClass(class_id.to_string()));
            }
            if state
                .tables
                .get(class_id)
                .is_some_and(|table| table.scores == scores)
            {
                false
            } else {
                state.tables.insert(
                    class_id.to_string(),
                    Table {
                        class_id: class_id.to_string(),
                        scores,
                        updated_at: Utc::now(),
                    },
                );
                state.generation += 1;
                true
            }
        };
        self.persist().await?;
        Ok(changed)
    }

    #[instrument(skip(self, games), fields(games = games.len()))]
    async fn upsert_games(
        &self,
        class_id: &str,
        week_id: WeekId,
        games: Vec<Game>,
    ) -> Result<UpsertSummary, StoreError> {
        let summary = self
            .state
            .write()
            .await
            .apply_games(class_id, week_id, games)?;
        self.persist().await?;
        Ok(summary)
    }

    async fn get_table(&self, class_id: &str) -> Result<Option<Table>, StoreError> {
        Ok(self.state.read().await.tables.get(class_id).cloned())
    }

    async fn get_games(&self, class_id: &str, week_id: WeekId) -> Result<Vec<Game>, StoreError> {
        let state = self.state.read().await;
        let mut games: Vec<Game> = state
            .games
            .values()
            .filter(|g| g.class_id == class_id && g.week_id == week_id)
            .cloned()
            .collect();
        games.sort_by(|a, b| {
            a.scheduled_at
                .cmp(&b.scheduled_at)
                .then_with(|| a.home_team.cmp(&b.home_team))
        });
        Ok(games)
    }

    async fn get_current_week(&self) -> Result<Option<Week>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .weeks
            .values()
            .find(|w| w.current)
            .copied())
    }

    async fn list_classes(&self) -> Result<Vec<Class>, StoreError> {
        Ok(self.state.read().await.classes.values().cloned().collect())
    }

    async fn list_weeks(&self) -> Result<Vec<Week>, StoreError> {
        Ok(self.state.read().await.weeks.values().copied().collect())
    }

    async fn stats(&self) -> Result<CacheStats, StoreError> {
        let state = self.state.read().await;
        Ok(CacheStats {
            classes: state.classes.len(),
            weeks: state.weeks.len(),
            tables: state.tables.len(),
            games: state.games.len(),
        })
    }
}
