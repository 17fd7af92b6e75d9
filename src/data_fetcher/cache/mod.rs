//! Cache store for normalized league data.
//!
//! Readers are served exclusively from here; nothing in this module talks to
//! the network. Every write is an upsert that reports whether stored state
//! actually changed, so re-running a job on identical data is a no-op.

use async_trait::async_trait;

use crate::data_fetcher::models::{Class, Game, Table, TableScore, Week, WeekId};
use crate::error::StoreError;

pub mod memory;
pub mod snapshot;

pub use memory::InMemoryCacheStore;
pub use snapshot::CacheSnapshot;

/// Outcome of a batch game upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl UpsertSummary {
    pub fn changed(&self) -> bool {
        self.inserted + self.updated > 0
    }
}

/// Entity counts of a store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub classes: usize,
    pub weeks: usize,
    pub tables: usize,
    pub games: usize,
}

/// Persistence of classes, weeks, tables and games.
///
/// Each call is atomic with respect to the keys it touches. Writes return
/// `true` (or a summary with changes) only when stored state changed.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Inserts a class or refreshes its display names.
    async fn upsert_class(&self, class: Class) -> Result<bool, StoreError>;

    /// Inserts or updates a week. Storing a week with `current = true`
    /// clears the flag on every other week in the same write.
    async fn upsert_week(&self, week: Week) -> Result<bool, StoreError>;

    /// Replaces the standings of a known class. `updated_at` only moves when
    /// the scores differ from the stored ones.
    async fn upsert_table(&self, class_id: &str, scores: Vec<TableScore>)
    -> Result<bool, StoreError>;

    /// Upserts games of a known class and week by their natural key. Games
    /// missing from `games` are kept.
    async fn upsert_games(
        &self,
        class_id: &str,
        week_id: WeekId,
        games: Vec<Game>,
    ) -> Result<UpsertSummary, StoreError>;

    async fn get_table(&self, class_id: &str) -> Result<Option<Table>, StoreError>;

    /// Games of one class and week ordered by kickoff.
    async fn get_games(&self, class_id: &str, week_id: WeekId) -> Result<Vec<Game>, StoreError>;

    async fn get_current_week(&self) -> Result<Option<Week>, StoreError>;

    /// All classes ordered by id.
    async fn list_classes(&self) -> Result<Vec<Class>, StoreError>;

    /// All weeks ordered by date.
    async fn list_weeks(&self) -> Result<Vec<Week>, StoreError>;

    async fn stats(&self) -> Result<CacheStats, StoreError>;
}
