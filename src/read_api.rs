//! Read surface for consumers of the cached league data.
//!
//! Every call is answered from the cache store or the result log. Nothing
//! here touches the network, so readers keep getting the last good state
//! while the source is down.

use std::sync::Arc;

use crate::caching::models::CachingResult;
use crate::caching::result_log::ResultLog;
use crate::data_fetcher::cache::CacheStore;
use crate::data_fetcher::models::{Class, Game, Table, Week, WeekId};
use crate::error::StoreError;

#[derive(Clone)]
pub struct LeagueReader {
    store: Arc<dyn CacheStore>,
    results: Arc<dyn ResultLog>,
}

impl LeagueReader {
    pub fn new(store: Arc<dyn CacheStore>, results: Arc<dyn ResultLog>) -> Self {
        Self { store, results }
    }

    /// Standings of a class, `None` until a run has stored one.
    pub async fn get_table(&self, class_id: &str) -> Result<Option<Table>, StoreError> {
        self.store.get_table(class_id).await
    }

    /// Games of a class in one week ordered by kickoff.
    pub async fn get_games_for_week(
        &self,
        class_id: &str,
        week_id: WeekId,
    ) -> Result<Vec<Game>, StoreError> {
        self.store.get_games(class_id, week_id).await
    }

    pub async fn get_current_week(&self) -> Result<Option<Week>, StoreError> {
        self.store.get_current_week().await
    }

    pub async fn list_classes(&self) -> Result<Vec<Class>, StoreError> {
        self.store.list_classes().await
    }

    /// Most recent results of a job, newest first.
    pub async fn list_recent_results(
        &self,
        job_id: &str,
        limit: usize,
    ) -> Result<Vec<CachingResult>, StoreError> {
        self.results.list_recent(job_id, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caching::models::RunStatus;
    use crate::caching::result_log::InMemoryResultLog;
    use crate::data_fetcher::cache::InMemoryCacheStore;
    use crate::testing_utils::TestDataBuilder;
    use chrono::{Duration, TimeZone, Utc};

    async fn seeded_reader() -> LeagueReader {
        let store = Arc::new(InMemoryCacheStore::new());
        let week = TestDataBuilder::week_date();
        store
            .upsert_class(Class::new("c1", "M-LL", "Männer Landesliga"))
            .await
            .unwrap();
        store.upsert_week(Week::new(week, true)).await.unwrap();
        store
            .upsert_table(
                "c1",
                vec![
                    TestDataBuilder::table_score(1, "TV Alpha", 12),
                    TestDataBuilder::table_score(2, "SG Beta", 10),
                ],
            )
            .await
            .unwrap();

        let mut late = TestDataBuilder::game("c1", week, "TV Alpha", "SG Beta", None);
        late.scheduled_at += Duration::hours(2);
        let early = TestDataBuilder::game("c1", week, "HC Gamma", "TSV Delta", None);
        store
            .upsert_games("c1", week, vec![late, early])
            .await
            .unwrap();

        let results = Arc::new(InMemoryResultLog::new());
        let start = Utc.with_ymd_and_hms(2024, 9, 20, 10, 0, 0).unwrap();
        for minutes in 0..3 {
            results
                .append(TestDataBuilder::caching_result(
                    "tables",
                    start + Duration::minutes(minutes),
                    RunStatus::Success,
                ))
                .await
                .unwrap();
        }

        LeagueReader::new(store, results)
    }

    #[tokio::test]
    async fn test_reads_table_and_current_week() {
        let reader = seeded_reader().await;

        let table = reader.get_table("c1").await.unwrap().unwrap();
        assert_eq!(table.scores.len(), 2);
        assert_eq!(table.scores[0].team, "TV Alpha");
        assert!(reader.get_table("unknown").await.unwrap().is_none());

        let week = reader.get_current_week().await.unwrap().unwrap();
        assert_eq!(week.id(), TestDataBuilder::week_date());
        assert_eq!(reader.list_classes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_games_ordered_by_kickoff() {
        let reader = seeded_reader().await;
        let games = reader
            .get_games_for_week("c1", TestDataBuilder::week_date())
            .await
            .unwrap();
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].home_team, "HC Gamma");
        assert!(games[0].scheduled_at < games[1].scheduled_at);
    }

    #[tokio::test]
    async fn test_recent_results_are_limited() {
        let reader = seeded_reader().await;
        let results = reader.list_recent_results("tables", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].started_at > results[1].started_at);
        assert!(reader.list_recent_results("games", 5).await.unwrap().is_empty());
    }
}
