use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::caching::models::{CachingResult, RunStatus};
use crate::data_fetcher::api::LeagueSource;
use crate::data_fetcher::models::{Game, GameScore, RawPayload, TableScore, Week, WeekId};
use crate::error::FetchError;
use crate::jobs::models::Job;
use crate::jobs::scheduler::{Clock, JobRunner};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Test utilities for creating mock data and testing scenarios
pub struct TestDataBuilder;

impl TestDataBuilder {
    /// Creates a class page body in the wire format of the source
    pub fn class_page_json(scores: Vec<Value>, games: Vec<Value>) -> String {
        json!([{
            "head": {"name": "Test class", "sname": "TC"},
            "content": {
                "score": scores,
                "futureGames": {"games": games}
            }
        }])
        .to_string()
    }

    /// Creates a class page with one standings row per team and no games
    pub fn class_page_with_table(teams: &[&str]) -> String {
        let rows = teams
            .iter()
            .enumerate()
            .map(|(i, team)| {
                let rank = i as u32 + 1;
                Self::score_row_json(rank, team, 2 * (teams.len() as u32 - i as u32))
            })
            .collect();
        Self::class_page_json(rows, vec![])
    }

    /// Creates one standings row in the wire format
    pub fn score_row_json(rank: u32, team: &str, points: u32) -> Value {
        let played = 10;
        let won = (points / 2).min(played);
        json!({
            "tabScore": rank,
            "tabTeamname": team,
            "numPlayedGames": played,
            "numWonGames": won,
            "numEqualGames": 0,
            "numLostGames": played - won,
            "numGoalsShot": 250,
            "numGoalsGot": 240,
            "pointsPlus": points,
            "pointsMinus": (2 * played).saturating_sub(points),
        })
    }

    /// Creates one game row in the wire format. Goals are published as
    /// strings, blank when the game has not been played.
    pub fn game_row_json(
        home: &str,
        away: &str,
        date: &str,
        time: &str,
        score: Option<(u32, u32)>,
    ) -> Value {
        let (home_goals, away_goals) = match score {
            Some((h, a)) => (h.to_string(), a.to_string()),
            None => (" ".to_string(), " ".to_string()),
        };
        json!({
            "gID": "",
            "gDate": date,
            "gTime": time,
            "gHomeTeam": home,
            "gGuestTeam": away,
            "gHomeGoals": home_goals,
            "gGuestGoals": away_goals,
        })
    }

    /// Creates an organization page body listing classes and the active round
    pub fn index_json(classes: Vec<Value>, selected: Option<&str>) -> String {
        json!([{
            "menu": {"dt": {"selected": selected}},
            "content": {"classes": classes}
        }])
        .to_string()
    }

    /// Creates one class row of the organization page
    pub fn class_row_json(id: &str, short_name: &str, long_name: &str) -> Value {
        json!({
            "gClassID": id,
            "gClassSname": short_name,
            "gClassLname": long_name,
        })
    }

    /// Creates a normalized standings row
    pub fn table_score(rank: u32, team: &str, points: u32) -> TableScore {
        TableScore {
            rank,
            team: team.to_string(),
            played: 10,
            won: points / 2,
            drawn: 0,
            lost: 10u32.saturating_sub(points / 2),
            goals_for: 250,
            goals_against: 240,
            points,
            points_against: 20u32.saturating_sub(points),
        }
    }

    /// Creates a normalized game kicking off at 18:00 five days into the week
    pub fn game(
        class_id: &str,
        week_id: WeekId,
        home: &str,
        away: &str,
        score: Option<GameScore>,
    ) -> Game {
        let kickoff = week_id + ChronoDuration::days(5);
        Game {
            class_id: class_id.to_string(),
            week_id,
            external_id: None,
            home_team: home.to_string(),
            away_team: away.to_string(),
            score,
            scheduled_at: kickoff.and_hms_opt(18, 0, 0).unwrap_or_default(),
        }
    }

    /// Creates a finished caching result without units
    pub fn caching_result(
        job_id: &str,
        started_at: DateTime<Utc>,
        status: RunStatus,
    ) -> CachingResult {
        CachingResult {
            id: CachingResult::generate_id(started_at),
            job_id: job_id.to_string(),
            caching_type: None,
            started_at,
            finished_at: started_at + ChronoDuration::seconds(1),
            status,
            units_attempted: 0,
            units_failed: 0,
            error_summaries: vec![],
        }
    }

    /// Date used as the current week in fixtures
    pub fn week_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 16).unwrap_or_default()
    }
}

/// In-process [`LeagueSource`] with canned answers per class.
///
/// Unknown classes answer with a permanent not-found error.
#[derive(Debug, Default)]
pub struct FakeSource {
    index: Mutex<Option<Result<String, FetchError>>>,
    classes: Mutex<HashMap<String, Result<String, FetchError>>>,
    delays: Mutex<HashMap<String, Duration>>,
    requests: Mutex<Vec<(String, Option<WeekId>)>>,
    index_calls: AtomicUsize,
    class_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_index(&self, body: impl Into<String>) {
        *lock(&self.index) = Some(Ok(body.into()));
    }

    pub fn set_index_error(&self, error: FetchError) {
        *lock(&self.index) = Some(Err(error));
    }

    pub fn set_class(&self, class_id: &str, body: impl Into<String>) {
        lock(&self.classes).insert(class_id.to_string(), Ok(body.into()));
    }

    pub fn set_class_error(&self, class_id: &str, error: FetchError) {
        lock(&self.classes).insert(class_id.to_string(), Err(error));
    }

    /// Delays every answer for `class_id`
    pub fn set_delay(&self, class_id: &str, delay: Duration) {
        lock(&self.delays).insert(class_id.to_string(), delay);
    }

    pub fn index_calls(&self) -> usize {
        self.index_calls.load(Ordering::SeqCst)
    }

    pub fn class_calls(&self) -> usize {
        self.class_calls.load(Ordering::SeqCst)
    }

    /// Class requests in the order they were made
    pub fn requests(&self) -> Vec<(String, Option<WeekId>)> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl LeagueSource for FakeSource {
    async fn fetch_index(&self) -> Result<RawPayload, FetchError> {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        let url = "fake://index";
        match lock(&self.index).clone() {
            Some(Ok(body)) => Ok(RawPayload::new(url, body)),
            Some(Err(e)) => Err(e),
            None => Err(FetchError::not_found(url)),
        }
    }

    async fn fetch_class(
        &self,
        class_id: &str,
        week: Option<WeekId>,
    ) -> Result<RawPayload, FetchError> {
        self.class_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push((class_id.to_string(), week));

        let delay = lock(&self.delays).get(class_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let url = format!("fake://class/{class_id}");
        let answer = lock(&self.classes).get(class_id).cloned();
        match answer {
            Some(Ok(body)) => Ok(RawPayload::new(url, body)),
            Some(Err(e)) => Err(e),
            None => Err(FetchError::not_found(url)),
        }
    }
}

/// [`JobRunner`] that counts runs and can block or panic on demand.
#[derive(Debug, Default)]
pub struct CountingRunner {
    calls: AtomicUsize,
    gate: Option<Semaphore>,
    panic: bool,
}

impl CountingRunner {
    /// Runs finish immediately
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs wait for [`CountingRunner::release`] before finishing
    pub fn blocking() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    /// Runs panic after being counted
    pub fn panicking() -> Self {
        Self {
            panic: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Lets one blocked run finish
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// Yields until at least `count` runs have started
    pub async fn wait_until_started(&self, count: usize) {
        while self.calls() < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl JobRunner for CountingRunner {
    async fn run(&self, job: &Job) -> CachingResult {
        let started_at = Utc::now();
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic {
            panic!("runner failure for job {}", job.id);
        }
        if let Some(gate) = &self.gate
            && let Ok(permit) = gate.acquire().await
        {
            permit.forget();
        }
        let mut result = TestDataBuilder::caching_result(&job.id, started_at, RunStatus::Success);
        result.caching_type = Some(job.caching_type);
        result
    }
}

/// Clock pinned to one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Clock that advances with tokio time, so paused-time tests can drive cron
/// schedules deterministically.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: DateTime<Utc>,
    started: tokio::time::Instant,
}

impl TokioClock {
    pub fn starting_at(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = ChronoDuration::from_std(self.started.elapsed())
            .unwrap_or_else(|_| ChronoDuration::zero());
        self.origin + elapsed
    }
}

/// Property-based testing utilities
pub struct PropertyTesting;

impl PropertyTesting {
    /// Checks that at most one week is flagged as current
    pub fn validate_weeks(weeks: &[Week]) -> Result<(), String> {
        let current = weeks.iter().filter(|w| w.current).count();
        if current > 1 {
            return Err(format!("{current} weeks are flagged as current"));
        }
        Ok(())
    }

    /// Checks that a caching result is internally consistent
    pub fn validate_caching_result(result: &CachingResult) -> Result<(), String> {
        if result.units_failed > result.units_attempted {
            return Err(format!(
                "{} failed units out of {} attempted",
                result.units_failed, result.units_attempted
            ));
        }
        if result.finished_at < result.started_at {
            return Err("Result finished before it started".to_string());
        }

        match result.status {
            RunStatus::Success if result.units_failed > 0 => {
                Err("Successful run cannot have failed units".to_string())
            }
            RunStatus::Partial
                if result.units_failed == 0 || result.units_failed == result.units_attempted =>
            {
                Err("Partial run needs some but not all units failed".to_string())
            }
            RunStatus::Failure
                if result.units_attempted > 0 && result.units_failed < result.units_attempted =>
            {
                Err("Failed run cannot have successful units".to_string())
            }
            _ => Ok(()),
        }
    }
}
