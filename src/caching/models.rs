use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data_fetcher::models::{ClassId, WeekId};
use crate::jobs::models::CachingType;

/// Aggregate outcome of one caching run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Success,
    Partial,
    Failure,
}

impl RunStatus {
    /// Derives the status of a run whose preconditions held.
    pub fn from_counts(attempted: usize, failed: usize) -> Self {
        if failed == 0 {
            RunStatus::Success
        } else if failed >= attempted {
            RunStatus::Failure
        } else {
            RunStatus::Partial
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "SUCCESS",
            RunStatus::Partial => "PARTIAL",
            RunStatus::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Immutable audit record of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachingResult {
    pub id: String,
    #[serde(rename = "jobId")]
    pub job_id: String,
    /// `None` when the job could not be resolved
    #[serde(rename = "cachingType")]
    pub caching_type: Option<CachingType>,
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "finishedAt")]
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    #[serde(rename = "unitsAttempted")]
    pub units_attempted: usize,
    #[serde(rename = "unitsFailed")]
    pub units_failed: usize,
    #[serde(rename = "errorSummaries", default)]
    pub error_summaries: Vec<String>,
}

impl CachingResult {
    /// Creates an identifier that sorts by start time.
    pub fn generate_id(started_at: DateTime<Utc>) -> String {
        let suffix: u32 = rand::rng().random();
        format!("{}-{:08x}", started_at.format("%Y%m%dT%H%M%S%3fZ"), suffix)
    }

    /// Result of a run that never attempted a unit because a precondition
    /// failed.
    pub fn precondition_failure(
        job_id: impl Into<String>,
        caching_type: Option<CachingType>,
        started_at: DateTime<Utc>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Self::generate_id(started_at),
            job_id: job_id.into(),
            caching_type,
            started_at,
            finished_at: Utc::now(),
            status: RunStatus::Failure,
            units_attempted: 0,
            units_failed: 0,
            error_summaries: vec![reason.into()],
        }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// One (class[, week]) combination processed within a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CachingUnit {
    Table { class_id: ClassId },
    Games { class_id: ClassId, week_id: WeekId },
    Full { class_id: ClassId, week_id: WeekId },
}

impl fmt::Display for CachingUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CachingUnit::Table { class_id } => write!(f, "table {class_id}"),
            CachingUnit::Games { class_id, week_id } => write!(f, "games {class_id} {week_id}"),
            CachingUnit::Full { class_id, week_id } => write!(f, "full {class_id} {week_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    #[test]
    fn test_status_from_counts() {
        assert_eq!(RunStatus::from_counts(0, 0), RunStatus::Success);
        assert_eq!(RunStatus::from_counts(5, 0), RunStatus::Success);
        assert_eq!(RunStatus::from_counts(5, 3), RunStatus::Partial);
        assert_eq!(RunStatus::from_counts(5, 5), RunStatus::Failure);
    }

    #[test]
    fn test_result_serializes_status_uppercase() {
        let started = Utc.with_ymd_and_hms(2024, 9, 16, 10, 0, 0).unwrap();
        let result = CachingResult::precondition_failure(
            "games",
            Some(CachingType::Games),
            started,
            "no current week",
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "FAILURE");
        assert_eq!(json["cachingType"], "GAMES");
        assert_eq!(json["unitsAttempted"], 0);
        assert!(result.id.starts_with("20240916T100000000Z-"));
    }

    #[test]
    fn test_unit_display() {
        let week = NaiveDate::from_ymd_opt(2024, 9, 16).unwrap();
        let unit = CachingUnit::Games {
            class_id: "c1".to_string(),
            week_id: week,
        };
        assert_eq!(unit.to_string(), "games c1 2024-09-16");
        assert_eq!(
            CachingUnit::Table {
                class_id: "c1".to_string()
            }
            .to_string(),
            "table c1"
        );
    }
}
