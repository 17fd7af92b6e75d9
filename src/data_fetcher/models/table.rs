use super::league::ClassId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One standings row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableScore {
    pub rank: u32,
    pub team: String,
    pub played: u32,
    pub won: u32,
    pub drawn: u32,
    pub lost: u32,
    #[serde(rename = "goalsFor")]
    pub goals_for: u32,
    #[serde(rename = "goalsAgainst")]
    pub goals_against: u32,
    pub points: u32,
    #[serde(rename = "pointsAgainst")]
    pub points_against: u32,
}

/// Latest standings of one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    #[serde(rename = "classId")]
    pub class_id: ClassId,
    pub scores: Vec<TableScore>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}
