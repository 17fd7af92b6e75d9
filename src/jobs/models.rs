use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of data a job refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CachingType {
    /// Class and current-week discovery, then tables and games of every class
    Full,
    /// Games of every class for the current week
    Games,
    /// Standings of every class
    Table,
}

impl CachingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CachingType::Full => "FULL",
            CachingType::Games => "GAMES",
            CachingType::Table => "TABLE",
        }
    }

    /// Whether the job cannot run without a current week.
    pub fn needs_current_week(&self) -> bool {
        matches!(self, CachingType::Full | CachingType::Games)
    }
}

impl fmt::Display for CachingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for CachingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FULL" => Ok(CachingType::Full),
            "GAMES" => Ok(CachingType::Games),
            "TABLE" => Ok(CachingType::Table),
            other => Err(format!("unknown caching type: {other}")),
        }
    }
}

/// A scheduled caching job as configured by an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub caching_type: CachingType,
    /// Five-field cron expression evaluated in UTC
    #[serde(rename = "cron")]
    pub cron_expression: String,
    #[serde(default)]
    pub disabled: bool,
}

impl Job {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        caching_type: CachingType,
        cron_expression: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            caching_type,
            cron_expression: cron_expression.into(),
            disabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.disabled
    }
}
