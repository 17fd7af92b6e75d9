use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// External stable identifier of a league class
pub type ClassId = String;

/// A week is identified by the date of its round
pub type WeekId = NaiveDate;

/// A league or age-group bracket as published by the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub id: ClassId,
    #[serde(rename = "shortName")]
    pub short_name: String,
    #[serde(rename = "longName")]
    pub long_name: String,
}

impl Class {
    pub fn new(
        id: impl Into<String>,
        short_name: impl Into<String>,
        long_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            short_name: short_name.into(),
            long_name: long_name.into(),
        }
    }
}

/// A scheduling round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Week {
    pub date: NaiveDate,
    pub current: bool,
}

impl Week {
    pub fn new(date: NaiveDate, current: bool) -> Self {
        Self { date, current }
    }

    pub fn id(&self) -> WeekId {
        self.date
    }
}
