//! Wire shapes of the handball4all JSON service.
//!
//! The service wraps every answer in a one-element array. Score and game rows
//! are kept as raw JSON values so the normalizer can validate them one by one
//! and skip malformed rows instead of rejecting the whole payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unparsed response body together with the URL it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload {
    pub url: String,
    pub body: String,
}

impl RawPayload {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
        }
    }
}

/// Class page (`cmd=ps`): standings plus the games of the selected round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassPageEnvelope {
    #[serde(default)]
    pub head: Option<ClassPageHead>,
    pub content: ClassPageContent,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClassPageHead {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sname: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassPageContent {
    #[serde(default)]
    pub score: Option<Vec<Value>>,
    #[serde(rename = "futureGames", default)]
    pub future_games: Option<GameList>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GameList {
    #[serde(default)]
    pub games: Vec<Value>,
}

/// Organization page (`cmd=po`): class catalogue and the active round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEnvelope {
    #[serde(default)]
    pub menu: Option<IndexMenu>,
    pub content: IndexContent,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IndexMenu {
    #[serde(default)]
    pub dt: Option<PeriodMenu>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PeriodMenu {
    #[serde(default)]
    pub selected: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexContent {
    #[serde(default)]
    pub classes: Option<Vec<Value>>,
}
