use super::league::{ClassId, WeekId};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Final or running score of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameScore {
    pub home: u32,
    pub away: u32,
}

/// A fixture of one class in one week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    #[serde(rename = "classId")]
    pub class_id: ClassId,
    #[serde(rename = "weekId")]
    pub week_id: WeekId,
    #[serde(rename = "externalId", default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(rename = "homeTeam")]
    pub home_team: String,
    #[serde(rename = "awayTeam")]
    pub away_team: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<GameScore>,
    #[serde(rename = "scheduledAt")]
    pub scheduled_at: NaiveDateTime,
}

/// Natural key deduplicating games across re-fetches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GameKey {
    pub class_id: ClassId,
    pub week_id: WeekId,
    pub home_team: String,
    pub away_team: String,
    pub scheduled_at: NaiveDateTime,
}

impl Game {
    pub fn key(&self) -> GameKey {
        GameKey {
            class_id: self.class_id.clone(),
            week_id: self.week_id,
            home_team: self.home_team.clone(),
            away_team: self.away_team.clone(),
            scheduled_at: self.scheduled_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn game(home: &str, away: &str, hour: u32) -> Game {
        let date = NaiveDate::from_ymd_opt(2024, 9, 21).unwrap();
        Game {
            class_id: "m-ll-1".to_string(),
            week_id: NaiveDate::from_ymd_opt(2024, 9, 16).unwrap(),
            external_id: None,
            home_team: home.to_string(),
            away_team: away.to_string(),
            score: None,
            scheduled_at: date.and_hms_opt(hour, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_key_ignores_score_and_external_id() {
        let a = game("TV Alpha", "SG Beta", 18);
        let mut b = a.clone();
        b.score = Some(GameScore { home: 30, away: 28 });
        b.external_id = Some("4711".to_string());
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_key_distinguishes_kickoff() {
        assert_ne!(
            game("TV Alpha", "SG Beta", 18).key(),
            game("TV Alpha", "SG Beta", 20).key()
        );
    }
}
