use crate::data_fetcher::models::{ClassPageEnvelope, Game, GameScore, RawPayload, WeekId};
use crate::error::ParseError;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;
use tracing::{debug, warn};

use super::SkippedRow;
use super::fields::{decode_envelope, non_negative, optional_text, required_text};

/// Games extracted from a class page for one week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedGames {
    pub class_id: String,
    pub week_id: WeekId,
    pub games: Vec<Game>,
    pub skipped: Vec<SkippedRow>,
}

/// Parses the games of the selected round from a class page.
///
/// A page without a `futureGames` section has no games that week. Dates are
/// published as `dd.mm.yy` (or `dd.mm.yyyy`) with an optional `HH:MM` kickoff;
/// blank goal fields mean the game has no score yet.
pub fn parse_games(
    payload: &RawPayload,
    class_id: &str,
    week_id: WeekId,
) -> Result<ParsedGames, ParseError> {
    let envelope: ClassPageEnvelope = decode_envelope(payload)?;
    let rows = envelope
        .content
        .future_games
        .map(|list| list.games)
        .unwrap_or_default();

    let mut games = Vec::with_capacity(rows.len());
    let mut skipped = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        match parse_game_row(row, class_id, week_id) {
            Ok(game) => games.push(game),
            Err(reason) => {
                warn!(
                    "Skipping malformed game row {} for class {} week {}: {}",
                    index, class_id, week_id, reason
                );
                skipped.push(SkippedRow { index, reason });
            }
        }
    }

    if games.is_empty() && !skipped.is_empty() {
        return Err(ParseError::NoValidRows {
            url: payload.url.clone(),
            kind: "games".to_string(),
            skipped: skipped.len(),
        });
    }

    debug!(
        "Parsed games for class {} week {}: {} games, {} skipped",
        class_id,
        week_id,
        games.len(),
        skipped.len()
    );

    Ok(ParsedGames {
        class_id: class_id.to_string(),
        week_id,
        games,
        skipped,
    })
}

fn parse_game_row(row: &Value, class_id: &str, week_id: WeekId) -> Result<Game, String> {
    if !row.is_object() {
        return Err(format!("row is not an object: {row}"));
    }

    let home_team = required_text(row, "gHomeTeam")?;
    let away_team = required_text(row, "gGuestTeam")?;
    let date = parse_game_date(&required_text(row, "gDate")?)?;
    let time = match optional_text(row, "gTime")? {
        Some(t) => parse_game_time(&t)?,
        None => NaiveTime::MIN,
    };

    Ok(Game {
        class_id: class_id.to_string(),
        week_id,
        external_id: optional_text(row, "gID")?,
        home_team,
        away_team,
        score: parse_score(row)?,
        scheduled_at: NaiveDateTime::new(date, time),
    })
}

/// Parses `dd.mm.yy` or `dd.mm.yyyy`.
pub fn parse_game_date(raw: &str) -> Result<NaiveDate, String> {
    let format = match raw.rsplit('.').next().map(str::len) {
        Some(2) => "%d.%m.%y",
        _ => "%d.%m.%Y",
    };
    NaiveDate::parse_from_str(raw, format).map_err(|e| format!("invalid date {raw:?}: {e}"))
}

fn parse_game_time(raw: &str) -> Result<NaiveTime, String> {
    // Some pages append "h" to the kickoff time
    let cleaned = raw.trim_end_matches('h').trim();
    NaiveTime::parse_from_str(cleaned, "%H:%M").map_err(|e| format!("invalid time {raw:?}: {e}"))
}

fn parse_score(row: &Value) -> Result<Option<GameScore>, String> {
    let home = optional_text(row, "gHomeGoals")?;
    let away = optional_text(row, "gGuestGoals")?;

    match (home, away) {
        (None, None) => Ok(None),
        (Some(_), Some(_)) => Ok(Some(GameScore {
            home: non_negative(row, "gHomeGoals")?,
            away: non_negative(row, "gGuestGoals")?,
        })),
        _ => Err("incomplete score: only one side has goals".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing_utils::TestDataBuilder;
    use serde_json::json;

    fn week() -> WeekId {
        NaiveDate::from_ymd_opt(2024, 9, 16).unwrap()
    }

    #[test]
    fn test_parse_games_with_and_without_scores() {
        let body = TestDataBuilder::class_page_json(
            vec![],
            vec![
                TestDataBuilder::game_row_json("TV Alpha", "SG Beta", "21.09.24", "18:00", Some((31, 29))),
                TestDataBuilder::game_row_json("HC Gamma", "TSV Delta", "22.09.24", "17:30", None),
            ],
        );
        let parsed = parse_games(&RawPayload::new("u", body), "m-ll-1", week()).unwrap();

        assert_eq!(parsed.games.len(), 2);
        let first = &parsed.games[0];
        assert_eq!(first.class_id, "m-ll-1");
        assert_eq!(first.week_id, week());
        assert_eq!(first.score, Some(GameScore { home: 31, away: 29 }));
        assert_eq!(
            first.scheduled_at,
            NaiveDate::from_ymd_opt(2024, 9, 21)
                .unwrap()
                .and_hms_opt(18, 0, 0)
                .unwrap()
        );
        assert_eq!(parsed.games[1].score, None);
    }

    #[test]
    fn test_missing_future_games_means_no_games() {
        let payload = RawPayload::new("u", r#"[{"content":{"score":[]}}]"#);
        let parsed = parse_games(&payload, "c", week()).unwrap();
        assert!(parsed.games.is_empty());
        assert!(parsed.skipped.is_empty());
    }

    #[test]
    fn test_four_digit_year_and_blank_time() {
        let mut row = TestDataBuilder::game_row_json("A", "B", "05.10.2024", "", None);
        row["gTime"] = json!(" ");
        let body = TestDataBuilder::class_page_json(vec![], vec![row]);

        let parsed = parse_games(&RawPayload::new("u", body), "c", week()).unwrap();
        assert_eq!(
            parsed.games[0].scheduled_at,
            NaiveDate::from_ymd_opt(2024, 10, 5)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let mut bad_date = TestDataBuilder::game_row_json("A", "B", "31.02.24", "18:00", None);
        bad_date["gID"] = json!("1");
        let mut negative = TestDataBuilder::game_row_json("C", "D", "21.09.24", "18:00", Some((3, 1)));
        negative["gGuestGoals"] = json!("-1");
        let half_score = json!({
            "gHomeTeam": "E", "gGuestTeam": "F", "gDate": "21.09.24", "gTime": "20:00",
            "gHomeGoals": "25", "gGuestGoals": " "
        });
        let good = TestDataBuilder::game_row_json("G", "H", "21.09.24", "19:00", None);

        let body = TestDataBuilder::class_page_json(vec![], vec![bad_date, negative, half_score, good]);
        let parsed = parse_games(&RawPayload::new("u", body), "c", week()).unwrap();

        assert_eq!(parsed.games.len(), 1);
        assert_eq!(parsed.games[0].home_team, "G");
        let indices: Vec<usize> = parsed.skipped.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(parsed.skipped[2].reason.contains("incomplete score"));
    }

    #[test]
    fn test_all_game_rows_malformed_is_an_error() {
        let body = TestDataBuilder::class_page_json(vec![], vec![json!({"gHomeTeam": "A"})]);
        assert!(matches!(
            parse_games(&RawPayload::new("u", body), "c", week()),
            Err(ParseError::NoValidRows { skipped: 1, .. })
        ));
    }

    #[test]
    fn test_parse_game_date_formats() {
        assert_eq!(
            parse_game_date("01.03.25"),
            Ok(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
        );
        assert_eq!(
            parse_game_date("01.03.2025"),
            Ok(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
        );
        assert!(parse_game_date("2025-03-01").is_err());
    }

    #[test]
    fn test_kickoff_with_suffix() {
        assert_eq!(
            parse_game_time("18:30h"),
            Ok(NaiveTime::from_hms_opt(18, 30, 0).unwrap())
        );
    }
}
