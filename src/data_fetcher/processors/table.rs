use crate::data_fetcher::models::{ClassPageEnvelope, RawPayload, TableScore};
use crate::error::ParseError;
use serde_json::Value;
use tracing::{debug, warn};

use super::SkippedRow;
use super::fields::{decode_envelope, non_negative, required_text};

/// Standings extracted from a class page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTable {
    pub class_id: String,
    pub scores: Vec<TableScore>,
    pub skipped: Vec<SkippedRow>,
}

/// Parses the standings section of a class page.
///
/// Rows keep the order the source publishes them in. Rows with missing or
/// negative numbers are skipped and reported in `skipped`; a payload whose
/// rows are all malformed is rejected so that the last good table survives.
///
/// # Errors
/// * `ParseError::MalformedJson` / `UnexpectedShape` - the envelope cannot be decoded
/// * `ParseError::MissingField` - the `content.score` section is absent
/// * `ParseError::NoValidRows` - rows were present but none passed validation
pub fn parse_table(payload: &RawPayload, class_id: &str) -> Result<ParsedTable, ParseError> {
    let envelope: ClassPageEnvelope = decode_envelope(payload)?;
    let rows = envelope
        .content
        .score
        .ok_or_else(|| ParseError::missing_field(&payload.url, "content.score"))?;

    let mut scores = Vec::with_capacity(rows.len());
    let mut skipped = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        match parse_score_row(row) {
            Ok(score) => scores.push(score),
            Err(reason) => {
                warn!(
                    "Skipping malformed score row {} for class {}: {}",
                    index, class_id, reason
                );
                skipped.push(SkippedRow { index, reason });
            }
        }
    }

    if scores.is_empty() && !skipped.is_empty() {
        return Err(ParseError::NoValidRows {
            url: payload.url.clone(),
            kind: "scores".to_string(),
            skipped: skipped.len(),
        });
    }

    debug!(
        "Parsed table for class {}: {} rows, {} skipped",
        class_id,
        scores.len(),
        skipped.len()
    );

    Ok(ParsedTable {
        class_id: class_id.to_string(),
        scores,
        skipped,
    })
}

fn parse_score_row(row: &Value) -> Result<TableScore, String> {
    if !row.is_object() {
        return Err(format!("row is not an object: {row}"));
    }

    let rank = non_negative(row, "tabScore")?;
    if rank == 0 {
        return Err("'tabScore' must be at least 1".to_string());
    }

    Ok(TableScore {
        rank,
        team: required_text(row, "tabTeamname")?,
        played: non_negative(row, "numPlayedGames")?,
        won: non_negative(row, "numWonGames")?,
        drawn: non_negative(row, "numEqualGames")?,
        lost: non_negative(row, "numLostGames")?,
        goals_for: non_negative(row, "numGoalsShot")?,
        goals_against: non_negative(row, "numGoalsGot")?,
        points: non_negative(row, "pointsPlus")?,
        points_against: non_negative(row, "pointsMinus")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing_utils::TestDataBuilder;
    use serde_json::json;

    #[test]
    fn test_parse_table_keeps_source_order() {
        let body = TestDataBuilder::class_page_json(
            vec![
                TestDataBuilder::score_row_json(1, "TV Alpha", 10),
                TestDataBuilder::score_row_json(2, "SG Beta", 8),
            ],
            vec![],
        );
        let parsed = parse_table(&RawPayload::new("u", body), "m-ll-1").unwrap();

        assert_eq!(parsed.class_id, "m-ll-1");
        assert_eq!(parsed.scores.len(), 2);
        assert_eq!(parsed.scores[0].team, "TV Alpha");
        assert_eq!(parsed.scores[0].points, 10);
        assert_eq!(parsed.scores[1].rank, 2);
        assert!(parsed.skipped.is_empty());
    }

    #[test]
    fn test_one_malformed_row_among_ten_is_skipped_and_counted() {
        let mut rows: Vec<Value> = (1..=10)
            .map(|i| TestDataBuilder::score_row_json(i, &format!("Team {i}"), 20 - i))
            .collect();
        rows[4]["pointsPlus"] = json!(-3);

        let body = TestDataBuilder::class_page_json(rows, vec![]);
        let parsed = parse_table(&RawPayload::new("u", body), "m-ll-1").unwrap();

        assert_eq!(parsed.scores.len(), 9);
        assert_eq!(parsed.skipped.len(), 1);
        assert_eq!(parsed.skipped[0].index, 4);
        assert!(parsed.skipped[0].reason.contains("pointsPlus"));
        assert!(parsed.scores.iter().all(|s| s.team != "Team 5"));
    }

    #[test]
    fn test_numeric_strings_are_accepted() {
        let mut row = TestDataBuilder::score_row_json(1, "TV Alpha", 4);
        row["numPlayedGames"] = json!("3");
        let body = TestDataBuilder::class_page_json(vec![row], vec![]);

        let parsed = parse_table(&RawPayload::new("u", body), "c").unwrap();
        assert_eq!(parsed.scores[0].played, 3);
    }

    #[test]
    fn test_missing_team_name_is_skipped() {
        let mut row = TestDataBuilder::score_row_json(2, "SG Beta", 4);
        row.as_object_mut().unwrap().remove("tabTeamname");
        let body = TestDataBuilder::class_page_json(
            vec![TestDataBuilder::score_row_json(1, "TV Alpha", 6), row],
            vec![],
        );

        let parsed = parse_table(&RawPayload::new("u", body), "c").unwrap();
        assert_eq!(parsed.scores.len(), 1);
        assert!(parsed.skipped[0].reason.contains("tabTeamname"));
    }

    #[test]
    fn test_all_rows_malformed_is_an_error() {
        let body = TestDataBuilder::class_page_json(vec![json!("garbage"), json!(42)], vec![]);
        let err = parse_table(&RawPayload::new("u", body), "c").unwrap_err();
        assert!(matches!(err, ParseError::NoValidRows { skipped: 2, .. }));
    }

    #[test]
    fn test_empty_table_is_valid() {
        let body = TestDataBuilder::class_page_json(vec![], vec![]);
        let parsed = parse_table(&RawPayload::new("u", body), "c").unwrap();
        assert!(parsed.scores.is_empty());
    }

    #[test]
    fn test_missing_score_section() {
        let payload = RawPayload::new("u", r#"[{"content":{"futureGames":{"games":[]}}}]"#);
        assert!(matches!(
            parse_table(&payload, "c"),
            Err(ParseError::MissingField { .. })
        ));
    }

    #[test]
    fn test_parse_is_deterministic() {
        let body = TestDataBuilder::class_page_json(
            vec![TestDataBuilder::score_row_json(1, "TV Alpha", 10)],
            vec![],
        );
        let payload = RawPayload::new("u", body);
        assert_eq!(parse_table(&payload, "c"), parse_table(&payload, "c"));
    }
}
