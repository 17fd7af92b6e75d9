//! Normalizer: turns raw source payloads into the league model.
//!
//! Every function here is pure. The same payload always yields the same
//! result, so the parsers are tested without any network access.

mod fields;
pub mod games;
pub mod index;
pub mod table;

pub use games::{ParsedGames, parse_game_date, parse_games};
pub use index::{ParsedIndex, parse_index};
pub use table::{ParsedTable, parse_table};

/// A source row that failed validation and was left out of the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// Position of the row in the source list
    pub index: usize,
    pub reason: String,
}

/// Renders skipped rows as one line for caching result error summaries.
pub fn describe_skipped(kind: &str, skipped: &[SkippedRow]) -> Option<String> {
    if skipped.is_empty() {
        return None;
    }
    let details: Vec<String> = skipped
        .iter()
        .map(|row| format!("row {}: {}", row.index, row.reason))
        .collect();
    Some(format!(
        "skipped {} malformed {} row(s) ({})",
        skipped.len(),
        kind,
        details.join("; ")
    ))
}
