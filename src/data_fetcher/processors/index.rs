use crate::data_fetcher::models::{Class, IndexEnvelope, RawPayload, Week};
use crate::error::ParseError;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, warn};

use super::SkippedRow;
use super::fields::{decode_envelope, optional_text, required_text};

/// Class catalogue and active round extracted from the organization page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedIndex {
    pub classes: Vec<Class>,
    pub current_week: Option<Week>,
    pub skipped: Vec<SkippedRow>,
}

/// Parses the organization page used for class and current-week discovery.
///
/// The active round is read from `menu.dt.selected` (ISO date). A missing or
/// unparsable value yields `current_week = None`; the caller keeps whatever
/// current week is already stored.
pub fn parse_index(payload: &RawPayload) -> Result<ParsedIndex, ParseError> {
    let envelope: IndexEnvelope = decode_envelope(payload)?;
    let rows = envelope
        .content
        .classes
        .ok_or_else(|| ParseError::missing_field(&payload.url, "content.classes"))?;

    let mut classes = Vec::with_capacity(rows.len());
    let mut skipped = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        match parse_class_row(row) {
            Ok(class) => classes.push(class),
            Err(reason) => {
                warn!("Skipping malformed class row {}: {}", index, reason);
                skipped.push(SkippedRow { index, reason });
            }
        }
    }

    let current_week = envelope
        .menu
        .and_then(|menu| menu.dt)
        .and_then(|dt| dt.selected)
        .and_then(|selected| match NaiveDate::parse_from_str(selected.trim(), "%Y-%m-%d") {
            Ok(date) => Some(Week::new(date, true)),
            Err(e) => {
                warn!("Ignoring unparsable active round {:?}: {}", selected, e);
                None
            }
        });

    debug!(
        "Parsed index: {} classes, {} skipped, current week {:?}",
        classes.len(),
        skipped.len(),
        current_week.map(|w| w.date)
    );

    Ok(ParsedIndex {
        classes,
        current_week,
        skipped,
    })
}

fn parse_class_row(row: &Value) -> Result<Class, String> {
    let id = required_text(row, "gClassID")?;
    let short_name = required_text(row, "gClassSname")?;
    let long_name = optional_text(row, "gClassLname")?.unwrap_or_else(|| short_name.clone());
    Ok(Class {
        id,
        short_name,
        long_name,
    })
}
