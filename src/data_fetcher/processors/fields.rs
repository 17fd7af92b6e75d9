//! Envelope decoding and per-field validation shared by the parsers.

use crate::data_fetcher::models::RawPayload;
use crate::error::ParseError;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Decodes the one-element array the service wraps its answers in.
/// A bare object is accepted as well.
pub(super) fn decode_envelope<T: DeserializeOwned>(payload: &RawPayload) -> Result<T, ParseError> {
    let trimmed = payload.body.trim();
    if trimmed.is_empty() {
        return Err(ParseError::malformed_json(&payload.url, "body is empty"));
    }

    let envelopes: Vec<T> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).map_err(|e| classify(payload, e))?
    } else {
        vec![serde_json::from_str(trimmed).map_err(|e| classify(payload, e))?]
    };

    envelopes
        .into_iter()
        .next()
        .ok_or_else(|| ParseError::missing_field(&payload.url, "envelope"))
}

fn classify(payload: &RawPayload, e: serde_json::Error) -> ParseError {
    if e.is_syntax() || e.is_eof() {
        ParseError::malformed_json(&payload.url, e.to_string())
    } else {
        ParseError::unexpected_shape(&payload.url, e.to_string())
    }
}

/// Reads a non-negative integer that the service may encode as a number or a
/// numeric string.
pub(super) fn non_negative(row: &Value, field: &str) -> Result<u32, String> {
    let raw = match row.get(field) {
        None | Some(Value::Null) => return Err(format!("missing '{field}'")),
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| format!("'{field}' is not an integer: {n}"))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("'{field}' is not an integer: {s:?}"))?,
        Some(other) => return Err(format!("'{field}' has unexpected type: {other}")),
    };

    if raw < 0 {
        return Err(format!("'{field}' is negative: {raw}"));
    }
    u32::try_from(raw).map_err(|_| format!("'{field}' is out of range: {raw}"))
}

/// Reads a non-empty text field. Numbers are accepted because identifiers are
/// not encoded consistently by the service.
pub(super) fn required_text(row: &Value, field: &str) -> Result<String, String> {
    optional_text(row, field)?.ok_or_else(|| format!("missing '{field}'"))
}

/// Like [`required_text`] but blank or absent values yield `None`.
pub(super) fn optional_text(row: &Value, field: &str) -> Result<Option<String>, String> {
    match row.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(format!("'{field}' has unexpected type: {other}")),
    }
}
