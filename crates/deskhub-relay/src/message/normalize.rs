//! Ingress payload normalization.
//!
//! Publishing clients are inconsistent: the payload is sometimes a JSON
//! string that itself encodes an object, and message text appears under
//! varying field names. Every listener normalizes at its ingress boundary
//! and reads text through an ordered field-name list, so business logic
//! only ever sees one canonical shape.

use serde_json::Value;

/// Parse a payload that may itself be a JSON-encoded string.
///
/// A string payload that parses as JSON is replaced by the parsed value;
/// a string that does not parse is kept as-is (it may be bare text).
pub fn normalize_payload(payload: Value) -> Value {
    match payload {
        Value::String(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(parsed) => parsed,
            Err(_) => Value::String(raw),
        },
        other => other,
    }
}

/// Extract non-empty text from a normalized payload.
///
/// A bare string payload is the text itself. An object payload is read
/// through `fields` in order; the first non-empty string wins. Whitespace
/// is trimmed; blank text counts as absent.
pub fn extract_text(payload: &Value, fields: &[&str]) -> Option<String> {
    match payload {
        Value::String(raw) => non_blank(raw),
        Value::Object(map) => fields
            .iter()
            .filter_map(|field| map.get(*field))
            .filter_map(|value| value.as_str())
            .find_map(non_blank),
        _ => None,
    }
}

fn non_blank(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
