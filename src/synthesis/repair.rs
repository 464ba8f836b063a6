//! Sanitizing semi-structured LLM output into JSON.
//!
//! Models wrap JSON in Markdown fences or chat around it despite instructions.
//! [`sanitize_json`] undoes that in three steps: strip fences, slice from the first
//! `{` to the last `}`, parse. Anything still unparseable is an error carrying
//! enough of the response to tell prompt drift from a truncated transport.

use crate::error::SynthesisError;
use crate::utils::{looks_truncated, tail_chars, truncate_chars};
use serde_json::{Map, Value};
use tracing::warn;

const EXCERPT_CHARS: usize = 200;

/// What an absent or null field defaults to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    List,
}

/// Strip a leading ```` ```json ```` / ```` ``` ```` fence and a trailing fence.
pub fn strip_fences(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// The span from the first `{` through the last `}`, if both exist in that order.
pub fn slice_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (end > start).then(|| &s[start..=end])
}

/// Turn a raw completion into a JSON object.
///
/// # Errors
///
/// [`SynthesisError::EmptyResponse`], [`SynthesisError::NoJsonObject`] or
/// [`SynthesisError::MalformedJson`], each distinct so operators can tell them apart.
pub fn sanitize_json(raw: &str) -> Result<Map<String, Value>, SynthesisError> {
    if raw.trim().is_empty() {
        return Err(SynthesisError::EmptyResponse);
    }

    let unfenced = strip_fences(raw);
    let Some(object) = slice_object(unfenced) else {
        return Err(SynthesisError::NoJsonObject {
            len: raw.chars().count(),
            head: truncate_chars(raw, EXCERPT_CHARS),
            tail: tail_chars(raw, EXCERPT_CHARS),
        });
    };

    match serde_json::from_str::<Value>(object) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(SynthesisError::Schema(serde::de::Error::custom(format!(
            "expected a JSON object, got {other}"
        )))),
        Err(source) => {
            if looks_truncated(&source) {
                warn!(len = raw.chars().count(), "LLM JSON ends early; completion may have hit max_tokens");
            }
            Err(SynthesisError::MalformedJson {
                len: raw.chars().count(),
                head: truncate_chars(raw, EXCERPT_CHARS),
                tail: tail_chars(raw, EXCERPT_CHARS),
                source,
            })
        }
    }
}

/// Give every required field a value: missing or null lists become `[]`, text `""`.
pub fn fill_required(object: &mut Map<String, Value>, fields: &[(&str, FieldKind)]) {
    for (name, kind) in fields {
        let absent = object.get(*name).is_none_or(Value::is_null);
        if absent {
            warn!(field = *name, "LLM response missing field; filling default");
            let default = match kind {
                FieldKind::Text => Value::String(String::new()),
                FieldKind::List => Value::Array(Vec::new()),
            };
            object.insert((*name).to_string(), default);
        }
    }
}

/// Coerce a field into the shape its [`FieldKind`] expects.
///
/// Models drift from the contract in predictable ways: a lone string where a list
/// was asked for, bare years inside a timeline, a list of paragraphs for a text
/// field, or `{"date": .., "event": ..}` entries. All of these are still usable
/// content, so they are reshaped rather than rejected. Object entries keep their
/// key order, joined with `": "`.
pub fn normalize_field(object: &mut Map<String, Value>, field: &str, kind: FieldKind) {
    let Some(value) = object.get_mut(field) else {
        return;
    };
    let reshaped = match (kind, value.take()) {
        (FieldKind::List, Value::Array(items)) => {
            Value::Array(items.into_iter().filter_map(scalar_text).map(Value::String).collect())
        }
        (FieldKind::List, other) => Value::Array(scalar_text(other).map(Value::String).into_iter().collect()),
        (FieldKind::Text, Value::Array(items)) => {
            let paragraphs: Vec<String> = items.into_iter().filter_map(scalar_text).collect();
            Value::String(paragraphs.join(" "))
        }
        (FieldKind::Text, other) => Value::String(scalar_text(other).unwrap_or_default()),
    };
    *value = reshaped;
}

/// One value as a single trimmed string; `None` for nulls and blanks.
fn scalar_text(value: Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => {
            let parts: Vec<String> = items.into_iter().filter_map(scalar_text).collect();
            parts.join(", ")
        }
        Value::Object(entry) => {
            let parts: Vec<String> = entry.into_iter().filter_map(|(_, v)| scalar_text(v)).collect();
            parts.join(": ")
        }
    };
    (!text.is_empty()).then_some(text)
}
