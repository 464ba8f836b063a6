//! Extraction of dated developments published after a cutoff.
//!
//! The model answers with `{"has_new_updates": bool, "updates": [{date, title, description}]}`.
//! Only one update per date is kept, first wins.

use super::repair::{FieldKind, fill_required, sanitize_json};
use crate::api::Prompt;
use crate::error::SynthesisError;
use crate::models::{EventRecord, EventUpdate, SearchResult};
use chrono::{DateTime, NaiveDate};
use itertools::Itertools;
use serde::Deserialize;
use std::fmt::Write;

const SYSTEM_PROMPT: &str = "You track follow-up developments for documented social-justice \
incidents. You only report developments that are explicitly dated in the material you are \
given, and you respond with a single JSON object and nothing else.";

#[derive(Debug, Deserialize)]
struct UpdateEnvelope {
    has_new_updates: bool,
    updates: Vec<RawUpdate>,
}

#[derive(Debug, Deserialize)]
struct RawUpdate {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Publication date of a search hit, from RFC 3339 or a leading `YYYY-MM-DD`.
pub fn published_date(result: &SearchResult) -> Option<NaiveDate> {
    let raw = result.published.as_deref()?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    raw.get(..10)
        .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
}

/// Hits published strictly after `since`. Undated hits are dropped.
pub fn published_after(results: &[SearchResult], since: NaiveDate) -> Vec<SearchResult> {
    results
        .iter()
        .filter(|r| published_date(r).is_some_and(|d| d > since))
        .cloned()
        .collect()
}

pub fn build_update_prompt(event: &EventRecord, hits: &[SearchResult], since: NaiveDate) -> Prompt {
    let mut user = String::new();
    let _ = writeln!(user, "Incident: {}", event.title);
    let _ = writeln!(user, "Research topic: {}", event.query);
    let _ = writeln!(user, "Report only developments dated after {since}.\n");
    let _ = writeln!(user, "## Recent coverage\n");
    for hit in hits {
        let date = published_date(hit).map(|d| d.to_string()).unwrap_or_default();
        let _ = writeln!(user, "- [{date}] {}: {} ({})", hit.title, hit.snippet, hit.link);
    }
    let _ = write!(
        user,
        r#"
Return ONLY a JSON object of this shape:

{{
  "has_new_updates": true,
  "updates": [
    {{ "date": "YYYY-MM-DD", "title": "Headline of the development (under 12 words)", "description": "2-3 sentences on what changed" }}
  ]
}}

Rules:
- At most one update per date; merge same-day coverage into one entry.
- If nothing new happened after {since}, return {{"has_new_updates": false, "updates": []}}.
- No Markdown fences, no commentary."#
    );

    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

/// Parse the update-analysis completion.
///
/// A missing `has_new_updates` flag is inferred from whether `updates` is non-empty.
/// Entries without a date or title are dropped.
pub fn parse_updates(raw: &str) -> Result<Vec<EventUpdate>, SynthesisError> {
    let mut object = sanitize_json(raw)?;
    fill_required(&mut object, &[("updates", FieldKind::List)]);
    if !object.contains_key("has_new_updates") {
        let any = object["updates"].as_array().is_some_and(|u| !u.is_empty());
        object.insert("has_new_updates".to_string(), serde_json::Value::Bool(any));
    }

    let envelope: UpdateEnvelope =
        serde_json::from_value(serde_json::Value::Object(object)).map_err(SynthesisError::Schema)?;
    if !envelope.has_new_updates {
        return Ok(Vec::new());
    }

    Ok(envelope
        .updates
        .into_iter()
        .filter_map(|u| {
            let date = u.date.map(|d| d.trim().to_string()).filter(|d| !d.is_empty())?;
            let title = u.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;
            Some(EventUpdate {
                date,
                title,
                description: u.description.unwrap_or_default().trim().to_string(),
            })
        })
        .unique_by(|u| u.date.clone())
        .collect())
}
