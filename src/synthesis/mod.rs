//! LLM synthesis of scraped material into structured records.
//!
//! - [`prompt`]: event prompt construction and article selection
//! - [`repair`]: fence stripping, brace slicing, defaulting and reshaping of model output
//! - [`updates`]: the companion "new developments" extraction

pub mod prompt;
pub mod repair;
pub mod updates;

use crate::api::AskAsync;
use crate::error::SynthesisError;
use crate::models::{EventDetails, ScrapedData};
use crate::utils::truncate_for_log;
use repair::{FieldKind, fill_required, normalize_field, sanitize_json};
use serde::Deserialize;
use tracing::{debug, error, info, instrument};

const EVENT_FIELDS: [(&str, FieldKind); 5] = [
    ("location", FieldKind::Text),
    ("details", FieldKind::Text),
    ("accused", FieldKind::List),
    ("victims", FieldKind::List),
    ("timeline", FieldKind::List),
];

#[derive(Debug, Deserialize)]
struct SynthesizedFields {
    location: String,
    details: String,
    accused: Vec<String>,
    victims: Vec<String>,
    timeline: Vec<String>,
}

/// Parse a raw completion into [`EventDetails`] with every required field present.
///
/// `sources` and `images` are left empty; they come from the scrape, not the model.
pub fn parse_event_details(raw: &str) -> Result<EventDetails, SynthesisError> {
    let mut object = sanitize_json(raw)?;
    fill_required(&mut object, &EVENT_FIELDS);
    for (name, kind) in EVENT_FIELDS {
        normalize_field(&mut object, name, kind);
    }

    let fields: SynthesizedFields =
        serde_json::from_value(serde_json::Value::Object(object)).map_err(SynthesisError::Schema)?;

    Ok(EventDetails {
        location: fields.location,
        details: fields.details,
        accused: fields.accused,
        victims: fields.victims,
        timeline: fields.timeline,
        sources: Vec::new(),
        images: Vec::new(),
    })
}

/// Turns scraped material into [`EventDetails`] through one LLM completion.
#[derive(Debug)]
pub struct SynthesisEngine<A> {
    llm: A,
}

impl<A: AskAsync> SynthesisEngine<A> {
    pub fn new(llm: A) -> Self {
        Self { llm }
    }

    pub fn llm(&self) -> &A {
        &self.llm
    }

    #[instrument(level = "info", skip(self, data), fields(articles = data.articles.len()))]
    pub async fn synthesize(&self, query: &str, data: &ScrapedData) -> Result<EventDetails, SynthesisError> {
        let prompt = prompt::build_event_prompt(query, data);
        debug!(prompt_chars = prompt.user.chars().count(), "Built synthesis prompt");

        let raw = self.llm.ask(&prompt).await?;
        match parse_event_details(&raw) {
            Ok(details) => {
                info!(
                    accused = details.accused.len(),
                    victims = details.victims.len(),
                    timeline = details.timeline.len(),
                    "Synthesized event details"
                );
                Ok(details)
            }
            Err(e) => {
                error!(error = %e, response_preview = %truncate_for_log(&raw, 300), "Synthesis failed");
                Err(e)
            }
        }
    }
}
