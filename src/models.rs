//! Data models shared across the search, scrape, synthesis and storage stages.
//!
//! - [`SearchResult`]: one organic web-search hit
//! - [`ScrapedArticle`] / [`ScrapedData`]: the scrape stage's output bundle
//! - [`EventDetails`]: the synthesized record persisted per event
//! - [`EventRecord`] / [`EventUpdate`]: rows read from and written to the store
//!
//! Field names serialize in camelCase so the JSON written by the CLI matches the
//! shapes the website consumes.

use serde::{Deserialize, Serialize};

/// One organic web-search hit. `link` is the uniqueness key.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_link: Option<String>,
    /// Publication date reported by the search index's page metadata, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
}

/// A scraped article body plus the metadata found alongside it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedArticle {
    pub url: String,
    pub title: String,
    /// Plain-text body, at most 5000 characters.
    pub content: String,
    pub publish_date: Option<String>,
    pub author: Option<String>,
    /// Bare hostname without a leading `www.`.
    pub source: String,
}

impl ScrapedArticle {
    /// Articles at or below this many characters are treated as failed scrapes.
    pub const MIN_CONTENT_CHARS: usize = 100;

    /// Whether the extracted body is long enough to feed synthesis.
    pub fn has_usable_content(&self) -> bool {
        self.content.chars().count() > Self::MIN_CONTENT_CHARS
    }
}

/// Everything the scrape stage produced for one query.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ScrapedData {
    pub results: Vec<SearchResult>,
    pub articles: Vec<ScrapedArticle>,
    pub images: Vec<String>,
}

/// The synthesized record for one event.
///
/// Any string may carry inline `**highlight**` markers; they are content, not structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EventDetails {
    pub location: String,
    pub details: String,
    pub accused: Vec<String>,
    pub victims: Vec<String>,
    pub timeline: Vec<String>,
    /// URLs of the articles that were actually scraped, not every search hit.
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// The parent event row: the query that drives synthesis and its display title.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub event_id: i64,
    pub query: String,
    pub title: String,
}

/// One dated development found by the update-analysis pass.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EventUpdate {
    pub date: String,
    pub title: String,
    pub description: String,
}

/// Result of a full `process` run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedEvent {
    pub event_data: EventRecord,
    pub structured_data: EventDetails,
    pub scraped_data: ScrapedData,
}
