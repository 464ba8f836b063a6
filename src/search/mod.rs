//! Clients for the Google Programmable Search JSON API.
//!
//! - [`web`]: paginated organic search with filtering and source-diversity selection
//! - [`images`]: best-effort image discovery
//!
//! Both share the response envelope and the page-decoding rules below. The API
//! sometimes answers with an HTML error page under a 200 status, so a body is only
//! accepted when it decodes as JSON and carries no `error` member.

pub mod images;
pub mod web;

use serde::Deserialize;

pub const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// API key and engine id, both required for any request.
#[derive(Debug, Clone, Default)]
pub struct SearchCredentials {
    pub api_key: Option<String>,
    pub engine_id: Option<String>,
}

impl SearchCredentials {
    pub fn new(api_key: Option<String>, engine_id: Option<String>) -> Self {
        Self { api_key, engine_id }
    }

    /// Both values, if both are present and non-empty.
    pub fn pair(&self) -> Option<(&str, &str)> {
        let key = self.api_key.as_deref().filter(|s| !s.trim().is_empty())?;
        let cx = self.engine_id.as_deref().filter(|s| !s.trim().is_empty())?;
        Some((key, cx))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub(crate) items: Vec<SearchItem>,
    pub(crate) error: Option<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchItem {
    #[serde(default)]
    pub(crate) title: Option<String>,
    #[serde(default)]
    pub(crate) link: Option<String>,
    #[serde(default)]
    pub(crate) snippet: Option<String>,
    #[serde(default)]
    pub(crate) display_link: Option<String>,
    #[serde(default)]
    pub(crate) pagemap: Option<PageMap>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageMap {
    #[serde(default)]
    pub(crate) metatags: Vec<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiError {
    #[serde(default)]
    pub(crate) code: Option<i64>,
    #[serde(default)]
    pub(crate) message: Option<String>,
}

/// Why one page of results was rejected.
#[derive(Debug, PartialEq)]
pub(crate) enum PageRejection {
    HtmlBody,
    Malformed(String),
    Api { code: Option<i64>, message: String },
}

impl std::fmt::Display for PageRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HtmlBody => write!(f, "HTML error page instead of JSON"),
            Self::Malformed(e) => write!(f, "malformed JSON: {e}"),
            Self::Api { code, message } => write!(f, "API error {code:?}: {message}"),
        }
    }
}

/// Decode one successful-status response body into a [`SearchResponse`].
pub(crate) fn decode_page(body: &str) -> Result<SearchResponse, PageRejection> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('<') {
        return Err(PageRejection::HtmlBody);
    }
    let response: SearchResponse =
        serde_json::from_str(trimmed).map_err(|e| PageRejection::Malformed(e.to_string()))?;
    if let Some(error) = response.error {
        return Err(PageRejection::Api {
            code: error.code,
            message: error.message.unwrap_or_default(),
        });
    }
    Ok(response)
}
