//! Paginated web search with result filtering.
//!
//! Pages are requested one after another with a short pause between them; a page
//! that fails for any reason is logged and skipped. The concatenated hits are then
//! deduplicated by link, stripped of social-media domains, and required to carry a
//! title and snippet. [`select_for_scraping`] applies the source-diversity cap used
//! by the main scrape path.

use super::{SearchCredentials, SearchItem, decode_page};
use crate::error::SearchError;
use crate::models::SearchResult;
use crate::utils::{bare_hostname, truncate_for_log};
use itertools::Itertools;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

pub const RESULTS_PER_PAGE: usize = 10;
pub const DEFAULT_PAGES: usize = 3;
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(300);

/// Most non-Reddit results kept for scraping.
pub const MAX_NON_REDDIT: usize = 16;
/// Most Reddit results kept for scraping.
pub const MAX_REDDIT: usize = 2;
/// Upper bound on one scrape batch.
pub const MAX_SCRAPE_TARGETS: usize = MAX_NON_REDDIT + MAX_REDDIT;

const BLOCKED_DOMAINS: [&str; 6] = [
    "tiktok.com",
    "pinterest.com",
    "facebook.com",
    "twitter.com",
    "instagram.com",
    "youtube.com",
];

const PUBLISHED_METATAGS: [&str; 4] = ["article:published_time", "og:updated_time", "date", "pubdate"];

#[derive(Debug, Clone)]
pub struct WebSearchClient {
    client: reqwest::Client,
    endpoint: String,
    credentials: SearchCredentials,
    pages: usize,
    page_delay: Duration,
}

impl WebSearchClient {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        credentials: SearchCredentials,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            credentials,
            pages: DEFAULT_PAGES,
            page_delay: DEFAULT_PAGE_DELAY,
        }
    }

    pub fn with_pagination(mut self, pages: usize, page_delay: Duration) -> Self {
        self.pages = pages.max(1);
        self.page_delay = page_delay;
        self
    }

    /// Search `query` and return filtered, deduplicated hits.
    ///
    /// # Errors
    ///
    /// [`SearchError::MissingCredentials`] without an API key and engine id, and
    /// [`SearchError::AllPagesFailed`] when not a single page could be decoded.
    /// An empty but well-formed answer is not an error.
    #[instrument(level = "info", skip(self))]
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let (key, cx) = self.credentials.pair().ok_or(SearchError::MissingCredentials)?;

        let mut raw = Vec::new();
        let mut ok_pages = 0usize;

        for page in 0..self.pages {
            if page > 0 {
                sleep(self.page_delay).await;
            }
            let start = page * RESULTS_PER_PAGE + 1;
            let url = format!(
                "{}?key={}&cx={}&q={}&start={}&num={}",
                self.endpoint,
                urlencoding::encode(key),
                urlencoding::encode(cx),
                urlencoding::encode(query),
                start,
                RESULTS_PER_PAGE
            );

            match self.fetch_page(&url).await {
                Some(items) => {
                    ok_pages += 1;
                    debug!(page, start, count = items.len(), "Search page decoded");
                    raw.extend(items.into_iter().map(into_result));
                }
                None => warn!(page, start, "Skipping failed search page"),
            }
        }

        if ok_pages == 0 {
            return Err(SearchError::AllPagesFailed {
                query: query.to_string(),
                pages: self.pages,
            });
        }

        let total = raw.len();
        let results = filter_results(raw);
        info!(pages_ok = ok_pages, total, kept = results.len(), "Web search complete");
        Ok(results)
    }

    async fn fetch_page(&self, url: &str) -> Option<Vec<SearchItem>> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Search request failed");
                return None;
            }
        };
        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Failed reading search response");
                return None;
            }
        };
        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                body = %truncate_for_log(&body, 200),
                "Search API returned non-success status"
            );
            return None;
        }
        match decode_page(&body) {
            Ok(response) => Some(response.items),
            Err(rejection) => {
                warn!(
                    %rejection,
                    body = %truncate_for_log(&body, 200),
                    "Search page rejected"
                );
                None
            }
        }
    }
}

fn into_result(item: SearchItem) -> SearchResult {
    let published = item.pagemap.as_ref().and_then(|pagemap| {
        pagemap.metatags.iter().find_map(|tags| {
            PUBLISHED_METATAGS
                .iter()
                .find_map(|name| tags.get(*name).and_then(|v| v.as_str()))
                .map(str::to_string)
        })
    });
    SearchResult {
        title: item.title.unwrap_or_default().trim().to_string(),
        link: item.link.unwrap_or_default().trim().to_string(),
        snippet: item.snippet.unwrap_or_default().trim().to_string(),
        display_link: item.display_link,
        published,
    }
}

/// Dedupe by link (first wins), drop blocked domains, require title and snippet.
pub fn filter_results(results: Vec<SearchResult>) -> Vec<SearchResult> {
    results
        .into_iter()
        .filter(|r| !r.link.is_empty())
        .unique_by(|r| r.link.clone())
        .filter(|r| !is_blocked(r))
        .filter(|r| !r.title.is_empty() && !r.snippet.is_empty())
        .collect()
}

/// Pick the scrape batch: up to 16 non-Reddit hits in rank order, then up to 2 Reddit hits.
pub fn select_for_scraping(results: &[SearchResult]) -> Vec<SearchResult> {
    let (reddit, other): (Vec<&SearchResult>, Vec<&SearchResult>) =
        results.iter().partition(|r| is_reddit(r));

    other
        .into_iter()
        .take(MAX_NON_REDDIT)
        .chain(reddit.into_iter().take(MAX_REDDIT))
        .cloned()
        .collect()
}

pub fn is_blocked(result: &SearchResult) -> bool {
    let link_host = bare_hostname(&result.link);
    let display_host = result
        .display_link
        .as_deref()
        .map(|d| d.trim().to_ascii_lowercase().trim_start_matches("www.").to_string())
        .unwrap_or_default();

    BLOCKED_DOMAINS
        .iter()
        .any(|domain| domain_matches(&link_host, domain) || domain_matches(&display_host, domain))
}

pub fn is_reddit(result: &SearchResult) -> bool {
    let host = bare_hostname(&result.link);
    domain_matches(&host, "reddit.com") || domain_matches(&host, "redd.it")
}

fn domain_matches(host: &str, domain: &str) -> bool {
    let host = host.to_ascii_lowercase();
    host == domain || host.ends_with(&format!(".{domain}"))
}
