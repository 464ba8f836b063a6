//! Single-article fetching.
//!
//! Failures here are routine on the open web (paywalls, bot walls, dead links,
//! slow hosts), so every failure collapses to `None` with a log line instead of
//! an error.

use crate::models::ScrapedArticle;
use crate::scrapers::extract::extract_article;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Per-article timeout.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Bodies larger than this are abandoned; no article page needs more.
pub const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

const MIN_BODY_BYTES: usize = 100;
const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Fetches article pages with browser-like headers and hands them to the extractor.
#[derive(Debug, Clone)]
pub struct ArticleFetcher {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl ArticleFetcher {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeout(FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self::from_client(Self::client_builder(timeout).build()?))
    }

    /// Wrap a prepared client, normally one built from [`Self::client_builder`].
    pub fn from_client(client: reqwest::Client) -> Self {
        Self {
            client,
            max_body_bytes: MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Client settings for article pages: desktop browser headers, `timeout`, at most 10 redirects.
    pub fn client_builder(timeout: Duration) -> reqwest::ClientBuilder {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        reqwest::Client::builder()
            .user_agent(DESKTOP_USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
    }

    /// Fetch `url` and extract its article, or `None` on any failure.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch(&self, url: &str) -> Option<ScrapedArticle> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                let kind = if e.is_timeout() { "timeout" } else { "request" };
                warn!(%url, kind, error = %e, "Article fetch failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "Article fetch returned non-success status");
            return None;
        }

        let body = self.read_body(url, response).await?;

        if body.len() < MIN_BODY_BYTES {
            warn!(%url, bytes = body.len(), "Article body too short to parse");
            return None;
        }

        let article = extract_article(&body, url);
        debug!(%url, chars = article.content.chars().count(), "Extracted article");
        Some(article)
    }

    /// Read the body in chunks, giving up once it passes `max_body_bytes`.
    async fn read_body(&self, url: &str, mut response: reqwest::Response) -> Option<String> {
        if let Some(declared) = response.content_length() {
            if declared as usize > self.max_body_bytes {
                warn!(%url, bytes = declared, limit = self.max_body_bytes, "Article body too large; skipping");
                return None;
            }
        }

        let mut bytes = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    bytes.extend_from_slice(&chunk);
                    if bytes.len() > self.max_body_bytes {
                        warn!(%url, limit = self.max_body_bytes, "Article body exceeded limit while reading; skipping");
                        return None;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(%url, error = %e, "Failed reading article body");
                    return None;
                }
            }
        }
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}
