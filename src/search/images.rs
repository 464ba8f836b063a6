//! Best-effort image discovery.
//!
//! A failed image search never blocks synthesis; every failure path returns an
//! empty list.

use super::{SearchCredentials, decode_page};
use crate::utils::truncate_for_log;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub const IMAGE_SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
const IMAGE_RESULTS: usize = 10;
const IMAGE_EXTENSIONS: [&str; 6] = [".jpg", ".jpeg", ".png", ".gif", ".webp", ".avif"];
const REJECTED_MARKERS: [&str; 3] = ["favicon", "logo", "icon"];

#[derive(Debug, Clone)]
pub struct ImageSearchClient {
    client: reqwest::Client,
    endpoint: String,
    credentials: SearchCredentials,
    timeout: Duration,
}

impl ImageSearchClient {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        credentials: SearchCredentials,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            credentials,
            timeout: IMAGE_SEARCH_TIMEOUT,
        }
    }

    #[instrument(level = "info", skip(self))]
    pub async fn search(&self, query: &str) -> Vec<String> {
        let Some((key, cx)) = self.credentials.pair() else {
            warn!("Image search skipped: credentials not configured");
            return Vec::new();
        };

        let url = format!(
            "{}?key={}&cx={}&q={}&searchType=image&num={}&imgSize=medium&safe=active",
            self.endpoint,
            urlencoding::encode(key),
            urlencoding::encode(cx),
            urlencoding::encode(query),
            IMAGE_RESULTS
        );

        let response = match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Image search request failed");
                return Vec::new();
            }
        };
        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Failed reading image search response");
                return Vec::new();
            }
        };
        if !status.is_success() {
            warn!(status = status.as_u16(), body = %truncate_for_log(&body, 200), "Image search returned non-success status");
            return Vec::new();
        }

        let items = match decode_page(&body) {
            Ok(response) => response.items,
            Err(rejection) => {
                warn!(%rejection, "Image search response rejected");
                return Vec::new();
            }
        };

        let images = filter_images(items.into_iter().filter_map(|item| item.link));
        info!(count = images.len(), "Image search complete");
        images
    }
}

/// Keep likely content images: no favicons, logos or icons, and an image-ish URL.
pub fn filter_images<I>(links: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    links
        .into_iter()
        .filter(|link| {
            let lower = link.to_ascii_lowercase();
            !REJECTED_MARKERS.iter().any(|marker| lower.contains(marker))
                && (IMAGE_EXTENSIONS.iter().any(|ext| lower.contains(ext)) || lower.contains("image"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn creds() -> SearchCredentials {
        SearchCredentials::new(Some("k".into()), Some("cx".into()))
    }

    #[test]
    fn test_filter_images() {
        let kept = filter_images(vec![
            "https://cdn.site.org/photos/protest.JPG".to_string(),
            "https://site.org/favicon.png".to_string(),
            "https://site.org/static/logo-dark.svg".to_string(),
            "https://site.org/icons/share.png".to_string(),
            "https://images.site.org/render?id=4".to_string(),
            "https://site.org/embed/video".to_string(),
            "https://site.org/media/a.webp?w=800".to_string(),
        ]);
        assert_eq!(
            kept,
            vec![
                "https://cdn.site.org/photos/protest.JPG".to_string(),
                "https://images.site.org/render?id=4".to_string(),
                "https://site.org/media/a.webp?w=800".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_credentials_is_empty() {
        let client = ImageSearchClient::new(reqwest::Client::new(), "http://127.0.0.1:9", SearchCredentials::default());
        assert!(client.search("q").await.is_empty());
    }

    #[tokio::test]
    async fn test_image_search_requests_safe_medium_images() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("searchType", "image"))
            .and(query_param("imgSize", "medium"))
            .and(query_param("safe", "active"))
            .and(query_param("num", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    { "link": "https://a.org/photo.jpg" },
                    { "link": "https://a.org/logo.png" },
                    { "title": "no link" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ImageSearchClient::new(reqwest::Client::new(), server.uri(), creds());
        assert_eq!(client.search("q").await, vec!["https://a.org/photo.jpg".to_string()]);
    }

    #[tokio::test]
    async fn test_image_search_errors_are_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": {"code": 400, "message": "bad"}})))
            .mount(&server)
            .await;
        let client = ImageSearchClient::new(reqwest::Client::new(), server.uri(), creds());
        assert!(client.search("q").await.is_empty());

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let client = ImageSearchClient::new(reqwest::Client::new(), server.uri(), creds());
        assert!(client.search("q").await.is_empty());
    }
}
