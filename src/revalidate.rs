//! Downstream cache invalidation.
//!
//! After a successful write the website's tag-based cache is told which entries
//! went stale. Notifications are spawned and never awaited by the pipeline; a
//! failure only produces a log line.

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const SECRET_HEADER: &str = "x-revalidate-secret";

/// Cache tags touched by new details for `event_id`.
pub fn event_tags(event_id: i64) -> Vec<String> {
    vec![
        "events".to_string(),
        format!("event-{event_id}"),
        format!("event-details-{event_id}"),
    ]
}

/// Cache tags touched by new updates for `event_id`.
pub fn update_tags(event_id: i64) -> Vec<String> {
    let mut tags = event_tags(event_id);
    tags.push(format!("event-updates-{event_id}"));
    tags
}

#[derive(Debug, Clone)]
pub struct Revalidator {
    client: reqwest::Client,
    endpoint: Option<String>,
    secret: Option<String>,
}

impl Revalidator {
    pub fn new(client: reqwest::Client, endpoint: Option<String>, secret: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.filter(|e| !e.trim().is_empty()),
            secret,
        }
    }

    /// Fire-and-forget notification; the handle is only useful to tests.
    pub fn notify(&self, tags: Vec<String>) -> JoinHandle<()> {
        let Some(endpoint) = self.endpoint.clone() else {
            debug!(?tags, "Revalidation endpoint not configured; skipping");
            return tokio::spawn(async {});
        };
        let client = self.client.clone();
        let secret = self.secret.clone();

        tokio::spawn(async move {
            let mut request = client
                .post(&endpoint)
                .json(&serde_json::json!({ "tags": tags }));
            if let Some(secret) = secret {
                request = request.header(SECRET_HEADER, secret);
            }
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    info!(?tags, "Cache revalidation requested");
                }
                Ok(response) => {
                    warn!(status = response.status().as_u16(), ?tags, "Cache revalidation rejected");
                }
                Err(e) => warn!(error = %e, ?tags, "Cache revalidation failed"),
            }
        })
    }
}
