//! The top-level event pipeline.
//!
//! ```text
//! LoadQuery -> Scrape -> Synthesize -> Merge -> Persist -> TouchTimestamp -> Done
//! ```
//!
//! Any stage error aborts the run before anything is written; nothing is retried
//! here. Timestamp touches and cache invalidation run after the write and are
//! best effort.

use crate::api::AskAsync;
use crate::error::PipelineError;
use crate::models::{EventDetails, EventUpdate, ProcessedEvent, ScrapedData};
use crate::revalidate::{Revalidator, event_tags, update_tags};
use crate::scrapers::orchestrator::ScrapeOrchestrator;
use crate::store::EventStore;
use crate::synthesis::SynthesisEngine;
use crate::synthesis::updates::{build_update_prompt, parse_updates, published_after};
use chrono::NaiveDate;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadQuery,
    Scrape,
    Synthesize,
    Merge,
    Persist,
    TouchTimestamp,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LoadQuery => "load_query",
            Self::Scrape => "scrape",
            Self::Synthesize => "synthesize",
            Self::Merge => "merge",
            Self::Persist => "persist",
            Self::TouchTimestamp => "touch_timestamp",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Attach what the scrape actually produced: article URLs as sources, found images.
pub fn merge_scrape(details: &mut EventDetails, scraped: &ScrapedData) {
    details.sources = scraped.articles.iter().map(|a| a.url.clone()).collect();
    details.images = scraped.images.clone();
}

/// Scrape and synthesize `query` without touching any store.
pub async fn synthesize_query<A: AskAsync>(
    scraper: &ScrapeOrchestrator,
    synthesis: &SynthesisEngine<A>,
    query: &str,
) -> Result<(EventDetails, ScrapedData), PipelineError> {
    info!(stage = %Stage::Scrape, "Stage started");
    let scraped = scraper.scrape(query).await?;

    info!(stage = %Stage::Synthesize, "Stage started");
    let mut details = synthesis.synthesize(query, &scraped).await?;

    info!(stage = %Stage::Merge, "Stage started");
    merge_scrape(&mut details, &scraped);
    Ok((details, scraped))
}

pub struct Pipeline<A, S> {
    scraper: ScrapeOrchestrator,
    synthesis: SynthesisEngine<A>,
    store: S,
    revalidator: Revalidator,
    notifications: Mutex<Vec<JoinHandle<()>>>,
}

impl<A: AskAsync, S: EventStore> Pipeline<A, S> {
    pub fn new(
        scraper: ScrapeOrchestrator,
        synthesis: SynthesisEngine<A>,
        store: S,
        revalidator: Revalidator,
    ) -> Self {
        Self {
            scraper,
            synthesis,
            store,
            revalidator,
            notifications: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Wait up to `timeout` for outstanding cache notifications.
    ///
    /// Notifications are never awaited by the stages themselves; a short-lived
    /// process calls this before exiting so they get a chance to go out.
    pub async fn drain_notifications(&self, timeout: Duration) {
        let handles: Vec<_> = match self.notifications.lock() {
            Ok(mut pending) => pending.drain(..).collect(),
            Err(_) => return,
        };
        if handles.is_empty() {
            return;
        }
        if tokio::time::timeout(timeout, futures::future::join_all(handles)).await.is_err() {
            warn!(?timeout, "Cache notifications still pending at shutdown");
        }
    }

    fn notify(&self, tags: Vec<String>) {
        let handle = self.revalidator.notify(tags);
        if let Ok(mut pending) = self.notifications.lock() {
            pending.push(handle);
        }
    }

    /// Run the full pipeline for one event and persist the result.
    #[instrument(level = "info", skip(self))]
    pub async fn process_event(&self, event_id: i64) -> Result<ProcessedEvent, PipelineError> {
        let t0 = Instant::now();

        info!(stage = %Stage::LoadQuery, "Stage started");
        let event = self.store.fetch_event(event_id).await.inspect_err(|e| {
            error!(stage = %Stage::LoadQuery, error = %e, "Pipeline aborted");
        })?;

        let (details, scraped) = synthesize_query(&self.scraper, &self.synthesis, &event.query)
            .await
            .inspect_err(|e| error!(error = %e, "Pipeline aborted before persisting"))?;

        info!(stage = %Stage::Persist, "Stage started");
        self.store
            .save_event_details(event_id, &details)
            .await
            .inspect_err(|e| error!(stage = %Stage::Persist, error = %e, "Pipeline aborted"))?;

        info!(stage = %Stage::TouchTimestamp, "Stage started");
        self.touch(event_id).await;
        self.notify(event_tags(event_id));

        info!(
            stage = %Stage::Done,
            elapsed_ms = t0.elapsed().as_millis(),
            articles = scraped.articles.len(),
            sources = details.sources.len(),
            images = details.images.len(),
            "Event processed"
        );

        Ok(ProcessedEvent {
            event_data: event,
            structured_data: details,
            scraped_data: scraped,
        })
    }

    /// Find and store developments published after `since`.
    ///
    /// Uses the raw filtered search results; the scrape path's Reddit quota does
    /// not apply here.
    #[instrument(level = "info", skip(self))]
    pub async fn analyze_updates(
        &self,
        event_id: i64,
        since: NaiveDate,
    ) -> Result<Vec<EventUpdate>, PipelineError> {
        let event = self.store.fetch_event(event_id).await?;
        let results = self.scraper.web().search(&event.query).await?;
        let recent = published_after(&results, since);
        info!(results = results.len(), recent = recent.len(), %since, "Filtered results by publish date");

        if recent.is_empty() {
            info!("No coverage after cutoff; skipping update extraction");
            return Ok(Vec::new());
        }

        let prompt = build_update_prompt(&event, &recent, since);
        let raw = self
            .synthesis
            .llm()
            .ask(&prompt)
            .await
            .map_err(crate::error::SynthesisError::from)?;
        let updates = parse_updates(&raw)?;

        if updates.is_empty() {
            info!("Model reported no new updates");
            return Ok(updates);
        }

        self.store.save_event_updates(event_id, &updates).await?;
        self.touch(event_id).await;
        self.notify(update_tags(event_id));
        info!(count = updates.len(), "Event updates stored");
        Ok(updates)
    }

    async fn touch(&self, event_id: i64) {
        if let Err(e) = self.store.update_event_timestamp(event_id).await {
            warn!(event_id, error = %e, "Failed to update event timestamp; continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, SynthesisError};
    use crate::scrapers::orchestrator::tests::{mount_search, orchestrator};
    use crate::store::memory::MemoryStore;
    use crate::synthesis::tests::CannedLlm;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GOOD_RESPONSE: &str = "Here is the JSON:\n```json\n{\"location\": \"Tulsa, Oklahoma\", \"details\": \"The **Greenwood district** was destroyed.\", \"accused\": [\"White mob\"], \"victims\": [\"Black residents of Greenwood\"]}\n```";

    async fn mount_articles(server: &MockServer, count: usize) -> Vec<String> {
        let links: Vec<String> = (0..count).map(|i| format!("{}/article/{i}", server.uri())).collect();
        mount_search(server, &links).await;
        for i in 0..count {
            Mock::given(method("GET"))
                .and(path(format!("/article/{i}")))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(crate::scrapers::orchestrator::tests::long_page(i)),
                )
                .mount(server)
                .await;
        }
        links
    }

    fn pipeline(server: &MockServer, llm: CannedLlm, store: MemoryStore) -> Pipeline<CannedLlm, MemoryStore> {
        Pipeline::new(
            orchestrator(server),
            SynthesisEngine::new(llm),
            store,
            Revalidator::new(reqwest::Client::new(), Some(format!("{}/revalidate", server.uri())), None),
        )
    }

    #[test]
    fn test_merge_uses_scraped_articles_not_all_results() {
        let mut details = EventDetails::default();
        let mut scraped = crate::synthesis::tests::scraped();
        scraped.results.push(crate::models::SearchResult {
            title: "t".into(),
            link: "https://unscraped.org".into(),
            snippet: "s".into(),
            display_link: None,
            published: None,
        });
        scraped.images.push("https://img.org/a.jpg".into());
        merge_scrape(&mut details, &scraped);
        assert_eq!(details.sources, vec!["https://a.org/1".to_string()]);
        assert_eq!(details.images, vec!["https://img.org/a.jpg".to_string()]);
    }

    #[tokio::test]
    async fn test_process_event_end_to_end() {
        let server = MockServer::start().await;
        let links = mount_articles(&server, 3).await;
        Mock::given(method("POST"))
            .and(path("/revalidate"))
            .and(body_json(json!({ "tags": ["events", "event-5", "event-details-5"] })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let store = MemoryStore::default().with_event(5, "Tulsa race massacre", "Tulsa 1921");
        let pipeline = pipeline(&server, CannedLlm::new(GOOD_RESPONSE), store);

        let processed = pipeline.process_event(5).await.unwrap();
        assert_eq!(processed.event_data.title, "Tulsa 1921");
        assert_eq!(processed.structured_data.location, "Tulsa, Oklahoma");
        assert!(processed.structured_data.timeline.is_empty());
        assert_eq!(processed.structured_data.sources, links);
        assert_eq!(processed.structured_data.images, vec!["https://img.org/scene.jpg".to_string()]);
        assert_eq!(processed.scraped_data.articles.len(), 3);

        let stored = pipeline.store().details(5).unwrap();
        assert_eq!(stored.details, processed.structured_data);
        assert!(pipeline.store().last_updated(5).is_some());
        pipeline.drain_notifications(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn test_unknown_event_stops_before_scraping() {
        let server = MockServer::start().await;
        let pipeline = pipeline(&server, CannedLlm::new(GOOD_RESPONSE), MemoryStore::default());
        let err = pipeline.process_event(404).await.unwrap_err();
        assert!(matches!(err, PipelineError::Store(StoreError::NotFound(404))));
        assert_eq!(pipeline.synthesis.llm().calls(), 0);
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_synthesis_failure_writes_nothing() {
        let server = MockServer::start().await;
        mount_articles(&server, 2).await;
        let store = MemoryStore::default().with_event(5, "q", "t");
        let pipeline = pipeline(&server, CannedLlm::new("No JSON today."), store);

        let err = pipeline.process_event(5).await.unwrap_err();
        assert!(matches!(err, PipelineError::Synthesis(SynthesisError::NoJsonObject { .. })));
        assert!(pipeline.store().details(5).is_none());
        assert!(pipeline.store().last_updated(5).is_none());
    }

    #[tokio::test]
    async fn test_timestamp_failure_is_not_fatal() {
        let server = MockServer::start().await;
        mount_articles(&server, 2).await;
        let store = MemoryStore::default().with_event(5, "q", "t").failing_timestamps();
        let pipeline = pipeline(&server, CannedLlm::new(GOOD_RESPONSE), store);

        pipeline.process_event(5).await.unwrap();
        assert!(pipeline.store().details(5).is_some());
        assert!(pipeline.store().last_updated(5).is_none());
    }

    async fn mount_dated_search(server: &MockServer) {
        let items = json!({ "items": [
            { "title": "Old", "link": "https://a.org/old", "snippet": "s",
              "pagemap": { "metatags": [{ "article:published_time": "2023-01-01T00:00:00Z" }] } },
            { "title": "New", "link": "https://www.reddit.com/r/news/new", "snippet": "s",
              "pagemap": { "metatags": [{ "article:published_time": "2024-06-02T00:00:00Z" }] } }
        ]});
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("start", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(items))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("start", "11"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(server)
            .await;
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn test_analyze_updates_stores_recent_developments() {
        let server = MockServer::start().await;
        mount_dated_search(&server).await;
        let llm = CannedLlm::new(
            r#"{"has_new_updates": true, "updates": [{"date": "2024-06-02", "title": "Survivors sue", "description": "A lawsuit was filed."}]}"#,
        );
        let store = MemoryStore::default().with_event(5, "q", "t");
        let pipeline = pipeline(&server, llm, store);

        let updates = pipeline.analyze_updates(5, day("2024-01-01")).await.unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(pipeline.store().updates(5), updates);
        assert!(pipeline.store().last_updated(5).is_some());

        let prompts = pipeline.synthesis.llm().prompts.lock().unwrap();
        assert!(prompts[0].user.contains("https://www.reddit.com/r/news/new"));
        assert!(!prompts[0].user.contains("https://a.org/old"));
    }

    #[tokio::test]
    async fn test_analyze_updates_without_recent_coverage_skips_llm() {
        let server = MockServer::start().await;
        mount_dated_search(&server).await;
        let store = MemoryStore::default().with_event(5, "q", "t");
        let pipeline = pipeline(&server, CannedLlm::new("{}"), store);

        let updates = pipeline.analyze_updates(5, day("2025-01-01")).await.unwrap();
        assert!(updates.is_empty());
        assert_eq!(pipeline.synthesis.llm().calls(), 0);
    }
}
