//! One scrape run: web search, concurrent article fetches, image search.

use crate::error::PipelineError;
use crate::models::{ScrapedArticle, ScrapedData};
use crate::scrapers::fetch::ArticleFetcher;
use crate::search::images::ImageSearchClient;
use crate::search::web::{MAX_SCRAPE_TARGETS, WebSearchClient, select_for_scraping};
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, instrument};

#[derive(Debug, Clone)]
pub struct ScrapeOrchestrator {
    web: WebSearchClient,
    images: ImageSearchClient,
    fetcher: ArticleFetcher,
}

impl ScrapeOrchestrator {
    pub fn new(web: WebSearchClient, images: ImageSearchClient, fetcher: ArticleFetcher) -> Self {
        Self { web, images, fetcher }
    }

    pub fn web(&self) -> &WebSearchClient {
        &self.web
    }

    /// Search `query`, scrape the selected hits and look for images.
    ///
    /// Every fetch in the batch runs to completion or failure independently; failed
    /// or thin articles are dropped.
    ///
    /// # Errors
    ///
    /// Propagates search failures, and returns [`PipelineError::NoArticles`] when
    /// nothing usable was scraped.
    #[instrument(level = "info", skip(self))]
    pub async fn scrape(&self, query: &str) -> Result<ScrapedData, PipelineError> {
        let results = self.web.search(query).await?;
        let targets = select_for_scraping(&results);
        info!(results = results.len(), targets = targets.len(), "Scraping selected results");

        let fetched: Vec<Option<ScrapedArticle>> = stream::iter(targets.iter())
            .map(|target| {
                let fetcher = &self.fetcher;
                async move { fetcher.fetch(&target.link).await }
            })
            .buffered(MAX_SCRAPE_TARGETS)
            .collect()
            .await;

        let attempted = fetched.len();
        let fetched_ok = fetched.iter().filter(|a| a.is_some()).count();
        let articles: Vec<ScrapedArticle> = fetched
            .into_iter()
            .flatten()
            .filter(|article| {
                let usable = article.has_usable_content();
                if !usable {
                    debug!(url = %article.url, "Dropping article with thin content");
                }
                usable
            })
            .collect();

        info!(
            attempted,
            fetched = fetched_ok,
            usable = articles.len(),
            "Article batch settled"
        );

        if articles.is_empty() {
            error!(%query, "No usable articles scraped");
            return Err(PipelineError::NoArticles(query.to_string()));
        }

        let images = self.images.search(query).await;

        Ok(ScrapedData {
            results,
            articles,
            images,
        })
    }
}
