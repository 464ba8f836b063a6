//! # Deadline Pipeline
//!
//! Researches historical events for a publication's website: searches the web
//! for an event's query, scrapes the best pages, asks an LLM to synthesize a
//! structured record and stores it in Postgres.
//!
//! ## Usage
//!
//! ```sh
//! deadline_pipeline process --event-id 42
//! deadline_pipeline updates --event-id 42 --since 2024-01-01
//! deadline_pipeline preview --query "1967 Detroit uprising"
//! deadline_pipeline migrate
//! ```
//!
//! ## Architecture
//!
//! 1. **Load**: read the event's search query from the `events` table
//! 2. **Search**: paginate Google Custom Search, filter and pick up to 18 pages
//! 3. **Scrape**: fetch pages concurrently and extract article text
//! 4. **Synthesize**: one LLM call, repaired into typed fields
//! 5. **Persist**: upsert `event_details`, touch the event, invalidate caches

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod error;
mod models;
mod outputs;
mod pipeline;
mod revalidate;
mod scrapers;
mod search;
mod store;
mod synthesis;
mod utils;

use api::{ChatClient, RetryAsk};
use cli::{Cli, Command};
use config::PipelineConfig;
use outputs::json;
use pipeline::{Pipeline, synthesize_query};
use revalidate::Revalidator;
use scrapers::fetch::ArticleFetcher;
use scrapers::orchestrator::ScrapeOrchestrator;
use search::SearchCredentials;
use search::images::ImageSearchClient;
use search::web::WebSearchClient;
use store::postgres::PgStore;
use synthesis::SynthesisEngine;
use utils::ensure_writable_dir;

const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
const NOTIFY_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("deadline_pipeline starting up");

    let args = Cli::parse();
    debug!(command = ?args.command, config = ?args.config, "Parsed CLI arguments");

    let config = PipelineConfig::load(args.config.as_deref()).await?;

    let result = run(&args, &config).await;
    if let Err(ref e) = result {
        error!(error = %e, "Run failed");
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    result
}

async fn run(args: &Cli, config: &PipelineConfig) -> Result<(), Box<dyn Error>> {
    match &args.command {
        Command::Migrate => {
            let store = connect_store(args).await?;
            store.migrate().await?;
        }
        Command::Preview { query } => {
            let http = reqwest::Client::new();
            let scraper = build_scraper(args, config, &http)?;
            let synthesis = build_synthesis(args, config, &http)?;
            let (details, _) = synthesize_query(&scraper, &synthesis, query).await?;
            println!("{}", serde_json::to_string_pretty(&details)?);
        }
        Command::Process { event_id, json_output_dir } => {
            // Fail before spending any API calls on an unwritable directory.
            if let Some(dir) = json_output_dir {
                if let Err(e) = ensure_writable_dir(dir).await {
                    error!(path = %dir, error = %e, "JSON output directory is not writable");
                    return Err(e);
                }
            }

            let pipeline = build_pipeline(args, config).await?;
            let processed = pipeline.process_event(*event_id).await;
            pipeline.drain_notifications(NOTIFY_GRACE).await;
            let processed = processed?;

            if let Some(dir) = json_output_dir {
                if let Err(e) = json::write_processed(&processed, dir).await {
                    error!(error = %e, "Failed to write JSON copy");
                }
            }
        }
        Command::Updates { event_id, since } => {
            let pipeline = build_pipeline(args, config).await?;
            let updates = pipeline.analyze_updates(*event_id, *since).await;
            pipeline.drain_notifications(NOTIFY_GRACE).await;
            let updates = updates?;
            info!(event_id, count = updates.len(), "Update analysis complete");
        }
    }
    Ok(())
}

async fn connect_store(args: &Cli) -> Result<PgStore, Box<dyn Error>> {
    let url = args
        .database_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or("DATABASE_URL is not set")?;
    Ok(PgStore::connect(url).await?)
}

fn build_scraper(
    args: &Cli,
    config: &PipelineConfig,
    http: &reqwest::Client,
) -> Result<ScrapeOrchestrator, Box<dyn Error>> {
    let creds = SearchCredentials::new(args.google_api_key.clone(), args.google_cse_id.clone());
    let web = WebSearchClient::new(http.clone(), config.search.endpoint.clone(), creds.clone())
        .with_pagination(config.search.pages, config.search.page_delay());
    let images = ImageSearchClient::new(http.clone(), config.search.endpoint.clone(), creds);
    Ok(ScrapeOrchestrator::new(web, images, ArticleFetcher::new()?))
}

fn build_synthesis(
    args: &Cli,
    config: &PipelineConfig,
    http: &reqwest::Client,
) -> Result<SynthesisEngine<RetryAsk<ChatClient>>, Box<dyn Error>> {
    let chat = ChatClient::new(http.clone(), args.openai_api_key.clone(), config.llm.clone())?;
    let llm = RetryAsk::new(chat, config.llm.max_retries, RETRY_BASE_DELAY);
    Ok(SynthesisEngine::new(llm))
}

async fn build_pipeline(
    args: &Cli,
    config: &PipelineConfig,
) -> Result<Pipeline<RetryAsk<ChatClient>, PgStore>, Box<dyn Error>> {
    let http = reqwest::Client::new();
    let scraper = build_scraper(args, config, &http)?;
    let synthesis = build_synthesis(args, config, &http)?;
    let store = connect_store(args).await?;
    let revalidator = Revalidator::new(http, args.revalidate_url.clone(), args.revalidate_secret.clone());
    Ok(Pipeline::new(scraper, synthesis, store, revalidator))
}
