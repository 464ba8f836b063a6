//! Command-line interface definitions.
//!
//! Secrets and endpoints can be passed as flags or picked up from the
//! environment; tunables live in the optional YAML config.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// Research pipeline for historical events.
///
/// # Examples
///
/// ```sh
/// # Research event 42 and keep a JSON copy of the result
/// deadline_pipeline process --event-id 42 -j ./json
///
/// # Look for coverage of event 42 published after a date
/// deadline_pipeline updates --event-id 42 --since 2024-01-01
///
/// # Dry run: scrape and synthesize a query without a database
/// deadline_pipeline preview --query "1967 Detroit uprising"
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Optional path to config.yaml file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Google Custom Search API key
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: Option<String>,

    /// Google Custom Search engine id
    #[arg(long, env = "GOOGLE_CSE_ID")]
    pub google_cse_id: Option<String>,

    /// API key for the chat-completions endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Cache revalidation endpoint of the website
    #[arg(long, env = "REVALIDATE_URL")]
    pub revalidate_url: Option<String>,

    /// Shared secret sent with revalidation requests
    #[arg(long, env = "REVALIDATE_SECRET", hide_env_values = true)]
    pub revalidate_secret: Option<String>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Scrape, synthesize and store details for an event
    Process {
        #[arg(long)]
        event_id: i64,

        /// Also write the processed event to this directory as JSON
        #[arg(short, long)]
        json_output_dir: Option<String>,
    },
    /// Extract dated developments published after a cutoff
    Updates {
        #[arg(long)]
        event_id: i64,

        /// Cutoff date, YYYY-MM-DD
        #[arg(long)]
        since: NaiveDate,
    },
    /// Scrape and synthesize a query, print JSON, store nothing
    Preview {
        #[arg(short, long)]
        query: String,
    },
    /// Apply database migrations
    Migrate,
}
