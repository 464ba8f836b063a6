//! Error types for each pipeline stage.
//!
//! Transient source failures (one search page, one article, the image query) never
//! show up here: they are logged and skipped where they happen. What remains are
//! the failures that abort a run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search credentials are not configured (GOOGLE_API_KEY / GOOGLE_CSE_ID)")]
    MissingCredentials,

    #[error("all {pages} search page requests failed for query {query:?}")]
    AllPagesFailed { query: String, pages: usize },
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM API key is not configured (OPENAI_API_KEY)")]
    MissingApiKey,

    #[error("LLM transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM API returned {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("LLM returned no response content")]
    EmptyResponse,

    #[error("no JSON object in LLM response (len {len}); head: {head:?}; tail: {tail:?}")]
    NoJsonObject { len: usize, head: String, tail: String },

    #[error("LLM response JSON is malformed (len {len}): {source}; head: {head:?}; tail: {tail:?}")]
    MalformedJson {
        len: usize,
        head: String,
        tail: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("LLM response does not match the expected schema: {0}")]
    Schema(#[source] serde_json::Error),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("event {0} not found")]
    NotFound(i64),

    #[error("event {0} has no search query")]
    MissingQuery(i64),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("no usable articles scraped for query {0:?}")]
    NoArticles(String),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
