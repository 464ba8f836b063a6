//! LLM API interaction with optional exponential backoff.
//!
//! # Architecture
//!
//! - [`AskAsync`]: core trait for one chat completion
//! - [`ChatClient`]: OpenAI-compatible `/chat/completions` client
//! - [`RetryAsk`]: decorator that adds retry logic to any `AskAsync` implementation
//!
//! # Retry Strategy
//!
//! Retries are transport-level and opt-in (`llm.max_retries`, default 0):
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::utils::truncate_for_log;
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// A system instruction plus the user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    /// Role and output rules, sent as the `system` message.
    pub system: String,
    /// The material to work on, sent as the `user` message.
    pub user: String,
}

/// Trait for async LLM interaction.
///
/// Returns the completion text; an absent completion comes back as an empty string.
pub trait AskAsync {
    /// Send a prompt to the LLM and return its completion.
    ///
    /// # Arguments
    ///
    /// * `prompt` - The system instruction and user turn to send
    ///
    /// # Returns
    ///
    /// The completion text, or an [`LlmError`] if the request failed.
    async fn ask(&self, prompt: &Prompt) -> Result<String, LlmError>;
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// Only transport failures are retried; a completion that later fails to parse is
/// returned as-is.
///
/// # Backoff Strategy
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    /// The underlying LLM client to wrap.
    inner: T,
    /// Retries after the first attempt; 0 disables retrying.
    max_retries: usize,
    /// Delay before the first retry (doubles with each attempt).
    base_delay: StdDuration,
    /// Upper bound on any single delay.
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Create a new retry wrapper around an existing [`AskAsync`] implementation.
    ///
    /// # Arguments
    ///
    /// * `inner` - The underlying LLM client to wrap
    /// * `max_retries` - Retries after the first attempt (`llm.max_retries`, default 0)
    /// * `base_delay` - Initial delay between retries
    ///
    /// # Example
    ///
    /// ```ignore
    /// let chat = ChatClient::new(http, Some(key), LlmConfig::default())?;
    /// let llm = RetryAsk::new(chat, 2, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    #[instrument(level = "info", skip_all)]
    async fn ask(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(prompt).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis(),
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1).min(16));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis(),
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completion client with fixed model settings.
#[derive(Debug, Clone)]
pub struct ChatClient {
    /// Shared HTTP client.
    http: reqwest::Client,
    /// Bearer token for the completions endpoint.
    api_key: String,
    /// Endpoint, model and sampling settings.
    config: LlmConfig,
}

impl ChatClient {
    /// Create a client for `{config.api_base}/chat/completions`.
    ///
    /// # Arguments
    ///
    /// * `http` - HTTP client to send requests with
    /// * `api_key` - Bearer token, usually from `OPENAI_API_KEY`
    /// * `config` - Endpoint, model, temperature and token limit
    ///
    /// # Errors
    ///
    /// [`LlmError::MissingApiKey`] when no non-empty key is provided.
    pub fn new(http: reqwest::Client, api_key: Option<String>, config: LlmConfig) -> Result<Self, LlmError> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(LlmError::MissingApiKey)?;
        Ok(Self { http, api_key, config })
    }
}

impl AskAsync for ChatClient {
    #[instrument(level = "info", skip_all, fields(model = %self.config.model))]
    async fn ask(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let t0 = Instant::now();
        let url = format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'));
        let request = ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            messages: [
                ChatMessage { role: "system", content: &prompt.system },
                ChatMessage { role: "user", content: &prompt.user },
            ],
        };
        debug!(prompt_chars = prompt.user.chars().count(), "Sending chat completion");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %truncate_for_log(&body, 300), "Chat completion failed");
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatResponse = response.json().await?;
        let choice = completion.choices.into_iter().next();
        let finish_reason = choice.as_ref().and_then(|c| c.finish_reason.clone());
        let text = choice.and_then(|c| c.message.content).unwrap_or_default();

        info!(
            elapsed_ms = t0.elapsed().as_millis(),
            chars = text.chars().count(),
            finish_reason = finish_reason.as_deref().unwrap_or("unknown"),
            "Chat completion received"
        );
        Ok(text)
    }
}
