//! YAML configuration for the LLM and search collaborators.
//!
//! Secrets never live here; they come from the CLI/environment (see [`crate::cli`]).
//! Every key is optional:
//!
//! ```yaml
//! llm:
//!   api_base: https://api.openai.com/v1
//!   model: gpt-4o-mini
//!   temperature: 0.3
//!   max_tokens: 4000
//!   max_retries: 0
//! search:
//!   endpoint: https://www.googleapis.com/customsearch/v1
//!   pages: 3
//!   page_delay_ms: 300
//! ```

use crate::search::DEFAULT_ENDPOINT;
use crate::search::web::{DEFAULT_PAGE_DELAY, DEFAULT_PAGES};
use serde::Deserialize;
use std::error::Error;
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub llm: LlmConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_retries: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_tokens: 4000,
            max_retries: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub endpoint: String,
    pub pages: usize,
    pub page_delay_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            pages: DEFAULT_PAGES,
            page_delay_ms: DEFAULT_PAGE_DELAY.as_millis() as u64,
        }
    }
}

impl SearchConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

impl PipelineConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    /// Load from `path`, or defaults when no path is given.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&str>) -> Result<Self, Box<dyn Error>> {
        let Some(path) = path else {
            info!("No config file given; using defaults");
            return Ok(Self::default());
        };
        let yaml = tokio::fs::read_to_string(path).await?;
        let config = Self::from_yaml(&yaml)?;
        info!(model = %config.llm.model, pages = config.search.pages, "Loaded configuration");
        Ok(config)
    }
}
