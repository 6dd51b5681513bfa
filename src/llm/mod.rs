//! LLM integration for Surooh.
//!
//! A single OpenAI-compatible chat completions backend sits behind the
//! `LlmProvider` trait so the brain and the bots can be tested with scripted
//! providers.

pub mod openai;
pub mod provider;

pub use openai::OpenAiCompatProvider;
pub use provider::*;

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use crate::config::{Lookup, non_empty, parsed_or};
use crate::error::{ConfigError, LlmError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl LlmConfig {
    /// Returns `Ok(None)` when no API key is present (brain disabled).
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Option<Self>, ConfigError> {
        let Some(api_key) =
            non_empty(lookup, "SUROOH_LLM_API_KEY").or_else(|| non_empty(lookup, "OPENAI_API_KEY"))
        else {
            return Ok(None);
        };

        Ok(Some(Self {
            api_key: SecretString::from(api_key),
            base_url: non_empty(lookup, "SUROOH_LLM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: non_empty(lookup, "SUROOH_LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout: Duration::from_secs(parsed_or(
                lookup,
                "SUROOH_LLM_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )?),
        }))
    }
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider = OpenAiCompatProvider::new(
        config.base_url.clone(),
        config.api_key.clone(),
        config.model.clone(),
        config.timeout,
    )?;
    tracing::info!(model = %config.model, base_url = %config.base_url, "LLM provider ready");
    Ok(Arc::new(provider))
}
