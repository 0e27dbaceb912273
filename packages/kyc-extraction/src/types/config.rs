//! Configuration for the vision model endpoint.

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::{ExtractionError, Result};

/// Key used when no API key is configured; local servers ignore it.
pub const PLACEHOLDER_API_KEY: &str = "lm-studio";

/// Vision model endpoint configuration.
///
/// The API key is held as a [`SecretString`]: it is redacted from `Debug`
/// output and never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    /// Bearer token for the endpoint.
    #[serde(skip, default = "placeholder_api_key")]
    pub api_key: SecretString,

    /// OpenAI-compatible base URL, without the `/chat/completions` suffix.
    pub base_url: String,

    /// Vision-capable chat model.
    pub model: String,

    /// Upper bound on completion length.
    ///
    /// Default: 1000.
    pub max_tokens: u32,

    /// Sampling temperature. Default: 0.0 (deterministic).
    pub temperature: f32,

    /// Whole-call timeout. `None` waits indefinitely.
    ///
    /// Default: 60 seconds.
    pub timeout: Option<Duration>,
}

fn placeholder_api_key() -> SecretString {
    SecretString::from(PLACEHOLDER_API_KEY)
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_key: placeholder_api_key(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            max_tokens: 1000,
            temperature: 0.0,
            timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl VisionConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Reads a `.env` file first if one is present.
    ///
    /// - `KYC_VISION_API_KEY` (falls back to `OPENAI_API_KEY`)
    /// - `KYC_VISION_BASE_URL`
    /// - `KYC_VISION_MODEL`
    /// - `KYC_VISION_MAX_TOKENS`
    /// - `KYC_VISION_TIMEOUT_SECS` (`0` disables the timeout)
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let max_tokens = match non_empty("KYC_VISION_MAX_TOKENS") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                ExtractionError::Config(format!(
                    "KYC_VISION_MAX_TOKENS must be a positive integer, got '{raw}'"
                ))
            })?,
            None => defaults.max_tokens,
        };
        if max_tokens == 0 {
            return Err(ExtractionError::Config(
                "KYC_VISION_MAX_TOKENS must be greater than zero".into(),
            ));
        }

        let timeout = match non_empty("KYC_VISION_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|_| {
                    ExtractionError::Config(format!(
                        "KYC_VISION_TIMEOUT_SECS must be a number of seconds, got '{raw}'"
                    ))
                })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => defaults.timeout,
        };

        Ok(Self {
            api_key: non_empty("KYC_VISION_API_KEY")
                .or_else(|| non_empty("OPENAI_API_KEY"))
                .map(SecretString::from)
                .unwrap_or(defaults.api_key),
            base_url: non_empty("KYC_VISION_BASE_URL").unwrap_or(defaults.base_url),
            model: non_empty("KYC_VISION_MODEL").unwrap_or(defaults.model),
            max_tokens,
            temperature: defaults.temperature,
            timeout,
        })
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = SecretString::from(api_key.into());
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the completion bound.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set or clear the timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}
