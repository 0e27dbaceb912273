//! OpenAI-compatible implementation of the requester trait.
//!
//! Works against api.openai.com and local servers that expose the same chat
//! completions API (LM Studio, vLLM), as long as the model accepts images.
//!
//! # Example
//!
//! ```rust,ignore
//! use kyc_extraction::ai::OpenAIRequester;
//!
//! let requester = OpenAIRequester::new(OpenAIClient::new("lm-studio")
//!     .with_base_url("http://127.0.0.1:1234/v1"), "internvl3_5-4b");
//! let raw = requester.extract(&instruction, &image_bytes).await?;
//! ```

use async_trait::async_trait;
use openai_client::{ChatRequest, ContentPart, Message, OpenAIClient};
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use crate::error::{ExtractionError, Result};
use crate::image::{sniff_mime, to_data_uri, FALLBACK_MIME};
use crate::traits::requester::ExtractionRequester;
use crate::types::config::VisionConfig;
use crate::types::fields::RawModelOutput;

/// System turn used when no document-specific prompt is set.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful OCR assistant. \
    Return ONLY a valid JSON object with exactly the keys requested by the user. \
    Do not add commentary or markdown fences.";

/// Vision requester backed by an OpenAI-compatible chat endpoint.
#[derive(Clone)]
pub struct OpenAIRequester {
    client: OpenAIClient,
    model: String,
    system_prompt: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAIRequester {
    /// Create a requester for `model` with deterministic sampling and a
    /// 1000-token completion bound.
    pub fn new(client: OpenAIClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: 1000,
            temperature: 0.0,
        }
    }

    /// Build the client and requester from endpoint configuration.
    ///
    /// The timeout in `config` is not applied here; callers impose it.
    pub fn from_config(config: &VisionConfig) -> Self {
        let client =
            OpenAIClient::new(config.api_key.expose_secret()).with_base_url(&config.base_url);
        Self::new(client, config.model.clone())
            .with_max_tokens(config.max_tokens)
            .with_temperature(config.temperature)
    }

    /// Replace the system turn.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Set the completion bound.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the system prompt.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Build the two-turn multimodal request without sending it.
    pub fn build_request(&self, instruction: &str, image: &[u8]) -> Result<ChatRequest> {
        if instruction.trim().is_empty() {
            return Err(ExtractionError::invalid_request("instruction is empty"));
        }
        if image.is_empty() {
            return Err(ExtractionError::invalid_request("image is empty"));
        }

        Ok(ChatRequest::new(&self.model)
            .message(Message::system(&self.system_prompt))
            .message(Message::user_parts(vec![
                ContentPart::text(instruction),
                ContentPart::image_url(to_data_uri(image)),
            ]))
            .temperature(self.temperature)
            .completion_limit(self.max_tokens)
            .no_stream())
    }
}

#[async_trait]
impl ExtractionRequester for OpenAIRequester {
    async fn extract(&self, instruction: &str, image: &[u8]) -> Result<RawModelOutput> {
        let request = self.build_request(instruction, image)?;

        debug!(
            model = %self.model,
            image_bytes = image.len(),
            mime = sniff_mime(image).unwrap_or(FALLBACK_MIME),
            "Requesting document transcription"
        );

        let response = self.client.chat_completion(request).await.map_err(|e| {
            warn!(model = %self.model, error = %e, "Vision model call failed");
            ExtractionError::extraction_failed(e)
        })?;

        if let Some(usage) = &response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Vision model usage"
            );
        }

        Ok(RawModelOutput::new(response.content))
    }
}
