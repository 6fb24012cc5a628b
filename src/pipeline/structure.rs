//! Structuring request: ask a language model to turn OCR text into a table.
//!
//! All prompt wording lives in [`crate::prompts`]; this module only builds
//! the request, calls the [`TextGenerator`] capability once, and applies the
//! failure-to-empty-string policy. There is no retry: a failed call drops
//! the image.

use crate::prompts::{structuring_prompt, STRUCTURING_SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A text-generation call failed.
#[derive(Debug, Error)]
#[error("Text generation failed: {0}")]
pub struct GenerationError(pub String);

/// One text-generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub prompt: String,
    /// Ask for greedy decoding so identical input gives identical output.
    pub deterministic: bool,
    pub max_tokens: usize,
}

/// Text-generation capability: prompt in, completion text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// [`TextGenerator`] backed by an `edgequake-llm` provider.
pub struct LlmGenerator {
    provider: Arc<dyn LLMProvider>,
}

impl LlmGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

/// Map a request to provider options; deterministic means temperature 0.
fn build_options(request: &GenerationRequest) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(if request.deterministic { 0.0 } else { 1.0 }),
        max_tokens: Some(request.max_tokens),
        ..Default::default()
    }
}

#[async_trait]
impl TextGenerator for LlmGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let messages = vec![
            ChatMessage::system(request.system_prompt.as_str()),
            ChatMessage::user(request.prompt.as_str()),
        ];
        let options = build_options(request);

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| GenerationError(e.to_string()))?;
        debug!(
            "Structuring: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Build the deterministic structuring request for `raw_text`.
pub fn structuring_request(raw_text: &str, max_tokens: usize) -> GenerationRequest {
    GenerationRequest {
        system_prompt: STRUCTURING_SYSTEM_PROMPT.to_string(),
        prompt: structuring_prompt(raw_text),
        deterministic: true,
        max_tokens,
    }
}

/// Send OCR text to the generator, converting every failure to an empty string.
pub async fn request_structuring(
    generator: &dyn TextGenerator,
    raw_text: &str,
    max_tokens: usize,
) -> String {
    let request = structuring_request(raw_text, max_tokens);
    match generator.generate(&request).await {
        Ok(text) => {
            let text = text.trim();
            if text.is_empty() {
                warn!("Structuring returned an empty response");
            } else {
                info!("Structured text received ({} chars)", text.len());
            }
            text.to_string()
        }
        Err(e) => {
            warn!("Structuring failed: {}", e);
            String::new()
        }
    }
}
