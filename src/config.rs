//! Configuration types for batch extraction.
//!
//! All batch behaviour is controlled through [`BatchConfig`], built via its
//! [`BatchConfigBuilder`]. Service handles can be injected directly
//! (`extractor`, `generator`, `provider`) or left empty to be resolved from
//! names and environment variables by [`crate::batch::preflight`].

use crate::error::IntakeError;
use crate::pipeline::ocr::{TextExtractor, GOOGLE_VISION_ENDPOINT};
use crate::pipeline::structure::TextGenerator;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default structuring model when only `OPENAI_API_KEY` is available.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Configuration for one batch run.
///
/// # Example
/// ```rust
/// use intake_extract::{BatchConfig, OcrBackend};
///
/// let config = BatchConfig::builder()
///     .ocr_backend(OcrBackend::VisionModel)
///     .model("gpt-4o-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// LLM model identifier, e.g. "gpt-4o-mini". If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed text generator. Takes precedence over every provider
    /// setting; used by tests and by callers with their own model client.
    pub generator: Option<Arc<dyn TextGenerator>>,

    /// Pre-constructed OCR backend. Takes precedence over `ocr_backend`.
    pub extractor: Option<Arc<dyn TextExtractor>>,

    /// Which OCR backend to build when `extractor` is None. Default: Google Vision.
    pub ocr_backend: OcrBackend,

    /// Cloud Vision API key. If None, read from `GOOGLE_VISION_API_KEY`.
    pub google_api_key: Option<String>,

    /// Cloud Vision annotate URL.
    pub vision_endpoint: String,

    /// Maximum tokens per generation call. Default: 16384.
    ///
    /// A form with several phone numbers repeats every other field per
    /// row, so the table can be much longer than the OCR text.
    pub max_tokens: usize,

    /// Optional per-image progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            generator: None,
            extractor: None,
            ocr_backend: OcrBackend::default(),
            google_api_key: None,
            vision_endpoint: GOOGLE_VISION_ENDPOINT.to_string(),
            max_tokens: 16384,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("generator", &self.generator.as_ref().map(|_| "<dyn TextGenerator>"))
            .field("extractor", &self.extractor.as_ref().map(|_| "<dyn TextExtractor>"))
            .field("ocr_backend", &self.ocr_backend)
            .field("google_api_key", &self.google_api_key.as_ref().map(|_| "<redacted>"))
            .field("vision_endpoint", &self.vision_endpoint)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl BatchConfig {
    /// Create a new builder for `BatchConfig`.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.config.generator = Some(generator);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn ocr_backend(mut self, backend: OcrBackend) -> Self {
        self.config.ocr_backend = backend;
        self
    }

    pub fn google_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.google_api_key = Some(key.into());
        self
    }

    pub fn vision_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.vision_endpoint = url.into();
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, IntakeError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(IntakeError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if !(c.vision_endpoint.starts_with("http://") || c.vision_endpoint.starts_with("https://")) {
            return Err(IntakeError::InvalidConfig(format!(
                "vision endpoint must be an HTTP(S) URL, got '{}'",
                c.vision_endpoint
            )));
        }
        Ok(self.config)
    }
}

/// Which OCR backend reads the scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OcrBackend {
    /// Google Cloud Vision `TEXT_DETECTION`. (default)
    #[default]
    GoogleVision,
    /// The configured LLM provider reading the image as a vision model.
    VisionModel,
}

impl fmt::Display for OcrBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OcrBackend::GoogleVision => f.write_str("google-vision"),
            OcrBackend::VisionModel => f.write_str("vision-model"),
        }
    }
}
