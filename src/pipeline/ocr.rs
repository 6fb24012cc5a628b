//! Image text extraction: the OCR capability and the stage that calls it.
//!
//! The pipeline only sees [`TextExtractor`], a one-method capability, so
//! tests and callers can swap in any backend. Two backends ship:
//!
//! - [`GoogleVisionExtractor`] — Cloud Vision `TEXT_DETECTION` over REST
//! - [`VisionModelExtractor`] — a vision-language model reading the scan
//!
//! [`extract_text`] is the stage itself. It never returns an error: any
//! failure is logged and turned into an empty string, which the coordinator
//! treats as "skip this image".

use crate::pipeline::input::SourceImage;
use crate::prompts::{OCR_SYSTEM_PROMPT, OCR_USER_PROMPT};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default Cloud Vision annotate endpoint.
pub const GOOGLE_VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Why an OCR call produced no text.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The request never got a response.
    #[error("OCR request failed: {0}")]
    Transport(String),

    /// The service answered with an error.
    #[error("OCR service error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Service { status: Option<u16>, message: String },

    /// The response body did not have the expected shape.
    #[error("Unexpected OCR response: {0}")]
    InvalidResponse(String),

    /// The bytes are not an image format the backend understands.
    #[error("Unsupported image data: {0}")]
    UnsupportedImage(String),
}

/// OCR capability: image bytes in, raw text out.
///
/// An `Ok` with an empty string means "no text detected"; the stage treats
/// it the same as an error.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, image: &[u8]) -> Result<String, OcrError>;
}

/// Run OCR on one image, converting every failure to an empty string.
pub async fn extract_text(extractor: &dyn TextExtractor, image: &SourceImage) -> String {
    let name = image.name();
    match extractor.extract_text(image.bytes()).await {
        Ok(text) => {
            let text = text.trim();
            if text.is_empty() {
                warn!("No text detected in image '{}'", name);
            } else {
                info!("Extracted text from image '{}' ({} chars)", name, text.len());
            }
            text.to_string()
        }
        Err(e) => {
            warn!("OCR failed for image '{}': {}", name, e);
            String::new()
        }
    }
}

// ── Google Cloud Vision ──────────────────────────────────────────────────

/// Cloud Vision `images:annotate` client authenticated with an API key.
#[derive(Debug, Clone)]
pub struct GoogleVisionExtractor {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GoogleVisionExtractor {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: GOOGLE_VISION_ENDPOINT.to_string(),
            api_key: api_key.into(),
        }
    }

    /// Point the client at a different annotate URL (proxies, emulators).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct AnnotateRequest<'a> {
    requests: [AnnotateImageRequest<'a>; 1],
}

#[derive(Debug, Serialize)]
struct AnnotateImageRequest<'a> {
    image: VisionImage,
    features: [Feature<'a>; 1],
}

#[derive(Debug, Serialize)]
struct VisionImage {
    content: String,
}

#[derive(Debug, Serialize)]
struct Feature<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    text_annotations: Vec<EntityAnnotation>,
    error: Option<VisionStatus>,
}

#[derive(Debug, Deserialize)]
struct EntityAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct VisionStatus {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct VisionErrorBody {
    error: VisionStatus,
}

/// Pull the full-page text out of an annotate response.
///
/// The first text annotation holds the whole detected text; the rest are
/// individual words. No annotations means no text.
pub(crate) fn text_from_response(response: AnnotateResponse) -> Result<String, OcrError> {
    let first = response
        .responses
        .into_iter()
        .next()
        .ok_or_else(|| OcrError::InvalidResponse("empty 'responses' array".into()))?;

    if let Some(err) = first.error {
        if !err.message.is_empty() {
            return Err(OcrError::Service {
                status: None,
                message: err.message,
            });
        }
    }

    Ok(first
        .text_annotations
        .into_iter()
        .next()
        .map(|a| a.description.trim().to_string())
        .unwrap_or_default())
}

#[async_trait]
impl TextExtractor for GoogleVisionExtractor {
    async fn extract_text(&self, image: &[u8]) -> Result<String, OcrError> {
        let body = AnnotateRequest {
            requests: [AnnotateImageRequest {
                image: VisionImage {
                    content: STANDARD.encode(image),
                },
                features: [Feature {
                    kind: "TEXT_DETECTION",
                }],
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| OcrError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<VisionErrorBody>(&text)
                .map(|b| b.error.message)
                .unwrap_or(text);
            return Err(OcrError::Service {
                status: Some(status.as_u16()),
                message,
            });
        }

        let parsed: AnnotateResponse = response
            .json()
            .await
            .map_err(|e| OcrError::InvalidResponse(e.to_string()))?;
        text_from_response(parsed)
    }
}

// ── Vision-language model ────────────────────────────────────────────────

/// OCR by asking a vision-capable LLM to transcribe the scan.
pub struct VisionModelExtractor {
    provider: Arc<dyn LLMProvider>,
    max_tokens: usize,
}

impl VisionModelExtractor {
    pub fn new(provider: Arc<dyn LLMProvider>, max_tokens: usize) -> Self {
        Self {
            provider,
            max_tokens,
        }
    }
}

/// Wrap raw image bytes as a base64 attachment with a sniffed MIME type.
///
/// `detail: "high"` keeps small handwriting legible to GPT-class models.
pub fn encode_image(bytes: &[u8]) -> Result<ImageData, OcrError> {
    let format = image::guess_format(bytes).map_err(|e| OcrError::UnsupportedImage(e.to_string()))?;
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded image → {} bytes base64", b64.len());
    Ok(ImageData::new(b64, format.to_mime_type()).with_detail("high"))
}

fn ocr_messages(data: ImageData) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(OCR_SYSTEM_PROMPT),
        ChatMessage::user_with_images(OCR_USER_PROMPT, vec![data]),
    ]
}

#[async_trait]
impl TextExtractor for VisionModelExtractor {
    async fn extract_text(&self, image: &[u8]) -> Result<String, OcrError> {
        let messages = ocr_messages(encode_image(image)?);
        let options = CompletionOptions {
            temperature: Some(0.0),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| OcrError::Service {
                status: None,
                message: e.to_string(),
            })?;
        debug!(
            "Vision OCR: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}
