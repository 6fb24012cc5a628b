//! Batch coordinator: drive every image in a directory through the pipeline.
//!
//! Images run strictly one at a time, in sorted listing order, so the
//! accumulated records come out in image order and then line order within
//! each image. A failure at any stage drops that one image (logged and
//! recorded in its [`ImageResult`]) and the loop moves on. Only two things
//! abort a batch: a directory with no supported images, and missing
//! service credentials.

use crate::config::{BatchConfig, OcrBackend, DEFAULT_MODEL};
use crate::error::{ImageError, IntakeError};
use crate::output::{BatchOutput, BatchReport, BatchStats, ImageResult};
use crate::pipeline::input::{self, display_name, SourceImage};
use crate::pipeline::ocr::{self, GoogleVisionExtractor, TextExtractor, VisionModelExtractor};
use crate::pipeline::structure::{self, LlmGenerator, TextGenerator};
use crate::pipeline::{parse, write};
use crate::record::PatientRecord;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The two external capabilities a batch needs, resolved once.
#[derive(Clone)]
pub struct Services {
    pub extractor: Arc<dyn TextExtractor>,
    pub generator: Arc<dyn TextGenerator>,
}

/// Resolve the OCR and text-generation services from `config`.
///
/// Call this once at startup so missing credentials fail before any image
/// is touched. The batch entry points call it again internally; resolution
/// only builds clients and makes no network calls.
///
/// # Errors
/// - [`IntakeError::ProviderNotConfigured`] when no LLM provider can be built
/// - [`IntakeError::OcrNotConfigured`] when Google Vision has no API key
pub fn preflight(config: &BatchConfig) -> Result<Services, IntakeError> {
    let mut provider: Option<Arc<dyn LLMProvider>> = None;

    let generator: Arc<dyn TextGenerator> = match config.generator {
        Some(ref generator) => Arc::clone(generator),
        None => {
            let p = resolve_provider(config)?;
            provider = Some(Arc::clone(&p));
            Arc::new(LlmGenerator::new(p))
        }
    };

    let extractor: Arc<dyn TextExtractor> = match config.extractor {
        Some(ref extractor) => Arc::clone(extractor),
        None => match config.ocr_backend {
            OcrBackend::GoogleVision => {
                let key = google_api_key(config)?;
                Arc::new(GoogleVisionExtractor::new(key).with_endpoint(&config.vision_endpoint))
            }
            OcrBackend::VisionModel => {
                let p = match provider {
                    Some(p) => p,
                    None => resolve_provider(config)?,
                };
                Arc::new(VisionModelExtractor::new(p, config.max_tokens))
            }
        },
    };

    Ok(Services {
        extractor,
        generator,
    })
}

/// Run every supported image in `input_dir` through OCR, structuring and
/// parsing, and return the accumulated records without writing anything.
///
/// # Errors
/// Returns `Err` only for fatal conditions: missing or unreadable
/// directory, zero supported images, or unresolvable services. Every
/// per-image failure is reported through [`BatchOutput::images`].
pub async fn extract_batch(
    input_dir: impl AsRef<Path>,
    config: &BatchConfig,
) -> Result<BatchOutput, IntakeError> {
    let start = Instant::now();
    let input_dir = input_dir.as_ref();
    info!("Starting batch: {}", input_dir.display());

    // ── Step 1: List images ──────────────────────────────────────────────
    let images = input::discover_images(input_dir)?;
    let total = images.len();
    info!("Found {} images", total);

    // ── Step 2: Resolve services ─────────────────────────────────────────
    let services = preflight(config)?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    // ── Step 3: Process images in order ──────────────────────────────────
    let mut records: Vec<PatientRecord> = Vec::new();
    let mut results: Vec<ImageResult> = Vec::with_capacity(total);

    for (i, path) in images.iter().enumerate() {
        let (image_records, result) = process_image(&services, path, i + 1, total, config).await;
        records.extend(image_records);
        results.push(result);
    }

    // ── Step 4: Stats ────────────────────────────────────────────────────
    let processed = results.iter().filter(|r| r.is_success()).count();
    let stats = BatchStats {
        total_images: total,
        processed_images: processed,
        failed_images: total - processed,
        total_records: records.len(),
        total_duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "Batch complete: {}/{} images, {} records, {}ms",
        processed, total, stats.total_records, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, processed, records.len());
    }

    Ok(BatchOutput {
        records,
        images: results,
        stats,
    })
}

/// Process a directory and write the records to `output_path`.
///
/// The writer runs once, after every image. When no image produced a
/// record the writer is not called and `output_path` in the report is
/// `None`; a failed write is logged and reported the same way.
///
/// # Errors
/// As [`extract_batch`], plus [`IntakeError::UnsupportedOutputFormat`]
/// when the output extension is not `.csv`, `.tsv`, `.json` or `.xlsx` (checked
/// before any image is processed).
pub async fn process_directory(
    input_dir: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &BatchConfig,
) -> Result<BatchReport, IntakeError> {
    let output_path = output_path.as_ref();
    if write::OutputFormat::from_path(output_path).is_none() {
        return Err(IntakeError::UnsupportedOutputFormat {
            path: output_path.to_path_buf(),
        });
    }

    let output = extract_batch(input_dir, config).await?;

    let written = if output.is_empty() {
        info!("No data extracted to save");
        None
    } else {
        write::save_records(&output.records, output_path)
    };

    Ok(BatchReport {
        output_path: written,
        stats: output.stats,
    })
}

/// Synchronous wrapper around [`extract_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_batch_sync(
    input_dir: impl AsRef<Path>,
    config: &BatchConfig,
) -> Result<BatchOutput, IntakeError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| IntakeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract_batch(input_dir, config))
}

/// Synchronous wrapper around [`process_directory`].
pub fn process_directory_sync(
    input_dir: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &BatchConfig,
) -> Result<BatchReport, IntakeError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| IntakeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process_directory(input_dir, output_path, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Run one image through every stage and report the outcome.
async fn process_image(
    services: &Services,
    path: &Path,
    index: usize,
    total: usize,
    config: &BatchConfig,
) -> (Vec<PatientRecord>, ImageResult) {
    let start = Instant::now();
    let name = display_name(path);

    if let Some(ref cb) = config.progress_callback {
        cb.on_image_start(index, total, &name);
    }

    let (records, error) = match run_stages(services, path, config.max_tokens).await {
        Ok(records) => (records, None),
        Err(e) => {
            warn!("Skipping image {}/{}: {}", index, total, e);
            (Vec::new(), Some(e))
        }
    };

    if let Some(ref cb) = config.progress_callback {
        match error {
            None => cb.on_image_complete(index, total, records.len()),
            Some(ref e) => cb.on_image_error(index, total, &e.to_string()),
        }
    }

    let result = ImageResult {
        index,
        path: path.to_path_buf(),
        record_count: records.len(),
        duration_ms: start.elapsed().as_millis() as u64,
        error,
    };
    (records, result)
}

/// Load → OCR → structure → parse. Each empty sentinel becomes an [`ImageError`].
async fn run_stages(
    services: &Services,
    path: &Path,
    max_tokens: usize,
) -> Result<Vec<PatientRecord>, ImageError> {
    let name = display_name(path);

    let image = SourceImage::load(path)
        .await
        .map_err(|e| ImageError::Unreadable {
            image: name.clone(),
            detail: e.to_string(),
        })?;

    let raw_text = ocr::extract_text(services.extractor.as_ref(), &image).await;
    drop(image);
    if raw_text.is_empty() {
        return Err(ImageError::NoText { image: name });
    }

    let blob =
        structure::request_structuring(services.generator.as_ref(), &raw_text, max_tokens).await;
    if blob.is_empty() {
        return Err(ImageError::NoStructuredText { image: name });
    }

    let records = parse::parse_records(&blob);
    if records.is_empty() {
        return Err(ImageError::NoRecords { image: name });
    }

    debug!("Image '{}': {} records", name, records.len());
    Ok(records)
}

/// Read the Cloud Vision key from config, then `GOOGLE_VISION_API_KEY`.
fn google_api_key(config: &BatchConfig) -> Result<String, IntakeError> {
    if let Some(ref key) = config.google_api_key {
        if !key.is_empty() {
            return Ok(key.clone());
        }
    }
    match std::env::var("GOOGLE_VISION_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => Err(IntakeError::OcrNotConfigured {
            backend: OcrBackend::GoogleVision.to_string(),
            hint: "Set GOOGLE_VISION_API_KEY (or pass --google-api-key), \
                   or use --ocr vision-model to read scans with the LLM."
                .to_string(),
        }),
    }
}

/// Instantiate a named provider with the given model.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, IntakeError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        IntakeError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`)
/// 2. **Named provider + model** (`config.provider_name`)
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`)
/// 4. **OpenAI key** (`OPENAI_API_KEY`) with `config.model` or [`DEFAULT_MODEL`]
/// 5. **Full auto-detection** (`ProviderFactory::from_env`)
fn resolve_provider(config: &BatchConfig) -> Result<Arc<dyn LLMProvider>, IntakeError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| IntakeError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
