//! Error types for the intake-extract library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`IntakeError`] — **Fatal**: the batch cannot run at all (input
//!   directory missing, no supported images, provider not configured).
//!   Returned as `Err(IntakeError)` from the top-level batch functions.
//!
//! * [`ImageError`] — **Non-fatal**: a single image was dropped (unreadable
//!   file, OCR miss, generation miss, nothing parseable) but every other
//!   image still runs. Stored inside [`crate::output::ImageResult`] so
//!   callers can account for dropped images without the batch aborting.
//!
//! The capability errors ([`crate::pipeline::ocr::OcrError`],
//! [`crate::pipeline::structure::GenerationError`]) and
//! [`crate::pipeline::write::WriteError`] live next to the stage that raises
//! them and are converted to sentinels at the stage boundary.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the intake-extract library.
///
/// Image-level failures use [`ImageError`] and are stored in
/// [`crate::output::ImageResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum IntakeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input directory does not exist or is not a directory.
    #[error("Input directory not found: '{path}'\nCheck the path exists and is a directory.")]
    InputDirNotFound { path: PathBuf },

    /// The directory exists but could not be listed.
    #[error("Cannot read input directory '{path}': {source}")]
    InputDirUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The directory contains no file with a supported image extension.
    #[error("No image files found in '{path}'\nSupported extensions: .jpg, .jpeg, .png, .tiff")]
    NoImagesFound { path: PathBuf },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The output path's extension does not name a supported format.
    #[error("Unsupported output format for '{path}'\nUse a .csv, .tsv, .json or .xlsx file name.")]
    UnsupportedOutputFormat { path: PathBuf },

    // ── Service errors ────────────────────────────────────────────────────
    /// The text-generation provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The OCR backend is missing credentials.
    #[error("OCR backend '{backend}' is not configured.\n{hint}")]
    OcrNotConfigured { backend: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single image.
///
/// The batch continues past every variant; the dropped image shows up only
/// in logs and in [`crate::output::ImageResult::error`].
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ImageError {
    /// The image file could not be read from disk.
    #[error("{image}: could not read file: {detail}")]
    Unreadable { image: String, detail: String },

    /// OCR produced no text (service failure or blank scan).
    #[error("{image}: no text extracted")]
    NoText { image: String },

    /// The generation service returned nothing usable.
    #[error("{image}: no structured text returned")]
    NoStructuredText { image: String },

    /// The structured text contained no line with six columns.
    #[error("{image}: no valid records parsed")]
    NoRecords { image: String },
}
