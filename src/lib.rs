//! # intake-extract
//!
//! Turn scanned dental-intake forms into tabular patient records.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload directory
//!  │
//!  ├─ 1. Input      list .jpg/.jpeg/.png/.tiff files, sorted by name
//!  ├─ 2. OCR        Google Cloud Vision or a vision LLM → raw text
//!  ├─ 3. Structure  LLM rewrites the text as a six-column pipe table
//!  ├─ 4. Parse      tolerant line parser → PatientRecord rows
//!  └─ 5. Write      one .csv / .tsv / .json / .xlsx file for the whole batch
//! ```
//!
//! Every image runs through stages 2–4 on its own; a failure at any stage
//! drops that image and the batch carries on. Only an empty input
//! directory or missing credentials abort a run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use intake_extract::{process_directory, BatchConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // OPENAI_API_KEY + GOOGLE_VISION_API_KEY from the environment
//!     let config = BatchConfig::default();
//!     let report = process_directory("uploads/session-1", "patients.csv", &config).await?;
//!     match report.output_path {
//!         Some(path) => println!("saved {}", path.display()),
//!         None => println!("nothing extracted"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `intake2table` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod record;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{
    extract_batch, extract_batch_sync, preflight, process_directory, process_directory_sync,
    Services,
};
pub use config::{BatchConfig, BatchConfigBuilder, OcrBackend};
pub use error::{ImageError, IntakeError};
pub use output::{BatchOutput, BatchReport, BatchStats, ImageResult};
pub use pipeline::ocr::{GoogleVisionExtractor, OcrError, TextExtractor, VisionModelExtractor};
pub use pipeline::parse::parse_records;
pub use pipeline::structure::{GenerationError, GenerationRequest, LlmGenerator, TextGenerator};
pub use pipeline::write::{save_records, write_records, OutputFormat, WriteError};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use record::{PatientRecord, COLUMNS};
