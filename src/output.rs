//! Result types returned by the batch coordinator.
//!
//! Per-image accounting lives here and in the logs, never in the written
//! file: the output file contains only the recovered records.

use crate::error::ImageError;
use crate::record::PatientRecord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of running one image through OCR → structuring → parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResult {
    /// 1-indexed position in the batch.
    pub index: usize,
    /// Path of the source image.
    pub path: PathBuf,
    /// Records contributed to the batch (0 when `error` is set).
    pub record_count: usize,
    /// Wall-clock time spent on this image.
    pub duration_ms: u64,
    /// Why the image was dropped, if it was.
    pub error: Option<ImageError>,
}

impl ImageResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate counters for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_images: usize,
    pub processed_images: usize,
    pub failed_images: usize,
    pub total_records: usize,
    pub total_duration_ms: u64,
}

/// Everything an in-memory batch run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    /// Records in image order, then line order within each image.
    pub records: Vec<PatientRecord>,
    /// One entry per discovered image, in processing order.
    pub images: Vec<ImageResult>,
    pub stats: BatchStats,
}

impl BatchOutput {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Result of [`crate::batch::process_directory`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// Where the records were written; `None` when nothing was saved
    /// (zero records, or the writer failed).
    pub output_path: Option<PathBuf>,
    pub stats: BatchStats,
}
