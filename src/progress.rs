//! Progress-callback trait for per-image batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::BatchConfigBuilder::progress_callback`] to receive
//! events as the coordinator drives each image through the pipeline.
//!
//! # Example
//!
//! ```rust
//! use intake_extract::{BatchConfig, BatchProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct RecordCounter {
//!     records: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for RecordCounter {
//!     fn on_image_complete(&self, _index: usize, _total: usize, record_count: usize) {
//!         self.records.fetch_add(record_count, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(RecordCounter { records: AtomicUsize::new(0) });
//!
//! let config = BatchConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch coordinator as it processes each image.
///
/// Images are processed one at a time, so calls never overlap, but the
/// trait is `Send + Sync` so it can be shared with other tasks. All methods
/// default to no-ops.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after the input directory has been listed.
    fn on_batch_start(&self, total_images: usize) {
        let _ = total_images;
    }

    /// Called before OCR runs on an image.
    ///
    /// # Arguments
    /// * `index` — 1-indexed position in the batch
    /// * `total` — number of images in the batch
    /// * `name`  — file name of the image
    fn on_image_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when an image yielded at least one record.
    fn on_image_complete(&self, index: usize, total: usize, record_count: usize) {
        let _ = (index, total, record_count);
    }

    /// Called when an image was dropped at some stage.
    fn on_image_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every image has been attempted.
    ///
    /// # Arguments
    /// * `total_images`  — images in the batch
    /// * `success_count` — images that contributed records
    /// * `record_count`  — records accumulated across the batch
    fn on_batch_complete(&self, total_images: usize, success_count: usize, record_count: usize) {
        let _ = (total_images, success_count, record_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        records: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_image_start(&self, _index: usize, _total: usize, _name: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_image_complete(&self, _index: usize, _total: usize, record_count: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            self.records.fetch_add(record_count, Ordering::SeqCst);
        }

        fn on_image_error(&self, _index: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_image_start(1, 2, "a.png");
        cb.on_image_complete(1, 2, 3);
        cb.on_image_error(2, 2, "no text extracted");
        cb.on_batch_complete(2, 1, 3);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_image_start(1, 2, "a.png");
        tracker.on_image_complete(1, 2, 3);
        tracker.on_image_start(2, 2, "b.png");
        tracker.on_image_error(2, 2, "b.png: no text extracted");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.records.load(Ordering::SeqCst), 3);
    }
}
