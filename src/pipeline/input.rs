//! Input discovery: list the supported images in an upload directory.
//!
//! Listing is sorted by file name so a batch processes the same directory
//! in the same order on every platform; record order in the output follows
//! from it. Image bytes are loaded one file at a time by the coordinator,
//! so at most one image is held in memory.

use crate::error::IntakeError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File extensions accepted as images (compared case-insensitively).
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["jpg", "png", "jpeg", "tiff"];

/// One scanned form: its path plus raw bytes.
#[derive(Debug, Clone)]
pub struct SourceImage {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl SourceImage {
    pub fn new(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            bytes,
        }
    }

    /// Read an image file from disk.
    pub async fn load(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        debug!("Loaded {} ({} bytes)", path.display(), bytes.len());
        Ok(Self::new(path, bytes))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// File name used in log lines and errors.
    pub fn name(&self) -> String {
        display_name(&self.path)
    }
}

/// File name of `path`, falling back to the full path.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Whether `path` has one of [`SUPPORTED_EXTENSIONS`].
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// List the supported image files directly inside `dir`, sorted by name.
///
/// # Errors
/// - [`IntakeError::InputDirNotFound`] if `dir` is not a directory
/// - [`IntakeError::InputDirUnreadable`] if listing fails
/// - [`IntakeError::NoImagesFound`] if nothing matches
pub fn discover_images(dir: &Path) -> Result<Vec<PathBuf>, IntakeError> {
    if !dir.is_dir() {
        return Err(IntakeError::InputDirNotFound {
            path: dir.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|source| IntakeError::InputDirUnreadable {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut images = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| IntakeError::InputDirUnreadable {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && is_supported_image(&path) {
            images.push(path);
        }
    }

    if images.is_empty() {
        return Err(IntakeError::NoImagesFound {
            path: dir.to_path_buf(),
        });
    }

    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!("Found {} images in {}", images.len(), dir.display());
    Ok(images)
}
