//! Tabular output: serialise a batch of records to a file.
//!
//! The file extension picks the format. Every format carries a header
//! naming the six columns and one row per record, in batch order.
//!
//! Writes are atomic: rows go to a temp file in the destination directory
//! which is then renamed over the target, so a failure never leaves a
//! half-written file behind.

use crate::record::{PatientRecord, COLUMNS};
use rust_xlsxwriter::Workbook;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{error, info};

/// Output formats selected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// `.csv` — comma-separated, opens directly in spreadsheet tools.
    Csv,
    /// `.tsv` — tab-separated.
    Tsv,
    /// `.json` — array of objects keyed by column label.
    Json,
    /// `.xlsx` — one worksheet, every cell written as text.
    Xlsx,
}

impl OutputFormat {
    /// Infer the format from `path`'s extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "tsv" => Some(Self::Tsv),
            "json" => Some(Self::Json),
            "xlsx" => Some(Self::Xlsx),
            _ => None,
        }
    }
}

/// Why writing the output file failed.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Unsupported output format for '{0}'")]
    UnsupportedFormat(PathBuf),

    #[error("I/O error writing '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XLSX error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

/// Write `records` to `path` in the format its extension names.
pub fn write_records(records: &[PatientRecord], path: &Path) -> Result<(), WriteError> {
    let format =
        OutputFormat::from_path(path).ok_or_else(|| WriteError::UnsupportedFormat(path.to_path_buf()))?;
    let io_err = |source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(io_err)?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
    match format {
        OutputFormat::Csv => write_delimited(records, tmp.as_file_mut(), b',')?,
        OutputFormat::Tsv => write_delimited(records, tmp.as_file_mut(), b'\t')?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(tmp.as_file_mut(), records)?;
            tmp.as_file_mut().write_all(b"\n").map_err(io_err)?;
        }
        OutputFormat::Xlsx => {
            let buf = workbook_bytes(records)?;
            tmp.as_file_mut().write_all(&buf).map_err(io_err)?;
        }
    }
    tmp.as_file_mut().flush().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

fn write_delimited<W: Write>(
    records: &[PatientRecord],
    out: W,
    delimiter: u8,
) -> Result<(), WriteError> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(out);
    wtr.write_record(COLUMNS)?;
    for record in records {
        wtr.write_record(record.as_row())?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Cells are written as strings so CPFs and phone numbers keep their
/// leading zeros.
fn workbook_bytes(records: &[PatientRecord]) -> Result<Vec<u8>, WriteError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Patients")?;
    for (col, label) in COLUMNS.iter().enumerate() {
        sheet.write_string(0, col as u16, *label)?;
    }
    for (i, record) in records.iter().enumerate() {
        let row = i as u32 + 1;
        for (col, cell) in record.as_row().iter().enumerate() {
            if !cell.is_empty() {
                sheet.write_string(row, col as u16, *cell)?;
            }
        }
    }
    Ok(workbook.save_to_buffer()?)
}

/// Write the batch, logging instead of failing.
///
/// Returns the written path, or `None` if anything went wrong. Callers
/// treat `None` exactly like a batch with nothing to save.
pub fn save_records(records: &[PatientRecord], path: &Path) -> Option<PathBuf> {
    match write_records(records, path) {
        Ok(()) => {
            info!("Saved {} records to '{}'", records.len(), path.display());
            Some(path.to_path_buf())
        }
        Err(e) => {
            error!("Failed to save records: {}", e);
            None
        }
    }
}
