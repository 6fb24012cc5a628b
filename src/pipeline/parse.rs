//! Record parsing: turn the model's pipe table into [`PatientRecord`]s.
//!
//! The parser is line-fault-tolerant. Each line is judged on its own:
//!
//! 1. blank lines, rule lines (`|---|:--:|`, `+===+`) and the header row
//!    (first cell `Name`) are skipped
//! 2. all leading and trailing `|` are stripped, the rest is split on
//!    `|`, and every cell is trimmed
//! 3. six or more cells make a record, mapped positionally to
//!    [`crate::record::COLUMNS`]; extra cells are ignored
//! 4. anything shorter is dropped with a debug log
//!
//! Empty cells keep their position, so a missing email leaves `Email`
//! empty instead of shifting the CPF left. The column order is taken on
//! trust from the prompt: a model that reorders columns produces
//! misassigned fields, not an error.

use crate::record::{PatientRecord, COLUMNS};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Column delimiter the structuring prompt asks for.
pub const DELIMITER: char = '|';

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\n(.*)\n```\s*$").unwrap());

static RE_RULE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\s|:+=\-]+$").unwrap());

/// Parse a structured blob into records, in line order.
///
/// Returns an empty vector when the blob is empty or no line qualifies.
pub fn parse_records(blob: &str) -> Vec<PatientRecord> {
    let blob = normalise_blob(blob);
    let mut records = Vec::new();

    for (line_no, line) in blob.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || is_rule_line(line) {
            continue;
        }

        let cells = split_cells(line);
        if is_header(&cells) {
            debug!("Line {}: skipping header row", line_no + 1);
            continue;
        }

        match PatientRecord::from_cells(&cells) {
            Some(record) => records.push(record),
            None => debug!(
                "Line {}: dropped, {} of {} columns: {:?}",
                line_no + 1,
                cells.len(),
                COLUMNS.len(),
                line
            ),
        }
    }

    records
}

/// Undo model output quirks that would otherwise break line splitting.
fn normalise_blob(input: &str) -> String {
    let s = input.replace("\r\n", "\n").replace('\r', "\n");
    let s = s.replace(
        ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'],
        "",
    );
    match RE_OUTER_FENCES.captures(s.trim()) {
        Some(caps) => caps[1].to_string(),
        None => s,
    }
}

/// A line made only of delimiters, dashes, colons and similar ruling.
fn is_rule_line(line: &str) -> bool {
    RE_RULE_LINE.is_match(line)
}

/// Split one table line into trimmed cells. Every outer delimiter is
/// stripped first, so `|| a | b ||` still starts at the first field.
fn split_cells(line: &str) -> Vec<&str> {
    line.trim_matches(DELIMITER)
        .split(DELIMITER)
        .map(str::trim)
        .collect()
}

/// The header row repeats the column labels; its first cell is `Name`.
fn is_header(cells: &[&str]) -> bool {
    cells
        .first()
        .map(|c| c.trim_matches('*').trim().eq_ignore_ascii_case(COLUMNS[0]))
        .unwrap_or(false)
}
