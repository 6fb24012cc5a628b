//! Pipeline stages for intake-form extraction.
//!
//! Each submodule implements exactly one transformation step, and each
//! stage that calls an external service converts every failure into an
//! empty value so the coordinator drives control flow with presence checks.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ ocr ──▶ structure ──▶ parse ──▶ (accumulate) ──▶ write
//! (dir)    (image    (raw text →    (table →                   (csv/tsv/
//!           → text)   table)         records)                   json)
//! ```
//!
//! 1. [`input`]     — list supported images, load one image's bytes
//! 2. [`ocr`]       — the OCR capability and its two backends
//! 3. [`structure`] — the text-generation capability and the structuring request
//! 4. [`parse`]     — tolerant pipe-table parser
//! 5. [`write`]     — atomic tabular writer

pub mod input;
pub mod ocr;
pub mod parse;
pub mod structure;
pub mod write;
