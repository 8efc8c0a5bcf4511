//! Error types for the pdf-similarity library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`SimilarityError`] — **Fatal**: the run cannot proceed at all
//!   (missing input folder, unknown metric, mismatched image shapes, an
//!   artifact that cannot be written). Returned as `Err(SimilarityError)`
//!   from the top-level `analyze*` functions.
//!
//! * [`ExtractionError`] — **Non-fatal**: a single PDF could not be read or
//!   parsed, but every other document is fine. Stored in
//!   [`crate::output::CorpusOutput::failures`] so callers can see which files
//!   dropped out of the matrix instead of losing the whole run to one bad
//!   file.
//!
//! Degenerate numeric input (empty strings, empty vocabularies, a flat image
//! with zero data range) never surfaces as an error: each metric defines its
//! own fallback value, documented on [`crate::metrics`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf-similarity library.
///
/// Per-file extraction failures use [`ExtractionError`] and are collected
/// rather than propagated here.
#[derive(Debug, Error)]
pub enum SimilarityError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The input folder does not exist.
    #[error("Input folder not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// The input path exists but is a file, not a folder.
    #[error("'{path}' is not a directory\nPass the folder that contains the PDF files.")]
    NotADirectory { path: PathBuf },

    /// The folder exists but its entries could not be listed.
    #[error("Failed to list '{path}': {source}")]
    ReadDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Metric errors ─────────────────────────────────────────────────────
    /// A metric name that is not part of the closed metric set.
    #[error("Unknown {kind} metric '{name}' (expected one of: {expected})")]
    InvalidMetric {
        kind: &'static str,
        name: String,
        expected: String,
    },

    /// Two canonical images with different dimensions were compared.
    #[error("Image shape mismatch: {left_width}x{left_height} vs {right_width}x{right_height}")]
    ShapeMismatch {
        left_width: u32,
        left_height: u32,
        right_width: u32,
        right_height: u32,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted snapshot could not be read back.
    #[error("Failed to read snapshot '{path}': {detail}")]
    SnapshotReadFailed { path: PathBuf, detail: String },

    /// JSON encoding of an artifact failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single source PDF.
///
/// The document is left out of the snapshot and of every pair, and the run
/// continues with the rest of the corpus.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum ExtractionError {
    /// The file could not be read from disk.
    #[error("{file}: unreadable: {detail}")]
    Unreadable { file: String, detail: String },

    /// The bytes were read but do not parse as a PDF.
    #[error("{file}: corrupt PDF: {detail}")]
    Corrupt { file: String, detail: String },

    /// The per-document image folder could not be created.
    #[error("{file}: cannot create image folder '{dir}': {detail}")]
    ImagesDir {
        file: String,
        dir: PathBuf,
        detail: String,
    },

    /// The PDF backend panicked on this file.
    #[error("{file}: extraction worker panicked: {detail}")]
    Panicked { file: String, detail: String },
}

impl ExtractionError {
    /// Name of the source file that failed.
    pub fn file(&self) -> &str {
        match self {
            ExtractionError::Unreadable { file, .. }
            | ExtractionError::Corrupt { file, .. }
            | ExtractionError::ImagesDir { file, .. }
            | ExtractionError::Panicked { file, .. } => file,
        }
    }
}
