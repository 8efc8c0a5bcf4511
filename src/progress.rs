//! Progress-callback trait for corpus analysis events.
//!
//! Inject an [`Arc<dyn CorpusProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to receive
//! events as documents are extracted and pairs are scored. The CLI renders
//! them as progress bars; a library caller might forward them to a channel
//! or a log.
//!
//! # Example
//!
//! ```rust
//! use pdf_similarity::{AnalysisConfig, CorpusProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     extracted: AtomicUsize,
//! }
//!
//! impl CorpusProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, file: &str, done: usize, total: usize) {
//!         self.extracted.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{done}/{total} {file}");
//!     }
//! }
//!
//! let config = AnalysisConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { extracted: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::RunStats;
use std::sync::Arc;

/// Which pair space is being scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairKind {
    Text,
    Image,
}

/// Called by the analysis pipeline as it works through the corpus.
///
/// Implementations must be `Send + Sync`: document events arrive from
/// concurrent extraction workers. All methods have default no-op
/// implementations so callers only override what they care about.
pub trait CorpusProgressCallback: Send + Sync {
    /// Called once after discovery, before any document is opened.
    fn on_run_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called when a document has been extracted and normalised.
    ///
    /// `done` counts finished documents (successful or not) so far.
    fn on_document_complete(&self, file: &str, done: usize, total: usize) {
        let _ = (file, done, total);
    }

    /// Called when a document fails extraction and is left out.
    fn on_document_error(&self, file: &str, done: usize, total: usize, error: &str) {
        let _ = (file, done, total, error);
    }

    /// Called before a pair space is scored.
    fn on_pairs_start(&self, kind: PairKind, total_pairs: usize) {
        let _ = (kind, total_pairs);
    }

    /// Called after a pair space has been scored.
    fn on_pairs_complete(&self, kind: PairKind, scored_pairs: usize) {
        let _ = (kind, scored_pairs);
    }

    /// Called once at the very end of a successful run.
    fn on_run_complete(&self, stats: &RunStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl CorpusProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn CorpusProgressCallback>;
