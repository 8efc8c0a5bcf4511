//! # pdf-similarity
//!
//! Pairwise text and image similarity across a folder of PDF documents.
//!
//! Given a folder of PDFs, the crate extracts each document's text and
//! embedded images, normalises both into canonical forms, and scores every
//! unordered pair of documents (and every unordered pair of images across
//! the corpus) under several interchangeable metrics. The run produces a
//! snapshot of the extracted corpus plus one flat report per axis.
//!
//! ## Pipeline Overview
//!
//! ```text
//! folder
//!  │
//!  ├─ 1. Input       list *.pdf in stable file-name order
//!  ├─ 2. Extract     per-page text + image XObjects (lopdf / pdf-extract)
//!  ├─ 3. Normalise   stop words + Porter stems; gray/blur/equalise/100×100
//!  ├─ 4. Score       i<j pairs × metrics on a rayon pool
//!  └─ 5. Persist     corpus_snapshot.json, text_similarity.csv,
//!                    image_similarity.csv, images/<file>/page_<p>_img_<i>.*
//! ```
//!
//! ## Metrics
//!
//! | Axis  | Metric | Range | Notes |
//! |-------|--------|-------|-------|
//! | text  | Levenshtein | 0–1 | `1 - edits / longest` |
//! | text  | Cosine      | 0–1 | TF-IDF fitted on the pair alone |
//! | text  | Jaccard     | 0–1 | whitespace token sets |
//! | text  | Hamming     | 0–1 | positional agreement, padded |
//! | image | SSIM        | −1–1 | 7×7 uniform window |
//! | image | MSE         | ≤ 0 | negated, so higher is more similar |
//!
//! Every text metric is computed on the raw (lowercased) text and on the
//! preprocessed text.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_similarity::{analyze_folder, AnalysisConfig, TextMetric, TextVariant};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AnalysisConfig::default();
//!     let output = analyze_folder("papers/", &config).await?;
//!     for m in output.text_report.most_similar("intro.pdf", TextMetric::Cosine, TextVariant::Preprocessed) {
//!         println!("{:.3}  {}", m.score, m.name);
//!     }
//!     for failure in &output.failures {
//!         eprintln!("skipped: {failure}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfsim` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-similarity = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod report;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{
    analyze_folder, analyze_folder_sync, analyze_to_dir, extract_corpus, score_extraction,
    score_snapshot,
};
pub use config::{AnalysisConfig, AnalysisConfigBuilder, PairShard};
pub use error::{ExtractionError, SimilarityError};
pub use metrics::{image_similarity, text_similarity, ImageMetric, TextMetric, TextVariant};
pub use output::{
    CorpusOutput, CorpusSnapshot, Document, ExtractionOutput, ImageAsset, ImagePairRow,
    ImageSimilarityReport, Metric, RankedMatch, RunStats, SimilarityRecord, TextPairRow,
    TextSimilarityReport, VariantScores,
};
pub use pipeline::canonical::{canonicalize, CanonicalImage, CANONICAL_SIZE};
pub use pipeline::extract::{extract_pdf, ExtractedContent, ExtractedImage};
pub use pipeline::preprocess::normalize_text;
pub use progress::{CorpusProgressCallback, NoopProgressCallback, PairKind, ProgressCallback};
pub use report::{read_snapshot, write_image_report, write_snapshot, write_text_report};
