//! Corpus analysis entry points.
//!
//! A run has two phases separated by a barrier:
//!
//! 1. **Extract**: every PDF is opened, its text normalised and its images
//!    written and canonicalised, on up to `concurrency` blocking tasks.
//!    A file that fails is recorded and left out; the rest carry on.
//! 2. **Score**: every unordered document pair and every unordered image
//!    pair is scored on a dedicated rayon pool.
//!
//! [`analyze_to_dir`] persists the snapshot at the barrier, before scoring.
//!
//! Results are ordered by the stable document index, never by completion
//! order, so two runs over the same folder produce identical reports.

use crate::config::AnalysisConfig;
use crate::error::{ExtractionError, SimilarityError};
use crate::output::{
    CorpusOutput, CorpusSnapshot, Document, ExtractionOutput, ImageSimilarityReport, RunStats,
    TextSimilarityReport,
};
use crate::pipeline::canonical::CanonicalImage;
use crate::pipeline::extract::{extract_pdf, ExtractedImage};
use crate::pipeline::input::{discover_pdfs, display_name};
use crate::pipeline::preprocess::normalize_text;
use crate::pipeline::score;
use crate::progress::{PairKind, ProgressCallback};
use crate::report;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Analyse every PDF in `folder`.
///
/// This is the primary entry point for the library. Image side files are
/// written under the configured images folder as a by-product of
/// extraction; the snapshot and reports are returned in memory (see
/// [`analyze_to_dir`] to persist them).
///
/// # Errors
/// Returns `Err(SimilarityError)` only for fatal errors:
/// - the folder is missing, not a folder, or cannot be listed
/// - two canonical images have different shapes
/// - the scoring pool cannot be created
///
/// Individual unreadable or corrupt PDFs are reported in
/// [`CorpusOutput::failures`] instead.
pub async fn analyze_folder(
    folder: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<CorpusOutput, SimilarityError> {
    let folder = folder.as_ref();
    info!("Starting analysis: {}", folder.display());
    let extraction = extract_corpus(folder, config).await?;
    score_extraction(extraction, config).await
}

/// Run the scoring phase over a finished extraction.
///
/// Scores every document pair and, when images are on, every pair of
/// decodable images. Run statistics carry over from the extraction.
pub async fn score_extraction(
    extraction: ExtractionOutput,
    config: &AnalysisConfig,
) -> Result<CorpusOutput, SimilarityError> {
    let ExtractionOutput {
        snapshot,
        images,
        failures,
        mut stats,
    } = extraction;

    let mut assets = Vec::with_capacity(images.len());
    let mut scorable: Vec<(String, CanonicalImage)> = Vec::new();
    for ExtractedImage { asset, canonical } in images {
        if let Some(c) = canonical {
            scorable.push((asset.label.clone(), c));
        }
        assets.push(asset);
    }

    let score_start = Instant::now();
    let job = ScoreJob {
        snapshot,
        images: config.extract_images.then_some(scorable),
        config: config.clone(),
    };
    let (snapshot, text_report, image_report) = tokio::task::spawn_blocking(move || job.run())
        .await
        .map_err(|e| SimilarityError::Internal(format!("Scoring task panicked: {e}")))??;

    stats.text_pairs = text_report.rows.len();
    stats.image_pairs = image_report.as_ref().map_or(0, |r| r.rows.len());
    stats.score_duration_ms = score_start.elapsed().as_millis() as u64;
    stats.total_duration_ms = stats.extract_duration_ms + stats.score_duration_ms;

    info!(
        "Analysis complete: {} document(s), {} text pair(s), {} image pair(s), {}ms total",
        stats.documents_extracted, stats.text_pairs, stats.image_pairs, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(&stats);
    }

    Ok(CorpusOutput {
        snapshot,
        images: assets,
        text_report,
        image_report,
        failures,
        stats,
    })
}

/// Analyse `folder` and persist every artifact into the output directory.
///
/// The snapshot is written as soon as extraction finishes, before any pair
/// is scored, so an interrupted scoring phase can be resumed from it. The
/// text report and (when images are on) the image report follow. Every
/// write is atomic.
pub async fn analyze_to_dir(
    folder: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<RunStats, SimilarityError> {
    let folder = folder.as_ref();
    info!("Starting analysis: {}", folder.display());
    let (snapshot_path, text_path, image_path) = artifact_paths(folder, config);

    let extraction = extract_corpus(folder, config).await?;
    let extraction = tokio::task::spawn_blocking(move || -> Result<_, SimilarityError> {
        report::write_snapshot(&snapshot_path, &extraction.snapshot)?;
        Ok(extraction)
    })
    .await
    .map_err(|e| SimilarityError::Internal(format!("Write task panicked: {e}")))??;

    let CorpusOutput {
        text_report,
        image_report,
        stats,
        ..
    } = score_extraction(extraction, config).await?;

    tokio::task::spawn_blocking(move || -> Result<(), SimilarityError> {
        report::write_text_report(&text_path, &text_report)?;
        if let Some(ref r) = image_report {
            report::write_image_report(&image_path, r)?;
        }
        Ok(())
    })
    .await
    .map_err(|e| SimilarityError::Internal(format!("Write task panicked: {e}")))??;

    info!(
        "Artifacts written to {}",
        config.resolve_output_dir(folder).display()
    );
    Ok(stats)
}

/// Synchronous wrapper around [`analyze_folder`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_folder_sync(
    folder: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<CorpusOutput, SimilarityError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SimilarityError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze_folder(folder, config))
}

/// Run only the extraction phase: text, normalised text and images.
///
/// Documents come back in stable file-name order regardless of which worker
/// finished first.
pub async fn extract_corpus(
    folder: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<ExtractionOutput, SimilarityError> {
    let start = Instant::now();
    let folder = folder.as_ref();
    let pdfs = discover_pdfs(folder)?;
    let total = pdfs.len();
    if total == 0 {
        warn!("No PDF files found in {}", folder.display());
    } else {
        info!("Found {} PDF(s) in {}", total, folder.display());
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total);
    }

    let images_root = config
        .extract_images
        .then(|| config.resolve_images_dir(folder));
    let done = Arc::new(AtomicUsize::new(0));

    let mut results: Vec<(usize, Result<ExtractedDocument, ExtractionError>)> =
        stream::iter(pdfs.into_iter().enumerate().map(|(idx, path)| {
            let images_root = images_root.clone();
            let callback = config.progress_callback.clone();
            let done = Arc::clone(&done);
            async move {
                let file = display_name(&path);
                let result = tokio::task::spawn_blocking(move || {
                    process_document(&path, images_root.as_deref())
                })
                .await
                .unwrap_or_else(|e| {
                    Err(ExtractionError::Panicked {
                        file: file.clone(),
                        detail: e.to_string(),
                    })
                });
                let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                report_document(callback.as_ref(), &file, finished, total, &result);
                (idx, result)
            }
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    // Sort by index for consistent output
    results.sort_by_key(|(idx, _)| *idx);

    let mut stats = RunStats {
        documents_found: total,
        ..RunStats::default()
    };
    let mut documents = Vec::with_capacity(total);
    let mut images = Vec::new();
    let mut failures = Vec::new();

    for (_, result) in results {
        match result {
            Ok(extracted) => {
                stats.images_skipped += extracted.skipped_images;
                images.extend(extracted.images);
                documents.push(extracted.document);
            }
            Err(e) => failures.push(e),
        }
    }

    stats.documents_extracted = documents.len();
    stats.documents_failed = failures.len();
    stats.images_extracted = images.len();
    stats.images_unscored = images.iter().filter(|i| i.canonical.is_none()).count();
    stats.extract_duration_ms = start.elapsed().as_millis() as u64;
    stats.total_duration_ms = stats.extract_duration_ms;

    info!(
        "Extracted {}/{} document(s) and {} image(s) in {}ms",
        stats.documents_extracted, total, stats.images_extracted, stats.extract_duration_ms
    );

    Ok(ExtractionOutput {
        snapshot: CorpusSnapshot { documents },
        images,
        failures,
        stats,
    })
}

/// Rescore the text pairs of a persisted snapshot without touching any PDF.
pub fn score_snapshot(
    snapshot: &CorpusSnapshot,
    config: &AnalysisConfig,
) -> Result<TextSimilarityReport, SimilarityError> {
    let pool = score::scoring_pool(config.concurrency)?;
    let callback = config.progress_callback.as_ref();
    Ok(score_text(&pool, &snapshot.documents, config, callback))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Output of the per-file worker.
struct ExtractedDocument {
    document: Document,
    images: Vec<ExtractedImage>,
    skipped_images: usize,
}

fn process_document(
    path: &Path,
    images_root: Option<&Path>,
) -> Result<ExtractedDocument, ExtractionError> {
    let content = extract_pdf(path, images_root)?;
    let preprocessed_text = normalize_text(&content.text);
    Ok(ExtractedDocument {
        document: Document {
            file_name: display_name(path),
            text: content.text,
            preprocessed_text,
        },
        images: content.images,
        skipped_images: content.skipped_images,
    })
}

fn report_document(
    callback: Option<&ProgressCallback>,
    file: &str,
    finished: usize,
    total: usize,
    result: &Result<ExtractedDocument, ExtractionError>,
) {
    match result {
        Ok(doc) => {
            debug!("{}: extracted, {} image(s)", file, doc.images.len());
            if let Some(cb) = callback {
                cb.on_document_complete(file, finished, total);
            }
        }
        Err(e) => {
            warn!("Skipping {}", e);
            if let Some(cb) = callback {
                cb.on_document_error(file, finished, total, &e.to_string());
            }
        }
    }
}

fn score_text(
    pool: &rayon::ThreadPool,
    documents: &[Document],
    config: &AnalysisConfig,
    callback: Option<&ProgressCallback>,
) -> TextSimilarityReport {
    let pairs = score::unordered_pairs(documents.len(), config.shard).len();
    if let Some(cb) = callback {
        cb.on_pairs_start(PairKind::Text, pairs);
    }
    let report = score::score_text_pairs(pool, documents, &config.text_metrics, config.shard);
    debug!("Scored {} text pair(s)", report.rows.len());
    if let Some(cb) = callback {
        cb.on_pairs_complete(PairKind::Text, report.rows.len());
    }
    report
}

/// Everything the scoring phase needs, owned so it can move onto a
/// blocking thread.
struct ScoreJob {
    snapshot: CorpusSnapshot,
    images: Option<Vec<(String, CanonicalImage)>>,
    config: AnalysisConfig,
}

type ScoreResult = (CorpusSnapshot, TextSimilarityReport, Option<ImageSimilarityReport>);

impl ScoreJob {
    fn run(self) -> Result<ScoreResult, SimilarityError> {
        let pool = score::scoring_pool(self.config.concurrency)?;
        let callback = self.config.progress_callback.as_ref();

        let text_report = score_text(&pool, &self.snapshot.documents, &self.config, callback);

        let image_report = match self.images {
            Some(ref images) => {
                let pairs = score::unordered_pairs(images.len(), self.config.shard).len();
                if let Some(cb) = callback {
                    cb.on_pairs_start(PairKind::Image, pairs);
                }
                let report = score::score_image_pairs(
                    &pool,
                    images,
                    &self.config.image_metrics,
                    self.config.shard,
                )?;
                debug!("Scored {} image pair(s)", report.rows.len());
                if let Some(cb) = callback {
                    cb.on_pairs_complete(PairKind::Image, report.rows.len());
                }
                Some(report)
            }
            None => None,
        };

        Ok((self.snapshot, text_report, image_report))
    }
}

/// Output paths for a run over `folder`: snapshot, text report, image report.
pub fn artifact_paths(folder: &Path, config: &AnalysisConfig) -> (PathBuf, PathBuf, PathBuf) {
    let out_dir = config.resolve_output_dir(folder);
    (
        out_dir.join(&config.snapshot_file),
        out_dir.join(&config.text_report_file),
        out_dir.join(&config.image_report_file),
    )
}
