//! Pair scoring: every unordered pair under every configured metric.
//!
//! Pairs are enumerated as `(i, j)` with `i < j`, row by row, so pair number
//! `k` is the same on every run over the same corpus. The pair list is
//! scored in parallel on a rayon pool and collected back in `k` order.

use crate::config::PairShard;
use crate::error::SimilarityError;
use crate::metrics::{ImageMetric, TextMetric};
use crate::output::{
    Document, ImagePairRow, ImageSimilarityReport, TextPairRow, TextSimilarityReport,
    VariantScores,
};
use crate::pipeline::canonical::CanonicalImage;
use rayon::prelude::*;
use rayon::ThreadPool;

/// Number of unordered pairs over `n` items.
pub fn pair_count(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}

/// Every `(i, j)` with `i < j < n` in stable order, restricted to `shard`.
pub fn unordered_pairs(n: usize, shard: Option<PairShard>) -> Vec<(usize, usize)> {
    (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .enumerate()
        .filter(|(k, _)| shard.map_or(true, |s| s.contains(*k)))
        .map(|(_, pair)| pair)
        .collect()
}

/// Dedicated scoring pool of `threads` workers.
pub fn scoring_pool(threads: usize) -> Result<ThreadPool, SimilarityError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("pdfsim-score-{i}"))
        .build()
        .map_err(|e| SimilarityError::Internal(format!("Failed to build scoring pool: {e}")))
}

/// Score every document pair under every metric, raw and preprocessed.
pub fn score_text_pairs(
    pool: &ThreadPool,
    documents: &[Document],
    metrics: &[TextMetric],
    shard: Option<PairShard>,
) -> TextSimilarityReport {
    let pairs = unordered_pairs(documents.len(), shard);
    let rows = pool.install(|| {
        pairs
            .par_iter()
            .map(|&(i, j)| {
                let (a, b) = (&documents[i], &documents[j]);
                TextPairRow {
                    file1: a.file_name.clone(),
                    file2: b.file_name.clone(),
                    scores: metrics
                        .iter()
                        .map(|m| VariantScores {
                            raw: m.score(&a.text, &b.text),
                            preprocessed: m.score(&a.preprocessed_text, &b.preprocessed_text),
                        })
                        .collect(),
                }
            })
            .collect::<Vec<_>>()
    });
    TextSimilarityReport {
        metrics: metrics.to_vec(),
        rows,
    }
}

/// Score every image pair across the corpus under every metric.
///
/// `images` holds `(label, canonical)` in corpus order. Fails on the first
/// shape mismatch.
pub fn score_image_pairs(
    pool: &ThreadPool,
    images: &[(String, CanonicalImage)],
    metrics: &[ImageMetric],
    shard: Option<PairShard>,
) -> Result<ImageSimilarityReport, SimilarityError> {
    let pairs = unordered_pairs(images.len(), shard);
    let rows = pool.install(|| {
        pairs
            .par_iter()
            .map(|&(i, j)| -> Result<ImagePairRow, SimilarityError> {
                let ((l1, a), (l2, b)) = (&images[i], &images[j]);
                let scores = metrics
                    .iter()
                    .map(|m| m.score(a, b))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ImagePairRow {
                    image1: l1.clone(),
                    image2: l2.clone(),
                    scores,
                })
            })
            .collect::<Result<Vec<_>, _>>()
    })?;
    Ok(ImageSimilarityReport {
        metrics: metrics.to_vec(),
        rows,
    })
}
