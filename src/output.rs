//! Output types: corpus snapshot, similarity reports, run statistics.

use crate::error::ExtractionError;
use crate::metrics::{ImageMetric, TextMetric, TextVariant};
use crate::pipeline::extract::ExtractedImage;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

// ── Corpus ───────────────────────────────────────────────────────────────

/// One successfully extracted source PDF.
///
/// Field names serialise to the snapshot's column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// File name, unique within a run.
    #[serde(rename = "File Name")]
    pub file_name: String,
    /// Concatenated page text, lowercased.
    #[serde(rename = "Text")]
    pub text: String,
    /// [`crate::normalize_text`] of `text`.
    #[serde(rename = "Preprocessed Text")]
    pub preprocessed_text: String,
}

/// All documents of one run, in stable index order.
///
/// Persisted as a bare JSON array of [`Document`] rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorpusSnapshot {
    pub documents: Vec<Document>,
}

impl CorpusSnapshot {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// An image extracted from a document and persisted as a side file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    /// File name of the source PDF.
    pub document: String,
    /// 1-based page number.
    pub page: u32,
    /// 1-based index among the page's images.
    pub index: u32,
    /// Where the image file was written.
    pub path: PathBuf,
    /// `<file name>/page_<p>_img_<i>.<ext>`; the identity used in reports.
    pub label: String,
}

// ── Records ──────────────────────────────────────────────────────────────

/// The metric a [`SimilarityRecord`] was computed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    Text(TextMetric),
    Image(ImageMetric),
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Text(m) => fmt::Display::fmt(m, f),
            Metric::Image(m) => fmt::Display::fmt(m, f),
        }
    }
}

/// One score for one unordered pair under one metric (and, for text, one
/// variant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityRecord {
    pub left: String,
    pub right: String,
    pub metric: Metric,
    /// `None` for image records.
    pub variant: Option<TextVariant>,
    pub score: f64,
}

/// Another corpus item ranked against a query item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMatch {
    pub name: String,
    pub score: f64,
}

fn rank(mut matches: Vec<RankedMatch>) -> Vec<RankedMatch> {
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    matches
}

// ── Text report ──────────────────────────────────────────────────────────

/// Raw and preprocessed score of one metric for one pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariantScores {
    pub raw: f64,
    pub preprocessed: f64,
}

impl VariantScores {
    pub fn get(&self, variant: TextVariant) -> f64 {
        match variant {
            TextVariant::Raw => self.raw,
            TextVariant::Preprocessed => self.preprocessed,
        }
    }
}

/// One document pair; `scores[k]` belongs to the report's `metrics[k]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPairRow {
    pub file1: String,
    pub file2: String,
    pub scores: Vec<VariantScores>,
}

/// Every scored document pair, in stable pair order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextSimilarityReport {
    pub metrics: Vec<TextMetric>,
    pub rows: Vec<TextPairRow>,
}

impl TextSimilarityReport {
    /// Score of `row` under `metric`/`variant`, if the metric was computed.
    pub fn score(&self, row: &TextPairRow, metric: TextMetric, variant: TextVariant) -> Option<f64> {
        let k = self.metrics.iter().position(|m| *m == metric)?;
        row.scores.get(k).map(|s| s.get(variant))
    }

    /// Look up the row for an unordered pair of file names.
    pub fn pair(&self, a: &str, b: &str) -> Option<&TextPairRow> {
        self.rows
            .iter()
            .find(|r| (r.file1 == a && r.file2 == b) || (r.file1 == b && r.file2 == a))
    }

    /// Every other document paired with `file`, best match first.
    ///
    /// Empty when `file` is unknown or `metric` was not computed.
    pub fn most_similar(
        &self,
        file: &str,
        metric: TextMetric,
        variant: TextVariant,
    ) -> Vec<RankedMatch> {
        let matches = self
            .rows
            .iter()
            .filter_map(|row| {
                let other = if row.file1 == file {
                    &row.file2
                } else if row.file2 == file {
                    &row.file1
                } else {
                    return None;
                };
                Some(RankedMatch {
                    name: other.clone(),
                    score: self.score(row, metric, variant)?,
                })
            })
            .collect();
        rank(matches)
    }

    /// Flatten into one record per pair, metric and variant.
    pub fn records(&self) -> Vec<SimilarityRecord> {
        let mut out = Vec::with_capacity(self.rows.len() * self.metrics.len() * 2);
        for row in &self.rows {
            for (metric, scores) in self.metrics.iter().zip(&row.scores) {
                for variant in TextVariant::ALL {
                    out.push(SimilarityRecord {
                        left: row.file1.clone(),
                        right: row.file2.clone(),
                        metric: Metric::Text(*metric),
                        variant: Some(variant),
                        score: scores.get(variant),
                    });
                }
            }
        }
        out
    }
}

// ── Image report ─────────────────────────────────────────────────────────

/// One image pair; `scores[k]` belongs to the report's `metrics[k]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePairRow {
    pub image1: String,
    pub image2: String,
    pub scores: Vec<f64>,
}

/// Every scored image pair across the corpus, in stable pair order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageSimilarityReport {
    pub metrics: Vec<ImageMetric>,
    pub rows: Vec<ImagePairRow>,
}

impl ImageSimilarityReport {
    pub fn score(&self, row: &ImagePairRow, metric: ImageMetric) -> Option<f64> {
        let k = self.metrics.iter().position(|m| *m == metric)?;
        row.scores.get(k).copied()
    }

    /// Every other image paired with `label`, best match first.
    pub fn most_similar(&self, label: &str, metric: ImageMetric) -> Vec<RankedMatch> {
        let matches = self
            .rows
            .iter()
            .filter_map(|row| {
                let other = if row.image1 == label {
                    &row.image2
                } else if row.image2 == label {
                    &row.image1
                } else {
                    return None;
                };
                Some(RankedMatch {
                    name: other.clone(),
                    score: self.score(row, metric)?,
                })
            })
            .collect();
        rank(matches)
    }

    pub fn records(&self) -> Vec<SimilarityRecord> {
        let mut out = Vec::with_capacity(self.rows.len() * self.metrics.len());
        for row in &self.rows {
            for (metric, score) in self.metrics.iter().zip(&row.scores) {
                out.push(SimilarityRecord {
                    left: row.image1.clone(),
                    right: row.image2.clone(),
                    metric: Metric::Image(*metric),
                    variant: None,
                    score: *score,
                });
            }
        }
        out
    }
}

// ── Run results ──────────────────────────────────────────────────────────

/// Counters and timings for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// PDFs found in the input folder.
    pub documents_found: usize,
    /// PDFs extracted successfully.
    pub documents_extracted: usize,
    /// PDFs that failed extraction and were left out.
    pub documents_failed: usize,
    /// Images written to disk.
    pub images_extracted: usize,
    /// Image XObjects with an unsupported encoding.
    pub images_skipped: usize,
    /// Written images that could not be decoded for scoring.
    pub images_unscored: usize,
    /// Document pairs scored.
    pub text_pairs: usize,
    /// Image pairs scored.
    pub image_pairs: usize,
    /// Wall-clock time for the whole run.
    pub total_duration_ms: u64,
    /// Time spent extracting and normalising.
    pub extract_duration_ms: u64,
    /// Time spent scoring pairs.
    pub score_duration_ms: u64,
}

/// The complete result of [`crate::analyze_folder`].
#[derive(Debug, Clone, Serialize)]
pub struct CorpusOutput {
    pub snapshot: CorpusSnapshot,
    /// Every image written, scored or not.
    pub images: Vec<ImageAsset>,
    pub text_report: TextSimilarityReport,
    /// `None` when image extraction was disabled.
    pub image_report: Option<ImageSimilarityReport>,
    /// Documents that dropped out of the run.
    pub failures: Vec<ExtractionError>,
    pub stats: RunStats,
}

/// The result of [`crate::extract_corpus`]: extraction and normalisation only.
#[derive(Debug, Clone)]
pub struct ExtractionOutput {
    pub snapshot: CorpusSnapshot,
    /// Extracted images with their canonical form, in document order.
    pub images: Vec<ExtractedImage>,
    pub failures: Vec<ExtractionError>,
    pub stats: RunStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> TextSimilarityReport {
        let row = |a: &str, b: &str, j: f64| TextPairRow {
            file1: a.into(),
            file2: b.into(),
            scores: vec![VariantScores { raw: j / 2.0, preprocessed: j }],
        };
        TextSimilarityReport {
            metrics: vec![TextMetric::Jaccard],
            rows: vec![row("a.pdf", "b.pdf", 0.2), row("a.pdf", "c.pdf", 0.9), row("b.pdf", "c.pdf", 0.5)],
        }
    }

    #[test]
    fn document_serialises_with_column_names() {
        let doc = Document {
            file_name: "a.pdf".into(),
            text: "cat sat".into(),
            preprocessed_text: "cat sat".into(),
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["File Name"], "a.pdf");
        assert_eq!(json["Preprocessed Text"], "cat sat");
    }

    #[test]
    fn snapshot_is_a_bare_array() {
        let snap = CorpusSnapshot::default();
        assert_eq!(serde_json::to_string(&snap).unwrap(), "[]");
    }

    #[test]
    fn most_similar_ranks_descending() {
        let r = report();
        let ranked = r.most_similar("c.pdf", TextMetric::Jaccard, TextVariant::Preprocessed);
        let names: Vec<&str> = ranked.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf"]);
        assert_eq!(ranked[0].score, 0.9);
    }

    #[test]
    fn most_similar_unknown_metric_or_file_is_empty() {
        let r = report();
        assert!(r.most_similar("c.pdf", TextMetric::Cosine, TextVariant::Raw).is_empty());
        assert!(r.most_similar("z.pdf", TextMetric::Jaccard, TextVariant::Raw).is_empty());
    }

    #[test]
    fn records_cover_every_pair_metric_and_variant() {
        let recs = report().records();
        assert_eq!(recs.len(), 3 * 2);
        assert!(recs.iter().all(|r| r.left != r.right));
        assert_eq!(recs[0].variant, Some(TextVariant::Raw));
        assert_eq!(recs[1].variant, Some(TextVariant::Preprocessed));
    }

    #[test]
    fn pair_lookup_is_order_independent() {
        let r = report();
        assert_eq!(r.pair("c.pdf", "a.pdf").unwrap().file1, "a.pdf");
        assert!(r.pair("a.pdf", "a.pdf").is_none());
    }

    #[test]
    fn image_records_have_no_variant() {
        let r = ImageSimilarityReport {
            metrics: vec![ImageMetric::Ssim, ImageMetric::Mse],
            rows: vec![ImagePairRow {
                image1: "a.pdf/page_1_img_1.png".into(),
                image2: "b.pdf/page_1_img_1.png".into(),
                scores: vec![1.0, 0.0],
            }],
        };
        let recs = r.records();
        assert_eq!(recs.len(), 2);
        assert!(recs.iter().all(|rec| rec.variant.is_none()));
        assert_eq!(r.most_similar("b.pdf/page_1_img_1.png", ImageMetric::Ssim)[0].score, 1.0);
    }
}
