//! Similarity metrics.
//!
//! Metric names are a closed set and map to [`TextMetric`] and
//! [`ImageMetric`]. Configuration parses them once through [`FromStr`]; the
//! string-dispatch helpers [`text_similarity`] and [`image_similarity`] parse
//! at call time for ad-hoc use.
//!
//! ## Fallback values for degenerate input
//!
//! | metric      | input                         | score |
//! |-------------|-------------------------------|-------|
//! | Levenshtein | both empty                    | 1.0   |
//! | Cosine      | both vocabularies empty       | 1.0   |
//! | Cosine      | exactly one vocabulary empty  | 0.0   |
//! | Jaccard     | both token sets empty         | 0.0   |
//! | Hamming     | both empty                    | 1.0   |
//! | SSIM        | second image flat             | data range 1.0 |
//!
//! MSE is reported negated so that larger is always more similar; it is
//! unbounded below and never positive.

pub mod image;
pub mod text;

use crate::error::SimilarityError;
use crate::pipeline::canonical::CanonicalImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ── Text ─────────────────────────────────────────────────────────────────

/// A text similarity algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextMetric {
    Levenshtein,
    Cosine,
    Jaccard,
    Hamming,
}

impl TextMetric {
    /// Every text metric, in report column order.
    pub const ALL: [TextMetric; 4] = [
        TextMetric::Levenshtein,
        TextMetric::Cosine,
        TextMetric::Jaccard,
        TextMetric::Hamming,
    ];

    /// Name used in report headers.
    pub fn name(self) -> &'static str {
        match self {
            TextMetric::Levenshtein => "Levenshtein",
            TextMetric::Cosine => "Cosine",
            TextMetric::Jaccard => "Jaccard",
            TextMetric::Hamming => "Hamming",
        }
    }

    /// Score two strings. Symmetric; always within `[0, 1]`.
    pub fn score(self, a: &str, b: &str) -> f64 {
        match self {
            TextMetric::Levenshtein => text::levenshtein(a, b),
            TextMetric::Cosine => text::cosine_tfidf(a, b),
            TextMetric::Jaccard => text::jaccard(a, b),
            TextMetric::Hamming => text::hamming(a, b),
        }
    }
}

impl fmt::Display for TextMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TextMetric {
    type Err = SimilarityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        TextMetric::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| SimilarityError::InvalidMetric {
                kind: "text",
                name: s.to_string(),
                expected: names(TextMetric::ALL.iter().map(|m| m.name())),
            })
    }
}

/// Which text a text metric was applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextVariant {
    /// Extracted text as-is (lowercased).
    Raw,
    /// Output of [`crate::normalize_text`].
    Preprocessed,
}

impl TextVariant {
    pub const ALL: [TextVariant; 2] = [TextVariant::Raw, TextVariant::Preprocessed];

    /// Label used in report headers.
    pub fn label(self) -> &'static str {
        match self {
            TextVariant::Raw => "Normal Text",
            TextVariant::Preprocessed => "Preprocessed Text",
        }
    }
}

impl fmt::Display for TextVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Image ────────────────────────────────────────────────────────────────

/// An image similarity algorithm over canonical images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageMetric {
    Ssim,
    Mse,
}

impl ImageMetric {
    /// Every image metric, in report column order.
    pub const ALL: [ImageMetric; 2] = [ImageMetric::Ssim, ImageMetric::Mse];

    pub fn name(self) -> &'static str {
        match self {
            ImageMetric::Ssim => "SSIM",
            ImageMetric::Mse => "MSE",
        }
    }

    /// Score two canonical images of identical shape.
    ///
    /// SSIM takes its dynamic range from `b`. Returns
    /// [`SimilarityError::ShapeMismatch`] when the dimensions differ.
    pub fn score(self, a: &CanonicalImage, b: &CanonicalImage) -> Result<f64, SimilarityError> {
        if a.width() != b.width() || a.height() != b.height() {
            return Err(SimilarityError::ShapeMismatch {
                left_width: a.width(),
                left_height: a.height(),
                right_width: b.width(),
                right_height: b.height(),
            });
        }
        Ok(match self {
            ImageMetric::Ssim => image::ssim(a, b),
            ImageMetric::Mse => image::mse(a, b),
        })
    }
}

impl fmt::Display for ImageMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ImageMetric {
    type Err = SimilarityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ImageMetric::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| SimilarityError::InvalidMetric {
                kind: "image",
                name: s.to_string(),
                expected: names(ImageMetric::ALL.iter().map(|m| m.name())),
            })
    }
}

// ── String dispatch ──────────────────────────────────────────────────────

/// Score two strings with the metric called `metric`.
///
/// ```
/// let s = pdf_similarity::text_similarity("cat sat", "cat sat", "jaccard").unwrap();
/// assert_eq!(s, 1.0);
/// ```
pub fn text_similarity(a: &str, b: &str, metric: &str) -> Result<f64, SimilarityError> {
    Ok(metric.parse::<TextMetric>()?.score(a, b))
}

/// Score two canonical images with the metric called `metric`.
pub fn image_similarity(
    a: &CanonicalImage,
    b: &CanonicalImage,
    metric: &str,
) -> Result<f64, SimilarityError> {
    metric.parse::<ImageMetric>()?.score(a, b)
}

fn names<'a>(it: impl Iterator<Item = &'a str>) -> String {
    it.collect::<Vec<_>>().join(", ")
}

/// Drop repeated entries, keeping first occurrences in order.
pub(crate) fn dedup_in_order<T: PartialEq + Copy>(items: &[T]) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(item) {
            out.push(*item);
        }
    }
    out
}
