//! Configuration types for corpus similarity analysis.
//!
//! All run behaviour is controlled through [`AnalysisConfig`], built via its
//! [`AnalysisConfigBuilder`]. Metric names are parsed into closed enums up
//! front, so an unknown metric fails when the config is built and never
//! halfway through a long scoring pass.

use crate::error::SimilarityError;
use crate::metrics::{dedup_in_order, ImageMetric, TextMetric};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Configuration for one analysis run.
///
/// Built via [`AnalysisConfig::builder()`] or using
/// [`AnalysisConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf_similarity::{AnalysisConfig, TextMetric};
///
/// let config = AnalysisConfig::builder()
///     .concurrency(4)
///     .text_metrics(vec![TextMetric::Cosine, TextMetric::Jaccard])
///     .extract_images(false)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Extraction tasks in flight, and size of the scoring thread pool.
    /// Default: available parallelism.
    pub concurrency: usize,

    /// Text metrics to compute, in report column order. Default: all four.
    pub text_metrics: Vec<TextMetric>,

    /// Image metrics to compute, in report column order. Default: SSIM, MSE.
    pub image_metrics: Vec<ImageMetric>,

    /// Extract embedded images and build the image report. Default: true.
    pub extract_images: bool,

    /// Where artifacts are written. Default: `None` (the input folder).
    pub output_dir: Option<PathBuf>,

    /// Snapshot file name inside the output directory.
    pub snapshot_file: String,

    /// Text report file name inside the output directory.
    pub text_report_file: String,

    /// Image report file name inside the output directory.
    pub image_report_file: String,

    /// Name of the folder (inside the output directory) that receives image
    /// side files.
    pub images_dir: String,

    /// Score only one shard of the pair space. Default: all pairs.
    pub shard: Option<PairShard>,

    /// Observer for run events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            text_metrics: TextMetric::ALL.to_vec(),
            image_metrics: ImageMetric::ALL.to_vec(),
            extract_images: true,
            output_dir: None,
            snapshot_file: "corpus_snapshot.json".into(),
            text_report_file: "text_similarity.csv".into(),
            image_report_file: "image_similarity.csv".into(),
            images_dir: "images".into(),
            shard: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("concurrency", &self.concurrency)
            .field("text_metrics", &self.text_metrics)
            .field("image_metrics", &self.image_metrics)
            .field("extract_images", &self.extract_images)
            .field("output_dir", &self.output_dir)
            .field("snapshot_file", &self.snapshot_file)
            .field("text_report_file", &self.text_report_file)
            .field("image_report_file", &self.image_report_file)
            .field("images_dir", &self.images_dir)
            .field("shard", &self.shard)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn CorpusProgressCallback>"),
            )
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// Directory that receives artifacts for a run over `input`.
    pub fn resolve_output_dir(&self, input: &Path) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| input.to_path_buf())
    }

    /// Root of the image side files for a run over `input`.
    pub fn resolve_images_dir(&self, input: &Path) -> PathBuf {
        self.resolve_output_dir(input).join(&self.images_dir)
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn text_metrics(mut self, metrics: Vec<TextMetric>) -> Self {
        self.config.text_metrics = metrics;
        self
    }

    pub fn image_metrics(mut self, metrics: Vec<ImageMetric>) -> Self {
        self.config.image_metrics = metrics;
        self
    }

    /// Parse text metric names (case-insensitive).
    pub fn text_metric_names<S: AsRef<str>>(
        mut self,
        names: &[S],
    ) -> Result<Self, SimilarityError> {
        self.config.text_metrics = names
            .iter()
            .map(|n| n.as_ref().parse())
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    /// Parse image metric names (case-insensitive).
    pub fn image_metric_names<S: AsRef<str>>(
        mut self,
        names: &[S],
    ) -> Result<Self, SimilarityError> {
        self.config.image_metrics = names
            .iter()
            .map(|n| n.as_ref().parse())
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    pub fn extract_images(mut self, v: bool) -> Self {
        self.config.extract_images = v;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    pub fn snapshot_file(mut self, name: impl Into<String>) -> Self {
        self.config.snapshot_file = name.into();
        self
    }

    pub fn text_report_file(mut self, name: impl Into<String>) -> Self {
        self.config.text_report_file = name.into();
        self
    }

    pub fn image_report_file(mut self, name: impl Into<String>) -> Self {
        self.config.image_report_file = name.into();
        self
    }

    pub fn images_dir(mut self, name: impl Into<String>) -> Self {
        self.config.images_dir = name.into();
        self
    }

    pub fn shard(mut self, shard: PairShard) -> Self {
        self.config.shard = Some(shard);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// Repeated metrics are collapsed to their first occurrence.
    pub fn build(mut self) -> Result<AnalysisConfig, SimilarityError> {
        let c = &mut self.config;
        if c.concurrency == 0 {
            return Err(SimilarityError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.text_metrics.is_empty() {
            return Err(SimilarityError::InvalidConfig(
                "At least one text metric is required".into(),
            ));
        }
        if c.extract_images && c.image_metrics.is_empty() {
            return Err(SimilarityError::InvalidConfig(
                "At least one image metric is required when image extraction is on".into(),
            ));
        }
        for (what, name) in [
            ("snapshot file", &c.snapshot_file),
            ("text report file", &c.text_report_file),
            ("image report file", &c.image_report_file),
            ("images folder", &c.images_dir),
        ] {
            if name.trim().is_empty() {
                return Err(SimilarityError::InvalidConfig(format!(
                    "The {what} name must not be empty"
                )));
            }
        }
        if let Some(shard) = c.shard {
            shard.validate()?;
        }
        c.text_metrics = dedup_in_order(&c.text_metrics);
        c.image_metrics = dedup_in_order(&c.image_metrics);
        Ok(self.config)
    }
}

// ── Sharding ─────────────────────────────────────────────────────────────

/// One slice of the pair space: pairs whose stable pair index `k` satisfies
/// `k % count == index`.
///
/// Running every shard `0..count` and concatenating the rows in pair-index
/// order reproduces the unsharded report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairShard {
    pub index: usize,
    pub count: usize,
}

impl PairShard {
    pub fn new(index: usize, count: usize) -> Result<Self, SimilarityError> {
        let shard = Self { index, count };
        shard.validate()?;
        Ok(shard)
    }

    fn validate(self) -> Result<(), SimilarityError> {
        if self.count == 0 || self.index >= self.count {
            return Err(SimilarityError::InvalidConfig(format!(
                "Shard index must be below the shard count, got {}/{}",
                self.index, self.count
            )));
        }
        Ok(())
    }

    /// Whether pair number `k` belongs to this shard.
    pub fn contains(self, k: usize) -> bool {
        k % self.count == self.index
    }
}

impl fmt::Display for PairShard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index, self.count)
    }
}

/// Parses `K/N`, e.g. `0/4`.
impl FromStr for PairShard {
    type Err = SimilarityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || SimilarityError::InvalidConfig(format!("Shard must look like K/N, got '{s}'"));
        let (k, n) = s.split_once('/').ok_or_else(bad)?;
        let index = k.trim().parse().map_err(|_| bad())?;
        let count = n.trim().parse().map_err(|_| bad())?;
        PairShard::new(index, count)
    }
}
