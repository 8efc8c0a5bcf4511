//! Persistence: corpus snapshot (JSON) and similarity reports (CSV).
//!
//! Every artifact is written atomically: the bytes go to a sibling
//! `*.tmp` file which is then renamed over the target, so a crashed run
//! never leaves a half-written report behind.
//!
//! CSV output follows RFC 4180: fields containing a comma, a double quote or
//! a line break are quoted and embedded quotes are doubled. Scores are
//! printed with the shortest representation that round-trips.

use crate::error::SimilarityError;
use crate::metrics::TextVariant;
use crate::output::{CorpusSnapshot, ImageSimilarityReport, TextSimilarityReport};
use std::fmt::Write as _;
use std::path::Path;
use tracing::debug;

// ── Snapshot ─────────────────────────────────────────────────────────────

/// Write the snapshot as a pretty-printed JSON array.
pub fn write_snapshot(path: &Path, snapshot: &CorpusSnapshot) -> Result<(), SimilarityError> {
    let json = serde_json::to_vec_pretty(snapshot)
        .map_err(|e| SimilarityError::Serialization(e.to_string()))?;
    write_atomic(path, &json)
}

/// Read a snapshot written by [`write_snapshot`].
pub fn read_snapshot(path: &Path) -> Result<CorpusSnapshot, SimilarityError> {
    let bytes = std::fs::read(path).map_err(|e| SimilarityError::SnapshotReadFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    serde_json::from_slice(&bytes).map_err(|e| SimilarityError::SnapshotReadFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

// ── CSV rendering ────────────────────────────────────────────────────────

/// `File1,File2,Similarity (<Metric>) (Normal Text),Similarity (<Metric>) (Preprocessed Text),…`
pub fn render_text_csv(report: &TextSimilarityReport) -> String {
    let mut header = vec!["File1".to_string(), "File2".to_string()];
    for metric in &report.metrics {
        for variant in TextVariant::ALL {
            header.push(format!("Similarity ({}) ({})", metric.name(), variant.label()));
        }
    }

    let mut out = String::new();
    push_record(&mut out, header.iter().map(String::as_str));
    for row in &report.rows {
        let mut fields = vec![row.file1.clone(), row.file2.clone()];
        for scores in &row.scores {
            fields.push(scores.raw.to_string());
            fields.push(scores.preprocessed.to_string());
        }
        push_record(&mut out, fields.iter().map(String::as_str));
    }
    out
}

/// `Image1,Image2,Image Similarity (<METRIC>),…`
pub fn render_image_csv(report: &ImageSimilarityReport) -> String {
    let mut header = vec!["Image1".to_string(), "Image2".to_string()];
    for metric in &report.metrics {
        header.push(format!("Image Similarity ({})", metric.name()));
    }

    let mut out = String::new();
    push_record(&mut out, header.iter().map(String::as_str));
    for row in &report.rows {
        let mut fields = vec![row.image1.clone(), row.image2.clone()];
        fields.extend(row.scores.iter().map(f64::to_string));
        push_record(&mut out, fields.iter().map(String::as_str));
    }
    out
}

pub fn write_text_report(path: &Path, report: &TextSimilarityReport) -> Result<(), SimilarityError> {
    write_atomic(path, render_text_csv(report).as_bytes())
}

pub fn write_image_report(
    path: &Path,
    report: &ImageSimilarityReport,
) -> Result<(), SimilarityError> {
    write_atomic(path, render_image_csv(report).as_bytes())
}

fn push_record<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_field(out, field);
    }
    out.push('\n');
}

fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        let _ = write!(out, "\"{}\"", field.replace('"', "\"\""));
    } else {
        out.push_str(field);
    }
}

// ── Atomic write ─────────────────────────────────────────────────────────

/// Write `bytes` to `path` via a temp file + rename, creating parent folders.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SimilarityError> {
    let fail = |source| SimilarityError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(fail)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    std::fs::write(&tmp_path, bytes).map_err(fail)?;
    std::fs::rename(&tmp_path, path).map_err(fail)?;
    debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{ImageMetric, TextMetric};
    use crate::output::{Document, ImagePairRow, TextPairRow, VariantScores};
    use tempfile::TempDir;

    fn text_report() -> TextSimilarityReport {
        TextSimilarityReport {
            metrics: vec![TextMetric::Levenshtein, TextMetric::Jaccard],
            rows: vec![TextPairRow {
                file1: "a.pdf".into(),
                file2: "b, draft.pdf".into(),
                scores: vec![
                    VariantScores { raw: 0.5, preprocessed: 1.0 },
                    VariantScores { raw: 0.25, preprocessed: 0.0 },
                ],
            }],
        }
    }

    #[test]
    fn text_csv_header_and_rows() {
        let csv = render_text_csv(&text_report());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "File1,File2,Similarity (Levenshtein) (Normal Text),\
             Similarity (Levenshtein) (Preprocessed Text),\
             Similarity (Jaccard) (Normal Text),Similarity (Jaccard) (Preprocessed Text)"
        );
        assert_eq!(lines[1], "a.pdf,\"b, draft.pdf\",0.5,1,0.25,0");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn image_csv_header_and_rows() {
        let report = ImageSimilarityReport {
            metrics: vec![ImageMetric::Ssim, ImageMetric::Mse],
            rows: vec![ImagePairRow {
                image1: "a.pdf/page_1_img_1.png".into(),
                image2: "b.pdf/page_2_img_1.jpg".into(),
                scores: vec![0.75, -0.125],
            }],
        };
        let csv = render_image_csv(&report);
        assert_eq!(
            csv,
            "Image1,Image2,Image Similarity (SSIM),Image Similarity (MSE)\n\
             a.pdf/page_1_img_1.png,b.pdf/page_2_img_1.jpg,0.75,-0.125\n"
        );
    }

    #[test]
    fn quotes_are_doubled() {
        let mut out = String::new();
        push_field(&mut out, "say \"hi\"");
        assert_eq!(out, "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn empty_report_has_header_only() {
        let csv = render_text_csv(&TextSimilarityReport {
            metrics: vec![TextMetric::Cosine],
            rows: vec![],
        });
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn snapshot_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("corpus_snapshot.json");
        let snap = CorpusSnapshot {
            documents: vec![Document {
                file_name: "a.pdf".into(),
                text: "the cat sat".into(),
                preprocessed_text: "cat sat".into(),
            }],
        };
        write_snapshot(&path, &snap).unwrap();
        assert!(!dir.path().join("nested").join("corpus_snapshot.json.tmp").exists());
        assert_eq!(read_snapshot(&path).unwrap(), snap);
    }

    #[test]
    fn unreadable_snapshot_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(
            read_snapshot(&path),
            Err(SimilarityError::SnapshotReadFailed { .. })
        ));
        assert!(matches!(
            read_snapshot(&dir.path().join("missing.json")),
            Err(SimilarityError::SnapshotReadFailed { .. })
        ));
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        write_atomic(&path, b"old").unwrap();
        write_atomic(&path, b"new").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }
}
