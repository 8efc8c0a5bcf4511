//! End-to-end integration tests for pdf-similarity.
//!
//! Every test builds its own corpus of small synthetic PDFs (Helvetica text
//! and uncompressed gray image XObjects) inside a temporary folder, so no
//! fixtures, network access or external binaries are needed.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use pdf_similarity::{
    analyze_folder, analyze_to_dir, extract_corpus, read_snapshot, score_snapshot,
    write_snapshot, AnalysisConfig, CorpusProgressCallback, ExtractionError, ImageMetric,
    PairKind, PairShard, RunStats, SimilarityError, TextMetric, TextVariant,
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// One page: a line of text and an optional gray image `(w, h, samples)`.
struct Page<'a> {
    text: &'a str,
    image: Option<(u32, u32, Vec<u8>)>,
}

fn text_page(text: &str) -> Page<'_> {
    Page { text, image: None }
}

/// Build a minimal uncompressed PDF. Object 1 is the catalog, 2 the page
/// tree, 3 the font; each page then adds a page, a content stream and an
/// optional image XObject.
fn build_pdf(pages: &[Page<'_>]) -> Vec<u8> {
    let mut objects: Vec<Vec<u8>> = Vec::new();
    let mut kids = Vec::new();
    let mut layout = Vec::new();
    let mut next_id = 4;
    for page in pages {
        let image_id = page.image.as_ref().map(|_| next_id + 2);
        kids.push(format!("{next_id} 0 R"));
        layout.push((next_id + 1, image_id));
        next_id += if image_id.is_some() { 3 } else { 2 };
    }

    objects.push(b"<< /Type /Catalog /Pages 2 0 R >>".to_vec());
    objects.push(
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        )
        .into_bytes(),
    );
    objects.push(b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_vec());

    for (page, (content_id, image_id)) in pages.iter().zip(layout) {
        let xobject = image_id
            .map(|id| format!(" /XObject << /Im1 {id} 0 R >>"))
            .unwrap_or_default();
        objects.push(
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                 /Resources << /Font << /F1 3 0 R >>{xobject} >> /Contents {content_id} 0 R >>"
            )
            .into_bytes(),
        );

        let mut ops = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", page.text);
        if image_id.is_some() {
            ops.push_str(" q 100 0 0 100 72 400 cm /Im1 Do Q");
        }
        objects.push(stream(String::new(), ops.as_bytes()));

        if let Some((w, h, samples)) = &page.image {
            let dict = format!(
                " /Type /XObject /Subtype /Image /Width {w} /Height {h} \
                 /ColorSpace /DeviceGray /BitsPerComponent 8"
            );
            objects.push(stream(dict, samples));
        }
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }
    let xref_at = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for off in offsets {
        out.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );
    out
}

fn stream(extra: String, data: &[u8]) -> Vec<u8> {
    let mut body = format!("<<{extra} /Length {} >>\nstream\n", data.len()).into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(b"\nendstream");
    body
}

fn checker(w: u32, h: u32) -> Vec<u8> {
    (0..h)
        .flat_map(|y| (0..w).map(move |x| if (x / 4 + y / 4) % 2 == 0 { 20 } else { 230 }))
        .collect()
}

fn ramp(w: u32, h: u32) -> Vec<u8> {
    (0..h)
        .flat_map(|_| (0..w).map(move |x| (x * 255 / (w - 1)) as u8))
        .collect()
}

/// Route library logs to the test harness; `RUST_LOG=debug` shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn write_pdf(dir: &Path, name: &str, pages: &[Page<'_>]) {
    std::fs::write(dir.join(name), build_pdf(pages)).unwrap();
}

fn config() -> AnalysisConfig {
    AnalysisConfig::builder().concurrency(2).build().unwrap()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Corpus of three text-only documents plus a non-PDF file.
fn text_corpus() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_pdf(dir.path(), "a.pdf", &[text_page("the cat sat")]);
    write_pdf(dir.path(), "b.pdf", &[text_page("a cat sat")]);
    write_pdf(dir.path(), "c.pdf", &[text_page("dogs barking loudly")]);
    std::fs::write(dir.path().join("notes.txt"), "not a pdf").unwrap();
    dir
}

// ── Text similarity ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_stop_words_do_not_separate_documents() {
    let dir = text_corpus();
    let output = analyze_folder(dir.path(), &config()).await.unwrap();

    assert_eq!(output.stats.documents_found, 3);
    assert_eq!(output.snapshot.documents[0].preprocessed_text, "cat sat");

    let report = &output.text_report;
    let ab = report.pair("a.pdf", "b.pdf").expect("a/b pair");
    let pre = report
        .score(ab, TextMetric::Jaccard, TextVariant::Preprocessed)
        .unwrap();
    let raw = report.score(ab, TextMetric::Jaccard, TextVariant::Raw).unwrap();
    assert!(close(pre, 1.0), "preprocessed jaccard = {pre}");
    assert!(close(raw, 0.5), "raw jaccard = {raw}");
}

#[tokio::test]
async fn test_disjoint_documents_score_zero() {
    let dir = text_corpus();
    let output = analyze_folder(dir.path(), &config()).await.unwrap();
    let report = &output.text_report;

    let ac = report.pair("a.pdf", "c.pdf").unwrap();
    for variant in TextVariant::ALL {
        assert_eq!(report.score(ac, TextMetric::Jaccard, variant), Some(0.0));
        assert_eq!(report.score(ac, TextMetric::Cosine, variant), Some(0.0));
    }
}

#[tokio::test]
async fn test_every_pair_once_and_never_with_itself() {
    let dir = TempDir::new().unwrap();
    for name in ["e.pdf", "d.pdf", "C.PDF", "b.pdf", "a.pdf"] {
        write_pdf(dir.path(), name, &[text_page(name)]);
    }
    let output = analyze_folder(dir.path(), &config()).await.unwrap();
    let rows = &output.text_report.rows;

    assert_eq!(rows.len(), 10);
    let mut seen = HashSet::new();
    for row in rows {
        assert_ne!(row.file1, row.file2);
        let key = if row.file1 < row.file2 {
            (row.file1.clone(), row.file2.clone())
        } else {
            (row.file2.clone(), row.file1.clone())
        };
        assert!(seen.insert(key), "duplicate pair {} / {}", row.file1, row.file2);
    }
    let names: Vec<&str> = output
        .snapshot
        .documents
        .iter()
        .map(|d| d.file_name.as_str())
        .collect();
    assert_eq!(names, ["C.PDF", "a.pdf", "b.pdf", "d.pdf", "e.pdf"]);
    assert_eq!((rows[0].file1.as_str(), rows[0].file2.as_str()), ("C.PDF", "a.pdf"));
}

#[tokio::test]
async fn test_scores_are_bounded_and_symmetric_in_order() {
    let dir = text_corpus();
    let output = analyze_folder(dir.path(), &config()).await.unwrap();
    for record in output.text_report.records() {
        assert!(
            (0.0..=1.0).contains(&record.score),
            "{} {} {} = {}",
            record.left,
            record.right,
            record.metric,
            record.score
        );
    }

    let docs = &output.snapshot.documents;
    for metric in TextMetric::ALL {
        let ab = metric.score(&docs[0].text, &docs[1].text);
        let ba = metric.score(&docs[1].text, &docs[0].text);
        assert!(close(ab, ba), "{metric} is not symmetric");
    }
}

#[tokio::test]
async fn test_most_similar_ranks_descending() {
    let dir = text_corpus();
    let output = analyze_folder(dir.path(), &config()).await.unwrap();
    let ranked =
        output
            .text_report
            .most_similar("a.pdf", TextMetric::Jaccard, TextVariant::Preprocessed);

    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].name, "b.pdf");
    assert!(ranked[0].score >= ranked[1].score);
    assert!(output
        .text_report
        .most_similar("missing.pdf", TextMetric::Jaccard, TextVariant::Raw)
        .is_empty());
}

// ── Failure isolation ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_corrupt_pdf_is_skipped_not_fatal() {
    init_tracing();
    let dir = text_corpus();
    std::fs::write(dir.path().join("broken.pdf"), b"%PDF-1.4 this is not a pdf").unwrap();

    let output = analyze_folder(dir.path(), &config()).await.unwrap();
    assert_eq!(output.stats.documents_found, 4);
    assert_eq!(output.stats.documents_extracted, 3);
    assert_eq!(output.stats.documents_failed, 1);
    assert_eq!(output.failures.len(), 1);
    assert_eq!(output.failures[0].file(), "broken.pdf");
    assert!(matches!(output.failures[0], ExtractionError::Corrupt { .. }));

    assert_eq!(output.text_report.rows.len(), 3);
    assert!(output
        .text_report
        .rows
        .iter()
        .all(|r| r.file1 != "broken.pdf" && r.file2 != "broken.pdf"));
}

#[tokio::test]
async fn test_missing_folder_is_fatal() {
    let dir = TempDir::new().unwrap();
    let err = analyze_folder(dir.path().join("nope"), &config())
        .await
        .unwrap_err();
    assert!(matches!(err, SimilarityError::InputNotFound { .. }));

    let file = dir.path().join("file.pdf");
    std::fs::write(&file, build_pdf(&[text_page("x")])).unwrap();
    let err = analyze_folder(&file, &config()).await.unwrap_err();
    assert!(matches!(err, SimilarityError::NotADirectory { .. }));
}

#[tokio::test]
async fn test_empty_folder_yields_empty_reports() {
    let dir = TempDir::new().unwrap();
    let stats = analyze_to_dir(dir.path(), &config()).await.unwrap();
    assert_eq!(stats.documents_found, 0);
    assert_eq!(stats.text_pairs, 0);

    let csv = std::fs::read_to_string(dir.path().join("text_similarity.csv")).unwrap();
    assert_eq!(csv.lines().count(), 1);
    assert!(csv.starts_with("File1,File2,Similarity (Levenshtein) (Normal Text)"));
}

// ── Images ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_identical_images_score_perfectly() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let page = |text| Page {
        text,
        image: Some((32, 24, checker(32, 24))),
    };
    write_pdf(dir.path(), "a.pdf", &[page("first")]);
    write_pdf(dir.path(), "b.pdf", &[text_page("cover"), page("second")]);
    write_pdf(
        dir.path(),
        "c.pdf",
        &[Page {
            text: "third",
            image: Some((40, 40, ramp(40, 40))),
        }],
    );

    let output = analyze_folder(dir.path(), &config()).await.unwrap();
    let labels: Vec<&str> = output.images.iter().map(|i| i.label.as_str()).collect();
    assert_eq!(
        labels,
        ["a.pdf/page_1_img_1.png", "b.pdf/page_2_img_1.png", "c.pdf/page_1_img_1.png"]
    );
    for asset in &output.images {
        assert!(asset.path.is_file(), "{} not written", asset.path.display());
        assert!(asset.path.starts_with(dir.path().join("images")));
    }

    let report = output.image_report.as_ref().expect("image report");
    assert_eq!(report.rows.len(), 3);
    let same = &report.rows[0];
    assert_eq!(same.image1, "a.pdf/page_1_img_1.png");
    assert_eq!(same.image2, "b.pdf/page_2_img_1.png");
    let ssim = report.score(same, ImageMetric::Ssim).unwrap();
    let mse = report.score(same, ImageMetric::Mse).unwrap();
    assert!(close(ssim, 1.0), "ssim = {ssim}");
    assert_eq!(mse, 0.0);

    let different = &report.rows[1];
    assert!(report.score(different, ImageMetric::Mse).unwrap() < 0.0);
    assert!(report.score(different, ImageMetric::Ssim).unwrap() < 1.0);

    let ranked = report.most_similar("a.pdf/page_1_img_1.png", ImageMetric::Ssim);
    assert_eq!(ranked[0].name, "b.pdf/page_2_img_1.png");
}

#[tokio::test]
async fn test_case_variant_file_names_keep_images_apart() {
    let dir = TempDir::new().unwrap();
    write_pdf(
        dir.path(),
        "a.pdf",
        &[Page { text: "lower", image: Some((16, 16, checker(16, 16))) }],
    );
    write_pdf(
        dir.path(),
        "a.PDF",
        &[Page { text: "upper", image: Some((16, 16, ramp(16, 16))) }],
    );
    if std::fs::read_dir(dir.path()).unwrap().count() < 2 {
        return; // case-insensitive filesystem
    }

    let output = analyze_folder(dir.path(), &config()).await.unwrap();
    let labels: HashSet<&str> = output.images.iter().map(|i| i.label.as_str()).collect();
    assert_eq!(labels.len(), 2);
    assert!(labels.contains("a.pdf/page_1_img_1.png"));
    assert!(labels.contains("a.PDF/page_1_img_1.png"));
    for asset in &output.images {
        assert!(asset.path.is_file(), "{} not written", asset.path.display());
    }

    let report = output.image_report.as_ref().expect("image report");
    assert_eq!(report.rows.len(), 1);
    for row in &report.rows {
        assert_ne!(row.image1, row.image2);
    }
    assert!(report.score(&report.rows[0], ImageMetric::Mse).unwrap() < 0.0);
}

#[tokio::test]
async fn test_no_images_skips_image_axis() {
    let dir = TempDir::new().unwrap();
    write_pdf(
        dir.path(),
        "a.pdf",
        &[Page {
            text: "pic",
            image: Some((16, 16, ramp(16, 16))),
        }],
    );
    write_pdf(dir.path(), "b.pdf", &[text_page("words")]);

    let config = AnalysisConfig::builder()
        .extract_images(false)
        .build()
        .unwrap();
    let stats = analyze_to_dir(dir.path(), &config).await.unwrap();

    assert_eq!(stats.images_extracted, 0);
    assert_eq!(stats.text_pairs, 1);
    assert!(!dir.path().join("images").exists());
    assert!(!dir.path().join("image_similarity.csv").exists());
}

// ── Persistence & determinism ───────────────────────────────────────────────

#[tokio::test]
async fn test_repeated_runs_write_identical_artifacts() {
    init_tracing();
    let dir = text_corpus();
    write_pdf(
        dir.path(),
        "d.pdf",
        &[Page {
            text: "cat picture",
            image: Some((20, 20, checker(20, 20))),
        }],
    );
    let first = dir.path().join("run1");
    let second = dir.path().join("run2");

    for (out, concurrency) in [(&first, 1), (&second, 4)] {
        let config = AnalysisConfig::builder()
            .concurrency(concurrency)
            .output_dir(out.clone())
            .build()
            .unwrap();
        analyze_to_dir(dir.path(), &config).await.unwrap();
    }

    for name in ["corpus_snapshot.json", "text_similarity.csv", "image_similarity.csv"] {
        let a = std::fs::read(first.join(name)).unwrap();
        let b = std::fs::read(second.join(name)).unwrap();
        assert_eq!(a, b, "{name} differs between runs");
    }
    assert!(first.join("images").join("d.pdf").join("page_1_img_1.png").is_file());
}

#[tokio::test]
async fn test_rescoring_a_snapshot_matches_full_run() {
    let dir = text_corpus();
    let config = config();
    let full = analyze_folder(dir.path(), &config).await.unwrap();

    let extracted = extract_corpus(dir.path(), &config).await.unwrap();
    let path = dir.path().join("saved").join("corpus_snapshot.json");
    write_snapshot(&path, &extracted.snapshot).unwrap();
    let snapshot = read_snapshot(&path).unwrap();
    assert_eq!(snapshot, full.snapshot);

    let rescored = score_snapshot(&snapshot, &config).unwrap();
    assert_eq!(rescored, full.text_report);

    let hamming_only = AnalysisConfig::builder()
        .text_metrics(vec![TextMetric::Hamming])
        .build()
        .unwrap();
    let report = score_snapshot(&snapshot, &hamming_only).unwrap();
    assert_eq!(report.metrics, vec![TextMetric::Hamming]);
    assert!(report.rows.iter().all(|r| r.scores.len() == 1));
}

#[tokio::test]
async fn test_shards_reassemble_the_full_report() {
    let dir = TempDir::new().unwrap();
    for (name, text) in [
        ("1.pdf", "alpha beta"),
        ("2.pdf", "beta gamma"),
        ("3.pdf", "gamma delta"),
        ("4.pdf", "delta alpha"),
        ("5.pdf", "alpha alpha"),
    ] {
        write_pdf(dir.path(), name, &[text_page(text)]);
    }
    let full = analyze_folder(dir.path(), &config()).await.unwrap();

    let mut merged = Vec::new();
    for index in 0..3 {
        let config = AnalysisConfig::builder()
            .shard(PairShard::new(index, 3).unwrap())
            .build()
            .unwrap();
        let part = analyze_folder(dir.path(), &config).await.unwrap();
        merged.extend(part.text_report.rows);
    }

    assert_eq!(merged.len(), full.text_report.rows.len());
    for row in &full.text_report.rows {
        assert!(merged.contains(row), "missing {} / {}", row.file1, row.file2);
    }
}

// ── Configuration & progress ────────────────────────────────────────────────

#[test]
fn test_unknown_metric_names_are_rejected() {
    let err = AnalysisConfig::builder()
        .text_metric_names(&["cosine", "euclid"])
        .unwrap_err();
    assert!(matches!(err, SimilarityError::InvalidMetric { .. }));

    let err = AnalysisConfig::builder()
        .image_metric_names(&["PSNR"])
        .unwrap_err();
    assert!(matches!(err, SimilarityError::InvalidMetric { .. }));

    let config = AnalysisConfig::builder()
        .text_metric_names(&[" Jaccard ", "COSINE", "jaccard"])
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(config.text_metrics, vec![TextMetric::Jaccard, TextMetric::Cosine]);
}

#[derive(Default)]
struct Recorder {
    total: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    text_pairs: AtomicUsize,
    finished: AtomicUsize,
}

impl CorpusProgressCallback for Recorder {
    fn on_run_start(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
    }
    fn on_document_complete(&self, _file: &str, _done: usize, _total: usize) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_document_error(&self, _file: &str, _done: usize, _total: usize, _error: &str) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_pairs_complete(&self, kind: PairKind, scored: usize) {
        if kind == PairKind::Text {
            self.text_pairs.store(scored, Ordering::SeqCst);
        }
    }
    fn on_run_complete(&self, _stats: &RunStats) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_progress_callback_sees_every_document() {
    let dir = text_corpus();
    std::fs::write(dir.path().join("zz.pdf"), b"garbage").unwrap();

    let recorder = Arc::new(Recorder::default());
    let config = AnalysisConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    analyze_folder(dir.path(), &config).await.unwrap();

    assert_eq!(recorder.total.load(Ordering::SeqCst), 4);
    assert_eq!(recorder.completed.load(Ordering::SeqCst), 3);
    assert_eq!(recorder.failed.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.text_pairs.load(Ordering::SeqCst), 3);
    assert_eq!(recorder.finished.load(Ordering::SeqCst), 1);
}
