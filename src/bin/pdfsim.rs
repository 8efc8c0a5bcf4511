//! CLI binary for pdf-similarity.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `AnalysisConfig`, writes the artifacts and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_similarity::{
    analyze::artifact_paths, extract_corpus, read_snapshot, score_extraction, score_snapshot,
    write_image_report, write_snapshot, write_text_report, AnalysisConfig, CorpusOutput,
    CorpusProgressCallback, ImageSimilarityReport, PairKind, PairShard,
    ProgressCallback, RankedMatch, RunStats, TextSimilarityReport, TextVariant,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for extraction, then a spinner per
/// pair space. Document events may arrive out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(spinner_style());
        bar.set_prefix("Preparing");
        bar.set_message("Listing PDFs…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICKS)
}

fn kind_name(kind: PairKind) -> &'static str {
    match kind {
        PairKind::Text => "text",
        PairKind::Image => "image",
    }
}

impl CorpusProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_documents: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} PDFs  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_documents as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Analysing {total_documents} PDFs…"))
        ));
    }

    fn on_document_complete(&self, file: &str, done: usize, total: usize) {
        self.bar
            .println(format!("  {} {:>3}/{:<3}  {}", green("✓"), done, total, file));
        self.bar.inc(1);
    }

    fn on_document_error(&self, file: &str, done: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            red("✗"),
            done,
            total,
            file,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_pairs_start(&self, kind: PairKind, total_pairs: usize) {
        self.bar.set_style(spinner_style());
        self.bar.set_prefix("Scoring");
        self.bar
            .set_message(format!("{total_pairs} {} pairs", kind_name(kind)));
    }

    fn on_pairs_complete(&self, kind: PairKind, scored_pairs: usize) {
        self.bar.println(format!(
            "  {} {} {} pairs scored",
            green("✓"),
            bold(&scored_pairs.to_string()),
            kind_name(kind)
        ));
    }

    fn on_run_complete(&self, stats: &RunStats) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} PDFs analysed",
                green("✔"),
                bold(&stats.documents_extracted.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} PDFs analysed  ({} skipped)",
                if stats.documents_extracted == 0 {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&stats.documents_extracted.to_string()),
                stats.documents_found,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Full run: snapshot, text report and image report next to the PDFs
  pdfsim papers/

  # Write artifacts elsewhere, text only
  pdfsim papers/ -o results/ --no-images

  # Pick metrics
  pdfsim papers/ --text-metrics cosine,jaccard --image-metrics ssim

  # Extract once, rescore later without re-parsing PDFs
  pdfsim papers/ --extract-only
  pdfsim papers/ --from-snapshot papers/corpus_snapshot.json --text-metrics hamming

  # Split a large corpus over three machines
  pdfsim papers/ --shard 0/3 -o shard0/

  # Ten documents closest to intro.pdf
  pdfsim papers/ --most-similar intro.pdf --top 10

  # Full run output as JSON
  pdfsim papers/ --json > run.json

METRICS:
  Text     levenshtein, cosine, jaccard, hamming   (range 0–1)
  Image    ssim (−1–1), mse (≤ 0, negated)

  Each text metric is scored on the lowercased text and on the
  preprocessed text (stop words removed, Porter stems).

ARTIFACTS (in the output directory, default: the input folder):
  corpus_snapshot.json    per-document text and preprocessed text
  text_similarity.csv     one row per document pair
  image_similarity.csv    one row per image pair
  images/<file>/page_<p>_img_<i>.<ext>

ENVIRONMENT VARIABLES:
  RUST_LOG                Override the log filter (e.g. pdf_similarity=debug)
"#;

/// Pairwise text and image similarity across a folder of PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "pdfsim",
    version,
    about = "Pairwise text and image similarity across a folder of PDFs",
    long_about = "Extract the text and embedded images of every PDF in a folder, normalise them, \
and score every pair of documents and every pair of images under several similarity metrics. \
Results are written as a JSON snapshot and flat CSV reports.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Folder containing the PDFs (not searched recursively).
    folder: PathBuf,

    /// Write artifacts here instead of the input folder.
    #[arg(short, long, env = "PDFSIM_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Extraction tasks in flight and scoring threads.
    #[arg(short, long, env = "PDFSIM_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Comma-separated text metrics: levenshtein, cosine, jaccard, hamming.
    #[arg(long, env = "PDFSIM_TEXT_METRICS", value_delimiter = ',')]
    text_metrics: Option<Vec<String>>,

    /// Comma-separated image metrics: ssim, mse.
    #[arg(long, env = "PDFSIM_IMAGE_METRICS", value_delimiter = ',')]
    image_metrics: Option<Vec<String>>,

    /// Skip image extraction and the image report.
    #[arg(long, env = "PDFSIM_NO_IMAGES")]
    no_images: bool,

    /// Only extract and write the corpus snapshot.
    #[arg(long, conflicts_with = "from_snapshot")]
    extract_only: bool,

    /// Rescore text pairs from an existing snapshot instead of the PDFs.
    #[arg(long, value_name = "FILE")]
    from_snapshot: Option<PathBuf>,

    /// Score only pairs whose index is K modulo N (e.g. 0/4).
    #[arg(long, value_name = "K/N")]
    shard: Option<PairShard>,

    /// Print the documents (or images) closest to NAME after the run.
    #[arg(long, value_name = "NAME")]
    most_similar: Option<String>,

    /// Number of entries shown by --most-similar.
    #[arg(long, default_value_t = 5)]
    top: usize,

    /// Print the run output as JSON on stdout.
    #[arg(long, env = "PDFSIM_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDFSIM_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFSIM_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFSIM_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs are suppressed while the progress bar is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn CorpusProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;
    let (snapshot_path, text_path, image_path) = artifact_paths(&cli.folder, &config);

    // ── Rescore a snapshot ───────────────────────────────────────────────
    if let Some(ref path) = cli.from_snapshot {
        let snapshot = read_snapshot(path).context("Failed to load snapshot")?;
        let report = score_snapshot(&snapshot, &config).context("Scoring failed")?;
        if let Some(ref cb) = config.progress_callback {
            cb.on_run_complete(&RunStats {
                documents_found: snapshot.len(),
                documents_extracted: snapshot.len(),
                text_pairs: report.rows.len(),
                ..RunStats::default()
            });
        }
        write_text_report(&text_path, &report).context("Failed to write text report")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialise report")?
            );
        } else if !cli.quiet {
            eprintln!(
                "{}  {} pairs  →  {}",
                green("✔"),
                report.rows.len(),
                bold(&text_path.display().to_string())
            );
        }
        if let Some(ref name) = cli.most_similar {
            print_text_ranking(&report, name, cli.top);
        }
        return Ok(());
    }

    // ── Extract only ─────────────────────────────────────────────────────
    if cli.extract_only {
        let output = extract_corpus(&cli.folder, &config)
            .await
            .context("Extraction failed")?;
        if let Some(ref cb) = config.progress_callback {
            cb.on_run_complete(&output.stats);
        }
        write_snapshot(&snapshot_path, &output.snapshot).context("Failed to write snapshot")?;

        if cli.json {
            let json = serde_json::json!({
                "snapshot": output.snapshot,
                "images": output.images.iter().map(|i| &i.asset).collect::<Vec<_>>(),
                "failures": output.failures,
                "stats": output.stats,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).context("Failed to serialise output")?
            );
        } else if !cli.quiet {
            eprintln!(
                "{}  {}/{} PDFs  {} images  {}ms  →  {}",
                status_mark(&output.stats),
                output.stats.documents_extracted,
                output.stats.documents_found,
                output.stats.images_extracted,
                output.stats.total_duration_ms,
                bold(&snapshot_path.display().to_string()),
            );
        }
        return Ok(());
    }

    // ── Full run ─────────────────────────────────────────────────────────
    let extraction = extract_corpus(&cli.folder, &config)
        .await
        .context("Extraction failed")?;
    write_snapshot(&snapshot_path, &extraction.snapshot).context("Failed to write snapshot")?;

    let output = score_extraction(extraction, &config)
        .await
        .context("Scoring failed")?;
    write_text_report(&text_path, &output.text_report).context("Failed to write text report")?;
    if let Some(ref report) = output.image_report {
        write_image_report(&image_path, report).context("Failed to write image report")?;
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        );
    } else if !cli.quiet {
        print_summary(&output, &text_path);
    }

    if let Some(ref name) = cli.most_similar {
        match output.image_report {
            Some(ref report) if output.images.iter().any(|i| &i.label == name) => {
                print_image_ranking(report, name, cli.top)
            }
            _ => print_text_ranking(&output.text_report, name, cli.top),
        }
    }

    Ok(())
}

/// Map CLI args to `AnalysisConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder().extract_images(!cli.no_images);

    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n);
    }
    if let Some(ref names) = cli.text_metrics {
        builder = builder
            .text_metric_names(names.as_slice())
            .context("Invalid --text-metrics")?;
    }
    if let Some(ref names) = cli.image_metrics {
        builder = builder
            .image_metric_names(names.as_slice())
            .context("Invalid --image-metrics")?;
    }
    if let Some(ref dir) = cli.output_dir {
        builder = builder.output_dir(dir);
    }
    if let Some(shard) = cli.shard {
        builder = builder.shard(shard);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn status_mark(stats: &RunStats) -> String {
    if stats.documents_failed == 0 {
        green("✔")
    } else {
        cyan("⚠")
    }
}

fn print_summary(output: &CorpusOutput, text_path: &std::path::Path) {
    let stats = &output.stats;
    eprintln!(
        "{}  {}/{} PDFs  {} text pairs  {} image pairs  {}ms  →  {}",
        status_mark(stats),
        stats.documents_extracted,
        stats.documents_found,
        stats.text_pairs,
        stats.image_pairs,
        stats.total_duration_ms,
        bold(&text_path.display().to_string()),
    );
    if stats.images_extracted > 0 || stats.images_skipped > 0 {
        eprintln!(
            "   {} images written  /  {} skipped  /  {} not scored",
            dim(&stats.images_extracted.to_string()),
            dim(&stats.images_skipped.to_string()),
            dim(&stats.images_unscored.to_string()),
        );
    }
    for failure in &output.failures {
        eprintln!("   {} {}", red("✗"), failure);
    }
}

fn print_ranking(title: &str, matches: &[RankedMatch], top: usize) {
    println!("{}", bold(title));
    if matches.is_empty() {
        println!("  {}", dim("(no pairs)"));
    }
    for m in matches.iter().take(top) {
        println!("  {:>10.6}  {}", m.score, m.name);
    }
}

fn print_text_ranking(report: &TextSimilarityReport, name: &str, top: usize) {
    for &metric in &report.metrics {
        for variant in TextVariant::ALL {
            let ranked = report.most_similar(name, metric, variant);
            print_ranking(
                &format!("{name}  ·  {metric} ({})", variant.label()),
                &ranked,
                top,
            );
        }
    }
}

fn print_image_ranking(report: &ImageSimilarityReport, label: &str, top: usize) {
    for &metric in &report.metrics {
        let ranked = report.most_similar(label, metric);
        print_ranking(&format!("{label}  ·  {metric}"), &ranked, top);
    }
}
