//! CLI binary for pdf2odt.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2odt::{
    convert_all, ConversionConfig, ConversionProgressCallback, GrobidClient, ProgressCallback,
    RunReport, DEFAULT_GROBID_URL,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

/// Terminal progress callback: one bar for the run plus a log line per
/// document.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Name and start time of the document in flight.
    current: Mutex<Option<(String, Instant)>>,
    errors: AtomicUsize,
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_run_start` reports how many PDFs were found.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Scanning source directory…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            current: Mutex::new(None),
            errors: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} PDFs  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }

    /// Take the in-flight document's name and elapsed seconds.
    fn finish_current(&self) -> (String, f64) {
        self.current
            .lock()
            .ok()
            .and_then(|mut g| g.take())
            .map(|(name, t)| (name, t.elapsed().as_secs_f64()))
            .unwrap_or_default()
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_documents: usize) {
        self.activate_bar(total_documents);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Found {total_documents} PDF(s)"))
        ));
    }

    fn on_document_start(&self, _index: usize, _total: usize, source: &Path) {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string());
        self.bar.set_message(name.clone());
        if let Ok(mut g) = self.current.lock() {
            *g = Some((name, Instant::now()));
        }
    }

    fn on_document_complete(&self, index: usize, total: usize, blocks: usize) {
        let (name, secs) = self.finish_current();
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            green("✓"),
            index,
            total,
            name,
            dim(&format!("{blocks} blocks")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_skipped(&self, index: usize, total: usize, reason: &str) {
        let (name, _) = self.finish_current();
        self.skipped.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            dim("↷"),
            index,
            total,
            name,
            dim(reason),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, total: usize, error: &str) {
        let (name, secs) = self.finish_current();
        self.errors.fetch_add(1, Ordering::SeqCst);

        // First line only; the full message is in the final summary.
        let first = error.lines().next().unwrap_or_default();
        let msg = if first.chars().count() > 80 {
            format!("{}\u{2026}", first.chars().take(79).collect::<String>())
        } else {
            first.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            red("✗"),
            index,
            total,
            name,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_documents: usize, converted: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        let skipped = self.skipped.load(Ordering::SeqCst);

        if failed == 0 {
            eprintln!(
                "{} {} converted, {} skipped",
                green("✔"),
                bold(&converted.to_string()),
                skipped
            );
        } else {
            eprintln!(
                "{} {}/{} converted, {} skipped  ({} failed)",
                if failed == total_documents {
                    red("✘")
                } else {
                    yellow("⚠")
                },
                bold(&converted.to_string()),
                total_documents,
                skipped,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert ./source/*.pdf into ./output/*.odt via a local GROBID
  pdf2odt

  # Work in another directory tree
  pdf2odt --root ~/papers

  # Remote GROBID, longer timeout, two retries
  pdf2odt --grobid-url http://grobid.lan:8070 --timeout 300 --max-retries 2

  # Rebuild every ODT from cached TEI (GROBID only sees new PDFs)
  pdf2odt --overwrite

  # Machine-readable run report
  pdf2odt --json > report.json

LAYOUT:
  source/   input PDFs (searched recursively)
  tei/      <stem>.tei.xml, GROBID output cache; delete a file to refetch it
  output/   <stem>.odt

SETUP:
  docker run --rm -p 8070:8070 grobid/grobid:0.8.1
"#;

/// Convert a directory of PDFs to ODT through GROBID.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2odt",
    version,
    about = "Convert a directory of PDFs to ODT through GROBID",
    long_about = "Send every PDF in the source directory to a GROBID server, cache the \
returned TEI XML, and write a styled OpenDocument Text file per PDF with headings, lists, \
tables and a linked bibliography.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Base directory holding source/, tei/ and output/.
    #[arg(long, env = "PDF2ODT_ROOT")]
    root: Option<PathBuf>,

    /// Directory of input PDFs (overrides <root>/source).
    #[arg(long, env = "PDF2ODT_SOURCE")]
    source: Option<PathBuf>,

    /// TEI cache directory (overrides <root>/tei).
    #[arg(long, env = "PDF2ODT_TEI")]
    tei: Option<PathBuf>,

    /// Directory for .odt files (overrides <root>/output).
    #[arg(short, long, env = "PDF2ODT_OUTPUT")]
    output: Option<PathBuf>,

    /// GROBID base URL.
    #[arg(long, env = "GROBID_URL", default_value = DEFAULT_GROBID_URL)]
    grobid_url: String,

    /// Per-request GROBID timeout in seconds.
    #[arg(long, env = "PDF2ODT_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Retries per PDF when GROBID is unavailable (0–10).
    #[arg(long, env = "PDF2ODT_MAX_RETRIES", default_value_t = 0,
          value_parser = clap::value_parser!(u32).range(0..=10))]
    max_retries: u32,

    /// Initial retry backoff in milliseconds (doubles per attempt).
    #[arg(long, env = "PDF2ODT_RETRY_BACKOFF_MS", default_value_t = 1000)]
    retry_backoff_ms: u64,

    /// TEI elements GROBID should annotate with coordinates (repeatable).
    #[arg(long = "tei-coordinates", env = "PDF2ODT_TEI_COORDINATES",
          value_delimiter = ',', default_value = "biblStruct")]
    tei_coordinates: Vec<String>,

    /// Ask GROBID to consolidate header metadata against external services.
    #[arg(long, env = "PDF2ODT_CONSOLIDATE_HEADER")]
    consolidate_header: bool,

    /// Ask GROBID to consolidate citations against external services.
    #[arg(long, env = "PDF2ODT_CONSOLIDATE_CITATIONS")]
    consolidate_citations: bool,

    /// Rewrite .odt files that already exist.
    #[arg(long, env = "PDF2ODT_OVERWRITE")]
    overwrite: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long, env = "PDF2ODT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2ODT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2ODT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2ODT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; -v brings them all back.
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Liveness probe (advisory) ────────────────────────────────────────
    let client = GrobidClient::from_config(&config).context("Failed to create GROBID client")?;
    if !client.is_alive().await && !cli.quiet {
        eprintln!(
            "{} GROBID at {} is not responding; PDFs without cached TEI will fail",
            yellow("⚠"),
            bold(&config.grobid_url)
        );
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let report = convert_all(&config).await.context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&report, show_progress);
    }

    if !report.all_succeeded() {
        anyhow::bail!(
            "{} of {} document(s) failed",
            report.stats.failed,
            report.stats.total_documents
        );
    }
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder();
    if let Some(ref root) = cli.root {
        builder = builder.root(root);
    }
    if let Some(ref dir) = cli.source {
        builder = builder.source_dir(dir);
    }
    if let Some(ref dir) = cli.tei {
        builder = builder.tei_dir(dir);
    }
    if let Some(ref dir) = cli.output {
        builder = builder.output_dir(dir);
    }

    builder = builder
        .grobid_url(&cli.grobid_url)
        .request_timeout_secs(cli.timeout)
        .max_retries(cli.max_retries)
        .retry_backoff_ms(cli.retry_backoff_ms)
        .tei_coordinates(cli.tei_coordinates.iter().map(|s| s.trim()).filter(|s| !s.is_empty()))
        .consolidate_header(cli.consolidate_header)
        .consolidate_citations(cli.consolidate_citations)
        .overwrite(cli.overwrite);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Totals plus one line per failed document.
fn print_summary(report: &RunReport, progress_shown: bool) {
    let s = &report.stats;
    // The progress callback already printed the headline.
    if !progress_shown {
        eprintln!(
            "Converted {}/{} PDFs in {}ms ({} skipped, {} failed)",
            s.converted, s.total_documents, s.total_duration_ms, s.skipped, s.failed
        );
    }
    eprintln!(
        "   {} TEI fetched  /  {} from cache",
        dim(&s.fetched.to_string()),
        dim(&s.cached.to_string()),
    );
    for doc in &report.documents {
        if let Some(error) = doc.error() {
            eprintln!("{} {}", red("✗"), bold(&doc.source.display().to_string()));
            for line in error.lines() {
                eprintln!("    {line}");
            }
        }
    }
}
