//! Eager conversion entry points.
//!
//! [`convert_all`] walks the whole source directory and returns a
//! [`RunReport`] once every document has been attempted. Use
//! [`crate::stream::convert_stream`] instead to observe documents as they
//! finish.
//!
//! A failing document never aborts the run: its error is recorded in its
//! [`DocumentResult`] and the next PDF is processed. Only problems that make
//! the whole run impossible (bad configuration, missing source directory)
//! are returned as `Err`.

use crate::config::ConversionConfig;
use crate::error::Pdf2OdtError;
use crate::output::{DocumentResult, DocumentStatus, EmitStats, RunReport, RunStats};
use crate::pipeline::fetch::TeiFetcher;
use crate::pipeline::odt::{self, OdtDocument};
use crate::pipeline::tei::TeiDocument;
use crate::stream::convert_stream;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert every PDF under `config.source_dir`.
///
/// # Errors
/// Returns `Err` only for fatal problems: an invalid GROBID URL, a source
/// directory that cannot be read, or TEI/output directories that cannot be
/// created. Per-document failures are reported in the returned
/// [`RunReport`].
pub async fn convert_all(config: &ConversionConfig) -> Result<RunReport, Pdf2OdtError> {
    let start = Instant::now();
    let documents: Vec<DocumentResult> = convert_stream(config).await?.collect().await;
    let stats = RunStats::from_results(&documents, start.elapsed().as_millis() as u64);

    info!(
        "Run complete: {} converted, {} skipped, {} failed of {} ({}ms)",
        stats.converted, stats.skipped, stats.failed, stats.total_documents, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(stats.total_documents, stats.converted);
    }

    Ok(RunReport { documents, stats })
}

/// Synchronous wrapper around [`convert_all`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(config: &ConversionConfig) -> Result<RunReport, Pdf2OdtError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2OdtError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_all(config))
}

/// Convert a single PDF, wherever it lives, into
/// `config.output_dir/<stem>.odt` using `config.tei_dir` as the cache.
///
/// Unlike [`convert_all`], the document's own failure is returned as `Err`.
pub async fn convert_document(
    source: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<DocumentResult, Pdf2OdtError> {
    let fetcher = TeiFetcher::from_config(config)?;
    let start = Instant::now();
    let mut result = DocumentResult::pending(source.as_ref());
    convert_into(&fetcher, config, &mut result).await?;
    result.duration_ms = start.elapsed().as_millis() as u64;
    Ok(result)
}

/// Turn an existing TEI file into an ODT file. No network access.
pub fn convert_tei(
    tei_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
) -> Result<EmitStats, Pdf2OdtError> {
    let tei_path = tei_path.as_ref();
    let xml = std::fs::read_to_string(tei_path).map_err(|e| Pdf2OdtError::io(tei_path, e))?;
    let tei = TeiDocument::parse(&xml, tei_path)?;

    let mut doc = OdtDocument::new();
    for node in tei.nodes() {
        doc.append(&node)?;
    }
    doc.write_to(output_path.as_ref())
}

/// Render TEI XML held in memory into ODT bytes.
pub fn tei_to_odt(xml: &str) -> Result<Vec<u8>, Pdf2OdtError> {
    let tei = TeiDocument::parse(xml, "<memory>")?;
    let (bytes, _) = odt::render(tei.nodes())?;
    Ok(bytes)
}

// ── Per-document processing ──────────────────────────────────────────────

/// One unit of a run, produced by discovery.
#[derive(Debug, Clone)]
pub(crate) struct Job {
    /// 1-based position in the run.
    pub index: usize,
    pub total: usize,
    pub source: PathBuf,
    /// An earlier source with the same stem, which owns the shared paths.
    pub duplicate_of: Option<PathBuf>,
}

impl DocumentResult {
    fn pending(source: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            tei_path: None,
            output_path: None,
            tei_cached: false,
            status: DocumentStatus::Converted,
            emit: None,
            duration_ms: 0,
        }
    }
}

/// Run one job to completion, capturing its failure in the result.
pub(crate) async fn process_document(
    fetcher: &TeiFetcher,
    config: &ConversionConfig,
    job: Job,
) -> DocumentResult {
    let start = Instant::now();
    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_document_start(job.index, job.total, &job.source);
    }
    info!("[{}/{}] {}", job.index, job.total, job.source.display());

    let mut result = DocumentResult::pending(&job.source);
    let outcome = match job.duplicate_of {
        Some(first) => Err(Pdf2OdtError::DuplicateName {
            first,
            second: job.source.clone(),
        }),
        None => convert_into(fetcher, config, &mut result).await,
    };
    result.duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(()) => match result.status {
            DocumentStatus::Skipped => {
                if let Some(cb) = cb {
                    cb.on_document_skipped(job.index, job.total, "output already exists");
                }
            }
            _ => {
                let blocks = result.emit.map(|s| s.blocks).unwrap_or(0);
                if let Some(cb) = cb {
                    cb.on_document_complete(job.index, job.total, blocks);
                }
            }
        },
        Err(e) => {
            warn!("Failed to convert {}: {}", job.source.display(), e);
            if let Some(cb) = cb {
                cb.on_document_error(job.index, job.total, &e.to_string());
            }
            result.output_path = None;
            result.emit = None;
            result.status = DocumentStatus::Failed {
                error: e.to_string(),
            };
        }
    }
    result
}

/// Fill `result` step by step so a failure still reports how far it got.
async fn convert_into(
    fetcher: &TeiFetcher,
    config: &ConversionConfig,
    result: &mut DocumentResult,
) -> Result<(), Pdf2OdtError> {
    let source = result.source.clone();
    let output_path = config.output_path_for(&source);

    // Every source gets a TEI file, whether or not its output already exists.
    let fetched = fetcher.ensure_tei(&source).await?;
    result.tei_path = Some(fetched.path.clone());
    result.tei_cached = fetched.cached;

    if !config.overwrite && output_path.is_file() {
        info!("Output already exists, skipping: {}", output_path.display());
        result.output_path = Some(output_path);
        result.status = DocumentStatus::Skipped;
        return Ok(());
    }

    let stats = convert_tei(&fetched.path, &output_path)?;
    debug!(
        "{}: {} headings, {} paragraphs, {} tables, {} references",
        source.display(),
        stats.headings,
        stats.paragraphs,
        stats.tables,
        stats.references
    );
    info!("Converted TEI to ODT: {} -> {}", fetched.path.display(), output_path.display());

    result.output_path = Some(output_path);
    result.emit = Some(stats);
    result.status = DocumentStatus::Converted;
    Ok(())
}
