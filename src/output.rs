//! Result types returned by the conversion entry points.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What happened to one source PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentStatus {
    /// TEI obtained and ODT written.
    Converted,
    /// The ODT already existed and `overwrite` was off.
    Skipped,
    /// The document failed; nothing was written for it in this step.
    Failed { error: String },
}

/// Per-document outcome of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResult {
    /// The source PDF.
    pub source: PathBuf,
    /// Cached TEI file, when one exists after this document was processed.
    pub tei_path: Option<PathBuf>,
    /// Written ODT file, when conversion succeeded.
    pub output_path: Option<PathBuf>,
    /// True when the TEI came from the cache rather than from GROBID.
    pub tei_cached: bool,
    pub status: DocumentStatus,
    /// Block counts of the emitted document (`None` unless converted).
    pub emit: Option<EmitStats>,
    /// Wall-clock time spent on this document.
    pub duration_ms: u64,
}

impl DocumentResult {
    pub fn is_success(&self) -> bool {
        !matches!(self.status, DocumentStatus::Failed { .. })
    }

    /// The error message, if the document failed.
    pub fn error(&self) -> Option<&str> {
        match &self.status {
            DocumentStatus::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Number of blocks of each kind the emitter wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitStats {
    pub blocks: usize,
    pub headings: usize,
    pub paragraphs: usize,
    pub lists: usize,
    pub tables: usize,
    pub references: usize,
}

/// Aggregate statistics for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// PDFs found in the source directory.
    pub total_documents: usize,
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
    /// TEI files produced by GROBID during this run.
    pub fetched: usize,
    /// TEI files taken from the cache.
    pub cached: usize,
    pub total_duration_ms: u64,
}

impl RunStats {
    /// Fold per-document results into run totals.
    pub fn from_results(results: &[DocumentResult], total_duration_ms: u64) -> Self {
        let mut stats = RunStats {
            total_documents: results.len(),
            total_duration_ms,
            ..Default::default()
        };
        for r in results {
            match r.status {
                DocumentStatus::Converted => stats.converted += 1,
                DocumentStatus::Skipped => stats.skipped += 1,
                DocumentStatus::Failed { .. } => stats.failed += 1,
            }
            if r.tei_path.is_some() {
                if r.tei_cached {
                    stats.cached += 1;
                } else {
                    stats.fetched += 1;
                }
            }
        }
        stats
    }
}

/// Everything a full run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub documents: Vec<DocumentResult>,
    pub stats: RunStats,
}

impl RunReport {
    /// True when no document failed.
    pub fn all_succeeded(&self) -> bool {
        self.stats.failed == 0
    }
}
