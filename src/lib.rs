//! # pdf2odt
//!
//! Batch-convert scholarly PDFs into editable OpenDocument Text files via a
//! GROBID server.
//!
//! GROBID does the hard part: it reads a paper's layout and returns TEI XML
//! with the title, authors, abstract, section structure, tables and a parsed
//! bibliography. This crate caches that TEI, walks it, and writes a styled
//! `.odt` with real headings, lists, tables and citation links.
//!
//! ## Pipeline Overview
//!
//! ```text
//! source/*.pdf
//!  │
//!  ├─ 1. Discover  recursive *.pdf scan, sorted
//!  ├─ 2. Fetch     tei/<stem>.tei.xml if cached, else POST to GROBID
//!  ├─ 3. Walk      TEI → ContentNode sequence (document order)
//!  ├─ 4. Style     (kind, level) → paragraph style / outline level
//!  └─ 5. Emit      output/<stem>.odt, written atomically
//! ```
//!
//! Documents are processed one at a time. A document whose fetch or parse
//! fails is reported and skipped; the run continues.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2odt::{convert_all, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // ./source, ./tei, ./output and http://localhost:8070
//!     let config = ConversionConfig::default();
//!     let report = convert_all(&config).await?;
//!     eprintln!(
//!         "{} converted, {} failed",
//!         report.stats.converted, report.stats.failed
//!     );
//!     Ok(())
//! }
//! ```
//!
//! Already have TEI? [`convert_tei`] and [`tei_to_odt`] skip the network
//! entirely.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2odt` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2odt = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, DEFAULT_GROBID_URL};
pub use convert::{convert_all, convert_document, convert_sync, convert_tei, tei_to_odt};
pub use error::Pdf2OdtError;
pub use output::{DocumentResult, DocumentStatus, EmitStats, RunReport, RunStats};
pub use pipeline::fetch::{GrobidClient, TeiService};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_stream, DocumentStream};
