//! Error types for the pdf2odt library.
//!
//! Every error is scoped to a single document except [`Pdf2OdtError::InvalidConfig`]
//! and an unreadable source directory, which abort the run before any
//! document is touched. [`crate::convert::convert_all`] records per-document
//! failures in [`crate::output::DocumentResult`] and moves on to the next PDF.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// All errors returned by the pdf2odt library.
#[derive(Debug, Error)]
pub enum Pdf2OdtError {
    // ── Service errors ────────────────────────────────────────────────────
    /// GROBID could not be reached, timed out, answered with a non-2xx
    /// status, or returned an empty body.
    #[error("GROBID service unavailable at '{url}': {reason}\nIs the server running? Try: docker run -p 8070:8070 grobid/grobid")]
    ServiceUnavailable { url: String, reason: String },

    // ── TEI errors ────────────────────────────────────────────────────────
    /// The TEI file is not well-formed XML or is not a TEI document.
    #[error("Malformed TEI in '{path}': {detail}\nDelete the file to force a fresh conversion.")]
    ParseError { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Reading a PDF/TEI file or writing a TEI/ODT file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Two source PDFs share a base filename and would overwrite each other's
    /// TEI and ODT files.
    #[error("'{second}' has the same base name as '{first}'; rename one of them")]
    DuplicateName { first: PathBuf, second: PathBuf },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (zip packaging, task join).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2OdtError {
    /// Wrap an [`std::io::Error`] with the path it happened on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Only service failures are worth another attempt; a broken TEI or a
    /// full disk will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_unavailable_display() {
        let e = Pdf2OdtError::ServiceUnavailable {
            url: "http://localhost:8070".into(),
            reason: "connection refused".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("localhost:8070"), "got: {msg}");
        assert!(msg.contains("connection refused"), "got: {msg}");
    }

    #[test]
    fn parse_error_display() {
        let e = Pdf2OdtError::ParseError {
            path: PathBuf::from("tei/paper.tei.xml"),
            detail: "unexpected end of stream".into(),
        };
        assert!(e.to_string().contains("paper.tei.xml"));
    }

    #[test]
    fn io_helper_keeps_path_and_source() {
        let e = Pdf2OdtError::io(
            "output/paper.odt",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(e.to_string().contains("output/paper.odt"));
        assert!(std::error::Error::source(&e).is_some());
    }

    #[test]
    fn only_service_errors_are_retryable() {
        assert!(Pdf2OdtError::ServiceUnavailable {
            url: String::new(),
            reason: String::new()
        }
        .is_retryable());
        assert!(!Pdf2OdtError::InvalidConfig("x".into()).is_retryable());
        assert!(!Pdf2OdtError::ParseError {
            path: PathBuf::new(),
            detail: String::new()
        }
        .is_retryable());
    }
}
