//! Pipeline stages for PDF-to-ODT conversion.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! discover ──▶ fetch ──▶ tei ──▶ style ──▶ odt
//! (source/)   (GROBID)  (walk)  (lookup)  (zip)
//! ```
//!
//! 1. [`discover`] : find the PDFs under the source directory
//! 2. [`fetch`]    : cached TEI or a GROBID call; the only stage with
//!    network I/O
//! 3. [`tei`]      : parse TEI and yield [`tei::ContentNode`]s in document order
//! 4. [`style`]    : pure `(kind, level) → directive` table
//! 5. [`odt`]      : append styled blocks and package the `.odt` container

pub mod discover;
pub mod fetch;
pub mod odt;
pub mod style;
pub mod tei;

use crate::error::Pdf2OdtError;
use std::io::Write;
use std::path::Path;

/// Write `bytes` to `path` via a temp file in the same directory and a
/// rename, creating the directory if needed. Readers never observe a
/// partially written file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Pdf2OdtError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| Pdf2OdtError::io(parent, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| Pdf2OdtError::io(parent, e))?;
    tmp.write_all(bytes).map_err(|e| Pdf2OdtError::io(path, e))?;
    tmp.flush().map_err(|e| Pdf2OdtError::io(path, e))?;
    tmp.persist(path)
        .map_err(|e| Pdf2OdtError::io(path, e.error))?;
    Ok(())
}
