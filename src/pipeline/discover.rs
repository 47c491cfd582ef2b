//! Source discovery: find every PDF under the source directory.

use crate::error::Pdf2OdtError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Recursively collect `*.pdf` files (extension matched case-insensitively),
/// sorted by path so runs are reproducible.
///
/// A missing or unreadable source directory is an error; unreadable
/// subdirectories are logged and skipped.
pub fn find_pdfs(dir: &Path) -> Result<Vec<PathBuf>, Pdf2OdtError> {
    let mut found = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|e| Pdf2OdtError::io(dir, e))?;
    collect(entries, &mut found);
    found.sort();
    debug!("Found {} PDF files under {}", found.len(), dir.display());
    Ok(found)
}

fn collect(entries: std::fs::ReadDir, found: &mut Vec<PathBuf>) {
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            match std::fs::read_dir(&path) {
                Ok(sub) => collect(sub, found),
                Err(e) => debug!("Skipping unreadable directory {}: {}", path.display(), e),
            }
        } else if is_pdf(&path) {
            found.push(path);
        }
    }
}

/// True for a path whose extension is `pdf` in any case.
pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pdf() {
        assert!(is_pdf(Path::new("a.pdf")));
        assert!(is_pdf(Path::new("dir/B.PDF")));
        assert!(!is_pdf(Path::new("a.pdf.txt")));
        assert!(!is_pdf(Path::new("pdf")));
        assert!(!is_pdf(Path::new("a.tei.xml")));
    }

    #[test]
    fn finds_nested_pdfs_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("nested/deeper")).unwrap();
        std::fs::write(root.join("b.pdf"), b"%PDF").unwrap();
        std::fs::write(root.join("a.PDF"), b"%PDF").unwrap();
        std::fs::write(root.join("notes.txt"), b"x").unwrap();
        std::fs::write(root.join("nested/deeper/c.pdf"), b"%PDF").unwrap();

        let found = find_pdfs(root).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.PDF"),
                PathBuf::from("b.pdf"),
                PathBuf::from("nested/deeper/c.pdf"),
            ]
        );
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let err = find_pdfs(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, Pdf2OdtError::Io { .. }));
    }
}
