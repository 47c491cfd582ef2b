//! Streaming conversion API: one [`DocumentResult`] per source PDF, yielded
//! as each document finishes.
//!
//! Documents are processed strictly one after another in discovery order;
//! the next PDF is not touched until the previous one's ODT is on disk. The
//! stream is lazy, so dropping it stops the run after the current document.

use crate::config::ConversionConfig;
use crate::convert::{process_document, Job};
use crate::error::Pdf2OdtError;
use crate::output::DocumentResult;
use crate::pipeline::discover::find_pdfs;
use crate::pipeline::fetch::TeiFetcher;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::{info, warn};

/// A boxed stream of per-document results.
pub type DocumentStream = Pin<Box<dyn Stream<Item = DocumentResult> + Send>>;

/// Discover the source PDFs and return a stream that converts them in order.
///
/// Creates the TEI and output directories if they are missing.
///
/// # Errors
/// Fails before yielding anything when the service client cannot be built,
/// the source directory cannot be read, or a working directory cannot be
/// created.
pub async fn convert_stream(config: &ConversionConfig) -> Result<DocumentStream, Pdf2OdtError> {
    let fetcher = Arc::new(TeiFetcher::from_config(config)?);

    for dir in [&config.tei_dir, &config.output_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Pdf2OdtError::io(dir, e))?;
    }

    let sources = find_pdfs(&config.source_dir)?;
    info!(
        "Found {} PDF(s) in {}",
        sources.len(),
        config.source_dir.display()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(sources.len());
    }

    let jobs = plan_jobs(config, sources);
    let cfg = config.clone();
    let s = stream::iter(jobs).then(move |job| {
        let fetcher = Arc::clone(&fetcher);
        let cfg = cfg.clone();
        async move { process_document(&fetcher, &cfg, job).await }
    });

    Ok(Box::pin(s))
}

/// Number the sources and flag every one whose output path is already
/// claimed by an earlier source.
fn plan_jobs(config: &ConversionConfig, sources: Vec<PathBuf>) -> Vec<Job> {
    let total = sources.len();
    let mut owners: HashMap<PathBuf, PathBuf> = HashMap::new();

    sources
        .into_iter()
        .enumerate()
        .map(|(i, source)| {
            let key = config.output_path_for(&source);
            let duplicate_of = match owners.get(&key) {
                Some(first) => {
                    warn!(
                        "{} collides with {} (same base name)",
                        source.display(),
                        first.display()
                    );
                    Some(first.clone())
                }
                None => {
                    owners.insert(key, source.clone());
                    None
                }
            };
            Job {
                index: i + 1,
                total,
                source,
                duplicate_of,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fetch::TeiService;
    use async_trait::async_trait;

    struct EchoService;

    #[async_trait]
    impl TeiService for EchoService {
        async fn process_fulltext(&self, _file_name: &str, _pdf: Vec<u8>) -> Result<String, Pdf2OdtError> {
            Ok(r#"<TEI><text><body><p>ok</p></body></text></TEI>"#.to_string())
        }
    }

    fn config_for(root: &std::path::Path) -> ConversionConfig {
        ConversionConfig::builder()
            .root(root)
            .service(Arc::new(EchoService))
            .build()
            .unwrap()
    }

    #[test]
    fn duplicate_stems_are_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let sources = vec![
            PathBuf::from("source/a/paper.pdf"),
            PathBuf::from("source/b/paper.PDF"),
            PathBuf::from("source/other.pdf"),
        ];

        let jobs = plan_jobs(&config, sources);
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].duplicate_of, None);
        assert_eq!(
            jobs[1].duplicate_of.as_deref(),
            Some(std::path::Path::new("source/a/paper.pdf"))
        );
        assert_eq!(jobs[2].duplicate_of, None);
        assert_eq!((jobs[2].index, jobs[2].total), (3, 3));
    }

    #[tokio::test]
    async fn stream_yields_in_discovery_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        std::fs::create_dir_all(&config.source_dir).unwrap();
        for name in ["b.pdf", "a.pdf", "c.pdf"] {
            std::fs::write(config.source_dir.join(name), b"%PDF-1.4").unwrap();
        }

        let results: Vec<DocumentResult> = convert_stream(&config).await.unwrap().collect().await;
        let names: Vec<_> = results
            .iter()
            .map(|r| r.source.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf", "c.pdf"]);
        assert!(results.iter().all(DocumentResult::is_success));
        assert!(config.output_dir.join("c.odt").is_file());
    }

    #[tokio::test]
    async fn missing_source_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let err = convert_stream(&config).await.err().unwrap();
        assert!(matches!(err, Pdf2OdtError::Io { .. }));
    }
}
