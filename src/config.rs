//! Configuration types for PDF-to-ODT conversion.
//!
//! Every directory, the GROBID endpoint and the retry policy live in
//! [`ConversionConfig`], built via [`ConversionConfigBuilder`]. Each pipeline
//! component receives the config (or the fields it needs) at construction;
//! nothing is read from globals.

use crate::error::Pdf2OdtError;
use crate::pipeline::fetch::TeiService;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default GROBID endpoint (the stock docker image listens here).
pub const DEFAULT_GROBID_URL: &str = "http://localhost:8070";

/// Configuration for a conversion run.
///
/// # Example
/// ```rust
/// use pdf2odt::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .root("papers")
///     .grobid_url("http://grobid.local:8070")
///     .max_retries(2)
///     .build()
///     .unwrap();
/// assert!(config.tei_dir.ends_with("tei"));
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Directory scanned (recursively) for `*.pdf` files. Default: `source`.
    pub source_dir: PathBuf,

    /// Cache of GROBID output, one `<stem>.tei.xml` per PDF. Default: `tei`.
    ///
    /// A TEI file is only ever created, never refreshed; delete it to force
    /// GROBID to run again for that PDF.
    pub tei_dir: PathBuf,

    /// Destination of `<stem>.odt` files. Default: `output`.
    pub output_dir: PathBuf,

    /// Base URL of the GROBID service. Default: [`DEFAULT_GROBID_URL`].
    pub grobid_url: String,

    /// HTTP timeout for one GROBID call, in seconds. Default: 120.
    ///
    /// Full-text extraction of a long paper takes tens of seconds on a
    /// laptop-sized GROBID instance.
    pub request_timeout_secs: u64,

    /// Extra attempts after a failed GROBID call. Default: 0 (fail fast).
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 1000.
    pub retry_backoff_ms: u64,

    /// Element names GROBID should annotate with PDF coordinates.
    /// Default: `["biblStruct"]`.
    pub tei_coordinates: Vec<String>,

    /// Ask GROBID to consolidate the header against CrossRef. Default: false.
    pub consolidate_header: bool,

    /// Ask GROBID to consolidate citations against CrossRef. Default: false.
    pub consolidate_citations: bool,

    /// Rewrite ODT files that already exist. Default: false (skip them).
    pub overwrite: bool,

    /// Pre-constructed TEI service. Takes precedence over `grobid_url`.
    pub service: Option<Arc<dyn TeiService>>,

    /// Per-document progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("source"),
            tei_dir: PathBuf::from("tei"),
            output_dir: PathBuf::from("output"),
            grobid_url: DEFAULT_GROBID_URL.to_string(),
            request_timeout_secs: 120,
            max_retries: 0,
            retry_backoff_ms: 1000,
            tei_coordinates: vec!["biblStruct".to_string()],
            consolidate_header: false,
            consolidate_citations: false,
            overwrite: false,
            service: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("source_dir", &self.source_dir)
            .field("tei_dir", &self.tei_dir)
            .field("output_dir", &self.output_dir)
            .field("grobid_url", &self.grobid_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("tei_coordinates", &self.tei_coordinates)
            .field("consolidate_header", &self.consolidate_header)
            .field("consolidate_citations", &self.consolidate_citations)
            .field("overwrite", &self.overwrite)
            .field("service", &self.service.as_ref().map(|_| "<dyn TeiService>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// TEI cache path for a source PDF: `<tei_dir>/<stem>.tei.xml`.
    pub fn tei_path_for(&self, pdf: &Path) -> PathBuf {
        self.tei_dir.join(format!("{}.tei.xml", file_stem(pdf)))
    }

    /// ODT output path for a source PDF: `<output_dir>/<stem>.odt`.
    pub fn output_path_for(&self, pdf: &Path) -> PathBuf {
        self.output_dir.join(format!("{}.odt", file_stem(pdf)))
    }
}

/// The base name shared by a PDF, its TEI file and its ODT file.
pub(crate) fn file_stem(pdf: &Path) -> String {
    pdf.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionConfigBuilder {
    /// Place all three directories under `root` as `source/`, `tei/`, `output/`.
    pub fn root(mut self, root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        self.config.source_dir = root.join("source");
        self.config.tei_dir = root.join("tei");
        self.config.output_dir = root.join("output");
        self
    }

    pub fn source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.source_dir = dir.into();
        self
    }

    pub fn tei_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.tei_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn grobid_url(mut self, url: impl Into<String>) -> Self {
        self.config.grobid_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(10);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn tei_coordinates<I, S>(mut self, elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.tei_coordinates = elements.into_iter().map(Into::into).collect();
        self
    }

    pub fn consolidate_header(mut self, v: bool) -> Self {
        self.config.consolidate_header = v;
        self
    }

    pub fn consolidate_citations(mut self, v: bool) -> Self {
        self.config.consolidate_citations = v;
        self
    }

    pub fn overwrite(mut self, v: bool) -> Self {
        self.config.overwrite = v;
        self
    }

    pub fn service(mut self, service: Arc<dyn TeiService>) -> Self {
        self.config.service = Some(service);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2OdtError> {
        let c = &self.config;

        if c.service.is_none() {
            let url = reqwest::Url::parse(&c.grobid_url).map_err(|e| {
                Pdf2OdtError::InvalidConfig(format!("GROBID URL '{}': {}", c.grobid_url, e))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Pdf2OdtError::InvalidConfig(format!(
                    "GROBID URL must be http or https, got '{}'",
                    c.grobid_url
                )));
            }
        }

        let dirs = [
            ("source", &c.source_dir),
            ("tei", &c.tei_dir),
            ("output", &c.output_dir),
        ];
        for (i, (a_name, a)) in dirs.iter().enumerate() {
            for (b_name, b) in &dirs[i + 1..] {
                if a == b {
                    return Err(Pdf2OdtError::InvalidConfig(format!(
                        "{a_name} and {b_name} directories must differ (both '{}')",
                        a.display()
                    )));
                }
            }
        }

        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_layout() {
        let c = ConversionConfig::default();
        assert_eq!(c.source_dir, PathBuf::from("source"));
        assert_eq!(c.tei_dir, PathBuf::from("tei"));
        assert_eq!(c.output_dir, PathBuf::from("output"));
        assert_eq!(c.grobid_url, "http://localhost:8070");
        assert_eq!(c.max_retries, 0);
        assert_eq!(c.tei_coordinates, vec!["biblStruct".to_string()]);
        assert!(!c.overwrite);
    }

    #[test]
    fn root_places_sibling_directories() {
        let c = ConversionConfig::builder().root("/data").build().unwrap();
        assert_eq!(c.source_dir, PathBuf::from("/data/source"));
        assert_eq!(c.tei_dir, PathBuf::from("/data/tei"));
        assert_eq!(c.output_dir, PathBuf::from("/data/output"));
    }

    #[test]
    fn paths_share_the_base_name() {
        let c = ConversionConfig::default();
        let pdf = Path::new("source/sub/attention.pdf");
        assert_eq!(c.tei_path_for(pdf), PathBuf::from("tei/attention.tei.xml"));
        assert_eq!(c.output_path_for(pdf), PathBuf::from("output/attention.odt"));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let c = ConversionConfig::builder()
            .grobid_url("http://localhost:8070/")
            .build()
            .unwrap();
        assert_eq!(c.grobid_url, "http://localhost:8070");
    }

    #[test]
    fn bad_url_is_rejected() {
        let err = ConversionConfig::builder()
            .grobid_url("not a url")
            .build()
            .unwrap_err();
        assert!(matches!(err, Pdf2OdtError::InvalidConfig(_)));

        let err = ConversionConfig::builder()
            .grobid_url("ftp://localhost:8070")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("http"));
    }

    #[test]
    fn colliding_directories_are_rejected() {
        let err = ConversionConfig::builder()
            .tei_dir("out")
            .output_dir("out")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("tei and output"), "got: {err}");
    }

    #[test]
    fn retries_are_clamped() {
        let c = ConversionConfig::builder().max_retries(99).build().unwrap();
        assert_eq!(c.max_retries, 10);
    }
}
