//! TEI fetching: return the cached TEI for a PDF, or ask GROBID for it.
//!
//! The cache is the TEI directory itself. A file there is never refreshed,
//! so re-running a batch only costs GROBID calls for new PDFs. New TEI is
//! written to a temp file and renamed into place, so a failed or interrupted
//! fetch never leaves a truncated TEI behind to poison later runs.

use crate::config::{file_stem, ConversionConfig};
use crate::error::Pdf2OdtError;
use crate::pipeline::write_atomic;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// A service that turns PDF bytes into TEI XML.
///
/// [`GrobidClient`] is the production implementation; inject another via
/// [`crate::config::ConversionConfigBuilder::service`].
#[async_trait]
pub trait TeiService: Send + Sync {
    /// Convert one PDF. `file_name` is informational (GROBID echoes it).
    ///
    /// Must fail with [`Pdf2OdtError::ServiceUnavailable`] for transport
    /// errors and non-success responses.
    async fn process_fulltext(&self, file_name: &str, pdf: Vec<u8>) -> Result<String, Pdf2OdtError>;

    /// Human-readable endpoint for log lines.
    fn endpoint(&self) -> String {
        "<custom service>".to_string()
    }
}

// ── GROBID over HTTP ─────────────────────────────────────────────────────

/// Client for GROBID's `processFulltextDocument` endpoint.
#[derive(Debug, Clone)]
pub struct GrobidClient {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
    tei_coordinates: Vec<String>,
    consolidate_header: bool,
    consolidate_citations: bool,
}

impl GrobidClient {
    pub fn from_config(config: &ConversionConfig) -> Result<Self, Pdf2OdtError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Pdf2OdtError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.grobid_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs: config.request_timeout_secs,
            tei_coordinates: config.tei_coordinates.clone(),
            consolidate_header: config.consolidate_header,
            consolidate_citations: config.consolidate_citations,
        })
    }

    pub fn fulltext_url(&self) -> String {
        format!("{}/api/processFulltextDocument", self.base_url)
    }

    /// GROBID's liveness probe. Any failure counts as "not alive".
    pub async fn is_alive(&self) -> bool {
        let url = format!("{}/api/isalive", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => resp
                .text()
                .await
                .map(|body| body.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            Ok(resp) => {
                debug!("GROBID liveness probe returned HTTP {}", resp.status());
                false
            }
            Err(e) => {
                debug!("GROBID liveness probe failed: {}", e);
                false
            }
        }
    }

    fn build_form(&self, file_name: &str, pdf: Vec<u8>) -> Result<Form, Pdf2OdtError> {
        let part = Part::bytes(pdf)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")
            .map_err(|e| Pdf2OdtError::Internal(format!("multipart: {e}")))?;

        let mut form = Form::new()
            .part("input", part)
            .text("consolidateHeader", flag(self.consolidate_header))
            .text("consolidateCitations", flag(self.consolidate_citations));
        for element in &self.tei_coordinates {
            form = form.text("teiCoordinates", element.clone());
        }
        Ok(form)
    }

    fn unavailable(&self, url: &str, e: reqwest::Error) -> Pdf2OdtError {
        let reason = if e.is_timeout() {
            format!("timed out after {}s", self.timeout_secs)
        } else if e.is_connect() {
            format!("connection failed: {e}")
        } else {
            e.to_string()
        };
        Pdf2OdtError::ServiceUnavailable {
            url: url.to_string(),
            reason,
        }
    }
}

fn flag(v: bool) -> &'static str {
    if v {
        "1"
    } else {
        "0"
    }
}

#[async_trait]
impl TeiService for GrobidClient {
    async fn process_fulltext(&self, file_name: &str, pdf: Vec<u8>) -> Result<String, Pdf2OdtError> {
        let url = self.fulltext_url();
        debug!("POST {} ({} bytes, {})", url, pdf.len(), file_name);

        let form = self.build_form(file_name, pdf)?;
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.unavailable(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Pdf2OdtError::ServiceUnavailable {
                url,
                reason: format!("HTTP {status}"),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.unavailable(&url, e))?;
        if body.trim().is_empty() {
            // GROBID answers 204 when it could not extract anything.
            return Err(Pdf2OdtError::ServiceUnavailable {
                url,
                reason: format!("empty response (HTTP {status})"),
            });
        }
        Ok(body)
    }

    fn endpoint(&self) -> String {
        self.fulltext_url()
    }
}

// ── Cache-aware fetcher ──────────────────────────────────────────────────

/// A TEI file guaranteed to exist on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedTei {
    pub path: PathBuf,
    /// True when the file was already in the TEI directory.
    pub cached: bool,
}

/// Looks up or creates the TEI file for each source PDF.
pub struct TeiFetcher {
    service: Arc<dyn TeiService>,
    tei_dir: PathBuf,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl TeiFetcher {
    pub fn new(service: Arc<dyn TeiService>, config: &ConversionConfig) -> Self {
        Self {
            service,
            tei_dir: config.tei_dir.clone(),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    /// Use the injected service if any, else a [`GrobidClient`] for
    /// `config.grobid_url`.
    pub fn from_config(config: &ConversionConfig) -> Result<Self, Pdf2OdtError> {
        let service: Arc<dyn TeiService> = match config.service {
            Some(ref s) => Arc::clone(s),
            None => Arc::new(GrobidClient::from_config(config)?),
        };
        Ok(Self::new(service, config))
    }

    pub fn tei_path(&self, pdf: &Path) -> PathBuf {
        self.tei_dir.join(format!("{}.tei.xml", file_stem(pdf)))
    }

    /// Return the TEI path for `pdf`, calling the service only when the
    /// cache has no entry for it.
    pub async fn ensure_tei(&self, pdf: &Path) -> Result<FetchedTei, Pdf2OdtError> {
        let path = self.tei_path(pdf);
        if path.is_file() {
            info!("TEI already cached for {}, skipping conversion", pdf.display());
            return Ok(FetchedTei { path, cached: true });
        }

        let bytes = tokio::fs::read(pdf)
            .await
            .map_err(|e| Pdf2OdtError::io(pdf, e))?;
        let file_name = pdf
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input.pdf".to_string());

        let tei = self.call_with_retry(&file_name, bytes).await?;
        write_atomic(&path, tei.as_bytes())?;
        info!("Converted PDF to TEI: {} -> {}", pdf.display(), path.display());

        Ok(FetchedTei {
            path,
            cached: false,
        })
    }

    async fn call_with_retry(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, Pdf2OdtError> {
        let mut last_err: Option<Pdf2OdtError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    file_name, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.service.process_fulltext(file_name, bytes.clone()).await {
                Ok(tei) => return Ok(tei),
                Err(e) if e.is_retryable() => {
                    warn!(
                        "{}: attempt {} against {} failed: {}",
                        file_name,
                        attempt + 1,
                        self.service.endpoint(),
                        e
                    );
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| Pdf2OdtError::Internal("no attempt was made".into())))
    }
}

/// Delay before retry number `retry` (1-based): `base * 2^(retry - 1)`, saturating.
fn backoff_ms(base: u64, retry: u32) -> u64 {
    let factor = 2u64.checked_pow(retry.saturating_sub(1)).unwrap_or(u64::MAX);
    base.saturating_mul(factor)
}
