//! Progress-callback trait for per-document conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the run walks the source directory.
//!
//! # Example
//!
//! ```rust
//! use pdf2odt::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, index: usize, total: usize, blocks: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Document {}/{} done ({} blocks)", index, total, blocks);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the conversion run as it processes each document.
///
/// Documents are processed one at a time, so events arrive in order. The
/// trait is still `Send + Sync` because the config holding it is shared with
/// the tokio runtime. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once after discovery, before the first document.
    fn on_run_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called before a document's TEI is looked up or fetched.
    ///
    /// `index` is 1-based.
    fn on_document_start(&self, index: usize, total: usize, source: &Path) {
        let _ = (index, total, source);
    }

    /// Called when an ODT file has been written.
    ///
    /// `blocks` is the number of content blocks emitted.
    fn on_document_complete(&self, index: usize, total: usize, blocks: usize) {
        let _ = (index, total, blocks);
    }

    /// Called when the output already existed and `overwrite` is off.
    fn on_document_skipped(&self, index: usize, total: usize, reason: &str) {
        let _ = (index, total, reason);
    }

    /// Called when the document failed; the run continues with the next one.
    fn on_document_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every document has been attempted.
    fn on_run_complete(&self, total_documents: usize, converted: usize) {
        let _ = (total_documents, converted);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        skips: AtomicUsize,
        errors: AtomicUsize,
        run_total: AtomicUsize,
        converted: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_run_start(&self, total_documents: usize) {
            self.run_total.store(total_documents, Ordering::SeqCst);
        }

        fn on_document_start(&self, _index: usize, _total: usize, _source: &Path) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_complete(&self, _index: usize, _total: usize, _blocks: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_skipped(&self, _index: usize, _total: usize, _reason: &str) {
            self.skips.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_error(&self, _index: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_run_complete(&self, _total_documents: usize, converted: usize) {
            self.converted.store(converted, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(2);
        cb.on_document_start(1, 2, Path::new("source/a.pdf"));
        cb.on_document_complete(1, 2, 42);
        cb.on_document_skipped(2, 2, "exists");
        cb.on_document_error(2, 2, "service down");
        cb.on_run_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_run_start(3);
        tracker.on_document_start(1, 3, Path::new("a.pdf"));
        tracker.on_document_complete(1, 3, 10);
        tracker.on_document_start(2, 3, Path::new("b.pdf"));
        tracker.on_document_skipped(2, 3, "output exists");
        tracker.on_document_start(3, 3, Path::new("c.pdf"));
        tracker.on_document_error(3, 3, "GROBID unavailable");
        tracker.on_run_complete(3, 1);

        assert_eq!(tracker.run_total.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.skips.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.converted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_run_start(10);
        cb.on_document_complete(1, 10, 512);
    }
}
