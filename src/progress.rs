//! Progress reporting: the run status and the per-page callback trait.
//!
//! Two complementary surfaces exist:
//!
//! * [`Status`]: a single value describing the latest step of one run
//!   ("reading", "page 3/12 converting", "packaging", "done", …). It is
//!   overwritten on every page boundary and never queued, so a poller only
//!   ever sees the most recent step. [`crate::session::RunHandle::status`]
//!   exposes it.
//!
//! * [`ConversionProgressCallback`]: push-style events injected through
//!   [`crate::config::ConversionConfigBuilder::progress_callback`]. The CLI
//!   uses it to drive a terminal progress bar.
//!
//! # Example
//!
//! ```rust
//! use pdf2png::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, png_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} done ({} bytes)", page_num, total_pages, png_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Latest step of a conversion run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Status {
    /// No run has started.
    #[default]
    Idle,
    /// The source bytes are being opened as a document.
    Reading,
    /// Page `page` of `total` is being rendered and encoded.
    Rendering { page: usize, total: usize },
    /// Encoded pages are being packed into the archive.
    Packaging,
    /// The run finished; the download artifact is available.
    Ready,
    /// The run was cancelled between pages.
    Cancelled,
    /// The run aborted with a fatal error.
    Failed(String),
}

impl Status {
    /// `true` once the run can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Ready | Status::Cancelled | Status::Failed(_))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Idle => f.write_str("idle"),
            Status::Reading => f.write_str("reading"),
            Status::Rendering { page, total } => write!(f, "page {page}/{total} converting"),
            Status::Packaging => f.write_str("packaging"),
            Status::Ready => f.write_str("done"),
            Status::Cancelled => f.write_str("cancelled"),
            Status::Failed(message) => f.write_str(message),
        }
    }
}

/// Called by the conversion pipeline as it processes each page.
///
/// Pages are processed one at a time, so events arrive strictly in page
/// order from the run's worker thread. All methods have default no-op
/// implementations so callers only override what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once after the document is opened.
    ///
    /// # Arguments
    /// * `total_pages`: number of pages that will be processed
    fn on_conversion_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page is rendered.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page has been rendered and PNG-encoded.
    ///
    /// # Arguments
    /// * `page_num`: 1-indexed page number
    /// * `total_pages`: pages in the document
    /// * `png_len`: size of the encoded payload (PNG bytes or data URL)
    fn on_page_complete(&self, page_num: usize, total_pages: usize, png_len: usize) {
        let _ = (page_num, total_pages, png_len);
    }

    /// Called when a page is skipped after a render or encode failure.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called before the archive is assembled (archive mode only).
    fn on_packaging(&self, entries: usize) {
        let _ = entries;
    }

    /// Called once when the page loop ends, cancelled or not.
    ///
    /// # Arguments
    /// * `total_pages`: pages selected for conversion
    /// * `success_count`: pages that produced an image
    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
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
        errors: AtomicUsize,
        packaged: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_page_start(&self, _page_num: usize, _total_pages: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page_num: usize, _total_pages: usize, _png_len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_packaging(&self, entries: usize) {
            self.packaged.store(entries, Ordering::SeqCst);
        }
    }

    #[test]
    fn status_text() {
        assert_eq!(Status::Reading.to_string(), "reading");
        assert_eq!(
            Status::Rendering { page: 2, total: 9 }.to_string(),
            "page 2/9 converting"
        );
        assert_eq!(Status::Packaging.to_string(), "packaging");
        assert_eq!(Status::Ready.to_string(), "done");
        assert_eq!(Status::Failed("bad file".into()).to_string(), "bad file");
    }

    #[test]
    fn terminal_states() {
        assert!(!Status::Idle.is_terminal());
        assert!(!Status::Rendering { page: 1, total: 1 }.is_terminal());
        assert!(Status::Ready.is_terminal());
        assert!(Status::Cancelled.is_terminal());
        assert!(Status::Failed(String::new()).is_terminal());
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start(5);
        cb.on_page_start(1, 5);
        cb.on_page_complete(1, 5, 42);
        cb.on_page_error(2, 5, "some error");
        cb.on_packaging(4);
        cb.on_conversion_complete(5, 4);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_page_start(1, 3);
        tracker.on_page_complete(1, 3, 100);
        tracker.on_page_start(2, 3);
        tracker.on_page_error(2, 3, "empty bitmap");
        tracker.on_page_start(3, 3);
        tracker.on_page_complete(3, 3, 200);
        tracker.on_packaging(2);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.packaged.load(Ordering::SeqCst), 2);
    }
}
