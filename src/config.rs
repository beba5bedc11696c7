//! Configuration types for PDF-to-PNG conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. One struct per run keeps every knob in
//! a single place: the orchestrator clones it into the worker thread and the
//! CLI maps its flags onto the builder one-to-one.

use crate::error::Pdf2PngError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Zoom factor applied when no other is configured.
pub const DEFAULT_ZOOM: f32 = 2.0;

/// Pause between two page renders, in milliseconds.
pub const DEFAULT_PAGE_DELAY_MS: u64 = 100;

/// Pause between two saves of the multi-file output, in milliseconds.
pub const DEFAULT_DOWNLOAD_DELAY_MS: u64 = 500;

/// Configuration for a PDF-to-PNG conversion.
///
/// # Example
/// ```rust
/// use pdf2png::{ConversionConfig, OutputMode};
///
/// let config = ConversionConfig::builder()
///     .zoom(2.0)
///     .output_mode(OutputMode::Images)
///     .page_delay_ms(0)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Multiplier applied to each page's native size (in PDF points) before
    /// rasterising. Default: 2.0.
    ///
    /// Output width and height scale linearly with this value, independent
    /// of the page size.
    pub zoom: f32,

    /// Which artifact the run produces. Default: [`OutputMode::Archive`].
    pub output_mode: OutputMode,

    /// Pause inserted between page renders. Default: 100.
    ///
    /// Hands the host a breather between pages so long documents do not
    /// pin a core or balloon memory on constrained machines. Set to 0 for
    /// batch use.
    pub page_delay_ms: u64,

    /// Spacing between consecutive saves in [`OutputMode::Images`]. Default: 500.
    pub download_delay_ms: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Page selection. Default: all pages.
    pub pages: PageSelection,

    /// Explicit path to the pdfium shared library.
    ///
    /// When `None`, `PDFIUM_LIB_PATH`, the working directory and the system
    /// library search path are tried in that order.
    pub pdfium_library_path: Option<PathBuf>,

    /// Receives per-page events as the run progresses.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_ZOOM,
            output_mode: OutputMode::default(),
            page_delay_ms: DEFAULT_PAGE_DELAY_MS,
            download_delay_ms: DEFAULT_DOWNLOAD_DELAY_MS,
            password: None,
            pages: PageSelection::default(),
            pdfium_library_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("zoom", &self.zoom)
            .field("output_mode", &self.output_mode)
            .field("page_delay_ms", &self.page_delay_ms)
            .field("download_delay_ms", &self.download_delay_ms)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("pages", &self.pages)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
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
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn zoom(mut self, zoom: f32) -> Self {
        self.config.zoom = zoom;
        self
    }

    pub fn output_mode(mut self, mode: OutputMode) -> Self {
        self.config.output_mode = mode;
        self
    }

    pub fn page_delay_ms(mut self, ms: u64) -> Self {
        self.config.page_delay_ms = ms;
        self
    }

    pub fn download_delay_ms(mut self, ms: u64) -> Self {
        self.config.download_delay_ms = ms;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.config.progress_callback = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2PngError> {
        let c = &self.config;
        if !c.zoom.is_finite() || c.zoom < 0.1 || c.zoom > 10.0 {
            return Err(Pdf2PngError::InvalidConfig(format!(
                "Zoom must be 0.1–10.0, got {}",
                c.zoom
            )));
        }
        if let PageSelection::Range(start, end) = c.pages {
            if start == 0 || start > end {
                return Err(Pdf2PngError::InvalidConfig(format!(
                    "Invalid page range {start}-{end}"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// The two output variants of one conversion loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// One PNG per page, each carried as a data URL and saved separately as
    /// `page-<n>.png`.
    Images,
    /// All pages packed into one `<name>_images.zip` with zero-padded entry
    /// names. (default)
    #[default]
    Archive,
}

/// Specifies which pages of the PDF to convert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Convert all pages (default).
    #[default]
    All,
    /// Convert a single page (1-indexed).
    Single(usize),
    /// Convert a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Convert specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}
