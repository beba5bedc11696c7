//! # pdf2png
//!
//! Convert PDF documents into PNG images, one per page, delivered either as
//! individual files or as a single zip archive.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    validate MIME type and %PDF magic, hold the bytes
//!  ├─ 2. Render   rasterise one page at a time via pdfium (spawn_blocking)
//!  ├─ 3. Encode   bitmap → PNG (data URL or raw bytes)
//!  ├─ 4. Archive  pack PNGs into <name>_images.zip (archive mode)
//!  └─ 5. Download save the zip, or each page-<n>.png spaced by a delay
//! ```
//!
//! Pages are processed strictly in ascending order with one page in flight,
//! trading throughput for bounded memory. A failed page is skipped and
//! counted; only document-level failures abort a run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2png::{convert, ConversionConfig, OutputMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .zoom(2.0)
//!         .output_mode(OutputMode::Archive)
//!         .build()?;
//!     let output = convert("document.pdf", &config).await?;
//!     println!(
//!         "{}: {} pages, {} failed",
//!         output.archive_name.as_deref().unwrap_or("-"),
//!         output.stats.encoded_pages,
//!         output.stats.failed_pages
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Interactive use
//!
//! [`Session`] exposes the run as commands (`on_file_selected`, `on_cancel`,
//! `on_progress`) so a UI can start, watch and cancel conversions without
//! holding any pipeline state itself.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2png` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2png = { version = "0.1", default-features = false }
//! ```
//!
//! ## pdfium
//!
//! Rendering needs the pdfium shared library at runtime. It is looked up at
//! the configured path, then `PDFIUM_LIB_PATH`, then the working directory,
//! then the system library path.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod session;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, OutputMode, PageSelection};
pub use convert::{convert, convert_from_bytes, convert_sync, convert_to_dir, convert_with, inspect};
pub use error::{PageError, Pdf2PngError};
pub use output::{ConversionOutput, ConversionStats, DocumentMetadata, EncodedImage, PngPayload};
pub use pipeline::archive::Archive;
pub use pipeline::download::{DirectorySink, Download, DownloadSink};
pub use pipeline::input::SourceDocument;
pub use pipeline::render::{PageSource, PdfiumRasterizer, Rasterizer};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback, Status};
pub use session::{RunHandle, Session};
pub use stream::{convert_file_stream, convert_stream, PageStream};
