//! Conversion orchestrator and the eager entry points.
//!
//! [`run_conversion`] is the one per-page loop shared by every entry point:
//! open → for each selected page (render → encode → accumulate) → package →
//! ready. It runs on a blocking-pool thread because pdfium is synchronous and
//! not safe to drive from async tasks, and it processes exactly one page at a
//! time so peak memory stays at one bitmap plus the encoded PNGs.
//!
//! All mutable state of a run lives in a [`RunContext`] owned by that run;
//! nothing leaks from one run into the next.
//!
//! Use [`crate::session::Session`] for the interactive command interface
//! (start, cancel, poll) and [`crate::stream::convert_stream`] to receive
//! pages as they complete.

use crate::config::{ConversionConfig, OutputMode, PageSelection};
use crate::error::{PageError, Pdf2PngError};
use crate::output::{ConversionOutput, ConversionStats, DocumentMetadata, EncodedImage};
use crate::pipeline::archive::{archive_name_for, ArchiveBuilder};
use crate::pipeline::download::{self, DirectorySink};
use crate::pipeline::input::{self, SourceDocument};
use crate::pipeline::render::{self, PdfiumRasterizer, Rasterizer};
use crate::pipeline::encode;
use crate::progress::Status;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Item type of the page channel used by streaming runs.
pub(crate) type PageItem = Result<EncodedImage, PageError>;

/// Run-scoped state shared between the worker thread and its owner.
pub(crate) struct RunContext {
    status: watch::Sender<Status>,
    cancel: Arc<AtomicBool>,
    /// When set, pages are sent here instead of being accumulated.
    page_sink: Option<mpsc::Sender<PageItem>>,
    /// Fired with the selected page count once the document is open.
    opened: Option<oneshot::Sender<usize>>,
}

impl RunContext {
    /// A context exists only for a started run, so its status begins at
    /// [`Status::Reading`].
    pub(crate) fn new() -> (Self, watch::Receiver<Status>) {
        let (status, rx) = watch::channel(Status::Reading);
        let ctx = Self {
            status,
            cancel: Arc::new(AtomicBool::new(false)),
            page_sink: None,
            opened: None,
        };
        (ctx, rx)
    }

    pub(crate) fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub(crate) fn with_page_sink(mut self, sink: mpsc::Sender<PageItem>) -> Self {
        self.page_sink = Some(sink);
        self
    }

    pub(crate) fn with_open_signal(mut self, opened: oneshot::Sender<usize>) -> Self {
        self.opened = Some(opened);
        self
    }

    fn set_status(&self, status: Status) {
        self.status.send_replace(status);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// Drive one run to completion on the current (blocking) thread.
pub(crate) fn run_conversion(
    rasterizer: &dyn Rasterizer,
    source: &SourceDocument,
    config: &ConversionConfig,
    ctx: &mut RunContext,
) -> Result<ConversionOutput, Pdf2PngError> {
    let total_start = Instant::now();
    info!("Starting conversion: {}", source.name());
    ctx.set_status(Status::Reading);

    let callback = config.progress_callback.clone();
    let delay = Duration::from_millis(config.page_delay_ms);

    let mut metadata = DocumentMetadata::default();
    let mut images: Vec<EncodedImage> = Vec::new();
    let mut page_errors: Vec<PageError> = Vec::new();
    let mut selected = 0usize;
    let mut attempted = 0usize;
    let mut cancelled = false;
    let mut render_duration = Duration::ZERO;

    rasterizer.with_document(source, config.password.as_deref(), &mut |doc| {
        metadata = doc.metadata();
        let total_pages = doc.page_count();

        let indices = config.pages.to_indices(total_pages);
        // A document with no pages converts to nothing; only an explicit
        // selection that matches no page is an error.
        if indices.is_empty() && config.pages != PageSelection::All {
            return Err(Pdf2PngError::PageOutOfRange {
                page: first_requested_page(&config.pages),
                total: total_pages,
            });
        }
        selected = indices.len();
        debug!("Selected {} of {} pages", selected, total_pages);

        if let Some(opened) = ctx.opened.take() {
            let _ = opened.send(selected);
        }
        if let Some(ref cb) = callback {
            cb.on_conversion_start(selected);
        }

        for (i, &idx) in indices.iter().enumerate() {
            if ctx.is_cancelled() {
                info!("Cancelled before page {}", idx + 1);
                cancelled = true;
                break;
            }

            let page_num = idx + 1;
            ctx.set_status(Status::Rendering {
                page: page_num,
                total: total_pages,
            });
            if let Some(ref cb) = callback {
                cb.on_page_start(page_num, total_pages);
            }

            // The bitmap is dropped at the end of this expression, before the
            // next page is rendered.
            let page_start = Instant::now();
            let result = doc.render_page(idx, config.zoom).and_then(|bitmap| {
                encode::encode_page(page_num, &bitmap, config.output_mode, total_pages)
            });
            render_duration += page_start.elapsed();
            attempted += 1;

            match result {
                Ok(image) => {
                    if let Some(ref cb) = callback {
                        cb.on_page_complete(page_num, total_pages, image.payload.len());
                    }
                    match ctx.page_sink {
                        Some(ref sink) => {
                            if sink.blocking_send(Ok(image)).is_err() {
                                info!("Page receiver dropped; stopping after page {}", page_num);
                                cancelled = true;
                                break;
                            }
                        }
                        None => images.push(image),
                    }
                }
                Err(e) => {
                    warn!("Skipping page {}: {}", page_num, e);
                    if let Some(ref cb) = callback {
                        cb.on_page_error(page_num, total_pages, &e.to_string());
                    }
                    let receiver_gone = match ctx.page_sink {
                        Some(ref sink) => sink.blocking_send(Err(e.clone())).is_err(),
                        None => false,
                    };
                    page_errors.push(e);
                    if receiver_gone {
                        info!("Page receiver dropped; stopping after page {}", page_num);
                        cancelled = true;
                        break;
                    }
                }
            }

            if i + 1 < indices.len() && !delay.is_zero() {
                std::thread::sleep(delay);
            }
        }

        Ok(())
    })?;

    let mut archive = None;
    if cancelled {
        ctx.set_status(Status::Cancelled);
    } else if config.output_mode == OutputMode::Archive && ctx.page_sink.is_none() {
        ctx.set_status(Status::Packaging);
        if let Some(ref cb) = callback {
            cb.on_packaging(images.len());
        }

        let mut builder = ArchiveBuilder::new();
        for image in &images {
            let png = image.payload.png_bytes().ok_or_else(|| {
                Pdf2PngError::Internal(format!("unreadable payload for {}", image.name))
            })?;
            builder.add(&image.name, &png)?;
        }
        archive = Some(builder.finish(archive_name_for(source.name()))?);
    }

    let encoded_pages = if ctx.page_sink.is_some() {
        attempted - page_errors.len()
    } else {
        images.len()
    };

    let stats = ConversionStats {
        total_pages: metadata.page_count,
        selected_pages: selected,
        encoded_pages,
        failed_pages: page_errors.len(),
        skipped_pages: selected.saturating_sub(attempted),
        archive_bytes: archive.as_ref().map_or(0, |a| a.len()),
        render_duration_ms: render_duration.as_millis() as u64,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    if let Some(ref cb) = callback {
        cb.on_conversion_complete(selected, encoded_pages);
    }

    if !cancelled {
        ctx.set_status(Status::Ready);
    }

    info!(
        "Conversion {}: {}/{} pages, {} failed, {}ms total",
        if cancelled { "cancelled" } else { "complete" },
        encoded_pages,
        selected,
        stats.failed_pages,
        stats.total_duration_ms
    );

    Ok(ConversionOutput {
        source_name: source.name().to_string(),
        mode: config.output_mode,
        images,
        archive_name: archive.as_ref().map(|a| a.name().to_string()),
        archive,
        page_errors,
        metadata,
        stats,
        cancelled,
    })
}

fn first_requested_page(selection: &PageSelection) -> usize {
    match selection {
        PageSelection::All => 0,
        PageSelection::Single(p) => *p,
        PageSelection::Range(start, _) => *start,
        PageSelection::Set(pages) => pages.iter().copied().min().unwrap_or(0),
    }
}

/// Start a run on the blocking pool.
///
/// A fatal error is published as [`Status::Failed`] before it is returned.
pub(crate) fn spawn_run(
    rasterizer: Arc<dyn Rasterizer>,
    source: SourceDocument,
    config: ConversionConfig,
    mut ctx: RunContext,
) -> JoinHandle<Result<ConversionOutput, Pdf2PngError>> {
    tokio::task::spawn_blocking(move || {
        let result = run_conversion(rasterizer.as_ref(), &source, &config, &mut ctx);
        if let Err(ref e) = result {
            warn!("Conversion of '{}' failed: {}", source.name(), e);
            ctx.set_status(Status::Failed(e.to_string()));
        }
        result
    })
}

pub(crate) async fn join_run(
    task: JoinHandle<Result<ConversionOutput, Pdf2PngError>>,
) -> Result<ConversionOutput, Pdf2PngError> {
    task.await
        .map_err(|e| Pdf2PngError::Internal(format!("Conversion task panicked: {}", e)))?
}

fn default_rasterizer(config: &ConversionConfig) -> Arc<dyn Rasterizer> {
    Arc::new(PdfiumRasterizer::with_library_path(
        config.pdfium_library_path.clone(),
    ))
}

/// Convert a PDF file into PNG images.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(ConversionOutput)` on success, even if some pages failed
/// (check `output.stats.failed_pages`).
///
/// # Errors
/// Returns `Err(Pdf2PngError)` only for fatal errors:
/// - File not found / permission denied / not a PDF
/// - The document cannot be opened
/// - pdfium cannot be bound
pub async fn convert(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2PngError> {
    let source = input::read_source(path).await?;
    convert_with(default_rasterizer(config), source, config).await
}

/// Convert an in-memory source with an explicit rasterizer.
pub async fn convert_with(
    rasterizer: Arc<dyn Rasterizer>,
    source: SourceDocument,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2PngError> {
    source.validate()?;
    let (ctx, _status) = RunContext::new();
    join_run(spawn_run(rasterizer, source, config.clone(), ctx)).await
}

/// Convert PDF bytes already in memory.
///
/// # Example
/// ```rust,no_run
/// use pdf2png::{convert_from_bytes, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("document.pdf")?;
/// let output = convert_from_bytes("document.pdf", bytes, &ConversionConfig::default()).await?;
/// println!("{} pages", output.stats.encoded_pages);
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(
    name: impl Into<String>,
    bytes: Vec<u8>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2PngError> {
    let source = SourceDocument::pdf(name, bytes);
    convert_with(default_rasterizer(config), source, config).await
}

/// Convert a PDF and save the result into `out_dir`.
///
/// Archive mode saves one `<name>_images.zip`; images mode saves one
/// `page-<n>.png` per page, spaced by `download_delay_ms`. Cancelled runs
/// save nothing.
pub async fn convert_to_dir(
    path: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<(ConversionStats, Vec<PathBuf>), Pdf2PngError> {
    let output = convert(path, config).await?;
    let stats = output.stats.clone();

    let saved = match output.into_download() {
        Some(download) => {
            let sink = DirectorySink::new(out_dir.as_ref());
            download::trigger(
                download,
                &sink,
                Duration::from_millis(config.download_delay_ms),
            )
            .await?
        }
        None => Vec::new(),
    };

    Ok((stats, saved))
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2PngError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2PngError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(path, config))
}

/// Read PDF metadata without rendering any page.
pub async fn inspect(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<DocumentMetadata, Pdf2PngError> {
    let source = input::read_source(path).await?;
    render::extract_metadata(default_rasterizer(config), source, config.password.clone()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::render::PageSource;
    use image::{DynamicImage, Rgba, RgbaImage};

    struct Pages {
        count: usize,
        fail_render: Option<usize>,
    }

    impl PageSource for Pages {
        fn page_count(&self) -> usize {
            self.count
        }

        fn render_page(&mut self, index: usize, zoom: f32) -> Result<DynamicImage, PageError> {
            if self.fail_render == Some(index) {
                return Err(PageError::RenderFailed {
                    page: index + 1,
                    detail: "synthetic".into(),
                });
            }
            let w = (50.0 * zoom) as u32;
            Ok(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
                w,
                w,
                Rgba([0, 0, 0, 255]),
            )))
        }
    }

    struct Fixed {
        count: usize,
        fail_render: Option<usize>,
    }

    impl Rasterizer for Fixed {
        fn with_document(
            &self,
            _source: &SourceDocument,
            _password: Option<&str>,
            visit: &mut dyn FnMut(&mut dyn PageSource) -> Result<(), Pdf2PngError>,
        ) -> Result<(), Pdf2PngError> {
            visit(&mut Pages {
                count: self.count,
                fail_render: self.fail_render,
            })
        }
    }

    fn fast(mode: OutputMode) -> ConversionConfig {
        ConversionConfig::builder()
            .output_mode(mode)
            .page_delay_ms(0)
            .build()
            .unwrap()
    }

    fn source() -> SourceDocument {
        SourceDocument::pdf("doc.pdf", b"%PDF-1.7".to_vec())
    }

    #[test]
    fn status_ends_ready_after_archive_run() {
        let (mut ctx, rx) = RunContext::new();
        let output = run_conversion(
            &Fixed { count: 2, fail_render: None },
            &source(),
            &fast(OutputMode::Archive),
            &mut ctx,
        )
        .unwrap();

        assert_eq!(*rx.borrow(), Status::Ready);
        assert_eq!(output.archive_name.as_deref(), Some("doc_images.zip"));
        assert_eq!(output.stats.encoded_pages, 2);
        assert!(output.stats.archive_bytes > 0);
    }

    #[test]
    fn render_failure_is_skipped() {
        let (mut ctx, _rx) = RunContext::new();
        let output = run_conversion(
            &Fixed { count: 3, fail_render: Some(1) },
            &source(),
            &fast(OutputMode::Images),
            &mut ctx,
        )
        .unwrap();

        let names: Vec<&str> = output.images.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["page-1.png", "page-3.png"]);
        assert_eq!(output.stats.failed_pages, 1);
        assert_eq!(output.page_errors[0].page(), 2);
    }

    #[test]
    fn empty_selection_is_fatal() {
        let (mut ctx, _rx) = RunContext::new();
        let config = ConversionConfig::builder()
            .pages(PageSelection::Single(9))
            .page_delay_ms(0)
            .build()
            .unwrap();
        let err = run_conversion(
            &Fixed { count: 3, fail_render: None },
            &source(),
            &config,
            &mut ctx,
        )
        .unwrap_err();
        assert!(matches!(err, Pdf2PngError::PageOutOfRange { page: 9, total: 3 }));
    }

    #[test]
    fn pre_cancelled_run_renders_nothing() {
        let (mut ctx, rx) = RunContext::new();
        ctx.cancel_flag().store(true, Ordering::SeqCst);
        let output = run_conversion(
            &Fixed { count: 3, fail_render: None },
            &source(),
            &fast(OutputMode::Archive),
            &mut ctx,
        )
        .unwrap();

        assert!(output.cancelled);
        assert!(output.archive.is_none());
        assert_eq!(output.stats.skipped_pages, 3);
        assert_eq!(*rx.borrow(), Status::Cancelled);
    }

    #[tokio::test]
    async fn convert_with_rejects_non_pdf() {
        let err = convert_with(
            Arc::new(Fixed { count: 1, fail_render: None }),
            SourceDocument::new("a.txt", "text/plain", b"hi".to_vec()),
            &fast(OutputMode::Archive),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Pdf2PngError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn spawned_failure_publishes_status() {
        struct Broken;
        impl Rasterizer for Broken {
            fn with_document(
                &self,
                source: &SourceDocument,
                _password: Option<&str>,
                _visit: &mut dyn FnMut(&mut dyn PageSource) -> Result<(), Pdf2PngError>,
            ) -> Result<(), Pdf2PngError> {
                Err(Pdf2PngError::DocumentOpen {
                    name: source.name().into(),
                    detail: "bad xref".into(),
                })
            }
        }

        let (ctx, rx) = RunContext::new();
        let result = join_run(spawn_run(
            Arc::new(Broken),
            source(),
            fast(OutputMode::Archive),
            ctx,
        ))
        .await;

        assert!(matches!(result, Err(Pdf2PngError::DocumentOpen { .. })));
        let status = rx.borrow().clone();
        match status {
            Status::Failed(msg) => assert!(msg.contains("bad xref")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn document_without_pages_finishes_ready() {
        let (mut ctx, rx) = RunContext::new();
        let output = run_conversion(
            &Fixed { count: 0, fail_render: None },
            &source(),
            &fast(OutputMode::Archive),
            &mut ctx,
        )
        .unwrap();

        assert_eq!(*rx.borrow(), Status::Ready);
        assert!(output.images.is_empty());
        assert_eq!(output.stats.selected_pages, 0);
        assert_eq!(output.archive_name.as_deref(), Some("doc_images.zip"));
    }

    #[test]
    fn dropped_receiver_stops_on_failed_page() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let (ctx, _status) = RunContext::new();
        let mut ctx = ctx.with_page_sink(tx);
        let output = run_conversion(
            &Fixed { count: 4, fail_render: Some(0) },
            &source(),
            &fast(OutputMode::Images),
            &mut ctx,
        )
        .unwrap();

        assert!(output.cancelled);
        assert_eq!(output.stats.failed_pages, 1);
        assert_eq!(output.stats.skipped_pages, 3);
    }
}
