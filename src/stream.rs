//! Streaming conversion API: emit pages as they complete.
//!
//! Unlike the eager [`crate::convert::convert`], which returns only after all
//! pages finish, [`convert_stream`] yields each [`EncodedImage`] as soon as it
//! is encoded and keeps nothing afterwards. Pages arrive in ascending page
//! order. No archive is built; callers that want one can feed the items into
//! an [`crate::pipeline::archive::ArchiveBuilder`] themselves.
//!
//! The channel holds a single page, so the renderer never gets more than one
//! page ahead of the consumer. Dropping the stream stops the run before its
//! next page.

use crate::config::ConversionConfig;
use crate::convert::{self, RunContext};
use crate::error::{PageError, Pdf2PngError};
use crate::output::EncodedImage;
use crate::pipeline::input::{self, SourceDocument};
use crate::pipeline::render::{PdfiumRasterizer, Rasterizer};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-page results.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<EncodedImage, PageError>> + Send>>;

/// Convert `source`, streaming pages as they are ready.
///
/// # Returns
/// - `Ok(PageStream)` once the document is open
/// - `Err(Pdf2PngError)` for fatal errors (invalid input, open failure, an
///   empty page selection)
pub async fn convert_stream(
    rasterizer: Arc<dyn Rasterizer>,
    source: SourceDocument,
    config: &ConversionConfig,
) -> Result<PageStream, Pdf2PngError> {
    source.validate()?;
    info!("Starting streaming conversion: {}", source.name());

    let (page_tx, page_rx) = mpsc::channel(1);
    let (opened_tx, opened_rx) = oneshot::channel();
    let (ctx, _status) = RunContext::new();
    let ctx = ctx.with_page_sink(page_tx).with_open_signal(opened_tx);

    let task = convert::spawn_run(rasterizer, source, config.clone(), ctx);

    match opened_rx.await {
        Ok(selected) => {
            info!("Streaming {} pages", selected);
            Ok(Box::pin(ReceiverStream::new(page_rx)))
        }
        // The run ended before the document opened: surface its error.
        Err(_) => match convert::join_run(task).await {
            Err(e) => Err(e),
            Ok(_) => Err(Pdf2PngError::Internal(
                "run ended before the document was opened".into(),
            )),
        },
    }
}

/// [`convert_stream`] for a file on disk, rendered with pdfium.
pub async fn convert_file_stream(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<PageStream, Pdf2PngError> {
    let source = input::read_source(path).await?;
    let rasterizer = PdfiumRasterizer::with_library_path(config.pdfium_library_path.clone());
    convert_stream(Arc::new(rasterizer), source, config).await
}
