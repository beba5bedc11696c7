//! PDF rasterisation: render one page at a time to `DynamicImage` via pdfium.
//!
//! The orchestrator only sees the [`Rasterizer`] / [`PageSource`] pair, so the
//! per-page loop can be driven by pdfium in production and by an in-process
//! fake in tests.
//!
//! ## Why a visitor instead of returning the document?
//!
//! A pdfium `PdfDocument` borrows both the bound library and the byte buffer
//! it was loaded from, and the library handle is not safe to move between
//! threads. [`Rasterizer::with_document`] keeps all three on the caller's
//! stack for the duration of the visit, so no self-referential struct is
//! needed and the whole document lives on the run's single worker thread.
//!
//! ## Why a zoom factor, not a pixel target?
//!
//! Output dimensions are `page size in points × zoom`, so the same document
//! and zoom always produce the same dimensions and a larger zoom scales them
//! linearly. Rendering is invoked for exactly one page at a time; nothing
//! here renders pages concurrently.

use crate::error::{PageError, Pdf2PngError};
use crate::output::DocumentMetadata;
use crate::pipeline::input::SourceDocument;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// An opened, paginated document.
pub trait PageSource {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Rasterise the page at 0-based `index`, scaling its native size by `zoom`.
    fn render_page(&mut self, index: usize, zoom: f32) -> Result<DynamicImage, PageError>;

    /// Document metadata. Sources without an info dictionary report only the
    /// page count.
    fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata::with_page_count(self.page_count())
    }
}

/// Opens byte buffers as paginated documents.
pub trait Rasterizer: Send + Sync {
    /// Open `source` and hand the document to `visit`.
    ///
    /// # Errors
    /// [`Pdf2PngError::DocumentOpen`], [`Pdf2PngError::PasswordRequired`] or
    /// [`Pdf2PngError::WrongPassword`] when the bytes cannot be opened;
    /// whatever `visit` returns otherwise.
    fn with_document(
        &self,
        source: &SourceDocument,
        password: Option<&str>,
        visit: &mut dyn FnMut(&mut dyn PageSource) -> Result<(), Pdf2PngError>,
    ) -> Result<(), Pdf2PngError>;
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// [`Rasterizer`] backed by the pdfium shared library.
///
/// The library is bound on every [`Rasterizer::with_document`] call, on the
/// calling thread, so the rasterizer itself is freely shareable.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    library_path: Option<PathBuf>,
}

impl PdfiumRasterizer {
    /// Bind to the library found via `PDFIUM_LIB_PATH`, the working
    /// directory, or the system search path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to the library at `path` first, then fall back like [`Self::new`].
    pub fn with_library_path(path: Option<PathBuf>) -> Self {
        Self { library_path: path }
    }

    fn bind(&self) -> Result<Pdfium, Pdf2PngError> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(ref p) = self.library_path {
            candidates.push(p.clone());
        }
        if let Ok(p) = std::env::var("PDFIUM_LIB_PATH") {
            if !p.is_empty() {
                candidates.push(PathBuf::from(p));
            }
        }
        candidates.push(Pdfium::pdfium_platform_library_name_at_path("./"));

        let mut last_error = String::new();
        for path in &candidates {
            match Pdfium::bind_to_library(path) {
                Ok(bindings) => {
                    debug!("Bound pdfium from {}", path.display());
                    return Ok(Pdfium::new(bindings));
                }
                Err(e) => last_error = format!("{}: {:?}", path.display(), e),
            }
        }

        Pdfium::bind_to_system_library()
            .map(Pdfium::new)
            .map_err(|e| Pdf2PngError::PdfiumBindingFailed(format!("{last_error}; system: {e:?}")))
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn with_document(
        &self,
        source: &SourceDocument,
        password: Option<&str>,
        visit: &mut dyn FnMut(&mut dyn PageSource) -> Result<(), Pdf2PngError>,
    ) -> Result<(), Pdf2PngError> {
        let pdfium = self.bind()?;

        let document = pdfium
            .load_pdf_from_byte_slice(source.bytes(), password)
            .map_err(|e| map_open_error(source.name(), password, &e))?;

        let mut pages = PdfiumPages { document };
        info!("PDF loaded: {} pages", pages.page_count());
        visit(&mut pages)
    }
}

fn map_open_error(name: &str, password: Option<&str>, e: &PdfiumError) -> Pdf2PngError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if password.is_some() {
            Pdf2PngError::WrongPassword { name: name.into() }
        } else {
            Pdf2PngError::PasswordRequired { name: name.into() }
        }
    } else {
        Pdf2PngError::DocumentOpen {
            name: name.into(),
            detail: err_str,
        }
    }
}

struct PdfiumPages<'a> {
    document: PdfDocument<'a>,
}

impl PageSource for PdfiumPages<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn render_page(&mut self, index: usize, zoom: f32) -> Result<DynamicImage, PageError> {
        let page = self
            .document
            .pages()
            .get(index as u16)
            .map_err(|e| PageError::RenderFailed {
                page: index + 1,
                detail: format!("{:?}", e),
            })?;

        let render_config = PdfRenderConfig::new().scale_page_by_factor(zoom);
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| PageError::RenderFailed {
                page: index + 1,
                detail: format!("{:?}", e),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            index + 1,
            image.width(),
            image.height()
        );
        Ok(image)
    }

    fn metadata(&self) -> DocumentMetadata {
        let metadata = self.document.metadata();

        let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
            metadata.get(tag).and_then(|t| {
                let v = t.value().to_string();
                if v.is_empty() {
                    None
                } else {
                    Some(v)
                }
            })
        };

        DocumentMetadata {
            title: get_meta(PdfDocumentMetadataTagType::Title),
            author: get_meta(PdfDocumentMetadataTagType::Author),
            subject: get_meta(PdfDocumentMetadataTagType::Subject),
            creator: get_meta(PdfDocumentMetadataTagType::Creator),
            producer: get_meta(PdfDocumentMetadataTagType::Producer),
            page_count: self.page_count(),
            pdf_version: format!("{:?}", self.document.version()),
        }
    }
}

/// Read document metadata without rendering any page.
///
/// Runs on the blocking pool since pdfium calls are synchronous.
pub async fn extract_metadata(
    rasterizer: std::sync::Arc<dyn Rasterizer>,
    source: SourceDocument,
    password: Option<String>,
) -> Result<DocumentMetadata, Pdf2PngError> {
    tokio::task::spawn_blocking(move || {
        let mut metadata = None;
        rasterizer.with_document(&source, password.as_deref(), &mut |doc| {
            metadata = Some(doc.metadata());
            Ok(())
        })?;
        metadata.ok_or_else(|| Pdf2PngError::Internal("document was never visited".into()))
    })
    .await
    .map_err(|e| Pdf2PngError::Internal(format!("Metadata task panicked: {}", e)))?
}
