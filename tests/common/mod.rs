//! Shared fixtures for the integration tests: an in-process rasterizer that
//! needs no pdfium, and a progress callback that can hold a run at a page.

#![allow(dead_code)]

use image::{DynamicImage, Rgba, RgbaImage};
use pdf2png::{
    ConversionProgressCallback, DocumentMetadata, PageError, PageSource, Pdf2PngError, Rasterizer,
    SourceDocument,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

/// US Letter in points.
pub const LETTER: (f32, f32) = (612.0, 792.0);

/// Renders solid bitmaps sized `page size in points × zoom`.
///
/// A page of size `(0.0, h)` renders to an empty bitmap, which the encoder
/// refuses; that is how tests simulate a per-page encode failure. Bytes
/// containing `corrupt` fail to open.
#[derive(Clone)]
pub struct FakeRasterizer {
    pages: Vec<(f32, f32)>,
    renders: Arc<AtomicUsize>,
}

impl FakeRasterizer {
    pub fn new(pages: Vec<(f32, f32)>) -> Self {
        Self {
            pages,
            renders: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// `count` letter-sized pages.
    pub fn letter(count: usize) -> Self {
        Self::new(vec![LETTER; count])
    }

    /// Number of `render_page` calls across every run.
    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

struct FakeDocument<'a> {
    pages: &'a [(f32, f32)],
    renders: &'a AtomicUsize,
}

impl PageSource for FakeDocument<'_> {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn render_page(&mut self, index: usize, zoom: f32) -> Result<DynamicImage, PageError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        let (w, h) = self.pages.get(index).copied().ok_or(PageError::RenderFailed {
            page: index + 1,
            detail: "no such page".into(),
        })?;
        let width = (w * zoom).round() as u32;
        let height = (h * zoom).round() as u32;
        Ok(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([255, 255, 255, 255]),
        )))
    }

    fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata {
            title: Some("Fake".into()),
            pdf_version: "Pdf1_7".into(),
            ..DocumentMetadata::with_page_count(self.pages.len())
        }
    }
}

impl Rasterizer for FakeRasterizer {
    fn with_document(
        &self,
        source: &SourceDocument,
        _password: Option<&str>,
        visit: &mut dyn FnMut(&mut dyn PageSource) -> Result<(), Pdf2PngError>,
    ) -> Result<(), Pdf2PngError> {
        if source.bytes().windows(7).any(|w| w == b"corrupt") {
            return Err(Pdf2PngError::DocumentOpen {
                name: source.name().to_string(),
                detail: "invalid cross-reference table".into(),
            });
        }
        visit(&mut FakeDocument {
            pages: &self.pages,
            renders: &self.renders,
        })
    }
}

/// Minimal bytes that pass input validation.
pub fn pdf_source(name: &str) -> SourceDocument {
    SourceDocument::pdf(name, b"%PDF-1.7\n%fake\n".to_vec())
}

/// Stops the run inside `on_page_complete(page)` until the test releases it.
pub struct PauseAtPage {
    page: usize,
    reached: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

/// Test-side ends of a [`PauseAtPage`].
pub struct PauseControl {
    reached: mpsc::Receiver<()>,
    release: mpsc::Sender<()>,
}

impl PauseAtPage {
    pub fn new(page: usize) -> (Arc<Self>, PauseControl) {
        let (reached_tx, reached_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let callback = Arc::new(Self {
            page,
            reached: Mutex::new(reached_tx),
            release: Mutex::new(release_rx),
        });
        let control = PauseControl {
            reached: reached_rx,
            release: release_tx,
        };
        (callback, control)
    }
}

impl ConversionProgressCallback for PauseAtPage {
    fn on_page_complete(&self, page_num: usize, _total_pages: usize, _png_len: usize) {
        if page_num == self.page {
            let _ = self.reached.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv();
        }
    }
}

impl PauseControl {
    /// Block until the run is held at its page.
    pub fn wait_until_reached(&self) {
        self.reached.recv().expect("run never reached the pause page");
    }

    pub fn release(&self) {
        let _ = self.release.send(());
    }
}
