//! End-to-end integration tests for pdf2png.
//!
//! These tests render real PDF files from `./test_cases/` through pdfium.
//! They are gated behind the `E2E_ENABLED` environment variable so they do
//! not run in CI unless explicitly requested, and each one is skipped when
//! its sample file is missing.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=/path/to/libpdfium.so cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_inspect -- --nocapture

use futures::StreamExt;
use pdf2png::{
    convert, convert_file_stream, convert_to_dir, inspect, ConversionConfig, OutputMode,
    PageSelection, Pdf2PngError,
};
use std::io::Cursor;
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// A three-page sample document.
fn sample_pdf() -> PathBuf {
    test_cases_dir().join("sample_3pages.pdf")
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn fast_config(mode: OutputMode) -> ConversionConfig {
    ConversionConfig::builder()
        .output_mode(mode)
        .page_delay_ms(0)
        .download_delay_ms(0)
        .build()
        .expect("valid config")
}

// ── Inspect ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_inspect_sample() {
    let path = e2e_skip_unless_ready!(sample_pdf());

    let meta = inspect(&path, &ConversionConfig::default())
        .await
        .expect("inspect() should succeed");

    assert_eq!(meta.page_count, 3);
    assert!(!meta.pdf_version.is_empty());
    println!("Metadata: {:?}", meta);
}

#[tokio::test]
async fn test_inspect_nonexistent() {
    let result = inspect("/definitely/not/a/real/file.pdf", &ConversionConfig::default()).await;
    assert!(matches!(result, Err(Pdf2PngError::FileNotFound { .. })));
}

#[tokio::test]
async fn test_convert_rejects_non_pdf_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, b"%PDF-1.7 but named .txt").unwrap();

    let result = convert(&path, &ConversionConfig::default()).await;
    assert!(matches!(result, Err(Pdf2PngError::InvalidInput { .. })));
}

// ── Conversion ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_convert_archive() {
    let path = e2e_skip_unless_ready!(sample_pdf());

    let output = convert(&path, &fast_config(OutputMode::Archive))
        .await
        .expect("conversion should succeed");

    assert_eq!(output.stats.encoded_pages, 3);
    assert_eq!(output.stats.failed_pages, 0);
    assert_eq!(output.archive_name.as_deref(), Some("sample_3pages_images.zip"));

    let archive = output.archive.expect("archive");
    let zip = zip::ZipArchive::new(Cursor::new(archive.bytes().to_vec())).unwrap();
    let names: Vec<&str> = zip.file_names().collect();
    assert_eq!(names, ["page-001.png", "page-002.png", "page-003.png"]);
}

#[tokio::test]
async fn test_convert_to_dir_images() {
    let path = e2e_skip_unless_ready!(sample_pdf());
    let out = tempfile::tempdir().unwrap();

    let (stats, saved) = convert_to_dir(&path, out.path(), &fast_config(OutputMode::Images))
        .await
        .expect("conversion should succeed");

    assert_eq!(stats.encoded_pages, 3);
    for (i, file) in saved.iter().enumerate() {
        assert_eq!(file, &out.path().join(format!("page-{}.png", i + 1)));
        let img = image::open(file).expect("saved file should be a PNG");
        assert!(img.width() > 0 && img.height() > 0);
    }
}

#[tokio::test]
async fn test_zoom_scales_dimensions() {
    let path = e2e_skip_unless_ready!(sample_pdf());

    let at = |zoom: f32| {
        ConversionConfig::builder()
            .zoom(zoom)
            .output_mode(OutputMode::Images)
            .pages(PageSelection::Single(1))
            .page_delay_ms(0)
            .build()
            .unwrap()
    };

    let one = convert(&path, &at(1.0)).await.unwrap();
    let two = convert(&path, &at(2.0)).await.unwrap();
    let (w1, h1) = (one.images[0].width, one.images[0].height);
    let (w2, h2) = (two.images[0].width, two.images[0].height);

    // pdfium rounds each dimension independently.
    assert!((w2 as i64 - 2 * w1 as i64).abs() <= 1, "{w1} → {w2}");
    assert!((h2 as i64 - 2 * h1 as i64).abs() <= 1, "{h1} → {h2}");
}

#[tokio::test]
async fn test_page_out_of_range_is_fatal() {
    let path = e2e_skip_unless_ready!(sample_pdf());

    let config = ConversionConfig::builder()
        .pages(PageSelection::Single(40))
        .build()
        .unwrap();
    let result = convert(&path, &config).await;
    assert!(matches!(
        result,
        Err(Pdf2PngError::PageOutOfRange { page: 40, total: 3 })
    ));
}

#[tokio::test]
async fn test_stream_yields_pages_in_order() {
    let path = e2e_skip_unless_ready!(sample_pdf());

    let stream = convert_file_stream(&path, &fast_config(OutputMode::Archive))
        .await
        .expect("stream should open");
    let pages: Vec<usize> = stream
        .map(|item| item.expect("page should encode").page_num)
        .collect()
        .await;
    assert_eq!(pages, [1, 2, 3]);
}

// ── Page-selection unit tests (no pdfium) ────────────────────────────────────

#[test]
fn test_page_selection_out_of_range_is_empty() {
    assert_eq!(
        PageSelection::Single(100).to_indices(4),
        Vec::<usize>::new()
    );
}

#[test]
fn test_page_selection_range_clipping() {
    // Range 3-10 on a 4-page doc → pages 3 and 4 (indices 2, 3)
    let indices = PageSelection::Range(3, 10).to_indices(4);
    assert_eq!(indices, vec![2, 3]);
}

/// A callback must be shareable with the worker thread that runs the pages.
#[test]
fn test_callback_is_send_sync() {
    use pdf2png::{ConversionProgressCallback, NoopProgressCallback};
    use std::sync::Arc;

    fn assert_send_sync<T: Send + Sync + ?Sized>() {}
    assert_send_sync::<NoopProgressCallback>();
    assert_send_sync::<dyn ConversionProgressCallback>();

    let cb: Arc<dyn ConversionProgressCallback> = Arc::new(NoopProgressCallback);
    std::thread::spawn(move || cb.on_page_error(1, 1, "an error"))
        .join()
        .unwrap();
}
