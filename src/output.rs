//! Result types produced by a conversion run.

use crate::config::OutputMode;
use crate::error::PageError;
use crate::pipeline::archive::Archive;
use crate::pipeline::download::Download;
use crate::pipeline::encode;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// PNG bytes in one of the two forms the encoder can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PngPayload {
    /// Self-contained `data:image/png;base64,…` string.
    DataUrl(String),
    /// Raw PNG bytes, ready to be added to an archive.
    Binary(Vec<u8>),
}

impl PngPayload {
    /// Raw PNG bytes, decoding the data URL form if needed.
    ///
    /// Returns `None` only for a malformed data URL.
    pub fn png_bytes(&self) -> Option<Cow<'_, [u8]>> {
        match self {
            PngPayload::Binary(bytes) => Some(Cow::Borrowed(bytes)),
            PngPayload::DataUrl(url) => encode::decode_data_url(url).map(Cow::Owned),
        }
    }

    /// Length of the payload as held in memory.
    pub fn len(&self) -> usize {
        match self {
            PngPayload::DataUrl(url) => url.len(),
            PngPayload::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One rendered and encoded page.
#[derive(Debug, Clone, Serialize)]
pub struct EncodedImage {
    /// 1-indexed page number.
    pub page_num: usize,
    /// File or archive entry name (`page-3.png` / `page-003.png`).
    pub name: String,
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    pub payload: PngPayload,
}

/// Document-level metadata read from the PDF info dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

impl DocumentMetadata {
    /// Metadata carrying only a page count.
    pub fn with_page_count(page_count: usize) -> Self {
        Self {
            page_count,
            ..Self::default()
        }
    }
}

/// Aggregate statistics for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Pages in the document.
    pub total_pages: usize,
    /// Pages the selection asked for.
    pub selected_pages: usize,
    /// Pages that produced an image.
    pub encoded_pages: usize,
    /// Pages skipped after a render or encode failure.
    pub failed_pages: usize,
    /// Selected pages never attempted because the run was cancelled.
    pub skipped_pages: usize,
    /// Size of the finalized archive, 0 in images mode.
    pub archive_bytes: usize,
    pub render_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    /// Name of the source file.
    pub source_name: String,
    pub mode: OutputMode,
    /// Encoded pages in ascending page order.
    ///
    /// Archive mode keeps these alongside the archive they were packed into.
    /// Streaming runs hand pages to the receiver instead and leave this empty.
    pub images: Vec<EncodedImage>,
    /// The finalized archive (archive mode, completed runs only).
    #[serde(skip)]
    pub archive: Option<Archive>,
    /// Name of the archive, when one was produced.
    pub archive_name: Option<String>,
    /// Per-page failures, in page order.
    pub page_errors: Vec<PageError>,
    pub metadata: DocumentMetadata,
    pub stats: ConversionStats,
    /// `true` when the run stopped early on request.
    pub cancelled: bool,
}

impl ConversionOutput {
    /// Turn the output into its download artifact.
    ///
    /// Cancelled runs never reach the ready state and offer no download.
    pub fn into_download(self) -> Option<Download> {
        if self.cancelled {
            return None;
        }
        match self.mode {
            OutputMode::Archive => self.archive.map(Download::Archive),
            OutputMode::Images => Some(Download::Images(self.images)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(page_num: usize) -> EncodedImage {
        EncodedImage {
            page_num,
            name: format!("page-{page_num}.png"),
            width: 1,
            height: 1,
            payload: PngPayload::Binary(vec![1, 2, 3]),
        }
    }

    #[test]
    fn binary_payload_borrows() {
        let payload = PngPayload::Binary(vec![9, 8, 7]);
        assert_eq!(payload.png_bytes().unwrap().as_ref(), &[9, 8, 7]);
        assert_eq!(payload.len(), 3);
    }

    #[test]
    fn data_url_payload_decodes() {
        let payload = PngPayload::DataUrl(encode::to_data_url(&[1, 2, 3, 4]));
        assert_eq!(payload.png_bytes().unwrap().as_ref(), &[1, 2, 3, 4]);
    }

    #[test]
    fn malformed_data_url_yields_none() {
        let payload = PngPayload::DataUrl("data:,".into());
        assert!(payload.png_bytes().is_none());
    }

    #[test]
    fn cancelled_output_has_no_download() {
        let output = ConversionOutput {
            source_name: "a.pdf".into(),
            mode: OutputMode::Images,
            images: vec![image(1)],
            archive: None,
            archive_name: None,
            page_errors: vec![],
            metadata: DocumentMetadata::with_page_count(3),
            stats: ConversionStats::default(),
            cancelled: true,
        };
        assert!(output.into_download().is_none());
    }

    #[test]
    fn images_output_downloads_every_image() {
        let output = ConversionOutput {
            source_name: "a.pdf".into(),
            mode: OutputMode::Images,
            images: vec![image(1), image(2)],
            archive: None,
            archive_name: None,
            page_errors: vec![],
            metadata: DocumentMetadata::with_page_count(2),
            stats: ConversionStats::default(),
            cancelled: false,
        };
        match output.into_download() {
            Some(Download::Images(images)) => assert_eq!(images.len(), 2),
            other => panic!("expected images download, got {other:?}"),
        }
    }

    #[test]
    fn output_serialises_without_payloads() {
        let output = ConversionOutput {
            source_name: "a.pdf".into(),
            mode: OutputMode::Images,
            images: vec![image(1)],
            archive: None,
            archive_name: None,
            page_errors: vec![],
            metadata: DocumentMetadata::with_page_count(1),
            stats: ConversionStats::default(),
            cancelled: false,
        };
        let json = serde_json::to_string(&output).unwrap();
        assert!(json.contains("page-1.png"));
        assert!(!json.contains("payload"));
    }
}
