//! Input resolution: turn a user-selected file into a validated
//! [`SourceDocument`].
//!
//! A selection is accepted only when it declares the `application/pdf` MIME
//! type. Files read from disk get their MIME type from the extension, the way
//! a browser file picker reports it, and are then checked for the `%PDF`
//! magic bytes so callers get a meaningful error rather than a pdfium crash.

use crate::error::Pdf2PngError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The only MIME type the converter accepts.
pub const PDF_MIME: &str = "application/pdf";

/// Raw bytes of the uploaded PDF, owned by one conversion run.
#[derive(Clone)]
pub struct SourceDocument {
    name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

impl std::fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDocument")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl SourceDocument {
    /// Wrap in-memory bytes with the name and MIME type the user supplied.
    ///
    /// No validation happens here; see [`SourceDocument::validate`].
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Wrap bytes that are known to be a PDF.
    pub fn pdf(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(name, PDF_MIME, bytes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Reject anything that is not a non-empty `application/pdf` selection.
    pub fn validate(&self) -> Result<(), Pdf2PngError> {
        if self.mime_type != PDF_MIME {
            return Err(Pdf2PngError::InvalidInput {
                name: self.name.clone(),
                reason: format!("MIME type '{}' is not {PDF_MIME}", self.mime_type),
            });
        }
        if self.bytes.is_empty() {
            return Err(Pdf2PngError::InvalidInput {
                name: self.name.clone(),
                reason: "file is empty".into(),
            });
        }
        if self.bytes.len() >= 4 && &self.bytes[..4] != b"%PDF" {
            let mut magic = [0u8; 4];
            magic.copy_from_slice(&self.bytes[..4]);
            return Err(Pdf2PngError::NotAPdf {
                name: self.name.clone(),
                magic,
            });
        }
        Ok(())
    }
}

/// Guess a MIME type from a file extension.
pub fn mime_from_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => PDF_MIME,
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("txt") => "text/plain",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

/// Read a local file into a validated [`SourceDocument`].
pub async fn read_source(path: impl AsRef<Path>) -> Result<SourceDocument, Pdf2PngError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Pdf2PngError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Pdf2PngError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let source = SourceDocument::new(file_name(path), mime_from_path(path), bytes);
    source.validate()?;

    debug!("Read PDF '{}' ({} bytes)", source.name(), source.len());
    Ok(source)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| PathBuf::from(path).display().to_string())
}
