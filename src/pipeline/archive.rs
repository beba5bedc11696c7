//! Archive assembly: pack encoded pages into a single in-memory zip.
//!
//! The whole archive materialises in memory before it is handed to the
//! download trigger; there is no partial or streaming output. The practical
//! document size is bounded by available memory.

use crate::error::Pdf2PngError;
use std::collections::HashSet;
use std::fmt;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Archive entry name for a page: `page-<NNN>.png`.
///
/// Zero-padded to 3 digits. Documents with more than 999 pages pad to the
/// digit count of `total_pages` instead, so entry names keep sorting in page
/// order.
pub fn entry_name(page_num: usize, total_pages: usize) -> String {
    let width = total_pages.max(1).to_string().len().max(3);
    format!("page-{page_num:0width$}.png")
}

/// Download name of the archive: the source file name with its last
/// extension replaced by `_images.zip`.
pub fn archive_name_for(source_name: &str) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string());
    format!("{stem}_images.zip")
}

/// A finalized zip archive.
///
/// Only [`ArchiveBuilder::finish`] creates one, and it exposes no mutators.
#[derive(Clone, PartialEq, Eq)]
pub struct Archive {
    name: String,
    bytes: Vec<u8>,
    entries: Vec<String>,
}

impl fmt::Debug for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .field("entries", &self.entries)
            .finish()
    }
}

impl Archive {
    /// Download file name, e.g. `report_images.zip`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The zip file bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Entry names in insertion order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Accumulates named PNG entries and finalizes them into one [`Archive`].
pub struct ArchiveBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    names: HashSet<String>,
    entries: Vec<String>,
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            names: HashSet::new(),
            entries: Vec::new(),
        }
    }

    /// Add one entry. Names must be unique within the archive.
    pub fn add(&mut self, name: &str, bytes: &[u8]) -> Result<(), Pdf2PngError> {
        if !self.names.insert(name.to_string()) {
            return Err(Pdf2PngError::Archive(format!("duplicate entry '{name}'")));
        }

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.writer
            .start_file(name, options)
            .map_err(|e| Pdf2PngError::Archive(format!("failed to add '{name}': {e}")))?;
        self.writer
            .write_all(bytes)
            .map_err(|e| Pdf2PngError::Archive(format!("failed to write '{name}': {e}")))?;

        self.entries.push(name.to_string());
        Ok(())
    }

    /// Number of entries added so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the central directory and return the immutable archive.
    pub fn finish(self, archive_name: impl Into<String>) -> Result<Archive, Pdf2PngError> {
        let cursor = self
            .writer
            .finish()
            .map_err(|e| Pdf2PngError::Archive(format!("failed to finalize archive: {e}")))?;

        let archive = Archive {
            name: archive_name.into(),
            bytes: cursor.into_inner(),
            entries: self.entries,
        };
        debug!(
            "Archive '{}' finalized: {} entries, {} bytes",
            archive.name,
            archive.entries.len(),
            archive.bytes.len()
        );
        Ok(archive)
    }
}
