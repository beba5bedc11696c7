//! Download trigger: hand finished artifacts to a save target.
//!
//! [`DownloadSink`] is the seam between the pipeline and wherever files end
//! up. [`DirectorySink`] writes into a directory through a temp file and a
//! rename, so a reader never observes a half-written PNG or zip; the temp
//! file is removed if the save fails.
//!
//! Saving many files in quick succession is spaced by a fixed delay, the same
//! cadence the multi-file output has always used.

use crate::error::Pdf2PngError;
use crate::output::EncodedImage;
use crate::pipeline::archive::Archive;
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Something that can save a named blob.
pub trait DownloadSink: Send + Sync {
    /// Save `bytes` under `file_name`, returning where it landed.
    fn save<'a>(
        &'a self,
        file_name: &'a str,
        bytes: &'a [u8],
    ) -> BoxFuture<'a, Result<PathBuf, Pdf2PngError>>;
}

/// Saves into a directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirectorySink {
    fn save<'a>(
        &'a self,
        file_name: &'a str,
        bytes: &'a [u8],
    ) -> BoxFuture<'a, Result<PathBuf, Pdf2PngError>> {
        Box::pin(async move {
            let path = self.dir.join(file_name);
            let write_err = |source| Pdf2PngError::OutputWriteFailed {
                path: path.clone(),
                source,
            };

            tokio::fs::create_dir_all(&self.dir)
                .await
                .map_err(write_err)?;

            // Atomic write: write to temp, then rename
            let tmp_path = path.with_extension("part");
            if let Err(e) = tokio::fs::write(&tmp_path, bytes).await {
                let _ = tokio::fs::remove_file(&tmp_path).await;
                return Err(write_err(e));
            }
            if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
                let _ = tokio::fs::remove_file(&tmp_path).await;
                return Err(write_err(e));
            }

            debug!("Saved {} ({} bytes)", path.display(), bytes.len());
            Ok(path)
        })
    }
}

/// The artifact a ready run offers for download.
#[derive(Debug, Clone)]
pub enum Download {
    /// One zip holding every page.
    Archive(Archive),
    /// One PNG per page, saved individually.
    Images(Vec<EncodedImage>),
}

impl Download {
    /// File names this download will produce, in save order.
    pub fn file_names(&self) -> Vec<&str> {
        match self {
            Download::Archive(archive) => vec![archive.name()],
            Download::Images(images) => images.iter().map(|i| i.name.as_str()).collect(),
        }
    }
}

/// Save a download through `sink`.
///
/// Images are saved one after another with `spacing` between consecutive
/// saves. Returns the saved paths in order.
pub async fn trigger(
    download: Download,
    sink: &dyn DownloadSink,
    spacing: Duration,
) -> Result<Vec<PathBuf>, Pdf2PngError> {
    match download {
        Download::Archive(archive) => {
            let path = sink.save(archive.name(), archive.bytes()).await?;
            info!("Saved archive {}", path.display());
            Ok(vec![path])
        }
        Download::Images(images) => {
            let mut saved = Vec::with_capacity(images.len());
            for (i, image) in images.iter().enumerate() {
                if i > 0 && !spacing.is_zero() {
                    tokio::time::sleep(spacing).await;
                }
                let png = image.payload.png_bytes().ok_or_else(|| {
                    Pdf2PngError::Internal(format!("malformed data URL for {}", image.name))
                })?;
                saved.push(sink.save(&image.name, &png).await?);
            }
            info!("Saved {} images", saved.len());
            Ok(saved)
        }
    }
}
