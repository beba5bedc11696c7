//! Command interface for interactive front ends.
//!
//! A [`Session`] owns at most one run at a time. Front ends drive it with
//! three commands and never touch pipeline state directly:
//!
//! - [`Session::on_file_selected`] starts a run and returns its [`RunHandle`]
//! - [`Session::on_cancel`] requests cooperative cancellation
//! - [`Session::on_progress`] reads the run's current [`Status`]
//!
//! Selecting a new file cancels the previous run and hides its download, so a
//! slow stale run can never publish into the new one: every run writes only to
//! its own status channel.

use crate::config::ConversionConfig;
use crate::convert::{self, RunContext};
use crate::error::Pdf2PngError;
use crate::output::{ConversionOutput, ConversionStats};
use crate::pipeline::download::{self, Download, DownloadSink};
use crate::pipeline::input::SourceDocument;
use crate::pipeline::render::{PdfiumRasterizer, Rasterizer};
use crate::progress::Status;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Caller-side handle to one run.
///
/// Cheap to clone; every clone observes the same run.
#[derive(Debug, Clone)]
pub struct RunHandle {
    id: u64,
    status: watch::Receiver<Status>,
    cancel: Arc<AtomicBool>,
}

impl RunHandle {
    /// Session-unique run number, starting at 1.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Snapshot of the run's status.
    pub fn status(&self) -> Status {
        self.status.borrow().clone()
    }

    /// Ask the run to stop before its next page.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Wait until the status changes, returning the new value.
    ///
    /// Returns `None` once the run has finished and no further change can
    /// arrive.
    pub async fn changed(&mut self) -> Option<Status> {
        self.status.changed().await.ok()?;
        Some(self.status.borrow_and_update().clone())
    }
}

type RunTask = JoinHandle<Result<ConversionOutput, Pdf2PngError>>;

/// One document at a time, from selection to download.
pub struct Session {
    config: ConversionConfig,
    rasterizer: Arc<dyn Rasterizer>,
    current: Option<RunHandle>,
    task: Option<RunTask>,
    ready: Option<Download>,
    next_id: u64,
}

impl Session {
    /// Session backed by pdfium, bound per `config.pdfium_library_path`.
    pub fn new(config: ConversionConfig) -> Self {
        let rasterizer = PdfiumRasterizer::with_library_path(config.pdfium_library_path.clone());
        Self::with_rasterizer(config, Arc::new(rasterizer))
    }

    pub fn with_rasterizer(config: ConversionConfig, rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self {
            config,
            rasterizer,
            current: None,
            task: None,
            ready: None,
            next_id: 1,
        }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Start converting `source`.
    ///
    /// The source is validated before anything else happens: an invalid
    /// selection returns [`Pdf2PngError::InvalidInput`] (or `NotAPdf`) and
    /// leaves the current run, its status and any ready download untouched.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_file_selected(&mut self, source: SourceDocument) -> Result<RunHandle, Pdf2PngError> {
        source.validate()?;

        if let Some(previous) = self.current.take() {
            debug!("Superseding run {}", previous.id);
            previous.cancel();
        }
        // The superseded task keeps running until its next cancel check; it
        // only ever writes to its own channel.
        self.task = None;
        self.ready = None;

        let (ctx, status) = RunContext::new();
        let handle = RunHandle {
            id: self.next_id,
            status,
            cancel: ctx.cancel_flag(),
        };
        self.next_id += 1;

        info!("Run {} started for '{}'", handle.id, source.name());
        self.task = Some(convert::spawn_run(
            Arc::clone(&self.rasterizer),
            source,
            self.config.clone(),
            ctx,
        ));
        self.current = Some(handle.clone());
        Ok(handle)
    }

    /// Request cancellation of `run`.
    ///
    /// Takes effect between pages; a page already rendering completes first.
    pub fn on_cancel(&self, run: &RunHandle) {
        info!("Cancel requested for run {}", run.id);
        run.cancel();
    }

    /// Current status of `run`.
    pub fn on_progress(&self, run: &RunHandle) -> Status {
        run.status()
    }

    /// Status of the current run, [`Status::Idle`] when there is none.
    pub fn status(&self) -> Status {
        self.current
            .as_ref()
            .map_or(Status::Idle, RunHandle::status)
    }

    pub fn current_run(&self) -> Option<&RunHandle> {
        self.current.as_ref()
    }

    /// Wait for the current run to end.
    ///
    /// A run that reaches Ready leaves its download artifact in the session
    /// for [`Session::take_download`]. Cancelled runs return their stats and
    /// leave nothing to download.
    ///
    /// # Errors
    /// [`Pdf2PngError::NoActiveRun`] when no run is pending; otherwise the
    /// run's fatal error, if any.
    pub async fn finish(&mut self) -> Result<ConversionStats, Pdf2PngError> {
        let task = self.task.take().ok_or(Pdf2PngError::NoActiveRun)?;
        let output = convert::join_run(task).await?;
        let stats = output.stats.clone();
        self.ready = output.into_download();
        Ok(stats)
    }

    /// Whether a finished run left something to download.
    pub fn has_download(&self) -> bool {
        self.ready.is_some()
    }

    /// Hand out the ready artifact. Yields it at most once per run.
    pub fn take_download(&mut self) -> Option<Download> {
        self.ready.take()
    }

    /// Take the ready artifact and save it through `sink`.
    ///
    /// # Errors
    /// [`Pdf2PngError::NoActiveRun`] when nothing is ready.
    pub async fn download(&mut self, sink: &dyn DownloadSink) -> Result<Vec<PathBuf>, Pdf2PngError> {
        let artifact = self.take_download().ok_or(Pdf2PngError::NoActiveRun)?;
        download::trigger(
            artifact,
            sink,
            Duration::from_millis(self.config.download_delay_ms),
        )
        .await
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("current", &self.current.as_ref().map(|r| r.id))
            .field("running", &self.task.is_some())
            .field("ready", &self.ready.is_some())
            .finish()
    }
}
