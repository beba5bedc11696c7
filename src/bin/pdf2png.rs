//! CLI binary for pdf2png.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, drives a `Session` and saves the result.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2png::cache::{
    default_manifest,
    worker::{Url, DEFAULT_FETCH_TIMEOUT_SECS},
    CacheStorage, HttpFetcher, OfflineCacheWorker, DEFAULT_CACHE_NAME,
};
use pdf2png::pipeline::input;
use pdf2png::{
    inspect, ConversionConfig, ConversionProgressCallback, DirectorySink, OutputMode,
    PageSelection, ProgressCallback, Session, Status,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal progress callback: a live bar plus one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// The bar starts as a spinner; `on_conversion_start` sets its length.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("reading");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
    }

    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        self.bar
            .set_message(Status::Rendering { page: page_num, total: total_pages }.to_string());
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize, png_len: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total_pages,
            dim(&format!("{:>8} bytes", png_len)),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total_pages,
            red(error),
        ));
        self.bar.inc(1);
    }

    fn on_packaging(&self, entries: usize) {
        self.bar.set_prefix("Packaging");
        self.bar.set_message(format!("{entries} entries"));
    }

    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 && success_count == total_pages {
            eprintln!(
                "{} {} pages converted",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages converted  ({} failed)",
                cyan("⚠"),
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One zip with every page (default): ./report_images.zip
  pdf2png report.pdf

  # One PNG per page into ./out: page-1.png, page-2.png, ...
  pdf2png --format images -o out report.pdf

  # Higher resolution, selected pages
  pdf2png --zoom 3 --pages 2-5 report.pdf

  # Inspect PDF metadata only
  pdf2png --inspect-only report.pdf

  # Pre-fetch the front-end assets into the offline cache
  pdf2png --warm-cache --base-url https://example.org/

  # Pre-fetch specific assets
  pdf2png --warm-cache /index.html /app.js --base-url https://example.org/

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Path to an existing libpdfium
  RUST_LOG          Overrides the log filter (e.g. pdf2png=debug)

Press Ctrl-C during a conversion to stop after the current page; nothing is
saved for a cancelled run.
"#;

/// Convert PDF files into PNG images.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2png",
    version,
    about = "Convert PDF files into PNG images, one per page or as a single zip",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file to convert.
    #[arg(required_unless_present_any = ["warm_cache"])]
    input: Option<PathBuf>,

    /// Directory the PNGs or the zip are saved into.
    #[arg(short, long, env = "PDF2PNG_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Output format: one zip archive, or one PNG file per page.
    #[arg(long, env = "PDF2PNG_FORMAT", value_enum, default_value = "zip")]
    format: FormatArg,

    /// Zoom factor applied to the native page size (0.1–10).
    #[arg(long, env = "PDF2PNG_ZOOM", default_value_t = pdf2png::config::DEFAULT_ZOOM)]
    zoom: f32,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDF2PNG_PAGES", default_value = "all")]
    pages: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2PNG_PASSWORD")]
    password: Option<String>,

    /// Pause between pages, in milliseconds.
    #[arg(long, env = "PDF2PNG_PAGE_DELAY_MS",
          default_value_t = pdf2png::config::DEFAULT_PAGE_DELAY_MS)]
    page_delay_ms: u64,

    /// Pause between saved files in images format, in milliseconds.
    #[arg(long, env = "PDF2PNG_DOWNLOAD_DELAY_MS",
          default_value_t = pdf2png::config::DEFAULT_DOWNLOAD_DELAY_MS)]
    download_delay_ms: u64,

    /// Path to the pdfium shared library.
    #[arg(long, env = "PDF2PNG_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Print a JSON summary instead of human-readable output.
    #[arg(long, env = "PDF2PNG_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2PNG_NO_PROGRESS")]
    no_progress: bool,

    /// Print PDF metadata only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Fetch asset URLs into the offline cache and exit. Without URLs, the
    /// built-in front-end manifest is fetched.
    #[arg(long, num_args = 0.., value_name = "URL")]
    warm_cache: Option<Vec<String>>,

    /// Root directory of the offline cache.
    #[arg(long, env = "PDF2PNG_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Base URL that relative cache URLs are resolved against.
    #[arg(long, env = "PDF2PNG_BASE_URL")]
    base_url: Option<String>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2PNG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2PNG_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Images,
    Zip,
}

impl From<FormatArg> for OutputMode {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Images => OutputMode::Images,
            FormatArg::Zip => OutputMode::Archive,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Offline cache ────────────────────────────────────────────────────
    if let Some(ref urls) = cli.warm_cache {
        warm_cache(&cli, urls).await?;
        if cli.input.is_none() {
            return Ok(());
        }
    }

    let Some(ref input_path) = cli.input else {
        anyhow::bail!("No input PDF given");
    };

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let config = build_config(&cli, None)?;
        let meta = inspect(input_path, &config)
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", input_path.display());
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let source = input::read_source(input_path)
        .await
        .with_context(|| format!("Failed to read {}", input_path.display()))?;

    let mut session = Session::new(config);
    let run = session.on_file_selected(source).context("Invalid input")?;

    // Ctrl-C stops the run after the page in flight.
    let cancel_on_interrupt = {
        let run = run.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                run.cancel();
            }
        })
    };
    let finished = session.finish().await;
    cancel_on_interrupt.abort();
    let stats = finished.context("Conversion failed")?;

    if session.on_progress(&run) == Status::Cancelled {
        if !cli.quiet {
            eprintln!(
                "{} cancelled after {}/{} pages; nothing saved",
                red("✘"),
                stats.encoded_pages + stats.failed_pages,
                stats.selected_pages
            );
        }
        std::process::exit(130);
    }

    // ── Save ─────────────────────────────────────────────────────────────
    let sink = DirectorySink::new(&cli.output_dir);
    let saved = session.download(&sink).await.context("Failed to save output")?;

    if cli.json {
        let summary = serde_json::json!({
            "input": input_path,
            "stats": stats,
            "files": saved,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        for path in &saved {
            println!("{}", path.display());
        }
        eprintln!(
            "{}  {}/{} pages  {}ms  →  {}",
            if stats.failed_pages == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.encoded_pages,
            stats.selected_pages,
            stats.total_duration_ms,
            bold(&cli.output_dir.display().to_string()),
        );
    }

    Ok(())
}

/// Install `--warm-cache` URLs into the named offline cache.
async fn warm_cache(cli: &Cli, urls: &[String]) -> Result<()> {
    let base = cli
        .base_url
        .as_deref()
        .map(Url::parse)
        .transpose()
        .context("Invalid --base-url")?;

    let storage = match cli.cache_dir {
        Some(ref dir) => CacheStorage::new(dir),
        None => CacheStorage::default(),
    };
    let cache = storage
        .open(DEFAULT_CACHE_NAME)
        .context("Failed to open offline cache")?;
    let fetcher = HttpFetcher::new(base, Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS))
        .context("Failed to build HTTP client")?;

    let worker = OfflineCacheWorker::new(
        DEFAULT_CACHE_NAME,
        manifest_or_default(urls),
        Arc::new(cache),
        Arc::new(fetcher),
    );
    let count = worker.install().await.context("Cache install failed")?;

    if !cli.quiet {
        eprintln!(
            "{} cached {} assets in {}",
            green("✔"),
            count,
            dim(&storage.root().join(DEFAULT_CACHE_NAME).display().to_string())
        );
    }
    Ok(())
}

fn manifest_or_default(urls: &[String]) -> Vec<String> {
    if urls.is_empty() {
        default_manifest()
    } else {
        urls.to_vec()
    }
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let pages = parse_pages(&cli.pages)?;

    let mut builder = ConversionConfig::builder()
        .zoom(cli.zoom)
        .output_mode(cli.format.into())
        .pages(pages)
        .page_delay_ms(cli.page_delay_ms)
        .download_delay_ms(cli.download_delay_ms);

    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(lib.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .with_context(|| format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
        }

        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}
