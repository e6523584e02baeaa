//! CLI binary for comic-ingest.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `IngestConfig`, runs one request or the HTTP server, and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comic_ingest::{
    AcquisitionOutput, AcquisitionProgressCallback, Acquirer, IngestConfig, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner while the page renders, then a bar over the candidates with one
/// log line per translated or skipped image.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Rendering");
        bar.set_message("Loading page…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>2}/{len} images  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Translating");
        self.bar.reset_eta();
    }

    fn skipped(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }

    fn elapsed_secs(&self, ordinal: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&ordinal))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl AcquisitionProgressCallback for CliProgressCallback {
    fn on_acquisition_start(&self, total_candidates: usize) {
        self.activate_bar(total_candidates);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Translating {total_candidates} image(s)…"))
        ));
    }

    fn on_candidate_start(&self, ordinal: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(ordinal, Instant::now());
        }
        self.bar.set_message(format!("image {}", ordinal + 1));
    }

    fn on_candidate_complete(&self, ordinal: usize, total: usize, url: &str) {
        let secs = self.elapsed_secs(ordinal);
        self.bar.println(format!(
            "  {} {}  {}  {}",
            green("✓"),
            image_label(ordinal, total),
            dim(url),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_candidate_error(&self, ordinal: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(ordinal);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {}  {}  {}",
            red("✗"),
            image_label(ordinal, total),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_acquisition_complete(&self, total: usize, success_count: usize) {
        let failed = self.skipped();
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} image(s) translated",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} image(s) translated  ({} skipped)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

/// 1-based position shown to the user; callbacks report 0-based ordinals.
fn image_label(ordinal: usize, total: usize) -> String {
    format!("Image {:>2}/{:<2}", ordinal + 1, total)
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Translate the pages of a chapter (first 5 tall images)
  comic-ingest scrape https://manga.example/chapter/12

  # Translate one local scan
  comic-ingest upload ./scan-04.png

  # Structured output
  comic-ingest --json scrape https://manga.example/chapter/12 > out.json

  # Run the HTTP API on :5000
  comic-ingest serve --bind 0.0.0.0:5000

ENVIRONMENT VARIABLES:
  COMIC_INGEST_UPLOADS_ROOT   Directory for uploads and session folders
  COMIC_INGEST_PUBLIC_BASE    Origin the /uploads URLs are built on
  COMIC_INGEST_WORKER_URL     Translation worker endpoint
  COMIC_INGEST_CHROME         Chrome/Chromium executable
  RUST_LOG                    Overrides the log filter

The translation worker must be running before any request is made.
"#;

/// Acquire comic pages from a URL or a file and translate them.
#[derive(Parser, Debug)]
#[command(
    name = "comic-ingest",
    version,
    about = "Acquire comic pages and send them through the translation worker",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    common: CommonArgs,

    /// Output structured JSON (AcquisitionOutput) instead of URL lines.
    #[arg(long, global = true, env = "COMIC_INGEST_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "COMIC_INGEST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "COMIC_INGEST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "COMIC_INGEST_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a page and translate its images (or a screenshot of it).
    Scrape {
        /// Absolute http(s) URL of the page.
        url: String,
    },
    /// Copy a local image into the uploads root and translate it.
    Upload {
        /// Path to the image.
        file: PathBuf,
    },
    /// Run the HTTP API.
    Serve {
        /// Address to listen on.
        #[arg(long, env = "COMIC_INGEST_BIND", default_value = "0.0.0.0:5000")]
        bind: SocketAddr,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Directory holding uploads and per-request session folders.
    #[arg(long, global = true, env = "COMIC_INGEST_UPLOADS_ROOT", default_value = "uploads")]
    uploads_root: PathBuf,

    /// Origin under which /uploads is publicly reachable.
    #[arg(
        long,
        global = true,
        env = "COMIC_INGEST_PUBLIC_BASE",
        default_value = "http://localhost:5000"
    )]
    public_base: String,

    /// Translation worker endpoint.
    #[arg(
        long,
        global = true,
        env = "COMIC_INGEST_WORKER_URL",
        default_value = "http://127.0.0.1:8000/process"
    )]
    worker_url: String,

    /// Per-call worker timeout in seconds (0 = wait indefinitely).
    #[arg(long, global = true, env = "COMIC_INGEST_WORKER_TIMEOUT", default_value_t = 0)]
    worker_timeout: u64,

    /// Image download timeout in seconds.
    #[arg(long, global = true, env = "COMIC_INGEST_FETCH_TIMEOUT", default_value_t = 10)]
    fetch_timeout: u64,

    /// Page navigation timeout in seconds.
    #[arg(long, global = true, env = "COMIC_INGEST_NAV_TIMEOUT", default_value_t = 60)]
    nav_timeout: u64,

    /// Maximum number of discovered images to translate.
    #[arg(long, global = true, env = "COMIC_INGEST_MAX_IMAGES", default_value_t = 5,
          value_parser = clap::value_parser!(u64).range(1..=100))]
    max_images: u64,

    /// Only images taller than this many pixels qualify.
    #[arg(long, global = true, env = "COMIC_INGEST_MIN_HEIGHT", default_value_t = 500)]
    min_height: u32,

    /// Images fetched and translated at once.
    #[arg(short, long, global = true, env = "COMIC_INGEST_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Chrome/Chromium executable (searched on PATH if unset).
    #[arg(long, global = true, env = "COMIC_INGEST_CHROME")]
    chrome: Option<PathBuf>,

    /// Show the browser window.
    #[arg(long, global = true, env = "COMIC_INGEST_HEADFUL")]
    headful: bool,

    /// Accept downloads that do not look like images.
    #[arg(long, global = true, env = "COMIC_INGEST_NO_VERIFY")]
    no_verify: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let serving = matches!(cli.command, Command::Serve { .. });

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs for one-shot requests.
    let show_progress = !serving && !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn AcquisitionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli.common, progress_cb)?;

    let acquirer = Arc::new(Acquirer::new(config).context("Failed to set up pipeline")?);
    acquirer
        .init()
        .await
        .context("Failed to prepare uploads root")?;

    // ── Dispatch ─────────────────────────────────────────────────────────
    match cli.command {
        Command::Serve { bind } => {
            let listener = tokio::net::TcpListener::bind(bind)
                .await
                .with_context(|| format!("Failed to bind {bind}"))?;
            if !cli.quiet {
                eprintln!("{} serving on {}", cyan("◆"), bold(&format!("http://{bind}")));
            }
            comic_ingest::server::serve(listener, acquirer)
                .await
                .context("Server stopped")?;
        }
        Command::Scrape { url } => {
            let output = acquirer.scrape(&url).await.context("Scraping failed")?;
            report(&output, cli.json, cli.quiet, show_progress)?;
        }
        Command::Upload { file } => {
            let stored = acquirer
                .store()
                .adopt_upload(&file)
                .await
                .with_context(|| format!("Failed to store {}", file.display()))?;
            let output = acquirer.upload(&stored).await.context("Translation failed")?;
            report(&output, cli.json, cli.quiet, show_progress)?;
        }
    }

    Ok(())
}

/// Print URLs (or JSON) to stdout and a summary to stderr.
fn report(output: &AcquisitionOutput, json: bool, quiet: bool, show_progress: bool) -> Result<()> {
    if json {
        let json = serde_json::to_string_pretty(output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    for url in &output.images {
        println!("{url}");
    }

    // The callback already printed the final tick when the bar was shown.
    if !quiet && !show_progress {
        eprintln!(
            "Translated {}/{} image(s) in {}ms",
            output.stats.succeeded, output.stats.attempted, output.stats.total_duration_ms
        );
    }
    if !quiet {
        for failure in &output.failures {
            eprintln!("  {} {}", dim("skipped"), failure);
        }
        if output.images.is_empty() {
            eprintln!("{} no images could be translated", red("✘"));
        }
    }
    Ok(())
}

/// Map CLI args to `IngestConfig`.
fn build_config(args: &CommonArgs, progress: Option<ProgressCallback>) -> Result<IngestConfig> {
    let mut builder = IngestConfig::builder()
        .uploads_root(&args.uploads_root)
        .public_base_url(&args.public_base)
        .worker_endpoint(&args.worker_url)
        .worker_timeout_secs(Some(args.worker_timeout))
        .fetch_timeout_secs(args.fetch_timeout)
        .navigation_timeout_secs(args.nav_timeout)
        .max_candidates(args.max_images as usize)
        .min_image_height(args.min_height)
        .concurrency(args.concurrency)
        .headful(args.headful)
        .verify_image_format(!args.no_verify);

    if let Some(ref exe) = args.chrome {
        builder = builder.chrome_executable(exe);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
