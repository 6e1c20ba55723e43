//! CLI binary for deck-digest.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `DigestConfig`, resolves the API key, and prints the digest.

use anyhow::{Context, Result};
use clap::Parser;
use deck_digest::digest::write_atomic;
use deck_digest::{
    summarize_deck, DigestConfig, DigestProgressCallback, DigestRequest, DigestStage,
    OutputFormat, ProgressCallback, ProviderKind, RasterBackend, ThumbnailMode,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner while the deck is rendered and rasterised, then a bar with one
/// log line per slide. Slides may finish out of order with `--concurrency`.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening deck…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    /// Switch to the full bar once the slide count is known.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} slides  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Summarising");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, slide: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&slide))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl DigestProgressCallback for CliProgressCallback {
    fn on_run_start(&self, deck_name: &str) {
        self.bar.set_message(deck_name.to_string());
    }

    fn on_stage(&self, stage: DigestStage) {
        match stage {
            DigestStage::Rendering => self.bar.set_prefix("Rendering"),
            DigestStage::Rasterizing => self.bar.set_prefix("Rasterising"),
            DigestStage::Summarizing => {}
        }
    }

    fn on_slide_start(&self, slide: usize, total: usize) {
        if self.bar.length() != Some(total as u64) {
            self.activate_bar(total);
        }
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(slide, Instant::now());
        }
        self.bar.set_message(format!("slide {slide}"));
    }

    fn on_slide_complete(&self, slide: usize, total: usize, summary_len: usize) {
        let secs = self.elapsed_secs(slide);
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            slide,
            total,
            dim(&format!("{summary_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_slide_error(&self, slide: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(slide);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            format!("{}…", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}  {}",
            red("✗"),
            slide,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total: usize, failed: usize) {
        self.bar.finish_and_clear();
        let done = total.saturating_sub(failed);
        if failed == 0 {
            eprintln!(
                "{} {} slides summarised",
                green("✔"),
                bold(&done.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} slides summarised  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&done.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Concise summaries with OpenAI (stdout)
  deckdigest quarterly.pptx

  # Bullet points with Gemini, written to a Markdown file
  deckdigest --provider gemini --style bullet-points talk.odp -o talk.md

  # Deck from a URL, JSON with embedded thumbnails
  deckdigest https://example.com/deck.pptx --format json --thumbnails embed

  # Already a PDF: rendering is skipped
  deckdigest slides.pdf --rasterizer pdftoppm

SUPPORTED DECKS:
  .ppt .pptx .pps .ppsx .odp .key .pdf

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY      OpenAI API key (or --openai-key)
  GEMINI_API_KEY      Google Gemini API key (or --gemini-key)
  PDFIUM_LIB_PATH     libpdfium file or directory for the pdfium rasteriser
  DECKDIGEST_*        Fallback for most flags, e.g. DECKDIGEST_PROVIDER
  RUST_LOG            Overrides the log filter

REQUIRED PROGRAMS:
  soffice (LibreOffice) for non-PDF decks, tesseract for OCR, and either
  libpdfium or pdftoppm (poppler-utils) for rasterising.

A .env file in the working directory is loaded before flags are parsed.
"#;

/// Summarise presentation decks slide by slide.
#[derive(Parser, Debug)]
#[command(
    name = "deckdigest",
    version,
    about = "Summarise presentation decks slide by slide with OpenAI or Gemini",
    long_about = "Render a deck to PDF with LibreOffice, rasterise each slide, read it back \
with tesseract, and ask OpenAI or Google Gemini for one summary per slide.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Deck path (.pptx, .ppt, .odp, .key, .pdf, …) or HTTP/HTTPS URL.
    input: String,

    /// Write the digest to this file instead of stdout.
    #[arg(short, long, env = "DECKDIGEST_OUTPUT")]
    output: Option<PathBuf>,

    /// Summarisation provider: openai or gemini.
    #[arg(long, env = "DECKDIGEST_PROVIDER", default_value = "openai")]
    provider: String,

    /// Summary style: concise, detailed or bullet-points.
    #[arg(long, env = "DECKDIGEST_STYLE", default_value = "concise")]
    style: String,

    /// OpenAI API key.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_key: Option<String>,

    /// Google Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_key: Option<String>,

    /// OpenAI chat model.
    #[arg(long, env = "DECKDIGEST_OPENAI_MODEL")]
    openai_model: Option<String>,

    /// Gemini model (with or without the `models/` prefix).
    #[arg(long, env = "DECKDIGEST_GEMINI_MODEL")]
    gemini_model: Option<String>,

    /// OpenAI-compatible base URL.
    #[arg(long, env = "DECKDIGEST_OPENAI_BASE_URL")]
    openai_base_url: Option<String>,

    /// Gemini API base URL.
    #[arg(long, env = "DECKDIGEST_GEMINI_BASE_URL")]
    gemini_base_url: Option<String>,

    /// Output format: text, markdown or json.
    #[arg(long, env = "DECKDIGEST_FORMAT", default_value = "text")]
    format: String,

    /// Rasterisation DPI (72–600).
    #[arg(long, env = "DECKDIGEST_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Rasteriser backend: pdfium or pdftoppm.
    #[arg(long, env = "DECKDIGEST_RASTERIZER", default_value = "pdfium")]
    rasterizer: String,

    /// LibreOffice program used to render decks.
    #[arg(long, env = "DECKDIGEST_SOFFICE")]
    soffice: Option<String>,

    /// pdftoppm program, for `--rasterizer pdftoppm`.
    #[arg(long, env = "DECKDIGEST_PDFTOPPM")]
    pdftoppm: Option<String>,

    /// Tesseract program.
    #[arg(long, env = "DECKDIGEST_TESSERACT")]
    tesseract: Option<String>,

    /// OCR languages, e.g. `eng` or `eng+deu`.
    #[arg(long, env = "DECKDIGEST_LANG", default_value = "eng")]
    lang: String,

    /// Slides summarised at once. 1 keeps the inter-call delay.
    #[arg(short, long, env = "DECKDIGEST_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Pause between consecutive provider calls, in milliseconds.
    #[arg(long, env = "DECKDIGEST_DELAY_MS", default_value_t = 1000)]
    delay_ms: u64,

    /// Wait before retrying a rate-limited call, in milliseconds.
    #[arg(long, env = "DECKDIGEST_BACKOFF_MS", default_value_t = 5000)]
    backoff_ms: u64,

    /// Retries after a rate limit (0–3).
    #[arg(long, env = "DECKDIGEST_RATE_LIMIT_RETRIES", default_value_t = 1)]
    rate_limit_retries: u32,

    /// LibreOffice conversion timeout in seconds.
    #[arg(long, env = "DECKDIGEST_RENDER_TIMEOUT", default_value_t = 180)]
    render_timeout: u64,

    /// Per-slide OCR timeout in seconds.
    #[arg(long, env = "DECKDIGEST_OCR_TIMEOUT", default_value_t = 60)]
    ocr_timeout: u64,

    /// Per-call provider timeout in seconds.
    #[arg(long, env = "DECKDIGEST_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout for URL decks, in seconds.
    #[arg(long, env = "DECKDIGEST_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Max output tokens per summary.
    #[arg(long, env = "DECKDIGEST_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: u32,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "DECKDIGEST_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "DECKDIGEST_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Parent directory for the temporary working area.
    #[arg(long, env = "DECKDIGEST_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Thumbnails: none, embed, or a directory to copy slide images into.
    #[arg(long, env = "DECKDIGEST_THUMBNAILS", default_value = "none")]
    thumbnails: String,

    /// Disable progress bar.
    #[arg(long, env = "DECKDIGEST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DECKDIGEST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DECKDIGEST_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Before parsing, so `.env` values feed the `env = …` fallbacks.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress;
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

    // ── Request ──────────────────────────────────────────────────────────
    // Validated before any file or network access.
    let key = cli
        .provider
        .parse::<ProviderKind>()
        .ok()
        .and_then(|kind| match kind {
            ProviderKind::OpenAi => cli.openai_key.as_deref(),
            ProviderKind::Gemini => cli.gemini_key.as_deref(),
        });
    let request = DigestRequest::parse(&cli.input, &cli.provider, &cli.style, key)?;
    let format: OutputFormat = cli.format.parse()?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn DigestProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Run ──────────────────────────────────────────────────────────────
    let digest = summarize_deck(&request, &config)
        .await
        .context("Digest failed")?;
    let rendered = digest.render(format).context("Failed to render digest")?;

    if let Some(ref output_path) = cli.output {
        write_atomic(output_path, &rendered)
            .await
            .with_context(|| format!("Failed to write {}", output_path.display()))?;
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(rendered.as_bytes())
            .context("Failed to write to stdout")?;
        if !rendered.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    let stats = &digest.stats;
    if !cli.quiet {
        if !show_progress {
            eprintln!(
                "Summarised {}/{} slides in {}ms ({} without text)",
                stats.summarized_slides,
                stats.total_slides,
                stats.total_duration_ms,
                stats.empty_slides
            );
        }
        if let Some(ref output_path) = cli.output {
            eprintln!(
                "{}  →  {}",
                if stats.failed_slides == 0 { green("✔") } else { cyan("⚠") },
                bold(&output_path.display().to_string()),
            );
        }
        eprintln!(
            "   {} tokens in  /  {} tokens out  /  {} rate-limit retries",
            dim(&stats.total_input_tokens.to_string()),
            dim(&stats.total_output_tokens.to_string()),
            dim(&stats.rate_limit_retries.to_string()),
        );
    }
    // Partial failures still exit 0; the count always reaches stderr.
    if stats.failed_slides > 0 && (cli.quiet || !show_progress) {
        eprintln!(
            "{} of {} slides failed",
            stats.failed_slides, stats.total_slides
        );
    }

    Ok(())
}

/// Map CLI args to `DigestConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<DigestConfig> {
    let rasterizer: RasterBackend = cli.rasterizer.parse()?;
    let thumbnails = parse_thumbnails(&cli.thumbnails);

    let mut builder = DigestConfig::builder()
        .dpi(cli.dpi)
        .rasterizer(rasterizer)
        .ocr_languages(&cli.lang)
        .concurrency(cli.concurrency)
        .call_delay_ms(cli.delay_ms)
        .rate_limit_backoff_ms(cli.backoff_ms)
        .max_rate_limit_retries(cli.rate_limit_retries)
        .render_timeout_secs(cli.render_timeout)
        .ocr_timeout_secs(cli.ocr_timeout)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .thumbnails(thumbnails);

    if let Some(ref p) = cli.soffice {
        builder = builder.soffice_program(p);
    }
    if let Some(ref p) = cli.pdftoppm {
        builder = builder.pdftoppm_program(p);
    }
    if let Some(ref p) = cli.tesseract {
        builder = builder.tesseract_program(p);
    }
    if let Some(ref m) = cli.openai_model {
        builder = builder.openai_model(m);
    }
    if let Some(ref m) = cli.gemini_model {
        builder = builder.gemini_model(m);
    }
    if let Some(ref u) = cli.openai_base_url {
        builder = builder.openai_base_url(u);
    }
    if let Some(ref u) = cli.gemini_base_url {
        builder = builder.gemini_base_url(u);
    }
    if let Some(ref dir) = cli.work_dir {
        builder = builder.work_dir(dir);
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--thumbnails`: `none`, `embed`, or an export directory.
fn parse_thumbnails(s: &str) -> ThumbnailMode {
    match s.trim().to_lowercase().as_str() {
        "" | "none" | "reference" => ThumbnailMode::Reference,
        "embed" => ThumbnailMode::Embed {
            max_width: ThumbnailMode::DEFAULT_EMBED_WIDTH,
        },
        _ => ThumbnailMode::Export(PathBuf::from(s.trim())),
    }
}
