//! CLI binary for intake-extract.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `BatchConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use intake_extract::{
    extract_batch, preflight, process_directory, BatchConfig, BatchProgressCallback, OcrBackend,
    ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per image.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start time of the image currently being processed.
    current: Mutex<Option<(String, Instant)>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Listing images…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            current: Mutex::new(None),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    /// Take the current image's name and elapsed seconds.
    fn finish_current(&self) -> (String, f64) {
        self.current
            .lock()
            .ok()
            .and_then(|mut c| c.take())
            .map(|(name, t)| (name, t.elapsed().as_secs_f64()))
            .unwrap_or_default()
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_images: usize) {
        self.activate_bar(total_images);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_images} images…"))
        ));
    }

    fn on_image_start(&self, _index: usize, _total: usize, name: &str) {
        if let Ok(mut c) = self.current.lock() {
            *c = Some((name.to_string(), Instant::now()));
        }
        self.bar.set_message(name.to_string());
    }

    fn on_image_complete(&self, index: usize, total: usize, record_count: usize) {
        let (name, secs) = self.finish_current();
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<28}  {}  {}",
            green("✓"),
            index,
            total,
            name,
            dim(&format!("{record_count:>3} rows")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, index: usize, total: usize, error: &str) {
        let (_, secs) = self.finish_current();

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_images: usize, success_count: usize, record_count: usize) {
        let failed = total_images.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} images → {} rows",
                green("✔"),
                bold(&success_count.to_string()),
                bold(&record_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} images → {} rows  ({} skipped)",
                if failed == total_images {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_images,
                bold(&record_count.to_string()),
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Scan a directory of forms into a CSV file
  intake2table uploads/session-1 -o patients.csv

  # Tab-separated or JSON output (picked from the extension)
  intake2table uploads/session-1 -o patients.tsv
  intake2table uploads/session-1 -o patients.xlsx
  intake2table uploads/session-1 -o patients.json

  # Let the LLM read the scans instead of Google Vision
  intake2table --ocr vision-model --model gpt-4o uploads/session-1

  # Print records and per-image results as JSON, write nothing
  intake2table --json uploads/session-1 > batch.json

SUPPORTED IMAGES:
  .jpg  .jpeg  .png  .tiff   (case-insensitive, processed in file-name order)

OUTPUT COLUMNS:
  Name | Phone | Email | CPF | Date of Birth | Address
  A patient with several phone numbers gets one row per number.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (default provider, model gpt-4o-mini)
  ANTHROPIC_API_KEY       Anthropic API key
  GOOGLE_VISION_API_KEY   Google Cloud Vision API key (default OCR backend)
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Override log filter (e.g. intake_extract=debug)
"#;

/// Extract patient records from scanned intake forms.
#[derive(Parser, Debug)]
#[command(
    name = "intake2table",
    version,
    about = "Extract patient records from scanned dental-intake forms",
    long_about = "Run every image in a directory through OCR and an LLM, parse the \
resulting tables into patient records and save them as one CSV, TSV or JSON file. \
Images that fail at any stage are skipped and reported; the rest of the batch still runs.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory containing the scanned forms.
    input_dir: PathBuf,

    /// Output file; the extension (.csv, .tsv, .json, .xlsx) picks the format.
    #[arg(short, long, env = "INTAKE_OUTPUT", default_value = "patients.csv")]
    output: PathBuf,

    /// LLM model ID (e.g. gpt-4o-mini, gpt-4o, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// OCR backend.
    #[arg(long, env = "INTAKE_OCR", value_enum, default_value = "google-vision")]
    ocr: OcrArg,

    /// Google Cloud Vision API key.
    #[arg(long, env = "GOOGLE_VISION_API_KEY", hide_env_values = true)]
    google_api_key: Option<String>,

    /// Google Cloud Vision annotate URL.
    #[arg(long, env = "INTAKE_VISION_ENDPOINT")]
    vision_endpoint: Option<String>,

    /// Max LLM output tokens per call.
    #[arg(long, env = "INTAKE_MAX_TOKENS", default_value_t = 16384)]
    max_tokens: usize,

    /// Print records and per-image results as JSON instead of writing a file.
    #[arg(long, env = "INTAKE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "INTAKE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "INTAKE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "INTAKE_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OcrArg {
    GoogleVision,
    VisionModel,
}

impl From<OcrArg> for OcrBackend {
    fn from(v: OcrArg) -> Self {
        match v {
            OcrArg::GoogleVision => OcrBackend::GoogleVision,
            OcrArg::VisionModel => OcrBackend::VisionModel,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level per-image logs.
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

    // ── Build config + check credentials ─────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;
    preflight(&config).context("Service configuration failed")?;

    // ── JSON mode ────────────────────────────────────────────────────────
    if cli.json {
        let output = extract_batch(&cli.input_dir, &config)
            .await
            .context("Batch failed")?;
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{json}").context("Failed to write to stdout")?;
        return Ok(());
    }

    // ── Run batch ────────────────────────────────────────────────────────
    let report = process_directory(&cli.input_dir, &cli.output, &config)
        .await
        .context("Batch failed")?;

    if !cli.quiet {
        let stats = &report.stats;
        match report.output_path {
            Some(ref path) => eprintln!(
                "{}  {}/{} images  {} rows  {}ms  →  {}",
                if stats.failed_images == 0 {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                stats.processed_images,
                stats.total_images,
                stats.total_records,
                stats.total_duration_ms,
                bold(&path.display().to_string()),
            ),
            None => eprintln!(
                "{}  nothing to save  {}",
                cyan("⚠"),
                dim(&format!(
                    "({} of {} images produced records)",
                    stats.processed_images, stats.total_images
                )),
            ),
        }
    }

    Ok(())
}

/// Map CLI args to `BatchConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<BatchConfig> {
    let mut builder = BatchConfig::builder()
        .ocr_backend(cli.ocr.clone().into())
        .max_tokens(cli.max_tokens);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref key) = cli.google_api_key {
        builder = builder.google_api_key(key);
    }
    if let Some(ref url) = cli.vision_endpoint {
        builder = builder.vision_endpoint(url);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
