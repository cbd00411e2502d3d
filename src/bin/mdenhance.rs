//! CLI binary for edgequake-md-enhance.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `EnhanceConfig`, streams progress, and prints the final JSON result on
//! stdout.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_md_enhance::{
    enhance, ChunkConfig, EnhanceConfig, EnhanceProgressCallback, ProgressCallback, ProgressUpdate,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
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
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── Progress reporting ───────────────────────────────────────────────────────

/// Writes one `PROGRESS:{json}` line per update on stdout, flushed
/// immediately so a supervising process sees it while the run continues.
struct LineProgress;

impl EnhanceProgressCallback for LineProgress {
    fn on_progress(&self, update: &ProgressUpdate) {
        let Ok(json) = serde_json::to_string(update) else {
            return;
        };
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        let _ = writeln!(handle, "PROGRESS:{json}");
        let _ = handle.flush();
    }
}

/// Terminal progress bar on stderr, one log line per finished image.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} images  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Describing");
        Arc::new(Self { bar })
    }
}

impl EnhanceProgressCallback for BarProgress {
    fn on_enhance_start(&self, total_images: usize) {
        self.bar.set_length(total_images as u64);
        self.bar.enable_steady_tick(Duration::from_millis(80));
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Describing {total_images} images…"))
        ));
    }

    fn on_image_complete(&self, completed: usize, total: usize, raw_target: &str) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}",
            green("✓"),
            completed,
            total,
            raw_target
        ));
        self.bar.inc(1);
    }

    fn on_image_failed(&self, completed: usize, total: usize, raw_target: &str) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}",
            red("✗"),
            completed,
            total,
            red(raw_target)
        ));
        self.bar.inc(1);
    }

    fn on_enhance_complete(&self, total: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = total.saturating_sub(success_count);
        if failed == 0 {
            eprintln!("{} {} images described", green("✔"), bold(&success_count.to_string()));
        } else {
            eprintln!(
                "{} {}/{} images described  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ProgressMode {
    /// `PROGRESS:{json}` lines on stdout.
    Lines,
    /// Interactive bar on stderr.
    Bar,
    /// No progress output.
    None,
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Enhance a Markdown file; JSON result on stdout
  mdenhance notes.md out/

  # A zip export (largest .md inside is used)
  mdenhance export.zip out/

  # A PDF: page text + embedded images
  mdenhance paper.pdf out/ --progress bar

  # A specific provider and model, more parallel requests
  mdenhance --provider openai --model gpt-4.1-mini -c 8 notes.md out/

OUTPUT:
  stdout   PROGRESS:{"progress":N,"message":"..."} lines, then one JSON
           document {content, images, chunks, stats}
           on failure: {"error": "..."} and exit status 1
  out/     _enhanced.md, downloaded_images/, extracted/, images/

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_PROVIDER      Provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_LLM_PROVIDER  Provider used by auto-detection (with EDGEQUAKE_MODEL)
  EDGEQUAKE_MODEL         Vision model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium; skips auto-download
  RUST_LOG                Log filter for stderr output
"#;

/// Describe every image in a document with a Vision LLM and chunk the result.
#[derive(Parser, Debug)]
#[command(
    name = "mdenhance",
    version,
    about = "Inject Vision-LLM image descriptions into Markdown and split it into RAG chunks",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input document: .md, .zip or .pdf.
    input: PathBuf,

    /// Directory for _enhanced.md and downloaded/extracted files.
    output_dir: PathBuf,

    /// Vision model ID (e.g. gpt-4.1-nano, qwen-vl-max).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Number of concurrent describe requests.
    #[arg(short, long, env = "MDENHANCE_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Max tokens per image description.
    #[arg(long, env = "MDENHANCE_MAX_TOKENS", default_value_t = 500)]
    max_tokens: usize,

    /// Describe attempts per image, including the first.
    #[arg(long, env = "MDENHANCE_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    /// Linear retry backoff unit in milliseconds.
    #[arg(long, env = "MDENHANCE_RETRY_BACKOFF_MS", default_value_t = 1000)]
    retry_backoff_ms: u64,

    /// LLM temperature (0.0–2.0). Provider default when unset.
    #[arg(long, env = "MDENHANCE_TEMPERATURE")]
    temperature: Option<f32>,

    /// Per-request describe timeout in seconds.
    #[arg(long, env = "MDENHANCE_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Remote image download timeout in seconds.
    #[arg(long, env = "MDENHANCE_DOWNLOAD_TIMEOUT", default_value_t = 30)]
    download_timeout: u64,

    /// Path to a text file containing a custom describe prompt.
    #[arg(long, env = "MDENHANCE_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Minimum trimmed length for a chunk closed by a header.
    #[arg(long, default_value_t = 50)]
    min_chunk_chars: usize,

    /// Minimum trimmed length for the final chunk.
    #[arg(long, default_value_t = 20)]
    min_final_chunk_chars: usize,

    /// Chapter label for text before the first header.
    #[arg(long, default_value = "Introduction")]
    default_chapter: String,

    /// Skip embedding probing; chunks are text-only.
    #[arg(long, env = "MDENHANCE_NO_EMBEDDINGS")]
    no_embeddings: bool,

    /// How to report progress.
    #[arg(long, value_enum, default_value = "lines")]
    progress: ProgressMode,

    /// Pretty-print the final JSON.
    #[arg(long)]
    pretty: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MDENHANCE_VERBOSE")]
    verbose: bool,

    /// Suppress all logs except errors.
    #[arg(short, long, env = "MDENHANCE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Logs go to stderr; stdout carries only progress lines and the result.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || cli.progress == ProgressMode::Bar {
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

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    if is_pdf(&cli.input) {
        ensure_pdf_engine(cli.quiet || cli.progress != ProgressMode::Bar)?;
    }

    let progress_cb: Option<ProgressCallback> = match cli.progress {
        ProgressMode::Lines => Some(Arc::new(LineProgress) as Arc<dyn EnhanceProgressCallback>),
        ProgressMode::Bar => Some(BarProgress::new() as Arc<dyn EnhanceProgressCallback>),
        ProgressMode::None => None,
    };
    let config = build_config(cli, progress_cb).await?;

    let output = enhance(&cli.input, &cli.output_dir, &config)
        .await
        .context("Enhancement failed")?;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&output)
    } else {
        serde_json::to_string(&output)
    }
    .context("Failed to serialise output")?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{json}").context("Failed to write to stdout")?;
    handle.flush().ok();
    Ok(())
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Download pdfium on first use, with a byte-progress bar unless `silent`.
fn ensure_pdf_engine(silent: bool) -> Result<()> {
    if pdfium_auto::is_pdfium_cached() {
        return Ok(());
    }

    if silent {
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .context("Failed to download PDFium engine")?;
        return Ok(());
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {bytes}/{total_bytes}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    dl_bar.set_prefix("PDF engine");
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    tokio::task::block_in_place(|| {
        pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
            if let Some(t) = total {
                if bar.length().unwrap_or(0) != t {
                    bar.set_length(t);
                }
            }
            bar.set_position(downloaded);
        }))
    })
    .context("Failed to download PDFium engine")?;

    dl_bar.finish_with_message("ready ✓");
    Ok(())
}

/// Map CLI args to `EnhanceConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<EnhanceConfig> {
    let mut builder = EnhanceConfig::builder()
        .concurrency(cli.concurrency)
        .max_tokens(cli.max_tokens)
        .max_attempts(cli.max_attempts)
        .retry_backoff_ms(cli.retry_backoff_ms)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .embeddings(!cli.no_embeddings)
        .chunking(ChunkConfig {
            min_chunk_chars: cli.min_chunk_chars,
            min_final_chunk_chars: cli.min_final_chunk_chars,
            default_chapter: cli.default_chapter.clone(),
        });

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
