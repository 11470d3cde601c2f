//! CLI binary for tocmd's chunked converter.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tocmd::{
    convert, inspect, parse_size, plan, ChunkPlan, ChunkProgress, CleanupOptions,
    ConversionConfig, ConversionOutput, ConversionProgressCallback, HeaderStrategy, ImageFormat,
    ImageMode, ImageOptions, Margins, ProgressCallback, TableStrategy,
};
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

/// Terminal progress callback: a live bar plus one log line per finished
/// chunk. Chunks finish out of order; the bar counts completions.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_conversion_start` reports the chunk count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Planning");
        bar.set_message("Reading outline…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} chunks  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
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
    fn on_conversion_start(&self, total_chunks: usize, total_pages: usize) {
        self.activate_bar(total_chunks);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Converting {total_pages} pages in {total_chunks} chunks…"
            ))
        ));
    }

    fn on_chunk_start(&self, _index: usize, title: &str) {
        self.bar.set_message(title.to_string());
    }

    fn on_chunk_complete(&self, progress: &ChunkProgress) {
        self.bar
            .println(format!("  {} {}", green("✓"), progress.status_line()));
        self.bar.inc(1);
    }

    fn on_chunk_error(&self, progress: &ChunkProgress, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Keep long errors on one line.
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} [{:5.1}%] Failed: {} (pages {}-{})  {}",
            red("✗"),
            progress.percent(),
            progress.title,
            progress.start_page,
            progress.end_page,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_chunks: usize, success_count: usize) {
        let failed = total_chunks.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} chunks converted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} chunks converted  ({} failed)",
                if failed == total_chunks {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_chunks,
                red(&failed.to_string()),
            );
        }
    }
}

/// Plain progress lines for when the bar is disabled but output is wanted.
struct LineProgressCallback;

impl ConversionProgressCallback for LineProgressCallback {
    fn on_chunk_complete(&self, progress: &ChunkProgress) {
        eprintln!("{}", progress.status_line());
    }

    fn on_chunk_error(&self, progress: &ChunkProgress, error: &str) {
        eprintln!("[{:5.1}%] Failed: {} ({})", progress.percent(), progress.title, error);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Split a book along its outline into ./book-markdown/
  pdf2md book.pdf

  # Smaller chunks, 8 workers, custom output directory
  pdf2md book.pdf -o out/ --max-chunk-size 500K --workers 8

  # Write images next to the chunks as JPEG
  pdf2md book.pdf --write-images --image-format jpg

  # Only split at chapters, not sections
  pdf2md book.pdf --toc-depth 1

  # Show the chunk plan without converting
  pdf2md book.pdf --plan-only

  # Convert from URL, JSON summary on stdout
  pdf2md https://arxiv.org/pdf/1706.03762 --json > result.json

OUTPUT:
  {stem}-index.md                 table of contents linking every chunk
  {stem}-{page:04}-{title}.md     one file per chunk (page is 0-based)

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Override log filtering (e.g. tocmd=debug)
"#;

/// Convert PDF files into TOC-aligned Markdown chunks.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2md",
    version,
    about = "Convert PDF files into TOC-aligned Markdown chunks",
    long_about = "Split a PDF along its table of contents into size-bounded chunks, convert \
each chunk to Markdown in parallel, clean up the text, and write an index file linking \
every chunk. Documents without an outline are split by size.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Output directory. Default: `{stem}-markdown` next to the input.
    #[arg(short, long, env = "PDF2MD_OUTPUT")]
    output: Option<PathBuf>,

    /// Maximum estimated chunk size (e.g. 1M, 500K, 2G).
    #[arg(long, env = "PDF2MD_MAX_CHUNK_SIZE", default_value = "1M")]
    max_chunk_size: String,

    /// Number of parallel workers. Default: available cores.
    #[arg(short, long, env = "PDF2MD_WORKERS")]
    workers: Option<usize>,

    /// Embed images as base64 data URIs.
    #[arg(long, env = "PDF2MD_EMBED_IMAGES")]
    embed_images: bool,

    /// Write images to --image-path and link them.
    #[arg(long, env = "PDF2MD_WRITE_IMAGES")]
    write_images: bool,

    /// Directory for written images, relative to the output directory.
    #[arg(long, env = "PDF2MD_IMAGE_PATH", default_value = "./images")]
    image_path: PathBuf,

    /// Image encoding.
    #[arg(long, env = "PDF2MD_IMAGE_FORMAT", value_enum, default_value = "png")]
    image_format: ImageFormatArg,

    /// Skip images entirely (overrides --embed-images / --write-images).
    #[arg(long, env = "PDF2MD_IGNORE_IMAGES")]
    ignore_images: bool,

    /// Skip vector graphics; line-based table detection finds nothing.
    #[arg(long, env = "PDF2MD_IGNORE_GRAPHICS")]
    ignore_graphics: bool,

    /// Table detection strategy.
    #[arg(long, env = "PDF2MD_TABLE_STRATEGY", value_enum, default_value = "lines-strict")]
    table_strategy: TableStrategyArg,

    /// Margins in points: N (top/bottom) or left,top,right,bottom.
    #[arg(long, env = "PDF2MD_MARGINS", default_value = "0,36,0,36")]
    margins: String,

    /// Disable all Markdown cleanup.
    #[arg(long, env = "PDF2MD_NO_CLEANUP")]
    no_cleanup: bool,

    /// Do not merge orphaned list markers.
    #[arg(long)]
    no_fix_lists: bool,

    /// Do not promote Title Case / ALL CAPS lines to headers.
    #[arg(long)]
    no_fix_headers: bool,

    /// Header detection strategy.
    #[arg(long, env = "PDF2MD_HEADER_STRATEGY", value_enum, default_value = "both")]
    header_strategy: HeaderStrategyArg,

    /// Font size (pt) at or below which text is body text.
    #[arg(long, env = "PDF2MD_BODY_LIMIT", default_value_t = 11.0)]
    body_limit: f32,

    /// Maximum header levels from font sizes (1–6).
    #[arg(long, env = "PDF2MD_MAX_HEADER_LEVELS", default_value_t = 4,
          value_parser = clap::value_parser!(u8).range(1..=6))]
    max_header_levels: u8,

    /// Ignore outline entries deeper than this level.
    #[arg(long, env = "PDF2MD_TOC_DEPTH",
          value_parser = clap::value_parser!(u64).range(1..))]
    toc_depth: Option<u64>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2MD_PASSWORD")]
    password: Option<String>,

    /// Print the chunk plan and exit.
    #[arg(long)]
    plan_only: bool,

    /// Print PDF metadata only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Output structured JSON instead of human-readable text.
    #[arg(long, env = "PDF2MD_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2MD_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2MD_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum TableStrategyArg {
    #[value(alias = "lines_strict")]
    LinesStrict,
    Lines,
    Text,
    None,
}

impl From<TableStrategyArg> for TableStrategy {
    fn from(v: TableStrategyArg) -> Self {
        match v {
            TableStrategyArg::LinesStrict => TableStrategy::LinesStrict,
            TableStrategyArg::Lines => TableStrategy::Lines,
            TableStrategyArg::Text => TableStrategy::Text,
            TableStrategyArg::None => TableStrategy::None,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum HeaderStrategyArg {
    Toc,
    Font,
    Both,
    None,
}

impl From<HeaderStrategyArg> for HeaderStrategy {
    fn from(v: HeaderStrategyArg) -> Self {
        match v {
            HeaderStrategyArg::Toc => HeaderStrategy::Toc,
            HeaderStrategyArg::Font => HeaderStrategy::Font,
            HeaderStrategyArg::Both => HeaderStrategy::Both,
            HeaderStrategyArg::None => HeaderStrategy::None,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ImageFormatArg {
    Png,
    #[value(alias = "jpeg")]
    Jpg,
    Webp,
}

impl From<ImageFormatArg> for ImageFormat {
    fn from(v: ImageFormatArg) -> Self {
        match v {
            ImageFormatArg::Png => ImageFormat::Png,
            ImageFormatArg::Jpg => ImageFormat::Jpeg,
            ImageFormatArg::Webp => ImageFormat::Webp,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO logs would tear the progress bar; it carries the feedback instead.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.plan_only;
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

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let config = build_config(&cli, None)?;
        let meta = inspect(&cli.input, &config)
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input);
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
            println!("TOC entries:  {}", meta.toc_entries);
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else if !cli.quiet && !cli.json {
        Some(Arc::new(LineProgressCallback) as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Plan-only mode ───────────────────────────────────────────────────
    if cli.plan_only {
        let chunk_plan = plan(&cli.input, &config)
            .await
            .context("Failed to plan chunks")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&chunk_plan).context("Failed to serialize plan")?
            );
        } else {
            print_plan(&chunk_plan);
        }
        return Ok(());
    }

    if !cli.quiet && !cli.json {
        print_banner(&cli, &config);
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let output = convert(&cli.input, &config)
        .await
        .context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&output);
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let max_chunk_size = parse_size(&cli.max_chunk_size).context("Invalid --max-chunk-size")?;
    let margins: Margins = cli.margins.parse().context("Invalid --margins")?;

    let mode = if cli.ignore_images {
        ImageMode::Skip
    } else if cli.embed_images {
        ImageMode::Embed
    } else if cli.write_images {
        ImageMode::Write
    } else {
        ImageMode::Skip
    };

    let mut builder = ConversionConfig::builder()
        .max_chunk_size(max_chunk_size)
        .images(ImageOptions {
            mode,
            path: cli.image_path.clone(),
            format: cli.image_format.into(),
        })
        .ignore_graphics(cli.ignore_graphics)
        .table_strategy(cli.table_strategy.into())
        .margins(margins)
        .cleanup(CleanupOptions {
            enabled: !cli.no_cleanup,
            fix_lists: !cli.no_fix_lists,
            fix_headers: !cli.no_fix_headers,
        })
        .header_strategy(cli.header_strategy.into())
        .body_limit(cli.body_limit)
        .max_header_levels(cli.max_header_levels)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref dir) = cli.output {
        builder = builder.output_dir(dir);
    }
    if let Some(n) = cli.workers {
        builder = builder.workers(n);
    }
    if let Some(depth) = cli.toc_depth {
        builder = builder.toc_depth(depth as usize);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_banner(cli: &Cli, config: &ConversionConfig) {
    eprintln!("{} {}", cyan("◆"), bold(&format!("pdf2md {}", env!("CARGO_PKG_VERSION"))));
    eprintln!("   {}  {}", dim("input  "), cli.input);
    if let Some(ref dir) = config.output_dir {
        eprintln!("   {}  {}", dim("output "), dir.display());
    }
    eprintln!(
        "   {}  {} max/chunk, {} workers, tables: {:?}, headers: {:?}",
        dim("options"),
        human_bytes(config.max_chunk_size),
        config.workers,
        config.table_strategy,
        config.header_strategy,
    );
}

fn print_plan(chunk_plan: &ChunkPlan) {
    println!(
        "{} chunks over {} pages ({} bytes/page, {})",
        chunk_plan.chunks.len(),
        chunk_plan.total_pages,
        chunk_plan.bytes_per_page,
        if chunk_plan.from_toc {
            "from outline"
        } else {
            "size-based"
        }
    );
    for chunk in &chunk_plan.chunks {
        println!(
            "{}- {} (pages {}-{})",
            "  ".repeat(chunk.level.saturating_sub(1)),
            chunk.title,
            chunk.start_page + 1,
            chunk.end_page
        );
    }
}

fn print_summary(output: &ConversionOutput) {
    let stats = &output.stats;
    eprintln!(
        "{}  {}/{} chunks  {} pages  {}  {}ms",
        if stats.failed_chunks == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        stats.succeeded_chunks,
        stats.total_chunks,
        stats.total_pages,
        human_bytes(stats.total_bytes),
        stats.total_duration_ms,
    );
    for failed in output.chunks.iter().filter_map(|c| c.error.as_ref()) {
        eprintln!("   {} {}", red("✗"), failed);
    }
    eprintln!(
        "   index  →  {}",
        bold(&output.index_file.display().to_string())
    );
}

fn human_bytes(n: u64) -> String {
    const K: f64 = 1024.0;
    let n = n as f64;
    if n >= K * K * K {
        format!("{:.1}G", n / (K * K * K))
    } else if n >= K * K {
        format!("{:.1}M", n / (K * K))
    } else if n >= K {
        format!("{:.1}K", n / K)
    } else {
        format!("{n}B")
    }
}
