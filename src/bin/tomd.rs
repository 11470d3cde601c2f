//! CLI binary converting one document to one Markdown file with a choice of
//! engine: the native pdfium pipeline, docling-serve or marker.

use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::time::Instant;
use tocmd::{convert_document, ConversionConfig, Engine, EngineOptions};
use tracing_subscriber::EnvFilter;

/// Convert a document to a single Markdown file.
#[derive(Parser, Debug)]
#[command(
    name = "tomd",
    version,
    about = "Convert a document to a single Markdown file",
    arg_required_else_help = true
)]
struct Cli {
    /// Input document.
    input: PathBuf,

    /// Output Markdown file.
    output: PathBuf,

    /// Conversion engine.
    #[arg(long, env = "TOMD_ENGINE", value_enum, default_value = "native")]
    engine: EngineArg,

    /// Port for docling-serve.
    #[arg(long, env = "TOMD_PORT", default_value_t = 5010)]
    port: u16,

    /// GPU batch size multiplier for marker.
    #[arg(long, env = "TOMD_BATCH_MULTIPLIER", default_value_t = 0.5)]
    batch_multiplier: f32,

    /// PDF user password (native engine).
    #[arg(long, env = "PDF2MD_PASSWORD")]
    password: Option<String>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EngineArg {
    Native,
    Docling,
    Marker,
}

impl From<EngineArg> for Engine {
    fn from(v: EngineArg) -> Self {
        match v {
            EngineArg::Native => Engine::Native,
            EngineArg::Docling => Engine::Docling,
            EngineArg::Marker => Engine::Marker,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let mut config = ConversionConfig::builder();
    if let Some(ref pwd) = cli.password {
        config = config.password(pwd);
    }
    let options = EngineOptions {
        engine: cli.engine.into(),
        port: cli.port,
        batch_multiplier: cli.batch_multiplier,
        config: config.build().context("Invalid configuration")?,
    };

    let start = Instant::now();
    convert_document(&cli.input, &cli.output, &options)
        .await
        .with_context(|| format!("Failed to convert '{}'", cli.input.display()))?;

    eprintln!(
        "Successfully converted to: {}  ({}ms, {})",
        cli.output.display(),
        start.elapsed().as_millis(),
        options.engine
    );
    Ok(())
}
