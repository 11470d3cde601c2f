//! # tocmd
//!
//! Convert large PDF documents into a set of Markdown files, one per section
//! of the document's table of contents, plus an index linking them.
//!
//! Text is extracted with pdfium and laid out locally: no OCR, no network
//! service. Chunks are converted in parallel, each worker holding its own
//! document handle, and every chunk passes through a set of textual cleanup
//! rules (dot leaders, orphaned list markers, header promotion, paragraph
//! continuation, page numbers).
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    resolve local file or download from URL
//!  ├─ 2. Outline  read the TOC (bookmarks), depth-first
//!  ├─ 3. Plan     chunk ranges sized from sampled bytes-per-page
//!  ├─ 4. Convert  parallel workers: extract → layout → cleanup → write
//!  └─ 5. Index    {stem}-index.md linking every chunk file
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tocmd::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .max_chunk_size(512 * 1024)
//!         .output_dir("book-markdown")
//!         .build()?;
//!     let output = convert("book.pdf", &config).await?;
//!     println!("index: {}", output.index_file.display());
//!     eprintln!("{}/{} chunks written",
//!         output.stats.succeeded_chunks,
//!         output.stats.total_chunks);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2md` and `tomd` binaries (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! tocmd = { version = "0.3", default-features = false }
//! ```
//!
//! ## pdfium
//!
//! The pdfium shared library is located at runtime: `PDFIUM_LIB_PATH`, then
//! next to the executable, then the working directory, then the system
//! library path.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod engines;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    parse_size, CleanupOptions, ConversionConfig, ConversionConfigBuilder, HeaderStrategy,
    ImageFormat, ImageMode, ImageOptions, Margins, TableStrategy,
};
pub use convert::{convert, convert_sync, convert_to_file, inspect, plan};
pub use engines::{convert_document, Engine, EngineOptions};
pub use error::{ChunkError, Pdf2MdError};
pub use output::{ChunkResult, ConversionOutput, ConversionStats, DocumentMetadata};
pub use pipeline::cleanup::cleanup_markdown;
pub use pipeline::plan::{Chunk, ChunkPlan};
pub use pipeline::toc::TocEntry;
pub use progress::{ChunkProgress, ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_stream, ChunkStream};
