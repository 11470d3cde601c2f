//! Conversion entry points: plan the chunks, convert them in parallel, write
//! the index.
//!
//! [`convert`] waits for every chunk and returns a [`ConversionOutput`]. Use
//! [`crate::stream::convert_stream`] to receive chunk results as they finish.

use crate::config::ConversionConfig;
use crate::error::Pdf2MdError;
use crate::output::{ChunkResult, ConversionOutput, ConversionStats, DocumentMetadata};
use crate::pipeline::cleanup::cleanup_markdown;
use crate::pipeline::extract::{self, ExtractError, PageSettings};
use crate::pipeline::images::ImageSink;
use crate::pipeline::layout::LayoutOptions;
use crate::pipeline::plan::{self, ChunkPlan};
use crate::pipeline::toc::{self, TocEntry};
use crate::pipeline::worker::{self, ChunkJob, DocumentContext};
use crate::pipeline::{engine, index, input};
use crate::progress::ProgressTracker;
use futures::stream::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Convert a PDF file or URL into per-section Markdown files plus an index.
///
/// # Arguments
/// * `input`: Local file path or HTTP/HTTPS URL to a PDF
/// * `config`: Conversion configuration
///
/// # Returns
/// `Ok(ConversionOutput)` when at least one chunk was written, even if
/// others failed (check `output.stats.failed_chunks`).
///
/// # Errors
/// Returns `Err(Pdf2MdError)` only for fatal errors:
/// - File not found / permission denied / not a PDF
/// - Encrypted PDF without the right password
/// - Empty document, or no chunk could be converted
/// - Output directory or index cannot be written
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2MdError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let pdf_path = resolved.path().to_path_buf();
    let stem = resolved.stem();
    let output_dir = config
        .output_dir
        .clone()
        .unwrap_or_else(|| resolved.default_output_dir());

    // ── Step 2: Read outline and plan chunks ─────────────────────────────
    let plan_start = Instant::now();
    let analysis = analyse(&pdf_path, config).await?;
    let plan_duration_ms = plan_start.elapsed().as_millis() as u64;
    info!(
        "Planned {} chunks over {} pages ({} bytes/page, {})",
        analysis.plan.chunks.len(),
        analysis.plan.total_pages,
        analysis.plan.bytes_per_page,
        if analysis.plan.from_toc { "outline" } else { "size-based" }
    );

    // ── Step 3: Prepare output directory ─────────────────────────────────
    create_output_dir(&output_dir).await?;

    // ── Step 4: Convert chunks in parallel ───────────────────────────────
    let (ctx, jobs) = build_jobs(&pdf_path, &stem, &output_dir, &analysis, config);
    let tracker = Arc::new(ProgressTracker::new(
        jobs.len(),
        analysis.plan.total_pages,
        config.progress_callback.clone(),
    ));
    tracker.start();

    let mut chunks: Vec<ChunkResult> =
        worker::run_chunks(ctx, jobs, config.workers, Arc::clone(&tracker))
            .collect()
            .await;
    chunks.sort_by_key(|r| r.index);

    tracker.finish(tracker.succeeded());
    let succeeded = require_any_success(&chunks)?;

    // ── Step 5: Write index ──────────────────────────────────────────────
    let index_file = index::generate_index(&chunks, &output_dir, &stem).map_err(|e| {
        Pdf2MdError::OutputWriteFailed {
            path: output_dir.join(index::index_file_name(&stem)),
            source: e,
        }
    })?;

    // ── Step 6: Compute stats ────────────────────────────────────────────
    let ok = chunks.iter().filter(|r| r.is_ok());
    let stats = ConversionStats {
        total_pages: analysis.plan.total_pages,
        total_chunks: chunks.len(),
        succeeded_chunks: succeeded,
        failed_chunks: chunks.len() - succeeded,
        total_bytes: ok.clone().map(|r| r.bytes as u64).sum(),
        total_images: ok.map(|r| r.images).sum(),
        plan_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Conversion complete: {}/{} chunks, {}ms total",
        succeeded, stats.total_chunks, stats.total_duration_ms
    );

    Ok(ConversionOutput {
        output_dir,
        index_file,
        chunks,
        metadata: analysis.metadata,
        plan: analysis.plan,
        stats,
    })
}

/// Analyse a PDF and return the chunk plan without converting anything.
pub async fn plan(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ChunkPlan, Pdf2MdError> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    Ok(analyse(resolved.path(), config).await?.plan)
}

/// Convert the whole document into a single cleaned Markdown file, without
/// chunking.
///
/// Uses atomic write (temp file + rename) to prevent partial files. Written
/// images resolve against the output file's directory.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Pdf2MdError> {
    let total_start = Instant::now();
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let pdf_path = resolved.path().to_path_buf();
    let output_path = output_path.as_ref().to_path_buf();
    let out_dir = output_path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let sink = ImageSink::new(&config.images, &out_dir, &resolved.stem());
    let settings = page_settings(config);
    let cleanup = config.effective_cleanup();
    let toc_depth = config.toc_depth;
    let password = config.password.clone();
    let target = output_path.clone();

    let (total_pages, bytes, images) = tokio::task::spawn_blocking(move || -> Result<_, Pdf2MdError> {
        let pdfium = engine::shared_pdfium()?;
        let document = engine::open_document(pdfium, &pdf_path, password.as_deref())?;
        let total_pages = document.pages().len() as usize;
        if total_pages == 0 {
            return Err(Pdf2MdError::EmptyDocument { path: pdf_path });
        }
        let toc = toc::limit_depth(toc::read_toc(&document), toc_depth);
        let (markdown, images) =
            extract::render_range(&document, 0..total_pages, &settings, &toc, Some(&sink))
                .map_err(extraction_failed)?;
        let markdown = cleanup_markdown(&markdown, &cleanup);
        worker::write_atomic(&target, &markdown).map_err(|e| Pdf2MdError::OutputWriteFailed {
            path: target.clone(),
            source: e,
        })?;
        Ok((total_pages, markdown.len(), images))
    })
    .await
    .map_err(|e| Pdf2MdError::Internal(format!("Conversion task panicked: {}", e)))??;

    info!(
        "Wrote {} ({} pages, {} bytes)",
        output_path.display(),
        total_pages,
        bytes
    );

    Ok(ConversionStats {
        total_pages,
        total_chunks: 1,
        succeeded_chunks: 1,
        failed_chunks: 0,
        total_bytes: bytes as u64,
        total_images: images,
        plan_duration_ms: 0,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    })
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2MdError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Extract PDF metadata without converting content.
///
/// Uses the config's password and download timeout; every other field is
/// ignored.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<DocumentMetadata, Pdf2MdError> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    engine::extract_metadata(resolved.path(), config.password.as_deref()).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// What the planning pass learned about a document.
pub(crate) struct Analysis {
    pub metadata: DocumentMetadata,
    pub toc: Vec<TocEntry>,
    pub plan: ChunkPlan,
}

/// Open the document once, read its outline and plan the chunks.
pub(crate) async fn analyse(
    pdf_path: &Path,
    config: &ConversionConfig,
) -> Result<Analysis, Pdf2MdError> {
    let path = pdf_path.to_path_buf();
    let password = config.password.clone();
    let toc_depth = config.toc_depth;
    let max_chunk_size = config.max_chunk_size;
    let settings = page_settings(config);

    tokio::task::spawn_blocking(move || -> Result<Analysis, Pdf2MdError> {
        let pdfium = engine::shared_pdfium()?;
        let document = engine::open_document(pdfium, &path, password.as_deref())?;
        let metadata = engine::read_metadata(&document);
        if metadata.page_count == 0 {
            return Err(Pdf2MdError::EmptyDocument { path });
        }

        let toc = toc::limit_depth(toc::read_toc(&document), toc_depth);
        debug!("Outline has {} usable entries", toc.len());

        let plan = plan::plan_chunks(&toc, metadata.page_count, max_chunk_size, |i| {
            extract::page_markdown_len(&document, i, &settings)
        })
        .map_err(extraction_failed)?;

        Ok(Analysis {
            metadata,
            toc,
            plan,
        })
    })
    .await
    .map_err(|e| Pdf2MdError::Internal(format!("Planning task panicked: {}", e)))?
}

/// Per-document page settings derived from the config.
pub(crate) fn page_settings(config: &ConversionConfig) -> PageSettings {
    PageSettings {
        layout: LayoutOptions {
            margins: config.margins,
            table_strategy: config.table_strategy,
        },
        ignore_graphics: config.ignore_graphics,
        header_strategy: config.header_strategy,
        body_limit: config.body_limit,
        max_header_levels: config.max_header_levels,
    }
}

/// Shared worker context plus one job per planned chunk.
pub(crate) fn build_jobs(
    pdf_path: &Path,
    stem: &str,
    output_dir: &Path,
    analysis: &Analysis,
    config: &ConversionConfig,
) -> (Arc<DocumentContext>, Vec<ChunkJob>) {
    let ctx = DocumentContext {
        pdf_path: pdf_path.to_path_buf(),
        password: config.password.clone(),
        output_dir: output_dir.to_path_buf(),
        toc: analysis.toc.clone(),
        settings: page_settings(config),
        cleanup: config.effective_cleanup(),
        images: ImageSink::new(&config.images, output_dir, stem),
    };
    let jobs = analysis
        .plan
        .chunks
        .iter()
        .cloned()
        .zip(analysis.plan.file_names(stem))
        .enumerate()
        .map(|(index, (chunk, file_name))| ChunkJob {
            index,
            chunk,
            file_name,
        })
        .collect();
    (Arc::new(ctx), jobs)
}

pub(crate) async fn create_output_dir(dir: &Path) -> Result<(), Pdf2MdError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Pdf2MdError::OutputDirFailed {
            path: dir.to_path_buf(),
            source: e,
        })
}

/// Count successful chunks; a run where every chunk failed is fatal.
pub(crate) fn require_any_success(chunks: &[ChunkResult]) -> Result<usize, Pdf2MdError> {
    let succeeded = chunks.iter().filter(|r| r.is_ok()).count();
    if succeeded > 0 {
        return Ok(succeeded);
    }
    let first_error = chunks
        .iter()
        .find_map(|r| r.error.as_ref())
        .map(|e| e.to_string())
        .unwrap_or_else(|| "Unknown error".to_string());
    Err(Pdf2MdError::AllChunksFailed {
        total: chunks.len(),
        first_error,
    })
}

fn extraction_failed(e: ExtractError) -> Pdf2MdError {
    match e {
        ExtractError::Page { page, detail } => Pdf2MdError::ExtractionFailed { page, detail },
        ExtractError::Image { page, n, detail } => Pdf2MdError::ExtractionFailed {
            page,
            detail: format!("image {n}: {detail}"),
        },
    }
}
