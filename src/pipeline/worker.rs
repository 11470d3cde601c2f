//! Chunk workers: convert one planned chunk to a Markdown file.
//!
//! Each chunk runs in `spawn_blocking` with its own document handle, and at
//! most `workers` chunks are in flight at once (`buffer_unordered`). Results
//! arrive in completion order; failures are reported per chunk and never
//! cancel the others.

use crate::config::CleanupOptions;
use crate::error::ChunkError;
use crate::output::ChunkResult;
use crate::pipeline::cleanup::cleanup_markdown;
use crate::pipeline::engine;
use crate::pipeline::extract::{self, ExtractError, PageSettings};
use crate::pipeline::images::ImageSink;
use crate::pipeline::plan::Chunk;
use crate::pipeline::toc::TocEntry;
use crate::progress::ProgressTracker;
use futures::stream::{self, Stream, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Everything a worker needs to know about the document.
#[derive(Debug, Clone)]
pub struct DocumentContext {
    pub pdf_path: PathBuf,
    pub password: Option<String>,
    pub output_dir: PathBuf,
    pub toc: Vec<TocEntry>,
    pub settings: PageSettings,
    pub cleanup: CleanupOptions,
    pub images: ImageSink,
}

/// One unit of work: a chunk and the file it is written to.
#[derive(Debug, Clone)]
pub struct ChunkJob {
    pub index: usize,
    pub chunk: Chunk,
    pub file_name: String,
}

/// Convert one chunk and write its file. Blocking.
pub fn process_chunk(ctx: &DocumentContext, job: &ChunkJob) -> ChunkResult {
    let start = Instant::now();
    let outcome = convert_chunk(ctx, job);
    let duration_ms = start.elapsed().as_millis() as u64;

    let (bytes, images, error) = match outcome {
        Ok((bytes, images)) => {
            debug!(
                "Chunk {} '{}' → {} ({} bytes, {}ms)",
                job.index, job.chunk.title, job.file_name, bytes, duration_ms
            );
            (bytes, images, None)
        }
        Err(e) => {
            warn!("{}", e);
            (0, 0, Some(e))
        }
    };

    ChunkResult {
        index: job.index,
        title: job.chunk.title.clone(),
        level: job.chunk.level,
        file: job.file_name.clone(),
        start_page: job.chunk.start_page + 1,
        end_page: job.chunk.end_page,
        bytes,
        images,
        duration_ms,
        error,
    }
}

fn convert_chunk(ctx: &DocumentContext, job: &ChunkJob) -> Result<(usize, usize), ChunkError> {
    let title = &job.chunk.title;
    let extract_failed = |detail: String| ChunkError::ExtractFailed {
        title: title.clone(),
        detail,
    };

    let pdfium = engine::shared_pdfium().map_err(|e| extract_failed(e.to_string()))?;
    let document = engine::open_document(pdfium, &ctx.pdf_path, ctx.password.as_deref())
        .map_err(|e| extract_failed(e.to_string()))?;

    let (markdown, images) = extract::render_range(
        &document,
        job.chunk.pages(),
        &ctx.settings,
        &ctx.toc,
        Some(&ctx.images),
    )
    .map_err(|e| match e {
        ExtractError::Page { .. } => extract_failed(e.to_string()),
        ExtractError::Image { .. } => ChunkError::ImageFailed {
            title: title.clone(),
            detail: e.to_string(),
        },
    })?;

    let markdown = cleanup_markdown(&markdown, &ctx.cleanup);
    let path = ctx.output_dir.join(&job.file_name);
    write_atomic(&path, &markdown).map_err(|e| ChunkError::WriteFailed {
        title: title.clone(),
        file: job.file_name.clone(),
        detail: e.to_string(),
    })?;

    Ok((markdown.len(), images))
}

/// Write via a sibling temp file and rename, so readers never see a
/// partially written file.
pub fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("md.tmp");
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path).inspect_err(|_| {
        let _ = std::fs::remove_file(&tmp_path);
    })
}

/// Run jobs with at most `workers` in flight, yielding results as they
/// finish.
pub fn run_chunks(
    ctx: Arc<DocumentContext>,
    jobs: Vec<ChunkJob>,
    workers: usize,
    tracker: Arc<ProgressTracker>,
) -> impl Stream<Item = ChunkResult> + Send {
    stream::iter(jobs)
        .map(move |job| {
            let ctx = Arc::clone(&ctx);
            let tracker = Arc::clone(&tracker);
            async move {
                tracker.chunk_started(job.index, &job.chunk.title);
                let fallback = job.clone();
                let result = tokio::task::spawn_blocking(move || process_chunk(&ctx, &job))
                    .await
                    .unwrap_or_else(|e| aborted(&fallback, e.to_string()));

                let error = result.error.as_ref().map(|e| e.to_string());
                tracker.chunk_finished(
                    &result.title,
                    fallback.chunk.start_page,
                    fallback.chunk.end_page,
                    error.as_deref(),
                );
                result
            }
        })
        .buffer_unordered(workers.max(1))
}

fn aborted(job: &ChunkJob, detail: String) -> ChunkResult {
    ChunkResult {
        index: job.index,
        title: job.chunk.title.clone(),
        level: job.chunk.level,
        file: job.file_name.clone(),
        start_page: job.chunk.start_page + 1,
        end_page: job.chunk.end_page,
        bytes: 0,
        images: 0,
        duration_ms: 0,
        error: Some(ChunkError::WorkerAborted {
            title: job.chunk.title.clone(),
            detail,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_and_cleans_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/book-0000-intro.md");
        write_atomic(&path, "first\n").unwrap();
        write_atomic(&path, "second\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second\n");
        assert!(!path.with_extension("md.tmp").exists());
    }

    #[test]
    fn failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory at the target path cannot be replaced by a file.
        let path = dir.path().join("book-0000-intro.md");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep.txt"), "x").unwrap();

        assert!(write_atomic(&path, "body\n").is_err());
        assert!(!path.with_extension("md.tmp").exists());
        assert!(path.join("keep.txt").exists());
    }

    #[test]
    fn aborted_result_keeps_chunk_identity() {
        let job = ChunkJob {
            index: 3,
            chunk: Chunk::new(2, "Appendix", 40, 45),
            file_name: "book-0040-appendix.md".into(),
        };
        let r = aborted(&job, "panicked".into());
        assert_eq!(r.start_page, 41);
        assert_eq!(r.end_page, 45);
        assert!(!r.is_ok());
        assert_eq!(r.error.unwrap().title(), "Appendix");
    }
}
