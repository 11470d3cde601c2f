//! Streaming conversion API: emit chunk results as they complete.
//!
//! Unlike [`crate::convert::convert`], which returns only after every chunk
//! finishes and then writes the index, [`convert_stream`] yields each
//! chunk's outcome as soon as its file is written. Chunks arrive in
//! completion order (sort by `index` or `start_page` if order matters) and
//! no index file is produced.

use crate::config::ConversionConfig;
use crate::convert::{analyse, build_jobs, create_output_dir};
use crate::error::{ChunkError, Pdf2MdError};
use crate::output::ChunkResult;
use crate::pipeline::{input, worker};
use crate::progress::ProgressTracker;
use futures::future;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of chunk results.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChunkResult, ChunkError>> + Send>>;

/// Convert a PDF to per-section Markdown files, streaming chunk results as
/// they are ready.
///
/// # Returns
/// - `Ok(ChunkStream)`: a stream of `Result<ChunkResult, ChunkError>`
/// - `Err(Pdf2MdError)`: fatal error before any chunk started (file not
///   found, not a PDF, wrong password, empty document, …)
pub async fn convert_stream(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ChunkStream, Pdf2MdError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming conversion: {}", input_str);

    // ── Resolve input ────────────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let pdf_path = resolved.path().to_path_buf();
    let stem = resolved.stem();
    let output_dir = config
        .output_dir
        .clone()
        .unwrap_or_else(|| resolved.default_output_dir());

    // ── Plan ─────────────────────────────────────────────────────────────
    let analysis = analyse(&pdf_path, config).await?;
    create_output_dir(&output_dir).await?;

    // ── Build the stream ─────────────────────────────────────────────────
    let (ctx, jobs) = build_jobs(&pdf_path, &stem, &output_dir, &analysis, config);
    let tracker = Arc::new(ProgressTracker::new(
        jobs.len(),
        analysis.plan.total_pages,
        config.progress_callback.clone(),
    ));
    tracker.start();

    let results = worker::run_chunks(ctx, jobs, config.workers, Arc::clone(&tracker));
    let stream = finish_when_exhausted(results, tracker).map(move |mut result| {
        // A downloaded PDF lives in `resolved`'s temp dir; keep it until
        // the stream is dropped.
        let _ = &resolved;
        match result.error.take() {
            None => Ok(result),
            Some(e) => Err(e),
        }
    });

    Ok(Box::pin(stream))
}

/// Pass results through, then report `on_conversion_complete` once the
/// inner stream ends.
fn finish_when_exhausted<S>(
    results: S,
    tracker: Arc<ProgressTracker>,
) -> impl Stream<Item = ChunkResult> + Send
where
    S: Stream<Item = ChunkResult> + Send,
{
    let completion = stream::once(async move {
        tracker.finish(tracker.succeeded());
        None
    });
    results
        .map(Some)
        .chain(completion)
        .filter_map(future::ready)
}
