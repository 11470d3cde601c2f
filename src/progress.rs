//! Progress reporting for per-chunk conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as workers finish chunks. Workers share one [`ProgressTracker`];
//! its counters are updated and the callback invoked under a single lock, so
//! reported percentages never go backwards even though chunks finish out of
//! order.
//!
//! # Example
//!
//! ```rust
//! use tocmd::{ChunkProgress, ConversionProgressCallback, ConversionConfig};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ConversionProgressCallback for Printer {
//!     fn on_chunk_complete(&self, progress: &ChunkProgress) {
//!         println!("{}", progress.status_line());
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Snapshot of overall progress taken when a chunk completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkProgress {
    /// Title of the chunk that just completed.
    pub title: String,
    /// First page of the chunk (1-indexed).
    pub start_page: usize,
    /// Last page of the chunk (1-indexed, inclusive).
    pub end_page: usize,
    /// Chunks finished so far, including this one.
    pub chunks_done: usize,
    pub total_chunks: usize,
    /// Pages covered by finished chunks. Outline chunks nest, so this can
    /// exceed `total_pages`.
    pub pages_done: usize,
    pub total_pages: usize,
}

impl ChunkProgress {
    /// Percentage of chunks finished.
    pub fn percent(&self) -> f64 {
        if self.total_chunks == 0 {
            return 100.0;
        }
        100.0 * self.chunks_done as f64 / self.total_chunks as f64
    }

    /// `[ 42.0%] Completed: Chapter 2 (pages 13-40)`
    pub fn status_line(&self) -> String {
        format!(
            "[{:5.1}%] Completed: {} (pages {}-{})",
            self.percent(),
            self.title,
            self.start_page,
            self.end_page
        )
    }
}

/// Called by the conversion pipeline as it processes each chunk.
///
/// Implementations must be `Send + Sync`: chunk events arrive from several
/// worker tasks. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once, after chunk planning and before any worker starts.
    fn on_conversion_start(&self, total_chunks: usize, total_pages: usize) {
        let _ = (total_chunks, total_pages);
    }

    /// Called when a worker picks up a chunk.
    fn on_chunk_start(&self, index: usize, title: &str) {
        let _ = (index, title);
    }

    /// Called when a chunk's Markdown file has been written.
    fn on_chunk_complete(&self, progress: &ChunkProgress) {
        let _ = progress;
    }

    /// Called when a chunk fails.
    fn on_chunk_error(&self, progress: &ChunkProgress, error: &str) {
        let _ = (progress, error);
    }

    /// Called once after every chunk has been attempted.
    fn on_conversion_complete(&self, total_chunks: usize, success_count: usize) {
        let _ = (total_chunks, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[derive(Debug, Default)]
struct Counters {
    chunks_done: usize,
    chunks_succeeded: usize,
    pages_done: usize,
}

/// Counters shared by all workers of one conversion.
pub struct ProgressTracker {
    counters: Mutex<Counters>,
    total_chunks: usize,
    total_pages: usize,
    callback: Option<ProgressCallback>,
}

impl ProgressTracker {
    pub fn new(total_chunks: usize, total_pages: usize, callback: Option<ProgressCallback>) -> Self {
        Self {
            counters: Mutex::new(Counters::default()),
            total_chunks,
            total_pages,
            callback,
        }
    }

    pub fn start(&self) {
        if let Some(ref cb) = self.callback {
            cb.on_conversion_start(self.total_chunks, self.total_pages);
        }
    }

    pub fn chunk_started(&self, index: usize, title: &str) {
        if let Some(ref cb) = self.callback {
            cb.on_chunk_start(index, title);
        }
    }

    /// Record a finished chunk (successful or not) and notify the callback.
    ///
    /// `start_page` is 0-indexed inclusive and `end_page` exclusive, as in
    /// [`crate::pipeline::plan::Chunk`].
    pub fn chunk_finished(
        &self,
        title: &str,
        start_page: usize,
        end_page: usize,
        error: Option<&str>,
    ) -> ChunkProgress {
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        counters.chunks_done += 1;
        if error.is_none() {
            counters.chunks_succeeded += 1;
        }
        counters.pages_done += end_page.saturating_sub(start_page);

        let progress = ChunkProgress {
            title: title.to_string(),
            start_page: start_page + 1,
            end_page,
            chunks_done: counters.chunks_done,
            total_chunks: self.total_chunks,
            pages_done: counters.pages_done,
            total_pages: self.total_pages,
        };

        // Notify while still holding the lock so events are delivered in
        // counter order.
        if let Some(ref cb) = self.callback {
            match error {
                None => cb.on_chunk_complete(&progress),
                Some(e) => cb.on_chunk_error(&progress, e),
            }
        }
        progress
    }

    /// Chunks recorded so far without an error.
    pub fn succeeded(&self) -> usize {
        self.counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .chunks_succeeded
    }

    pub fn finish(&self, success_count: usize) {
        if let Some(ref cb) = self.callback {
            cb.on_conversion_complete(self.total_chunks, success_count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        started_total: AtomicUsize,
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        lines: Mutex<Vec<String>>,
        success: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_conversion_start(&self, total_chunks: usize, _total_pages: usize) {
            self.started_total.store(total_chunks, Ordering::SeqCst);
        }

        fn on_chunk_start(&self, _index: usize, _title: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_chunk_complete(&self, progress: &ChunkProgress) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            self.lines.lock().unwrap().push(progress.status_line());
        }

        fn on_chunk_error(&self, _progress: &ChunkProgress, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_conversion_complete(&self, _total_chunks: usize, success_count: usize) {
            self.success.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn status_line_format() {
        let p = ChunkProgress {
            title: "Chapter 2".into(),
            start_page: 13,
            end_page: 40,
            chunks_done: 3,
            total_chunks: 8,
            pages_done: 40,
            total_pages: 100,
        };
        assert_eq!(p.status_line(), "[ 37.5%] Completed: Chapter 2 (pages 13-40)");
    }

    #[test]
    fn percent_of_empty_plan_is_complete() {
        let p = ChunkProgress {
            title: String::new(),
            start_page: 1,
            end_page: 1,
            chunks_done: 0,
            total_chunks: 0,
            pages_done: 0,
            total_pages: 0,
        };
        assert_eq!(p.percent(), 100.0);
    }

    #[test]
    fn tracker_counts_and_dispatches() {
        let cb = Arc::new(TrackingCallback::default());
        let tracker = ProgressTracker::new(
            2,
            10,
            Some(Arc::clone(&cb) as Arc<dyn ConversionProgressCallback>),
        );

        tracker.start();
        assert_eq!(cb.started_total.load(Ordering::SeqCst), 2);

        tracker.chunk_started(0, "Intro");
        let first = tracker.chunk_finished("Intro", 0, 4, None);
        assert_eq!(first.chunks_done, 1);
        assert_eq!(first.pages_done, 4);
        assert_eq!(first.start_page, 1);
        assert_eq!(first.end_page, 4);

        tracker.chunk_started(1, "Body");
        let second = tracker.chunk_finished("Body", 4, 10, Some("disk full"));
        assert_eq!(second.chunks_done, 2);
        assert_eq!(second.pages_done, 10);

        assert_eq!(tracker.succeeded(), 1);
        tracker.finish(tracker.succeeded());

        assert_eq!(cb.starts.load(Ordering::SeqCst), 2);
        assert_eq!(cb.completes.load(Ordering::SeqCst), 1);
        assert_eq!(cb.errors.load(Ordering::SeqCst), 1);
        assert_eq!(cb.success.load(Ordering::SeqCst), 1);
        assert_eq!(
            cb.lines.lock().unwrap().as_slice(),
            ["[ 50.0%] Completed: Intro (pages 1-4)"]
        );
    }

    #[test]
    fn tracker_without_callback_still_counts() {
        let tracker = ProgressTracker::new(1, 3, None);
        tracker.start();
        let p = tracker.chunk_finished("All", 0, 3, None);
        assert_eq!(p.percent(), 100.0);
        tracker.finish(1);
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb: Arc<dyn ConversionProgressCallback> = Arc::new(NoopProgressCallback);
        let p = ChunkProgress {
            title: "x".into(),
            start_page: 1,
            end_page: 2,
            chunks_done: 1,
            total_chunks: 1,
            pages_done: 2,
            total_pages: 2,
        };
        cb.on_conversion_start(1, 2);
        cb.on_chunk_start(0, "x");
        cb.on_chunk_complete(&p);
        cb.on_chunk_error(&p, "oops");
        cb.on_conversion_complete(1, 1);
    }
}
