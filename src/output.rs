//! Result types returned by the conversion entry points.

use crate::error::ChunkError;
use crate::pipeline::plan::ChunkPlan;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of converting one chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkResult {
    /// Position of the chunk in the plan.
    pub index: usize,
    pub title: String,
    /// Outline depth (1 = top level).
    pub level: usize,
    /// File name relative to the output directory.
    pub file: String,
    /// First page, 1-indexed.
    pub start_page: usize,
    /// Last page, 1-indexed inclusive.
    pub end_page: usize,
    /// Bytes of Markdown written (after cleanup).
    pub bytes: usize,
    /// Number of images written or embedded.
    pub images: usize,
    pub duration_ms: u64,
    /// `Some` when the chunk failed; `file` was not written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ChunkError>,
}

impl ChunkResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Document metadata read from the PDF info dictionary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
    /// Number of outline entries with a resolvable page.
    pub toc_entries: usize,
}

/// Aggregate timings and counts for one conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total_pages: usize,
    pub total_chunks: usize,
    pub succeeded_chunks: usize,
    pub failed_chunks: usize,
    /// Markdown bytes written across all chunk files.
    pub total_bytes: u64,
    pub total_images: usize,
    /// Time spent reading the outline and sampling pages.
    pub plan_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything produced by [`crate::convert::convert`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    pub output_dir: PathBuf,
    /// Path of the generated `{stem}-index.md`.
    pub index_file: PathBuf,
    /// Per-chunk results in plan order, failures included.
    pub chunks: Vec<ChunkResult>,
    pub metadata: DocumentMetadata,
    pub plan: ChunkPlan,
    pub stats: ConversionStats,
}
