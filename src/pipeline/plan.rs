//! Chunk planning: turn an outline and a bytes-per-page estimate into
//! bounded-size page ranges.
//!
//! Converting every page just to measure the document would double the
//! work, so the planner samples at most three pages (first, middle, last),
//! converts them, and assumes the average holds everywhere. Any outline
//! entry whose estimated size exceeds the limit is cut into equal page runs
//! titled `"{title} (Part n)"`.
//!
//! Every outline entry becomes a chunk spanning up to the next entry at the
//! same or a shallower level, so a chapter chunk also contains the pages of
//! its sections. Use [`crate::config::ConversionConfig::toc_depth`] to keep
//! only the top levels.
//!
//! All functions here are pure; page sampling is injected as a closure so
//! the arithmetic can be tested without a PDF engine.

use crate::pipeline::toc::TocEntry;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A contiguous page range converted into one Markdown file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Outline depth (1 = top level). Drives indentation in the index.
    pub level: usize,
    pub title: String,
    /// First page, 0-indexed inclusive.
    pub start_page: usize,
    /// One past the last page, 0-indexed exclusive.
    pub end_page: usize,
}

impl Chunk {
    pub fn new(level: usize, title: impl Into<String>, start_page: usize, end_page: usize) -> Self {
        Self {
            level,
            title: title.into(),
            start_page,
            end_page,
        }
    }

    pub fn page_count(&self) -> usize {
        self.end_page.saturating_sub(self.start_page)
    }

    /// 0-indexed page numbers covered by this chunk.
    pub fn pages(&self) -> std::ops::Range<usize> {
        self.start_page..self.end_page
    }
}

/// The outcome of structure analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPlan {
    pub chunks: Vec<Chunk>,
    /// Estimated Markdown bytes per page used for sizing.
    pub bytes_per_page: usize,
    /// `true` when chunks follow the outline, `false` for the size-based fallback.
    pub from_toc: bool,
    pub total_pages: usize,
}

impl ChunkPlan {
    /// Output file name for every chunk, in plan order:
    /// `{stem}-{start:04}-{title}.md`. Names that would collide get a
    /// numeric suffix so no chunk overwrites another.
    pub fn file_names(&self, stem: &str) -> Vec<String> {
        let mut taken: HashSet<String> = HashSet::new();
        self.chunks
            .iter()
            .map(|chunk| {
                let base = format!(
                    "{}-{:04}-{}",
                    stem,
                    chunk.start_page,
                    sanitize_filename(&chunk.title)
                );
                let mut name = base.clone();
                let mut n = 1;
                while taken.contains(&name) {
                    n += 1;
                    name = format!("{base}-{n}");
                }
                taken.insert(name.clone());
                format!("{name}.md")
            })
            .collect()
    }
}

// ── File naming ──────────────────────────────────────────────────────────

static RE_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());
static RE_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").unwrap());

/// Convert a title into a safe file-name component: lower-case, only word
/// characters and hyphens, at most 50 characters.
pub fn sanitize_filename(text: &str) -> String {
    let lower = text.to_lowercase();
    let cleaned = RE_UNSAFE.replace_all(&lower, "");
    let hyphenated = RE_SEPARATORS.replace_all(&cleaned, "-");
    hyphenated.trim_matches('-').chars().take(50).collect()
}

// ── Size estimation ──────────────────────────────────────────────────────

/// Pages sampled for the bytes-per-page estimate: first, middle and last,
/// without duplicates.
pub fn sample_indices(total_pages: usize) -> Vec<usize> {
    if total_pages == 0 {
        return Vec::new();
    }
    let mut indices = vec![0, total_pages / 2, total_pages - 1];
    indices.dedup();
    indices
}

/// Average Markdown byte length of the sampled pages.
///
/// `sample` converts one 0-indexed page and returns its UTF-8 byte length.
pub fn estimate_bytes_per_page<E>(
    total_pages: usize,
    mut sample: impl FnMut(usize) -> Result<usize, E>,
) -> Result<usize, E> {
    let indices = sample_indices(total_pages);
    if indices.is_empty() {
        return Ok(0);
    }
    let mut total = 0usize;
    for &idx in &indices {
        total += sample(idx)?;
    }
    Ok(total / indices.len())
}

/// Pages that fit into `max_size` at `bytes_per_page`, never fewer than one.
fn pages_per_chunk(max_size: u64, bytes_per_page: usize) -> usize {
    ((max_size / bytes_per_page as u64) as usize).max(1)
}

// ── Splitting ────────────────────────────────────────────────────────────

/// Split `chunk` into `"{title} (Part n)"` runs if its estimated size
/// exceeds `max_size`; otherwise return it unchanged.
pub fn split_large_chunk(chunk: Chunk, max_size: u64, bytes_per_page: usize) -> Vec<Chunk> {
    let estimated = bytes_per_page as u64 * chunk.page_count() as u64;
    if bytes_per_page == 0 || estimated <= max_size {
        return vec![chunk];
    }

    let step = pages_per_chunk(max_size, bytes_per_page);
    chunk
        .pages()
        .step_by(step)
        .enumerate()
        .map(|(part, start)| {
            let end = (start + step).min(chunk.end_page);
            Chunk::new(
                chunk.level,
                format!("{} (Part {})", chunk.title, part + 1),
                start,
                end,
            )
        })
        .collect()
}

/// Build chunks from outline entries.
///
/// Entry *i* ends where the next entry at the same or a shallower level
/// starts. Ranges are clamped to the document and to at least one page, so
/// two headings on one page each still get that page.
pub fn build_toc_chunks(
    toc: &[TocEntry],
    total_pages: usize,
    max_size: u64,
    bytes_per_page: usize,
) -> Vec<Chunk> {
    if total_pages == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::with_capacity(toc.len());
    for (i, entry) in toc.iter().enumerate() {
        let next_start = toc[i + 1..]
            .iter()
            .find(|next| next.level <= entry.level)
            .map(|next| next.page.saturating_sub(1))
            .unwrap_or(total_pages);

        let start = entry.page.saturating_sub(1).min(total_pages - 1);
        let end = next_start.clamp(start + 1, total_pages);

        let chunk = Chunk::new(entry.level, entry.title.clone(), start, end);
        chunks.extend(split_large_chunk(chunk, max_size, bytes_per_page));
    }
    chunks
}

/// Fallback for documents without an outline: equal page runs titled
/// `"Section n"`. A zero `bytes_per_page` yields one chunk.
pub fn build_size_based_chunks(total_pages: usize, max_size: u64, bytes_per_page: usize) -> Vec<Chunk> {
    if total_pages == 0 {
        return Vec::new();
    }
    let step = if bytes_per_page == 0 {
        total_pages
    } else {
        pages_per_chunk(max_size, bytes_per_page)
    };

    (0..total_pages)
        .step_by(step)
        .enumerate()
        .map(|(n, start)| {
            Chunk::new(
                1,
                format!("Section {}", n + 1),
                start,
                (start + step).min(total_pages),
            )
        })
        .collect()
}

/// Plan the chunks for a document.
///
/// With an outline the three-point estimate is used once for all entries.
/// Without one, only the first page is measured; a blank first page (cover
/// image, empty title page) falls back to the three-point estimate.
pub fn plan_chunks<E>(
    toc: &[TocEntry],
    total_pages: usize,
    max_size: u64,
    mut sample: impl FnMut(usize) -> Result<usize, E>,
) -> Result<ChunkPlan, E> {
    if toc.is_empty() {
        let mut bytes_per_page = if total_pages > 0 { sample(0)? } else { 0 };
        if bytes_per_page == 0 {
            bytes_per_page = estimate_bytes_per_page(total_pages, &mut sample)?;
        }
        return Ok(ChunkPlan {
            chunks: build_size_based_chunks(total_pages, max_size, bytes_per_page),
            bytes_per_page,
            from_toc: false,
            total_pages,
        });
    }

    let bytes_per_page = estimate_bytes_per_page(total_pages, &mut sample)?;
    Ok(ChunkPlan {
        chunks: build_toc_chunks(toc, total_pages, max_size, bytes_per_page),
        bytes_per_page,
        from_toc: true,
        total_pages,
    })
}
