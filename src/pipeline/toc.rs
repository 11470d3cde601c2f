//! Outline (bookmark tree) extraction.

use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Malformed outlines can contain sibling cycles; stop walking after this
/// many entries.
const MAX_ENTRIES: usize = 10_000;
const MAX_DEPTH: usize = 64;

/// One outline entry, flattened depth-first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    /// Nesting depth, 1 for top-level entries.
    pub level: usize,
    pub title: String,
    /// Target page, 1-indexed.
    pub page: usize,
}

/// Read the document outline in reading order.
///
/// Entries whose destination does not resolve to a page are skipped; their
/// children are still visited.
pub fn read_toc(document: &PdfDocument) -> Vec<TocEntry> {
    let mut entries = Vec::new();
    let bookmarks = document.bookmarks();
    if let Some(root) = bookmarks.root() {
        walk_siblings(root, 1, &mut entries);
    }
    if entries.len() >= MAX_ENTRIES {
        warn!("Outline truncated at {} entries", MAX_ENTRIES);
    }
    debug!("Outline has {} entries", entries.len());
    entries
}

fn walk_siblings(first: PdfBookmark, level: usize, entries: &mut Vec<TocEntry>) {
    if level > MAX_DEPTH {
        return;
    }
    let mut current = Some(first);
    while let Some(bookmark) = current {
        if entries.len() >= MAX_ENTRIES {
            return;
        }

        let page = bookmark
            .destination()
            .and_then(|dest| dest.page_index().ok())
            .map(|idx| idx as usize + 1);
        match page {
            Some(page) => entries.push(TocEntry {
                level,
                title: bookmark.title().unwrap_or_default().trim().to_string(),
                page,
            }),
            None => debug!(
                "Skipping outline entry without destination: {:?}",
                bookmark.title()
            ),
        }

        if let Some(child) = bookmark.first_child() {
            walk_siblings(child, level + 1, entries);
        }
        current = bookmark.next_sibling();
    }
}

/// Keep only entries at `depth` or shallower.
pub fn limit_depth(entries: Vec<TocEntry>, depth: Option<usize>) -> Vec<TocEntry> {
    match depth {
        Some(depth) => entries.into_iter().filter(|e| e.level <= depth).collect(),
        None => entries,
    }
}

/// Normalised form used to match outline titles against page text:
/// lower-case with whitespace runs collapsed.
pub fn normalize_title(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}
