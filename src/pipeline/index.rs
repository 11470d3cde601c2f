//! The cross-linked index file listing every converted chunk.

use crate::output::ChunkResult;
use crate::pipeline::worker::write_atomic;
use std::path::{Path, PathBuf};

/// Name of the index file for a document stem.
pub fn index_file_name(stem: &str) -> String {
    format!("{stem}-index.md")
}

/// Render the index: successful chunks in page order, indented by level.
pub fn render_index(results: &[ChunkResult], stem: &str) -> String {
    let mut ok: Vec<&ChunkResult> = results.iter().filter(|r| r.is_ok()).collect();
    // Stable sort keeps plan order for chunks starting on the same page.
    ok.sort_by_key(|r| (r.start_page, r.index));

    let mut out = format!("# {stem}\n\n## Table of Contents\n\n");
    for r in ok {
        let indent = "  ".repeat(r.level.saturating_sub(1));
        out.push_str(&format!(
            "{indent}- [{}](./{}) (pages {}-{})\n",
            escape_link_text(&r.title),
            r.file,
            r.start_page,
            r.end_page
        ));
    }
    out
}

/// Write `{stem}-index.md` into `output_dir` and return its path.
pub fn generate_index(
    results: &[ChunkResult],
    output_dir: &Path,
    stem: &str,
) -> std::io::Result<PathBuf> {
    let path = output_dir.join(index_file_name(stem));
    write_atomic(&path, &render_index(results, stem))?;
    Ok(path)
}

fn escape_link_text(title: &str) -> String {
    title.replace('[', "\\[").replace(']', "\\]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChunkError;

    fn result(index: usize, level: usize, title: &str, start: usize, end: usize) -> ChunkResult {
        ChunkResult {
            index,
            title: title.into(),
            level,
            file: format!("book-{:04}-{}.md", start - 1, title.to_lowercase()),
            start_page: start,
            end_page: end,
            bytes: 100,
            images: 0,
            duration_ms: 1,
            error: None,
        }
    }

    #[test]
    fn index_lists_successful_chunks_by_page() {
        let mut failed = result(2, 1, "Broken", 20, 30);
        failed.error = Some(ChunkError::ExtractFailed {
            title: "Broken".into(),
            detail: "bad page".into(),
        });
        // Completion order differs from page order.
        let results = vec![
            result(1, 2, "Setup", 5, 9),
            failed,
            result(0, 1, "Intro", 1, 9),
        ];
        assert_eq!(
            render_index(&results, "book"),
            "# book\n\n## Table of Contents\n\n\
             - [Intro](./book-0000-intro.md) (pages 1-9)\n  \
             - [Setup](./book-0004-setup.md) (pages 5-9)\n"
        );
    }

    #[test]
    fn same_start_page_keeps_plan_order() {
        let results = vec![result(1, 2, "B", 3, 4), result(0, 1, "A", 3, 10)];
        let index = render_index(&results, "doc");
        assert!(index.find("[A]").unwrap() < index.find("[B]").unwrap());
    }

    #[test]
    fn brackets_in_titles_are_escaped() {
        let results = vec![result(0, 1, "Notes [draft]", 1, 2)];
        assert!(render_index(&results, "doc").contains("- [Notes \\[draft\\]](./"));
    }

    #[test]
    fn index_is_written_to_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = generate_index(&[result(0, 1, "Intro", 1, 2)], dir.path(), "book").unwrap();
        assert_eq!(path, dir.path().join("book-index.md"));
        assert!(std::fs::read_to_string(path).unwrap().starts_with("# book\n"));
    }
}
