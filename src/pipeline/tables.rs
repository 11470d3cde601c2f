//! Table detection over reconstructed lines.
//!
//! A text table is at least two consecutive lines with the same number of
//! cells (two or more) whose columns line up. The line strategies also
//! require drawn horizontal rules around the candidate, which filters out
//! tab-aligned prose and forms.

use crate::config::TableStrategy;
use crate::pipeline::layout::{Cell, Line, Rule};
use std::ops::Range;

/// Runs of line indices that form tables, in page order.
pub fn detect_tables(lines: &[Line], rules: &[Rule], strategy: TableStrategy) -> Vec<Range<usize>> {
    if strategy == TableStrategy::None {
        return Vec::new();
    }
    text_candidates(lines)
        .into_iter()
        .filter(|run| match strategy {
            TableStrategy::Text => true,
            TableStrategy::Lines => has_rules(&lines[run.clone()], rules, false),
            TableStrategy::LinesStrict => has_rules(&lines[run.clone()], rules, true),
            TableStrategy::None => false,
        })
        .collect()
}

fn text_candidates(lines: &[Line]) -> Vec<Range<usize>> {
    let cells: Vec<Vec<Cell>> = lines.iter().map(Line::cells).collect();
    let mut runs = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let width = cells[i].len();
        if width < 2 {
            i += 1;
            continue;
        }
        let tolerance = (lines[i].size() * 0.5).max(2.0);
        let mut j = i + 1;
        while j < lines.len()
            && cells[j].len() == width
            && columns_align(&cells[i], &cells[j], tolerance)
        {
            j += 1;
        }
        if j - i >= 2 {
            runs.push(i..j);
            i = j;
        } else {
            i += 1;
        }
    }
    runs
}

/// Columns align when each pair of cells shares a left edge, right edge or
/// centre. Numeric columns are usually right-aligned.
fn columns_align(a: &[Cell], b: &[Cell], tolerance: f32) -> bool {
    a.iter().zip(b).all(|(x, y)| {
        (x.left - y.left).abs() <= tolerance
            || (x.right - y.right).abs() <= tolerance
            || ((x.left + x.right) - (y.left + y.right)).abs() / 2.0 <= tolerance
    })
}

/// `strict` needs a rule at or above the first row and one at or below the
/// last row; otherwise any rule touching the block will do.
fn has_rules(run: &[Line], rules: &[Rule], strict: bool) -> bool {
    let (Some(first), Some(last)) = (run.first(), run.last()) else {
        return false;
    };
    let left = run.iter().map(Line::left).fold(f32::INFINITY, f32::min);
    let right = run.iter().map(Line::right).fold(f32::NEG_INFINITY, f32::max);
    let pad = first.size().max(last.size());
    let top = first.top() + pad;
    let bottom = last.bottom() - pad;

    let nearby: Vec<&Rule> = rules
        .iter()
        .filter(|r| r.left < right && r.right > left && r.y <= top && r.y >= bottom)
        .collect();

    if strict {
        nearby.iter().any(|r| r.y >= first.center()) && nearby.iter().any(|r| r.y <= last.center())
    } else {
        !nearby.is_empty()
    }
}

/// Render rows as a GFM table; the first row is the header.
pub fn to_markdown(rows: &[Vec<String>]) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    if columns == 0 {
        return String::new();
    }
    let render_row = |row: &[String]| {
        let mut out = String::from("|");
        for c in 0..columns {
            let cell = row.get(c).map(|s| escape_cell(s)).unwrap_or_default();
            out.push(' ');
            out.push_str(&cell);
            out.push_str(" |");
        }
        out
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(render_row(&rows[0]));
    lines.push(format!("|{}", " --- |".repeat(columns)));
    for row in &rows[1..] {
        lines.push(render_row(row));
    }
    lines.join("\n")
}

fn escape_cell(text: &str) -> String {
    text.trim().replace('|', "\\|")
}
