//! Page layout reconstruction: positioned glyphs → lines → blocks → Markdown.
//!
//! Coordinates are PDF points with the origin at the bottom-left of the
//! page, so larger `y` is higher on the page. Nothing in this module touches
//! pdfium; [`crate::pipeline::extract`] fills a [`PageContent`] and hands it
//! over.
//!
//! ```text
//! glyphs ──margins──▶ lines (vertical overlap) ──▶ spans (size, gaps)
//!                       │
//!                       ├─ table runs (tables.rs) ──▶ GFM table
//!                       ├─ header level (headers.rs) ──▶ # …
//!                       ├─ bullet / numbered ──▶ list item
//!                       └─ otherwise ──▶ paragraph (joined until a wide gap)
//! ```

use crate::config::{Margins, TableStrategy};
use crate::pipeline::cleanup::BULLET_CHARS;
use crate::pipeline::headers::{FontHistogram, HeaderDetector};
use crate::pipeline::tables;
use once_cell::sync::Lazy;
use regex::Regex;

/// A gap wider than this many font sizes inside a line inserts a space.
const SPACE_GAP: f32 = 0.25;
/// A gap wider than this many font sizes separates table cells.
pub const CELL_GAP: f32 = 1.5;
/// Line centres further apart than this many font sizes start a new block.
const PARAGRAPH_GAP: f32 = 1.5;
/// Spans whose sizes differ by more than this (points) are kept apart.
const SIZE_TOLERANCE: f32 = 0.5;

/// One positioned character.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    pub ch: char,
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    /// Effective font size in points.
    pub size: f32,
}

impl Glyph {
    fn center_x(&self) -> f32 {
        (self.left + self.right) / 2.0
    }

    fn center_y(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }
}

/// A horizontal line drawn on the page (table borders, header rules).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rule {
    pub left: f32,
    pub right: f32,
    pub y: f32,
}

/// Markdown for an image, ordered among text blocks by its top edge.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedImage {
    pub top: f32,
    pub bottom: f32,
    pub markdown: String,
}

/// Everything layout needs from one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContent {
    /// 0-indexed page number.
    pub index: usize,
    pub width: f32,
    pub height: f32,
    pub glyphs: Vec<Glyph>,
    pub rules: Vec<Rule>,
    pub images: Vec<PlacedImage>,
}

impl PageContent {
    /// Drop glyphs, rules and images whose centre falls inside the margins.
    pub fn clip_to_margins(&mut self, margins: &Margins) {
        if self.width <= 0.0 || self.height <= 0.0 {
            return;
        }
        let x_min = margins.left;
        let x_max = self.width - margins.right;
        let y_min = margins.bottom;
        let y_max = self.height - margins.top;
        let inside_x = |x: f32| x >= x_min && x <= x_max;
        let inside_y = |y: f32| y >= y_min && y <= y_max;

        self.glyphs
            .retain(|g| inside_x(g.center_x()) && inside_y(g.center_y()));
        self.rules
            .retain(|r| inside_y(r.y) && inside_x((r.left + r.right) / 2.0));
        let images = std::mem::take(&mut self.images);
        self.images = images
            .into_iter()
            .filter(|img| self.keeps_image(margins, img.top, img.bottom))
            .collect();
    }

    /// Whether an image spanning `top..bottom` survives margin clipping.
    /// Checked before an image is written so clipped images are never
    /// emitted.
    pub fn keeps_image(&self, margins: &Margins, top: f32, bottom: f32) -> bool {
        if self.width <= 0.0 || self.height <= 0.0 {
            return true;
        }
        let y = (top + bottom) / 2.0;
        y >= margins.bottom && y <= self.height - margins.top
    }

    /// Count visible characters per font size.
    pub fn add_to_histogram(&self, histogram: &mut FontHistogram) {
        for glyph in self.glyphs.iter().filter(|g| !g.ch.is_whitespace()) {
            histogram.add(glyph.size, 1);
        }
    }
}

/// A run of glyphs of one size with no wide gap.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub size: f32,
    chars: usize,
}

impl Span {
    fn from_glyph(g: &Glyph) -> Self {
        Self {
            text: g.ch.to_string(),
            left: g.left,
            right: g.right,
            top: g.top,
            bottom: g.bottom,
            size: g.size,
            chars: 1,
        }
    }

    fn push(&mut self, g: &Glyph) {
        self.text.push(g.ch);
        self.right = self.right.max(g.right);
        self.top = self.top.max(g.top);
        self.bottom = self.bottom.min(g.bottom);
        self.chars += 1;
    }
}

/// A table cell: spans on one line separated by less than [`CELL_GAP`].
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub text: String,
    pub left: f32,
    pub right: f32,
}

/// Spans sharing a baseline, ordered left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub spans: Vec<Span>,
}

impl Line {
    pub fn left(&self) -> f32 {
        self.spans.iter().map(|s| s.left).fold(f32::INFINITY, f32::min)
    }

    pub fn right(&self) -> f32 {
        self.spans.iter().map(|s| s.right).fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn top(&self) -> f32 {
        self.spans.iter().map(|s| s.top).fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn bottom(&self) -> f32 {
        self.spans.iter().map(|s| s.bottom).fold(f32::INFINITY, f32::min)
    }

    pub fn center(&self) -> f32 {
        (self.top() + self.bottom()) / 2.0
    }

    /// Size carrying the most characters.
    pub fn size(&self) -> f32 {
        self.spans
            .iter()
            .max_by_key(|s| s.chars)
            .map(|s| s.size)
            .unwrap_or(0.0)
    }

    pub fn text(&self) -> String {
        let mut out = String::new();
        for (i, span) in self.spans.iter().enumerate() {
            if i > 0 {
                let prev = &self.spans[i - 1];
                if span.left - prev.right > SPACE_GAP * prev.size.max(span.size) {
                    out.push(' ');
                }
            }
            out.push_str(&span.text);
        }
        out
    }

    pub fn cells(&self) -> Vec<Cell> {
        let mut cells: Vec<Cell> = Vec::new();
        let mut prev: Option<&Span> = None;
        for span in &self.spans {
            match (cells.last_mut(), prev) {
                (Some(cell), Some(p)) if span.left - p.right <= CELL_GAP * p.size.max(span.size) => {
                    if span.left - p.right > SPACE_GAP * p.size.max(span.size) {
                        cell.text.push(' ');
                    }
                    cell.text.push_str(&span.text);
                    cell.right = cell.right.max(span.right);
                }
                _ => cells.push(Cell {
                    text: span.text.clone(),
                    left: span.left,
                    right: span.right,
                }),
            }
            prev = Some(span);
        }
        cells
    }
}

/// Group glyphs into lines, top to bottom.
pub fn group_lines(glyphs: &[Glyph]) -> Vec<Line> {
    let mut sorted: Vec<Glyph> = glyphs
        .iter()
        .filter(|g| !g.ch.is_whitespace() && !g.ch.is_control())
        .copied()
        .collect();
    sorted.sort_by(|a, b| {
        b.center_y()
            .total_cmp(&a.center_y())
            .then(a.left.total_cmp(&b.left))
    });

    let mut rows: Vec<Vec<Glyph>> = Vec::new();
    for glyph in sorted {
        match rows.last_mut() {
            Some(row) if same_row(row, &glyph) => row.push(glyph),
            _ => rows.push(vec![glyph]),
        }
    }

    rows.into_iter().map(build_line).collect()
}

fn same_row(row: &[Glyph], glyph: &Glyph) -> bool {
    let top = row.iter().map(|g| g.top).fold(f32::NEG_INFINITY, f32::max);
    let bottom = row.iter().map(|g| g.bottom).fold(f32::INFINITY, f32::min);
    let center = (top + bottom) / 2.0;
    let height = (top - bottom).max(glyph.top - glyph.bottom);
    (glyph.center_y() - center).abs() < 0.5 * height
}

fn build_line(mut row: Vec<Glyph>) -> Line {
    row.sort_by(|a, b| a.left.total_cmp(&b.left));
    let mut spans: Vec<Span> = Vec::new();
    for glyph in &row {
        if let Some(span) = spans.last_mut() {
            let size = span.size.max(glyph.size);
            let gap = glyph.left - span.right;
            if (glyph.size - span.size).abs() <= SIZE_TOLERANCE && gap <= CELL_GAP * size {
                if gap > SPACE_GAP * size {
                    span.text.push(' ');
                }
                span.push(glyph);
                continue;
            }
        }
        spans.push(Span::from_glyph(glyph));
    }
    Line { spans }
}

/// Settings that shape page rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOptions {
    pub margins: Margins,
    pub table_strategy: TableStrategy,
}

#[derive(Debug, Clone, PartialEq)]
enum Block {
    Heading(usize, String),
    Paragraph(String),
    ListItem(String),
    Table(Vec<Vec<String>>),
    Image(String),
}

static RE_ORDERED_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+[.)]|[-*])\s").unwrap());

/// Render one page to Markdown. The result has no trailing newline.
pub fn render_page(content: &PageContent, options: &LayoutOptions, headers: &HeaderDetector) -> String {
    let mut content = content.clone();
    content.clip_to_margins(&options.margins);

    let lines = group_lines(&content.glyphs);
    let table_runs = tables::detect_tables(&lines, &content.rules, options.table_strategy);

    let mut blocks: Vec<(f32, Block)> = Vec::new();
    let mut prev: Option<&Line> = None;
    let mut i = 0;
    while i < lines.len() {
        if let Some(run) = table_runs.iter().find(|r| r.start == i) {
            let rows = lines[run.clone()]
                .iter()
                .map(|line| line.cells().into_iter().map(|c| c.text).collect())
                .collect();
            blocks.push((lines[i].top(), Block::Table(rows)));
            prev = None;
            i = run.end;
            continue;
        }

        let line = &lines[i];
        let text = line.text();
        let continues = prev.is_some_and(|p| {
            p.center() - line.center() <= PARAGRAPH_GAP * p.size().max(line.size())
        });

        if let Some(level) = headers.level(content.index, &text, line.size()) {
            match blocks.last_mut() {
                Some((_, Block::Heading(l, title))) if *l == level && continues => {
                    title.push(' ');
                    title.push_str(&text);
                }
                _ => blocks.push((line.top(), Block::Heading(level, text))),
            }
        } else if let Some(item) = list_item(&text) {
            blocks.push((line.top(), Block::ListItem(item)));
        } else {
            let same_size = prev.is_some_and(|p| (p.size() - line.size()).abs() <= 1.0);
            match blocks.last_mut() {
                Some((_, Block::Paragraph(buf))) | Some((_, Block::ListItem(buf)))
                    if continues && same_size =>
                {
                    join_continuation(buf, &text)
                }
                _ => blocks.push((line.top(), Block::Paragraph(text))),
            }
        }
        prev = Some(line);
        i += 1;
    }

    place_images(&mut blocks, &content.images);
    render_blocks(&blocks)
}

/// `• text` → `- text`; `1. text`, `- text` and `* text` are kept as is.
fn list_item(text: &str) -> Option<String> {
    let mut chars = text.chars();
    let first = chars.next()?;
    if BULLET_CHARS.contains(first) {
        let rest = chars.as_str().trim_start();
        return Some(format!("- {rest}"));
    }
    RE_ORDERED_ITEM.is_match(text).then(|| text.to_string())
}

/// Append a wrapped line, undoing end-of-line hyphenation.
fn join_continuation(buf: &mut String, next: &str) {
    let hyphenated = buf.ends_with('-')
        && buf
            .chars()
            .rev()
            .nth(1)
            .is_some_and(char::is_alphabetic)
        && next.chars().next().is_some_and(char::is_lowercase);
    if hyphenated {
        buf.pop();
    } else {
        buf.push(' ');
    }
    buf.push_str(next);
}

fn place_images(blocks: &mut Vec<(f32, Block)>, images: &[PlacedImage]) {
    for image in images {
        let at = blocks
            .iter()
            .position(|(top, _)| *top < image.top)
            .unwrap_or(blocks.len());
        blocks.insert(at, (image.top, Block::Image(image.markdown.clone())));
    }
}

fn render_blocks(blocks: &[(f32, Block)]) -> String {
    let mut out = String::new();
    for (i, (_, block)) in blocks.iter().enumerate() {
        if i > 0 {
            let tight = matches!(
                (&blocks[i - 1].1, block),
                (Block::ListItem(_), Block::ListItem(_))
            );
            out.push_str(if tight { "\n" } else { "\n\n" });
        }
        match block {
            Block::Heading(level, text) => {
                out.push_str(&"#".repeat(*level));
                out.push(' ');
                out.push_str(text);
            }
            Block::Paragraph(text) | Block::ListItem(text) | Block::Image(text) => {
                out.push_str(text)
            }
            Block::Table(rows) => out.push_str(&tables::to_markdown(rows)),
        }
    }
    out
}

/// Join rendered pages with a blank line and end with one newline.
pub fn join_pages(pages: &[String]) -> String {
    let mut out = pages
        .iter()
        .map(|p| p.trim_end())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    out.push('\n');
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pipeline::toc::TocEntry;

    /// Lay out `text` as glyphs 0.5 × size wide, starting at `x` on baseline `y`.
    pub(crate) fn word_glyphs(text: &str, x: f32, y: f32, size: f32) -> Vec<Glyph> {
        let w = size * 0.5;
        text.chars()
            .enumerate()
            .filter(|(_, ch)| *ch != ' ')
            .map(|(i, ch)| Glyph {
                ch,
                left: x + i as f32 * w,
                right: x + i as f32 * w + w * 0.9,
                top: y + size * 0.7,
                bottom: y,
                size,
            })
            .collect()
    }

    fn page(glyphs: Vec<Glyph>) -> PageContent {
        PageContent {
            index: 0,
            width: 612.0,
            height: 792.0,
            glyphs,
            ..Default::default()
        }
    }

    fn options() -> LayoutOptions {
        LayoutOptions {
            margins: Margins::new(0.0, 0.0, 0.0, 0.0),
            table_strategy: TableStrategy::Text,
        }
    }

    #[test]
    fn group_lines_orders_top_to_bottom() {
        let mut glyphs = word_glyphs("second", 72.0, 600.0, 10.0);
        glyphs.extend(word_glyphs("first", 72.0, 700.0, 10.0));
        let lines = group_lines(&glyphs);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "first");
        assert_eq!(lines[1].text(), "second");
    }

    #[test]
    fn word_gaps_become_spaces() {
        let lines = group_lines(&word_glyphs("hello world", 72.0, 700.0, 10.0));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text(), "hello world");
        assert_eq!(lines[0].cells().len(), 1);
    }

    #[test]
    fn wide_gaps_split_cells() {
        let mut glyphs = word_glyphs("Name", 72.0, 700.0, 10.0);
        glyphs.extend(word_glyphs("Value", 200.0, 700.0, 10.0));
        let lines = group_lines(&glyphs);
        let cells = lines[0].cells();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].text, "Name");
        assert_eq!(cells[1].text, "Value");
        assert_eq!(lines[0].text(), "Name Value");
    }

    #[test]
    fn margins_drop_headers_and_footers() {
        let mut content = page(word_glyphs("Running head", 72.0, 770.0, 9.0));
        content.glyphs.extend(word_glyphs("Body", 72.0, 400.0, 10.0));
        content.glyphs.extend(word_glyphs("12", 300.0, 20.0, 9.0));
        content.clip_to_margins(&Margins::default());
        let lines = group_lines(&content.glyphs);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text(), "Body");
    }

    #[test]
    fn wrapped_lines_join_into_paragraph() {
        let mut glyphs = word_glyphs("The quick brown fox jum-", 72.0, 700.0, 10.0);
        glyphs.extend(word_glyphs("ped over the dog.", 72.0, 688.0, 10.0));
        glyphs.extend(word_glyphs("New paragraph.", 72.0, 650.0, 10.0));
        let md = render_page(&page(glyphs), &options(), &HeaderDetector::None);
        assert_eq!(md, "The quick brown fox jumped over the dog.\n\nNew paragraph.");
    }

    #[test]
    fn font_headers_and_bullets() {
        let mut glyphs = word_glyphs("Introduction", 72.0, 700.0, 18.0);
        glyphs.extend(word_glyphs("• first point", 72.0, 670.0, 10.0));
        glyphs.extend(word_glyphs("• second point", 72.0, 658.0, 10.0));
        let mut hist = FontHistogram::default();
        hist.add(10.0, 1000);
        hist.add(18.0, 12);
        let headers = HeaderDetector::from_fonts(&hist, None, 4);
        let md = render_page(&page(glyphs), &options(), &headers);
        assert_eq!(md, "# Introduction\n\n- first point\n- second point");
    }

    #[test]
    fn tables_render_as_gfm() {
        let mut glyphs = Vec::new();
        for (row, (a, b)) in [("Key", "Value"), ("alpha", "1"), ("beta", "2")].iter().enumerate() {
            let y = 700.0 - row as f32 * 14.0;
            glyphs.extend(word_glyphs(a, 72.0, y, 10.0));
            glyphs.extend(word_glyphs(b, 250.0, y, 10.0));
        }
        let md = render_page(&page(glyphs), &options(), &HeaderDetector::None);
        assert_eq!(
            md,
            "| Key | Value |\n| --- | --- |\n| alpha | 1 |\n| beta | 2 |"
        );
    }

    #[test]
    fn images_are_placed_by_position() {
        let mut content = page(word_glyphs("Above", 72.0, 700.0, 10.0));
        content.glyphs.extend(word_glyphs("Below", 72.0, 300.0, 10.0));
        content.images.push(PlacedImage {
            top: 500.0,
            bottom: 400.0,
            markdown: "![](images/x.png)".into(),
        });
        let md = render_page(&content, &options(), &HeaderDetector::None);
        assert_eq!(md, "Above\n\n![](images/x.png)\n\nBelow");
    }

    #[test]
    fn toc_headers_match_titles_on_their_page() {
        let toc = vec![
            TocEntry {
                level: 2,
                title: "Getting  started".into(),
                page: 1,
            },
            TocEntry {
                level: 1,
                title: "Summary".into(),
                page: 5,
            },
        ];
        let mut glyphs = word_glyphs("Getting Started", 72.0, 700.0, 10.0);
        glyphs.extend(word_glyphs("Some text.", 72.0, 650.0, 10.0));
        glyphs.extend(word_glyphs("Summary", 72.0, 600.0, 10.0));
        let md = render_page(&page(glyphs), &options(), &HeaderDetector::from_toc(&toc));
        assert_eq!(md, "## Getting Started\n\nSome text.\n\nSummary");
    }

    fn ruled_grid() -> PageContent {
        let mut glyphs = Vec::new();
        for (row, (a, b)) in [("Key", "Value"), ("alpha", "1"), ("beta", "2")].iter().enumerate() {
            let y = 700.0 - row as f32 * 14.0;
            glyphs.extend(word_glyphs(a, 72.0, y, 10.0));
            glyphs.extend(word_glyphs(b, 250.0, y, 10.0));
        }
        let mut content = page(glyphs);
        content.rules = vec![
            Rule {
                left: 60.0,
                right: 400.0,
                y: 712.0,
            },
            Rule {
                left: 60.0,
                right: 400.0,
                y: 668.0,
            },
        ];
        content
    }

    #[test]
    fn rule_strategies_without_graphics_find_no_table() {
        let lines_options = |table_strategy| LayoutOptions {
            table_strategy,
            ..options()
        };
        let ruled = ruled_grid();
        for strategy in [TableStrategy::Lines, TableStrategy::LinesStrict] {
            let md = render_page(&ruled, &lines_options(strategy), &HeaderDetector::None);
            assert!(md.starts_with("| Key | Value |"), "{strategy:?}: {md}");
        }

        // Pages read with graphics ignored carry no rules.
        let mut bare = ruled_grid();
        bare.rules.clear();
        for strategy in [TableStrategy::Lines, TableStrategy::LinesStrict] {
            let md = render_page(&bare, &lines_options(strategy), &HeaderDetector::None);
            assert!(!md.contains('|'), "{strategy:?}: {md}");
            assert!(md.contains("alpha"));
        }
    }

    #[test]
    fn images_in_margin_bands_are_not_kept() {
        let margins = Margins::default();
        let content = page(Vec::new());
        assert!(!content.keeps_image(&margins, 785.0, 765.0));
        assert!(!content.keeps_image(&margins, 30.0, 10.0));
        assert!(content.keeps_image(&margins, 500.0, 400.0));

        let unsized_page = PageContent::default();
        assert!(unsized_page.keeps_image(&margins, 785.0, 765.0));

        let mut clipped = page(Vec::new());
        for (top, bottom) in [(785.0, 765.0), (500.0, 400.0)] {
            clipped.images.push(PlacedImage {
                top,
                bottom,
                markdown: format!("![]({top}.png)"),
            });
        }
        clipped.clip_to_margins(&margins);
        assert_eq!(clipped.images.len(), 1);
        assert!(content.keeps_image(&margins, clipped.images[0].top, clipped.images[0].bottom));
    }

    #[test]
    fn join_pages_skips_blank_pages() {
        let pages = vec!["one\n".to_string(), String::new(), "two".to_string()];
        assert_eq!(join_pages(&pages), "one\n\ntwo\n");
    }
}
