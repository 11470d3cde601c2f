//! pdfium adapter: read one page into a [`PageContent`] and render page
//! ranges to Markdown.

use crate::config::{HeaderStrategy, Margins};
use crate::pipeline::headers::{FontHistogram, HeaderDetector};
use crate::pipeline::images::ImageSink;
use crate::pipeline::layout::{self, Glyph, LayoutOptions, PageContent, PlacedImage, Rule};
use crate::pipeline::toc::TocEntry;
use pdfium_render::prelude::*;
use std::ops::Range;
use thiserror::Error;
use tracing::{debug, warn};

/// Paths thinner than this (points) are treated as horizontal rules.
const RULE_THICKNESS: f32 = 2.0;
/// Paths narrower than this are ignored (glyph-like decorations, ticks).
const RULE_MIN_WIDTH: f32 = 10.0;
/// Pages used to build the font-size histogram for header ranking.
const HISTOGRAM_PAGES: usize = 3;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("page {page}: {detail}")]
    Page { page: usize, detail: String },

    #[error("image {n} on page {page}: {detail}")]
    Image { page: usize, n: usize, detail: String },
}

/// Per-document settings shared by every page.
#[derive(Debug, Clone)]
pub struct PageSettings {
    pub layout: LayoutOptions,
    pub ignore_graphics: bool,
    pub header_strategy: HeaderStrategy,
    pub body_limit: Option<f32>,
    pub max_header_levels: u8,
}

/// Read characters, rules and images of one 0-indexed page.
///
/// Images are only decoded when `images` is an active sink, and only when
/// they lie inside the margins.
pub fn read_page(
    document: &PdfDocument,
    index: usize,
    settings: &PageSettings,
    images: Option<&ImageSink>,
) -> Result<PageContent, ExtractError> {
    let ignore_graphics = settings.ignore_graphics;
    let page_err = |detail: String| ExtractError::Page {
        page: index + 1,
        detail,
    };
    let page = document
        .pages()
        .get(index as u16)
        .map_err(|e| page_err(format!("{e:?}")))?;
    let text = page.text().map_err(|e| page_err(format!("{e:?}")))?;

    let mut content = PageContent {
        index,
        width: page.width().value,
        height: page.height().value,
        ..Default::default()
    };

    for ch in text.chars().iter() {
        let Some(c) = ch.unicode_char() else { continue };
        if c.is_whitespace() || c.is_control() {
            continue;
        }
        let Ok(rect) = ch.tight_bounds().or_else(|_| ch.loose_bounds()) else {
            continue;
        };
        let (top, bottom) = (rect.top().value, rect.bottom().value);
        let size = ch.scaled_font_size().value;
        content.glyphs.push(Glyph {
            ch: c,
            left: rect.left().value,
            right: rect.right().value,
            top,
            bottom,
            size: if size > 0.0 { size } else { (top - bottom).abs() },
        });
    }

    let sink = images.filter(|s| s.is_active());
    if ignore_graphics && sink.is_none() {
        return Ok(content);
    }

    let mut image_count = 0;
    for object in page.objects().iter() {
        match object.object_type() {
            PdfPageObjectType::Path if !ignore_graphics => {
                if let Ok(bounds) = object.bounds() {
                    push_rules(
                        &mut content.rules,
                        bounds.left().value,
                        bounds.right().value,
                        bounds.top().value,
                        bounds.bottom().value,
                    );
                }
            }
            PdfPageObjectType::Image => {
                let (Some(sink), Some(image_object)) = (sink, object.as_image_object()) else {
                    continue;
                };
                let Ok(bounds) = object.bounds() else { continue };
                let (top, bottom) = (bounds.top().value, bounds.bottom().value);
                if !content.keeps_image(&settings.layout.margins, top, bottom) {
                    debug!("Page {}: image outside margins skipped", index + 1);
                    continue;
                }
                let raw = match image_object.get_raw_image() {
                    Ok(raw) => raw,
                    Err(e) => {
                        warn!("Page {}: unreadable image skipped: {:?}", index + 1, e);
                        continue;
                    }
                };
                image_count += 1;
                let markdown = sink
                    .emit(&raw, index + 1, image_count)
                    .map_err(|detail| ExtractError::Image {
                        page: index + 1,
                        n: image_count,
                        detail,
                    })?;
                content.images.push(PlacedImage {
                    top,
                    bottom,
                    markdown,
                });
            }
            _ => {}
        }
    }

    debug!(
        "Page {}: {} glyphs, {} rules, {} images",
        index + 1,
        content.glyphs.len(),
        content.rules.len(),
        content.images.len()
    );
    Ok(content)
}

/// A thin path is one rule; a box contributes its top and bottom edges.
fn push_rules(rules: &mut Vec<Rule>, left: f32, right: f32, top: f32, bottom: f32) {
    if right - left < RULE_MIN_WIDTH {
        return;
    }
    if (top - bottom).abs() <= RULE_THICKNESS {
        rules.push(Rule {
            left,
            right,
            y: (top + bottom) / 2.0,
        });
    } else {
        rules.push(Rule { left, right, y: top });
        rules.push(Rule {
            left,
            right,
            y: bottom,
        });
    }
}

/// Character counts per font size over the first pages of a range.
pub fn font_histogram(pages: &[PageContent], margins: &Margins) -> FontHistogram {
    let mut histogram = FontHistogram::default();
    for page in pages.iter().take(HISTOGRAM_PAGES) {
        let mut page = page.clone();
        page.clip_to_margins(margins);
        page.add_to_histogram(&mut histogram);
    }
    histogram
}

/// Render a page range to Markdown. Returns the text and the number of
/// images emitted.
pub fn render_range(
    document: &PdfDocument,
    pages: Range<usize>,
    settings: &PageSettings,
    toc: &[TocEntry],
    images: Option<&ImageSink>,
) -> Result<(String, usize), ExtractError> {
    let contents = pages
        .map(|i| read_page(document, i, settings, images))
        .collect::<Result<Vec<_>, _>>()?;

    let headers = HeaderDetector::for_strategy(
        settings.header_strategy,
        toc,
        || font_histogram(&contents, &settings.layout.margins),
        settings.body_limit,
        settings.max_header_levels,
    );

    let image_count = contents.iter().map(|c| c.images.len()).sum();
    let rendered: Vec<String> = contents
        .iter()
        .map(|c| layout::render_page(c, &settings.layout, &headers))
        .collect();
    Ok((layout::join_pages(&rendered), image_count))
}

/// Byte length of one page's Markdown, without headers or images. Used to
/// size chunks.
pub fn page_markdown_len(
    document: &PdfDocument,
    index: usize,
    settings: &PageSettings,
) -> Result<usize, ExtractError> {
    let content = read_page(document, index, settings, None)?;
    let markdown = layout::render_page(&content, &settings.layout, &HeaderDetector::None);
    Ok(markdown.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thin_paths_are_single_rules() {
        let mut rules = Vec::new();
        push_rules(&mut rules, 50.0, 500.0, 400.5, 399.5);
        assert_eq!(
            rules,
            vec![Rule {
                left: 50.0,
                right: 500.0,
                y: 400.0
            }]
        );
    }

    #[test]
    fn boxes_contribute_both_edges() {
        let mut rules = Vec::new();
        push_rules(&mut rules, 50.0, 500.0, 420.0, 380.0);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].y, 420.0);
        assert_eq!(rules[1].y, 380.0);
    }

    #[test]
    fn narrow_paths_are_ignored() {
        let mut rules = Vec::new();
        push_rules(&mut rules, 50.0, 55.0, 400.5, 399.5);
        assert!(rules.is_empty());
    }

    #[test]
    fn histogram_uses_first_pages_inside_margins() {
        let glyph = |size: f32, y: f32| Glyph {
            ch: 'x',
            left: 100.0,
            right: 105.0,
            top: y + size * 0.7,
            bottom: y,
            size,
        };
        let page = |glyphs: Vec<Glyph>| PageContent {
            width: 612.0,
            height: 792.0,
            glyphs,
            ..Default::default()
        };
        let pages = vec![
            page(vec![glyph(10.0, 400.0), glyph(10.0, 380.0), glyph(9.0, 780.0)]),
            page(vec![glyph(18.0, 700.0)]),
            page(vec![glyph(10.0, 400.0)]),
            page(vec![glyph(30.0, 400.0)]),
        ];
        let h = font_histogram(&pages, &Margins::default());
        assert_eq!(h.modal_size(), Some(10));
        let d = HeaderDetector::from_fonts(&h, None, 6);
        assert_eq!(d.level(0, "Title", 18.0), Some(1));
        // The fourth page is outside the sample.
        assert_eq!(d.level(0, "Title", 30.0), None);
    }
}
