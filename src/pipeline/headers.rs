//! Header level detection for extracted lines.
//!
//! Two sources are supported. Outline titles give exact levels but only for
//! documents with a table of contents. Font sizes work everywhere: the sizes
//! used by more characters than any other are body text, and the distinct
//! sizes above it are ranked largest first, so the largest becomes `#`.

use crate::config::HeaderStrategy;
use crate::pipeline::toc::{normalize_title, TocEntry};
use std::collections::{BTreeMap, HashMap};

/// Markdown has six header levels.
pub const MAX_MARKDOWN_LEVEL: usize = 6;

/// Character counts per rounded font size.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontHistogram {
    counts: BTreeMap<u32, usize>,
}

impl FontHistogram {
    pub fn add(&mut self, size: f32, chars: usize) {
        if size.is_finite() && size > 0.0 && chars > 0 {
            *self.counts.entry(size.round() as u32).or_insert(0) += chars;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// The size with the most characters. Ties go to the smaller size.
    pub fn modal_size(&self) -> Option<u32> {
        self.counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(size, _)| *size)
    }
}

/// Assigns header levels to lines of text.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderDetector {
    /// Normalised outline titles keyed by 0-indexed page.
    Toc(HashMap<usize, Vec<(String, usize)>>),
    /// Rounded font size → header level.
    Font(BTreeMap<u32, usize>),
    None,
}

impl HeaderDetector {
    pub fn from_toc(entries: &[TocEntry]) -> Self {
        let mut by_page: HashMap<usize, Vec<(String, usize)>> = HashMap::new();
        for entry in entries {
            let title = normalize_title(&entry.title);
            if title.is_empty() {
                continue;
            }
            by_page
                .entry(entry.page.saturating_sub(1))
                .or_default()
                .push((title, entry.level.clamp(1, MAX_MARKDOWN_LEVEL)));
        }
        HeaderDetector::Toc(by_page)
    }

    /// Rank the sizes above the body size. `body_limit` overrides the modal
    /// size as the body threshold.
    pub fn from_fonts(histogram: &FontHistogram, body_limit: Option<f32>, max_levels: u8) -> Self {
        let limit = match (body_limit, histogram.modal_size()) {
            (Some(limit), _) => limit,
            (None, Some(modal)) => modal as f32,
            (None, None) => return HeaderDetector::Font(BTreeMap::new()),
        };
        let max_levels = (max_levels as usize).clamp(1, MAX_MARKDOWN_LEVEL);

        let levels = histogram
            .counts
            .keys()
            .rev()
            .filter(|&&size| size as f32 > limit)
            .take(max_levels)
            .enumerate()
            .map(|(rank, &size)| (size, rank + 1))
            .collect();
        HeaderDetector::Font(levels)
    }

    /// Pick the detector for a header strategy.
    ///
    /// `fonts` is only called when font ranking is needed.
    pub fn for_strategy(
        strategy: HeaderStrategy,
        toc: &[TocEntry],
        fonts: impl FnOnce() -> FontHistogram,
        body_limit: Option<f32>,
        max_levels: u8,
    ) -> Self {
        match strategy {
            HeaderStrategy::None => HeaderDetector::None,
            HeaderStrategy::Toc => HeaderDetector::from_toc(toc),
            HeaderStrategy::Font => HeaderDetector::from_fonts(&fonts(), body_limit, max_levels),
            HeaderStrategy::Both if !toc.is_empty() => HeaderDetector::from_toc(toc),
            HeaderStrategy::Both => HeaderDetector::from_fonts(&fonts(), body_limit, max_levels),
        }
    }

    /// Header level for a line, or `None` for body text.
    pub fn level(&self, page: usize, text: &str, size: f32) -> Option<usize> {
        if !text.chars().any(char::is_alphanumeric) {
            return None;
        }
        match self {
            HeaderDetector::None => None,
            HeaderDetector::Font(levels) => levels.get(&(size.round() as u32)).copied(),
            HeaderDetector::Toc(by_page) => {
                let titles = by_page.get(&page)?;
                let normalized = normalize_title(text);
                titles
                    .iter()
                    .find(|(title, _)| *title == normalized)
                    .map(|(_, level)| *level)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn histogram(entries: &[(f32, usize)]) -> FontHistogram {
        let mut h = FontHistogram::default();
        for &(size, n) in entries {
            h.add(size, n);
        }
        h
    }

    #[test]
    fn modal_size_picks_most_chars() {
        let h = histogram(&[(10.2, 5000), (18.0, 40), (14.0, 200)]);
        assert_eq!(h.modal_size(), Some(10));
        assert_eq!(FontHistogram::default().modal_size(), None);
    }

    #[test]
    fn fonts_ranked_above_modal_size() {
        let h = histogram(&[(10.0, 5000), (24.0, 20), (18.0, 40), (14.0, 200), (8.0, 300)]);
        let d = HeaderDetector::from_fonts(&h, None, 2);
        assert_eq!(d.level(0, "Title", 24.0), Some(1));
        assert_eq!(d.level(0, "Chapter", 18.2), Some(2));
        assert_eq!(d.level(0, "Section", 14.0), None);
        assert_eq!(d.level(0, "Body", 10.0), None);
        assert_eq!(d.level(0, "Footnote", 8.0), None);
    }

    #[test]
    fn body_limit_overrides_modal_size() {
        let h = histogram(&[(10.0, 5000), (12.0, 900), (16.0, 30)]);
        let d = HeaderDetector::from_fonts(&h, Some(11.0), 4);
        assert_eq!(d.level(3, "Lead", 12.0), Some(2));
        assert_eq!(d.level(3, "Head", 16.0), Some(1));
    }

    #[test]
    fn toc_titles_match_by_page() {
        let toc = vec![
            TocEntry { level: 1, title: "Getting  Started".into(), page: 3 },
            TocEntry { level: 8, title: "Deep".into(), page: 3 },
        ];
        let d = HeaderDetector::from_toc(&toc);
        assert_eq!(d.level(2, "getting started", 11.0), Some(1));
        assert_eq!(d.level(1, "Getting Started", 11.0), None);
        assert_eq!(d.level(2, "Deep", 11.0), Some(6));
        assert_eq!(d.level(2, "Getting Started with Rust", 11.0), None);
    }

    #[test]
    fn punctuation_only_lines_are_never_headers() {
        let h = histogram(&[(10.0, 100), (20.0, 5)]);
        let d = HeaderDetector::from_fonts(&h, None, 4);
        assert_eq!(d.level(0, "* * *", 20.0), None);
    }

    #[test]
    fn strategy_selection() {
        let toc = vec![TocEntry { level: 1, title: "A".into(), page: 1 }];
        let fonts = || histogram(&[(10.0, 10)]);
        assert!(matches!(
            HeaderDetector::for_strategy(HeaderStrategy::Both, &toc, fonts, None, 4),
            HeaderDetector::Toc(_)
        ));
        assert!(matches!(
            HeaderDetector::for_strategy(HeaderStrategy::Both, &[], fonts, None, 4),
            HeaderDetector::Font(_)
        ));
        assert_eq!(
            HeaderDetector::for_strategy(HeaderStrategy::None, &toc, fonts, None, 4),
            HeaderDetector::None
        );
    }
}
