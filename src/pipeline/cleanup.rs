//! Post-processing: deterministic cleanup of extracted Markdown.
//!
//! Text pulled out of a PDF carries print artefacts: dot leaders from tables
//! of contents, list markers separated from their text, running page
//! numbers, section titles that were set in body font, and paragraphs
//! broken at every printed line. Each rule below fixes one of them with a
//! regex or a single line scan.
//!
//! ## Rule Order
//!
//! List markers are re-attached before header promotion so that `1.` on its
//! own line is not mistaken for a title. Blank lines are collapsed before
//! page numbers are removed, and trailing whitespace is stripped last so the
//! paragraph merge sees clean line ends.

use crate::config::CleanupOptions;
use once_cell::sync::Lazy;
use regex::Regex;

/// Bullet glyphs recognised as list markers.
pub const BULLET_CHARS: &str = "•◦▪▸▹►◆◇○●■□▶▷";

/// Apply the enabled cleanup rules.
///
/// Rules (applied in order):
/// 0. Normalise line endings and strip invisible Unicode
/// 1. Replace dot leaders with a single space
/// 2. Re-attach orphaned list markers (`fix_lists`)
/// 3. Promote Title Case and ALL CAPS lines to `##` headers (`fix_headers`)
/// 4. Collapse 3+ newlines to a single blank line
/// 5. Remove lines holding only a page number
/// 6. Strip trailing spaces and tabs
/// 7. Merge paragraph lines broken before a lower-case continuation
pub fn cleanup_markdown(input: &str, options: &CleanupOptions) -> String {
    if !options.enabled {
        return input.to_string();
    }
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = remove_dot_leaders(&s);
    let s = if options.fix_lists {
        fix_orphan_list_markers(&s)
    } else {
        s
    };
    let s = if options.fix_headers {
        promote_headers(&s)
    } else {
        s
    };
    let s = collapse_blank_lines(&s);
    let s = remove_page_numbers(&s);
    let s = trim_trailing_whitespace(&s);
    merge_broken_paragraphs(&s)
}

// ── Rule 0: Normalise line endings, remove invisible Unicode ─────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 1: Dot leaders ──────────────────────────────────────────────────────

static RE_DOT_LEADERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\s*\.\s+){3,}").unwrap());

fn remove_dot_leaders(input: &str) -> String {
    RE_DOT_LEADERS.replace_all(input, " ").to_string()
}

// ── Rule 2: Orphaned list markers ────────────────────────────────────────────

static RE_ORPHAN_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(\s*)(\d+\.)\s*\n+(.+)$").unwrap());

static RE_ORPHAN_BULLET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?m)^(\s*)([{BULLET_CHARS}])\s*\n+(.+)$")).unwrap()
});

/// The text line must not itself look like a marker.
static RE_ORPHAN_DASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(\s*)([-*])\s*\n+([^\s*-].+)$").unwrap());

static RE_ORPHAN_LETTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^(\s*)([a-z]\.)\s*\n+(.+)$").unwrap());

static RE_ORPHAN_ROMAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(\s*)([ivxIVX]+\.)\s*\n+(.+)$").unwrap());

fn fix_orphan_list_markers(input: &str) -> String {
    [
        &*RE_ORPHAN_NUMBER,
        &*RE_ORPHAN_BULLET,
        &*RE_ORPHAN_DASH,
        &*RE_ORPHAN_LETTER,
        &*RE_ORPHAN_ROMAN,
    ]
    .iter()
    .fold(input.to_string(), |text, re| {
        re.replace_all(&text, "${1}${2} ${3}").to_string()
    })
}

// ── Rule 3: Header promotion ─────────────────────────────────────────────────

static RE_NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.").unwrap());

static RE_MARKUP_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^([|!]|[-*+{BULLET_CHARS}]\s)")).unwrap()
});

/// Headers set in body font survive extraction as plain short lines.
///
/// A line under 60 characters with at most 8 words is promoted when 60 % of
/// its words start upper-case and it is followed by a blank or a longer
/// line. Failing that, an ALL CAPS line longer than 3 characters is
/// promoted in Title Case. Table rows, images and list items are left alone.
fn promote_headers(input: &str) -> String {
    let mut lines: Vec<String> = input.split('\n').map(str::to_string).collect();
    for i in 0..lines.len() {
        let stripped = lines[i].trim();
        let is_candidate = !stripped.is_empty()
            && stripped.chars().count() < 60
            && !stripped.starts_with('#')
            && !RE_NUMBERED.is_match(stripped)
            && !RE_MARKUP_LINE.is_match(stripped);
        if !is_candidate {
            continue;
        }

        let words: Vec<&str> = stripped.split_whitespace().collect();
        if words.len() > 8 {
            continue;
        }
        let cap_words = words
            .iter()
            .filter(|w| w.chars().next().is_some_and(char::is_uppercase))
            .count();

        let promoted = if cap_words as f64 >= words.len() as f64 * 0.6 {
            let next = lines.get(i + 1).map(String::as_str).unwrap_or("");
            let next_is_longer = next.chars().count() > stripped.chars().count();
            (next.trim().is_empty() || next_is_longer).then(|| format!("## {stripped}"))
        } else if is_all_caps(stripped) && stripped.chars().count() > 3 {
            Some(format!("## {}", title_case(stripped)))
        } else {
            None
        };

        if let Some(header) = promoted {
            lines[i] = header;
        }
    }
    lines.join("\n")
}

/// At least one cased character, and every cased character upper-case.
fn is_all_caps(text: &str) -> bool {
    let mut cased = false;
    for c in text.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            cased = true;
        }
    }
    cased
}

/// Upper-case the first letter of every letter run, lower-case the rest.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

// ── Rule 4: Collapse blank lines ─────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 5: Standalone page numbers ──────────────────────────────────────────

static RE_PAGE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*\d{1,4}\s*$").unwrap());

fn remove_page_numbers(input: &str) -> String {
    RE_PAGE_NUMBER.replace_all(input, "").to_string()
}

// ── Rule 6: Trailing whitespace ──────────────────────────────────────────────

static RE_TRAILING_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)[ \t]+$").unwrap());

fn trim_trailing_whitespace(input: &str) -> String {
    RE_TRAILING_WS.replace_all(input, "").to_string()
}

// ── Rule 7: Broken paragraphs ────────────────────────────────────────────────

static RE_LIST_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^\s*[\d{BULLET_CHARS}*-]")).unwrap());

const END_PUNCT: [char; 7] = ['.', '!', '?', ':', ';', '"', '\''];

/// Join a line with the next when it does not end a sentence and the next
/// starts lower-case. Only pairs are merged; the joined line is not
/// examined again.
fn merge_broken_paragraphs(input: &str) -> String {
    let lines: Vec<&str> = input.split('\n').collect();
    let mut merged: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let next = lines.get(i + 1).copied().unwrap_or("");
        let should_merge = !line.is_empty()
            && !line.starts_with('#')
            && !RE_LIST_LINE.is_match(line)
            && !line.trim_end().ends_with(END_PUNCT)
            && next.chars().next().is_some_and(char::is_lowercase);
        if should_merge {
            merged.push(format!("{line} {next}"));
            i += 2;
        } else {
            merged.push(line.to_string());
            i += 1;
        }
    }
    merged.join("\n")
}

// ── Tests ────────────────────────────────────────────────────────────────────
