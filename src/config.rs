//! Configuration types for chunked PDF-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Every knob lives in one struct so a
//! config can be cloned into each worker and logged in one line.

use crate::error::Pdf2MdError;
use crate::progress::ProgressCallback;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default upper bound on a chunk's estimated Markdown size: 1 MiB.
pub const DEFAULT_MAX_CHUNK_SIZE: u64 = 1024 * 1024;

/// Configuration for a chunked PDF-to-Markdown conversion.
///
/// # Example
/// ```rust
/// use tocmd::{ConversionConfig, TableStrategy};
///
/// let config = ConversionConfig::builder()
///     .max_chunk_size(512 * 1024)
///     .workers(4)
///     .table_strategy(TableStrategy::Text)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Upper bound on the estimated Markdown bytes of one chunk. Default: 1 MiB.
    ///
    /// Chunks are sized from a bytes-per-page estimate, so an individual
    /// file can overshoot when its pages are denser than the sampled ones.
    pub max_chunk_size: u64,

    /// Number of chunks converted concurrently. Default: available cores.
    pub workers: usize,

    /// Output directory. `None` means `{input-stem}-markdown/` next to the input.
    pub output_dir: Option<PathBuf>,

    /// Image extraction settings.
    pub images: ImageOptions,

    /// Skip vector graphics. Line-based table strategies find no rules.
    pub ignore_graphics: bool,

    /// How tables are recognised. Default: [`TableStrategy::LinesStrict`].
    pub table_strategy: TableStrategy,

    /// Page margins (in points) whose content is discarded. Default: `0,36,0,36`.
    pub margins: Margins,

    /// Markdown cleanup passes.
    pub cleanup: CleanupOptions,

    /// Header detection strategy. Default: [`HeaderStrategy::Both`].
    pub header_strategy: HeaderStrategy,

    /// Font size (pt) at or below which text is body text.
    /// `None` uses the most frequent font size of the sampled pages.
    pub body_limit: Option<f32>,

    /// Number of header levels font-based detection may assign (1–6). Default: 4.
    pub max_header_levels: u8,

    /// Ignore outline entries deeper than this level. Default: all levels.
    pub toc_depth: Option<usize>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receives per-chunk progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            workers: default_workers(),
            output_dir: None,
            images: ImageOptions::default(),
            ignore_graphics: false,
            table_strategy: TableStrategy::default(),
            margins: Margins::default(),
            cleanup: CleanupOptions::default(),
            header_strategy: HeaderStrategy::default(),
            body_limit: None,
            max_header_levels: 4,
            toc_depth: None,
            password: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("max_chunk_size", &self.max_chunk_size)
            .field("workers", &self.workers)
            .field("output_dir", &self.output_dir)
            .field("images", &self.images)
            .field("ignore_graphics", &self.ignore_graphics)
            .field("table_strategy", &self.table_strategy)
            .field("margins", &self.margins)
            .field("cleanup", &self.cleanup)
            .field("header_strategy", &self.header_strategy)
            .field("body_limit", &self.body_limit)
            .field("max_header_levels", &self.max_header_levels)
            .field("toc_depth", &self.toc_depth)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Cleanup options actually in effect: header promotion is pointless
    /// when header detection is switched off.
    pub fn effective_cleanup(&self) -> CleanupOptions {
        let mut opts = self.cleanup;
        if self.header_strategy == HeaderStrategy::None {
            opts.fix_headers = false;
        }
        opts
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn max_chunk_size(mut self, bytes: u64) -> Self {
        self.config.max_chunk_size = bytes;
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n.max(1);
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    pub fn images(mut self, images: ImageOptions) -> Self {
        self.config.images = images;
        self
    }

    pub fn ignore_graphics(mut self, v: bool) -> Self {
        self.config.ignore_graphics = v;
        self
    }

    pub fn table_strategy(mut self, strategy: TableStrategy) -> Self {
        self.config.table_strategy = strategy;
        self
    }

    pub fn margins(mut self, margins: Margins) -> Self {
        self.config.margins = margins;
        self
    }

    pub fn cleanup(mut self, cleanup: CleanupOptions) -> Self {
        self.config.cleanup = cleanup;
        self
    }

    pub fn header_strategy(mut self, strategy: HeaderStrategy) -> Self {
        self.config.header_strategy = strategy;
        self
    }

    pub fn body_limit(mut self, pts: f32) -> Self {
        self.config.body_limit = Some(pts);
        self
    }

    pub fn max_header_levels(mut self, n: u8) -> Self {
        self.config.max_header_levels = n.clamp(1, 6);
        self
    }

    pub fn toc_depth(mut self, depth: usize) -> Self {
        self.config.toc_depth = Some(depth);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2MdError> {
        let c = &self.config;
        if c.max_chunk_size == 0 {
            return Err(Pdf2MdError::InvalidConfig(
                "max chunk size must be > 0".into(),
            ));
        }
        if c.workers == 0 {
            return Err(Pdf2MdError::InvalidConfig("workers must be ≥ 1".into()));
        }
        if c.toc_depth == Some(0) {
            return Err(Pdf2MdError::InvalidConfig("TOC depth must be ≥ 1".into()));
        }
        let m = c.margins;
        if [m.left, m.top, m.right, m.bottom].iter().any(|v| *v < 0.0) {
            return Err(Pdf2MdError::InvalidConfig(format!(
                "margins must not be negative, got {m}"
            )));
        }
        if let Some(limit) = c.body_limit {
            if limit.is_nan() || limit <= 0.0 {
                return Err(Pdf2MdError::InvalidConfig(format!(
                    "body limit must be positive, got {limit}"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Chunk size ───────────────────────────────────────────────────────────

static RE_SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+)?)\s*([KMG]?)").unwrap());

/// Parse a human-readable size such as `1M`, `500K`, `2G` or `4096`.
///
/// Units are powers of 1024 and case-insensitive. Anything after the unit is
/// ignored, so `1MB` reads as one mebibyte.
pub fn parse_size(s: &str) -> Result<u64, Pdf2MdError> {
    let upper = s.trim().to_uppercase();
    let caps = RE_SIZE
        .captures(&upper)
        .ok_or_else(|| Pdf2MdError::InvalidConfig(format!("Invalid chunk size '{s}'")))?;

    let value: f64 = caps[1]
        .parse()
        .map_err(|_| Pdf2MdError::InvalidConfig(format!("Invalid chunk size '{s}'")))?;
    let multiplier: u64 = match &caps[2] {
        "K" => 1024,
        "M" => 1024 * 1024,
        "G" => 1024 * 1024 * 1024,
        _ => 1,
    };
    Ok((value * multiplier as f64) as u64)
}

// ── Margins ──────────────────────────────────────────────────────────────

/// Page margins in PDF points (1/72 inch). Content inside them is dropped,
/// which is how running headers and footers are kept out of the Markdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            left: 0.0,
            top: 36.0,
            right: 0.0,
            bottom: 36.0,
        }
    }
}

impl Margins {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

impl fmt::Display for Margins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.left, self.top, self.right, self.bottom)
    }
}

impl FromStr for Margins {
    type Err = Pdf2MdError;

    /// `N` applies to top and bottom only (left/right stay 0 so line starts
    /// are never cut); `l,t,r,b` sets all four sides.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            Pdf2MdError::InvalidConfig(format!(
                "Invalid margins '{s}'. Use single value or left,top,right,bottom"
            ))
        };

        if s.contains(',') {
            let values = s
                .split(',')
                .map(|v| v.trim().parse::<i64>().map_err(|_| invalid()))
                .collect::<Result<Vec<_>, _>>()?;
            match values.as_slice() {
                &[l, t, r, b] => Ok(Margins::new(l as f32, t as f32, r as f32, b as f32)),
                _ => Err(invalid()),
            }
        } else {
            let v: i64 = s.trim().parse().map_err(|_| invalid())?;
            Ok(Margins::new(0.0, v as f32, 0.0, v as f32))
        }
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How tables are recognised on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TableStrategy {
    /// Column-aligned text bounded by ruling lines above and below. (default)
    #[default]
    LinesStrict,
    /// Column-aligned text with at least one ruling line in or next to it.
    Lines,
    /// Column-aligned text alone.
    Text,
    /// Never emit tables.
    None,
}

impl FromStr for TableStrategy {
    type Err = Pdf2MdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lines_strict" => Ok(TableStrategy::LinesStrict),
            "lines" => Ok(TableStrategy::Lines),
            "text" => Ok(TableStrategy::Text),
            "none" => Ok(TableStrategy::None),
            other => Err(Pdf2MdError::InvalidConfig(format!(
                "unknown table strategy '{other}' (lines_strict|lines|text|none)"
            ))),
        }
    }
}

/// Where header levels come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HeaderStrategy {
    /// Outline titles only.
    Toc,
    /// Font-size ranking only.
    Font,
    /// Outline titles when the document has an outline, font sizes otherwise. (default)
    #[default]
    Both,
    /// No header detection.
    None,
}

impl FromStr for HeaderStrategy {
    type Err = Pdf2MdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "toc" => Ok(HeaderStrategy::Toc),
            "font" => Ok(HeaderStrategy::Font),
            "both" => Ok(HeaderStrategy::Both),
            "none" => Ok(HeaderStrategy::None),
            other => Err(Pdf2MdError::InvalidConfig(format!(
                "unknown header strategy '{other}' (toc|font|both|none)"
            ))),
        }
    }
}

/// What happens to images embedded in the PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageMode {
    /// Image objects are not read. (default)
    #[default]
    Skip,
    /// Images are written to [`ImageOptions::path`] and linked.
    Write,
    /// Images are inlined as base64 data URIs.
    Embed,
}

/// Encoding used for extracted images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Webp => "webp",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Webp => "image/webp",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = Pdf2MdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
            "webp" => Ok(ImageFormat::Webp),
            other => Err(Pdf2MdError::InvalidConfig(format!(
                "unknown image format '{other}' (png|jpg|webp)"
            ))),
        }
    }
}

/// Image extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageOptions {
    pub mode: ImageMode,
    /// Directory for written images. Relative paths resolve against the
    /// output directory so the Markdown links stay valid.
    pub path: PathBuf,
    pub format: ImageFormat,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            mode: ImageMode::Skip,
            path: PathBuf::from("./images"),
            format: ImageFormat::Png,
        }
    }
}

/// Which text cleanup passes run on each chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupOptions {
    /// Master switch; `false` leaves the extracted Markdown untouched.
    pub enabled: bool,
    /// Merge orphaned list markers with their text.
    pub fix_lists: bool,
    /// Promote short Title Case / ALL CAPS lines to `##` headers.
    pub fix_headers: bool,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            fix_lists: true,
            fix_headers: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_size_units() {
        assert_eq!(parse_size("1M").unwrap(), 1024 * 1024);
        assert_eq!(parse_size("500K").unwrap(), 500 * 1024);
        assert_eq!(parse_size("2G").unwrap(), 2 * 1024 * 1024 * 1024);
        assert_eq!(parse_size("4096").unwrap(), 4096);
        assert_eq!(parse_size("1.5m").unwrap(), 1024 * 1024 * 3 / 2);
        assert_eq!(parse_size("2 k").unwrap(), 2048);
        assert_eq!(parse_size("1MB").unwrap(), 1024 * 1024);
    }

    #[test]
    fn parse_size_rejects_garbage() {
        assert!(parse_size("abc").is_err());
        assert!(parse_size("").is_err());
        assert!(parse_size("M1").is_err());
    }

    #[test]
    fn margins_single_value_is_top_bottom() {
        let m: Margins = "72".parse().unwrap();
        assert_eq!(m, Margins::new(0.0, 72.0, 0.0, 72.0));
    }

    #[test]
    fn margins_four_values() {
        let m: Margins = "0, 36,0,36".parse().unwrap();
        assert_eq!(m, Margins::default());
    }

    #[test]
    fn margins_rejects_wrong_arity() {
        assert!("1,2,3".parse::<Margins>().is_err());
        assert!("a,b,c,d".parse::<Margins>().is_err());
        assert!("wide".parse::<Margins>().is_err());
    }

    #[test]
    fn builder_clamps_and_validates() {
        let c = ConversionConfig::builder()
            .workers(0)
            .max_header_levels(9)
            .build()
            .unwrap();
        assert_eq!(c.workers, 1);
        assert_eq!(c.max_header_levels, 6);

        assert!(ConversionConfig::builder().max_chunk_size(0).build().is_err());
        assert!(ConversionConfig::builder().toc_depth(0).build().is_err());
        assert!(ConversionConfig::builder()
            .margins(Margins::new(-1.0, 0.0, 0.0, 0.0))
            .build()
            .is_err());
        assert!(ConversionConfig::builder().body_limit(0.0).build().is_err());
    }

    #[test]
    fn header_strategy_none_disables_header_promotion() {
        let c = ConversionConfig::builder()
            .header_strategy(HeaderStrategy::None)
            .build()
            .unwrap();
        let opts = c.effective_cleanup();
        assert!(!opts.fix_headers);
        assert!(opts.fix_lists);
    }

    #[test]
    fn enum_parsing() {
        assert_eq!("lines_strict".parse::<TableStrategy>().unwrap(), TableStrategy::LinesStrict);
        assert_eq!("NONE".parse::<TableStrategy>().unwrap(), TableStrategy::None);
        assert!("grid".parse::<TableStrategy>().is_err());
        assert_eq!("font".parse::<HeaderStrategy>().unwrap(), HeaderStrategy::Font);
        assert_eq!("jpeg".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::Jpeg.extension(), "jpg");
    }

    #[test]
    fn debug_redacts_password() {
        let c = ConversionConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("redacted"));
    }
}
