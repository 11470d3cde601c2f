//! Image output: write extracted image objects to disk or embed them as
//! base64 data URIs.

use crate::config::{ImageFormat, ImageMode, ImageOptions};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Turns decoded images into Markdown image references for one document.
#[derive(Debug, Clone)]
pub struct ImageSink {
    mode: ImageMode,
    format: ImageFormat,
    /// Where written images go.
    dir: PathBuf,
    /// How chunk files (which live in the output directory) refer to `dir`.
    link_prefix: String,
    stem: String,
}

impl ImageSink {
    pub fn new(options: &ImageOptions, output_dir: &Path, stem: &str) -> Self {
        let (dir, link_prefix) = resolve_image_dir(&options.path, output_dir);
        Self {
            mode: options.mode,
            format: options.format,
            dir,
            link_prefix,
            stem: stem.to_string(),
        }
    }

    /// `false` when images are skipped and should not even be decoded.
    pub fn is_active(&self) -> bool {
        self.mode != ImageMode::Skip
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for the `n`-th image (1-based) on a 1-based page.
    pub fn file_name(&self, page: usize, n: usize) -> String {
        format!("{}-p{:04}-{:02}.{}", self.stem, page, n, self.format.extension())
    }

    /// Encode `img` and return the Markdown reference to it.
    pub fn emit(&self, img: &DynamicImage, page: usize, n: usize) -> Result<String, String> {
        match self.mode {
            ImageMode::Skip => Ok(String::new()),
            ImageMode::Embed => {
                let bytes = encode_image(img, self.format).map_err(|e| e.to_string())?;
                debug!("Embedding image p{} #{} ({} bytes)", page, n, bytes.len());
                Ok(format!(
                    "![](data:{};base64,{})",
                    self.format.mime(),
                    STANDARD.encode(&bytes)
                ))
            }
            ImageMode::Write => {
                let bytes = encode_image(img, self.format).map_err(|e| e.to_string())?;
                std::fs::create_dir_all(&self.dir)
                    .map_err(|e| format!("{}: {}", self.dir.display(), e))?;
                let name = self.file_name(page, n);
                let path = self.dir.join(&name);
                std::fs::write(&path, &bytes).map_err(|e| format!("{}: {}", path.display(), e))?;
                debug!("Wrote image {}", path.display());
                Ok(format!("![]({}{})", self.link_prefix, name))
            }
        }
    }
}

/// Encode an image in the requested format.
///
/// JPEG has no alpha channel and the WebP encoder only accepts 8-bit RGB(A),
/// so both are converted first.
pub fn encode_image(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    match format {
        ImageFormat::Png => img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?,
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8())
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)?,
        ImageFormat::Webp => DynamicImage::ImageRgba8(img.to_rgba8())
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::WebP)?,
    }
    Ok(buf)
}

/// Resolve the image directory and the link prefix used from chunk files.
fn resolve_image_dir(image_path: &Path, output_dir: &Path) -> (PathBuf, String) {
    if image_path.is_absolute() {
        let link = match image_path.strip_prefix(output_dir) {
            Ok(rel) => to_link(rel),
            Err(_) => to_link(image_path),
        };
        return (image_path.to_path_buf(), link);
    }
    (output_dir.join(image_path), to_link(image_path))
}

/// Forward-slash link prefix ending in `/` (or empty for the output dir).
fn to_link(path: &Path) -> String {
    let mut out = String::new();
    if path.has_root() {
        out.push('/');
    }
    for component in path.components() {
        if let Component::Normal(part) = component {
            out.push_str(&part.to_string_lossy());
            out.push('/');
        } else if component == Component::ParentDir {
            out.push_str("../");
        }
    }
    out
}
