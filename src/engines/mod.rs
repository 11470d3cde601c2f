//! Whole-document converters used by `tomd`.
//!
//! [`Engine::Native`] is the in-crate pdfium pipeline; the others hand the
//! document to an external tool and copy its single Markdown result to the
//! output path.

pub mod docling;
pub mod marker;

use crate::config::ConversionConfig;
use crate::error::Pdf2MdError;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Which converter processes the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// pdfium text extraction and layout analysis (PDF only).
    #[default]
    Native,
    /// A local `docling-serve` instance.
    Docling,
    /// The `marker_single` OCR binary.
    Marker,
}

impl FromStr for Engine {
    type Err = Pdf2MdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" | "pdfium" => Ok(Engine::Native),
            "docling" => Ok(Engine::Docling),
            "marker" => Ok(Engine::Marker),
            other => Err(Pdf2MdError::InvalidConfig(format!(
                "unknown engine '{other}' (native|docling|marker)"
            ))),
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Engine::Native => "native",
            Engine::Docling => "docling",
            Engine::Marker => "marker",
        })
    }
}

/// Settings for [`convert_document`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub engine: Engine,
    /// Port `docling-serve` listens on.
    pub port: u16,
    /// GPU batch size multiplier passed to marker.
    pub batch_multiplier: f32,
    /// Settings for the native engine.
    pub config: ConversionConfig,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            engine: Engine::Native,
            port: docling::DEFAULT_PORT,
            batch_multiplier: marker::DEFAULT_BATCH_MULTIPLIER,
            config: ConversionConfig::default(),
        }
    }
}

/// Convert `input` into a single Markdown file at `output`.
pub async fn convert_document(
    input: &Path,
    output: &Path,
    options: &EngineOptions,
) -> Result<(), Pdf2MdError> {
    if !input.exists() {
        return Err(Pdf2MdError::FileNotFound {
            path: input.to_path_buf(),
        });
    }
    info!("Converting {} with {}", input.display(), options.engine);

    match options.engine {
        Engine::Native => {
            let input = input.to_string_lossy();
            crate::convert::convert_to_file(&*input, output, &options.config).await?;
            Ok(())
        }
        Engine::Docling => docling::convert(input, output, options.port).await,
        Engine::Marker => marker::convert(input, output, options.batch_multiplier).await,
    }
}

/// Locate `binary` in the directories of a `PATH`-style list.
pub fn find_on_path(binary: &str, path_var: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}

/// Locate `binary` on the process `PATH`, or fail with a hint.
pub(crate) fn require_binary(binary: &str, hint: &str) -> Result<PathBuf, Pdf2MdError> {
    std::env::var_os("PATH")
        .and_then(|path| find_on_path(binary, &path))
        .ok_or_else(|| Pdf2MdError::EngineUnavailable {
            binary: binary.to_string(),
            hint: hint.to_string(),
        })
}

/// Write the engine's Markdown to `output`, creating parent directories.
pub(crate) fn write_output(output: &Path, markdown: &str) -> Result<(), Pdf2MdError> {
    crate::pipeline::worker::write_atomic(output, markdown).map_err(|e| {
        Pdf2MdError::OutputWriteFailed {
            path: output.to_path_buf(),
            source: e,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_names() {
        assert_eq!("native".parse::<Engine>().unwrap(), Engine::Native);
        assert_eq!("Docling".parse::<Engine>().unwrap(), Engine::Docling);
        assert_eq!("marker".parse::<Engine>().unwrap(), Engine::Marker);
        assert!("pandoc".parse::<Engine>().is_err());
        assert_eq!(Engine::Marker.to_string(), "marker");
    }

    #[test]
    fn binaries_are_found_on_path_list() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("docling-serve"), b"#!/bin/sh\n").unwrap();
        let empty = tempfile::tempdir().unwrap();
        let path = std::env::join_paths([empty.path(), dir.path()]).unwrap();

        assert_eq!(
            find_on_path("docling-serve", &path),
            Some(dir.path().join("docling-serve"))
        );
        assert_eq!(find_on_path("marker_single", &path), None);
    }

    #[tokio::test]
    async fn missing_input_is_reported() {
        let err = convert_document(
            Path::new("/no/such/input.pdf"),
            Path::new("/tmp/out.md"),
            &EngineOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Pdf2MdError::FileNotFound { .. }));
    }
}
