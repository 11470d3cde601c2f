//! Error types for the tocmd library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2MdError`]: **Fatal**: the conversion cannot proceed at all
//!   (bad input file, wrong password, unwritable output directory). Returned
//!   as `Err(Pdf2MdError)` from the top-level `convert*` functions.
//!
//! * [`ChunkError`]: **Non-fatal**: a single chunk failed (unreadable page,
//!   write error) but every other chunk is fine. Stored inside
//!   [`crate::output::ChunkResult`] so the index and the remaining chunk
//!   files are still produced.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the tocmd library.
#[derive(Debug, Error)]
pub enum Pdf2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File '{path}' not found")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The document has no pages, so there is nothing to chunk.
    #[error("PDF '{path}' has no pages")]
    EmptyDocument { path: PathBuf },

    /// Text extraction failed while analysing the document structure.
    #[error("Failed to extract page {page}: {detail}")]
    ExtractionFailed { page: usize, detail: String },

    /// Every chunk failed; no Markdown was produced.
    #[error("All {total} chunks failed.\nFirst error: {first_error}")]
    AllChunksFailed { total: usize, first_error: String },

    // ── External engine errors ────────────────────────────────────────────
    /// An external converter binary is not on `PATH`.
    #[error("'{binary}' is not available on PATH.\n{hint}")]
    EngineUnavailable { binary: String, hint: String },

    /// An external converter ran but did not produce Markdown.
    #[error("{engine} conversion failed: {detail}")]
    EngineFailed { engine: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the output directory.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write an output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or flag validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Install pdfium system-wide.\n\
  • Place the pdfium library next to the executable or in the working directory.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single chunk.
///
/// The overall conversion continues unless ALL chunks fail.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ChunkError {
    /// The worker could not open the document or read a page.
    #[error("Chunk '{title}': extraction failed: {detail}")]
    ExtractFailed { title: String, detail: String },

    /// An extracted image could not be encoded or written.
    #[error("Chunk '{title}': image output failed: {detail}")]
    ImageFailed { title: String, detail: String },

    /// The Markdown file could not be written.
    #[error("Chunk '{title}': failed to write '{file}': {detail}")]
    WriteFailed {
        title: String,
        file: String,
        detail: String,
    },

    /// The worker task panicked or was cancelled.
    #[error("Chunk '{title}': worker aborted: {detail}")]
    WorkerAborted { title: String, detail: String },
}

impl ChunkError {
    /// Title of the chunk that failed.
    pub fn title(&self) -> &str {
        match self {
            ChunkError::ExtractFailed { title, .. }
            | ChunkError::ImageFailed { title, .. }
            | ChunkError::WriteFailed { title, .. }
            | ChunkError::WorkerAborted { title, .. } => title,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_not_found_display() {
        let e = Pdf2MdError::FileNotFound {
            path: PathBuf::from("book.pdf"),
        };
        assert_eq!(e.to_string(), "File 'book.pdf' not found");
    }

    #[test]
    fn all_chunks_failed_display() {
        let e = Pdf2MdError::AllChunksFailed {
            total: 4,
            first_error: "boom".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("All 4 chunks"), "got: {msg}");
        assert!(msg.contains("boom"));
    }

    #[test]
    fn engine_unavailable_mentions_binary() {
        let e = Pdf2MdError::EngineUnavailable {
            binary: "docling-serve".into(),
            hint: "Use --engine marker instead.".into(),
        };
        assert!(e.to_string().contains("docling-serve"));
        assert!(e.to_string().contains("--engine marker"));
    }

    #[test]
    fn chunk_error_title_accessor() {
        let e = ChunkError::WriteFailed {
            title: "Intro".into(),
            file: "book-0000-intro.md".into(),
            detail: "disk full".into(),
        };
        assert_eq!(e.title(), "Intro");
        assert!(e.to_string().contains("book-0000-intro.md"));
    }
}
