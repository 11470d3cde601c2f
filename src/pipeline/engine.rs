//! pdfium binding, document opening and metadata.
//!
//! pdfium is a blocking C library. Every function here must run on a
//! blocking thread (`tokio::task::spawn_blocking`). The library is bound
//! once per process; each worker opens its own document handle from it.

use crate::error::Pdf2MdError;
use crate::output::DocumentMetadata;
use crate::pipeline::toc;
use once_cell::sync::OnceCell;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming a pdfium library file or the directory
/// containing it.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Bind to a pdfium library.
///
/// Search order: `PDFIUM_LIB_PATH`, the executable's directory, the working
/// directory, then the system library path.
pub fn bind_pdfium() -> Result<Pdfium, Pdf2MdError> {
    if let Ok(value) = std::env::var(PDFIUM_LIB_PATH_ENV) {
        let path = PathBuf::from(&value);
        let lib = if path.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&path)
        } else {
            path
        };
        let bindings = Pdfium::bind_to_library(&lib).map_err(|e| {
            Pdf2MdError::PdfiumBindingFailed(format!(
                "{PDFIUM_LIB_PATH_ENV}={}: {e:?}",
                lib.display()
            ))
        })?;
        debug!("Bound pdfium from {}", lib.display());
        return Ok(Pdfium::new(bindings));
    }

    let mut candidates = Vec::new();
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        candidates.push(Pdfium::pdfium_platform_library_name_at_path(&dir));
    }
    candidates.push(Pdfium::pdfium_platform_library_name_at_path("./"));

    for lib in candidates.iter().filter(|p| p.is_file()) {
        if let Ok(bindings) = Pdfium::bind_to_library(lib) {
            debug!("Bound pdfium from {}", lib.display());
            return Ok(Pdfium::new(bindings));
        }
    }

    let bindings = Pdfium::bind_to_system_library()
        .map_err(|e| Pdf2MdError::PdfiumBindingFailed(format!("{e:?}")))?;
    debug!("Bound system pdfium");
    Ok(Pdfium::new(bindings))
}

static PDFIUM: OnceCell<Pdfium> = OnceCell::new();

/// The process-wide pdfium binding, created on first use.
pub fn shared_pdfium() -> Result<&'static Pdfium, Pdf2MdError> {
    PDFIUM.get_or_try_init(bind_pdfium)
}

/// Open a PDF, mapping pdfium's errors onto password and corruption errors.
pub fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, Pdf2MdError> {
    pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| map_open_error(pdf_path, password.is_some(), &format!("{e:?}")))
}

fn map_open_error(pdf_path: &Path, had_password: bool, detail: &str) -> Pdf2MdError {
    if detail.contains("Password") || detail.contains("password") {
        if had_password {
            Pdf2MdError::WrongPassword {
                path: pdf_path.to_path_buf(),
            }
        } else {
            Pdf2MdError::PasswordRequired {
                path: pdf_path.to_path_buf(),
            }
        }
    } else {
        Pdf2MdError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: detail.to_string(),
        }
    }
}

/// Read the info dictionary, page count and outline size of an open document.
pub fn read_metadata(document: &PdfDocument) -> DocumentMetadata {
    let metadata = document.metadata();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().trim().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
        toc_entries: toc::read_toc(document).len(),
    }
}

/// Extract document metadata without converting any page.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, Pdf2MdError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || {
        let pdfium = shared_pdfium()?;
        let document = open_document(pdfium, &path, pwd.as_deref())?;
        Ok(read_metadata(&document))
    })
    .await
    .map_err(|e| Pdf2MdError::Internal(format!("Metadata task panicked: {}", e)))?
}
