//! Input resolution: normalise a user-supplied path or URL to a local PDF.
//!
//! pdfium opens documents from a path, so URLs are downloaded into a
//! `TempDir` that lives as long as the `ResolvedInput`. Every worker reopens
//! the same file, which is why the directory must outlive the conversion.

use crate::error::Pdf2MdError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// The resolved input: either a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; PDF downloaded to a temp directory.
    Downloaded {
        path: PathBuf,
        stem: String,
        _temp_dir: TempDir,
    },
}

impl ResolvedInput {
    /// Get the path to the PDF file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    /// Document stem used to name output files.
    pub fn stem(&self) -> String {
        match self {
            ResolvedInput::Local(p) => file_stem(p),
            ResolvedInput::Downloaded { stem, .. } => stem.clone(),
        }
    }

    /// Directory outputs default to when none is configured: beside a
    /// local input, or the working directory for downloads.
    pub fn default_output_dir(&self) -> PathBuf {
        let name = format!("{}-markdown", self.stem());
        match self {
            ResolvedInput::Local(p) => p
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .map(|d| d.join(&name))
                .unwrap_or_else(|| PathBuf::from(&name)),
            ResolvedInput::Downloaded { .. } => PathBuf::from(name),
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

/// Resolve the input string to a local PDF file path.
///
/// If the input is a URL, download it to a temporary directory.
/// If the input is a local file, validate it exists and is readable.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2MdError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Resolve a local file path, validating existence and PDF magic bytes.
fn resolve_local(path_str: &str) -> Result<ResolvedInput, Pdf2MdError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(Pdf2MdError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(Pdf2MdError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2MdError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(Pdf2MdError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2MdError> {
    info!("Downloading PDF from: {}", url);

    let download_err = |reason: String| Pdf2MdError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| download_err(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Pdf2MdError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            download_err(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(download_err(format!("HTTP {}", response.status())));
    }

    let filename = url_file_name(url);
    let temp_dir = TempDir::new().map_err(|e| Pdf2MdError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| download_err(e.to_string()))?;

    if bytes.len() >= 4 && &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(Pdf2MdError::NotAPdf {
            path: file_path,
            magic,
        });
    }

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| Pdf2MdError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        stem: file_stem(Path::new(&filename)),
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// File name from the URL's last path segment, or `downloaded.pdf`.
fn url_file_name(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn url_file_names() {
        assert_eq!(url_file_name("https://example.com/a/report.pdf"), "report.pdf");
        assert_eq!(url_file_name("https://example.com/download"), "downloaded.pdf");
        assert_eq!(url_file_name("https://example.com/"), "downloaded.pdf");
        assert_eq!(file_stem(Path::new(&url_file_name("https://x.org/get"))), "downloaded");
    }

    #[test]
    fn local_stem_and_default_output_dir() {
        let input = ResolvedInput::Local(PathBuf::from("/data/books/manual.pdf"));
        assert_eq!(input.stem(), "manual");
        assert_eq!(
            input.default_output_dir(),
            PathBuf::from("/data/books/manual-markdown")
        );
        let bare = ResolvedInput::Local(PathBuf::from("manual.pdf"));
        assert_eq!(bare.default_output_dir(), PathBuf::from("manual-markdown"));
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.err().unwrap();
        assert!(matches!(err, Pdf2MdError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn non_pdf_is_rejected_by_magic_bytes() {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        file.write_all(b"PK\x03\x04 not a pdf").unwrap();
        let err = resolve_input(file.path().to_str().unwrap(), 5)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Pdf2MdError::NotAPdf { magic, .. } if &magic == b"PK\x03\x04"));
    }
}
