//! OCR conversion by shelling out to `marker_single`.

use crate::engines::{require_binary, write_output};
use crate::error::Pdf2MdError;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

pub const DEFAULT_BATCH_MULTIPLIER: f32 = 0.5;
const BINARY: &str = "marker_single";

pub async fn convert(input: &Path, output: &Path, batch_multiplier: f32) -> Result<(), Pdf2MdError> {
    let binary = require_binary(BINARY, "Install marker-pdf or use --engine native instead.")?;
    let scratch = tempfile::tempdir().map_err(|e| Pdf2MdError::Internal(e.to_string()))?;
    let multiplier = batch_multiplier.to_string();

    info!("Running {} on {}", BINARY, input.display());
    let result = Command::new(&binary)
        .arg(input)
        .arg(scratch.path())
        .arg("--batch_multiplier")
        .arg(&multiplier)
        .env("PYTORCH_CUDA_ALLOC_CONF", "expandable_segments:True")
        .env("BATCH_MULTIPLIER", &multiplier)
        .output()
        .await
        .map_err(|e| engine_failed(format!("failed to run {BINARY}: {e}")))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        warn!(stderr = %stderr, "{} failed", BINARY);
        return Err(engine_failed(format!(
            "{BINARY} exited with {}: {}",
            result.status,
            stderr.trim()
        )));
    }

    let md_file = find_markdown(scratch.path())
        .ok_or_else(|| engine_failed("no Markdown output from marker".to_string()))?;
    debug!("marker output: {}", md_file.display());
    let markdown = std::fs::read_to_string(&md_file)
        .map_err(|e| engine_failed(format!("{}: {e}", md_file.display())))?;
    write_output(output, &markdown)
}

/// First `*.md` file in `dir`, then in its immediate subdirectories.
///
/// marker writes into `<out>/<stem>/<stem>.md` in recent versions and
/// directly into `<out>` in older ones.
pub fn find_markdown(dir: &Path) -> Option<PathBuf> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    let is_md = |p: &PathBuf| p.is_file() && p.extension().is_some_and(|e| e == "md");
    if let Some(found) = entries.iter().find(|p| is_md(p)) {
        return Some(found.clone());
    }
    entries.iter().filter(|p| p.is_dir()).find_map(|sub| {
        let mut nested: Vec<PathBuf> = std::fs::read_dir(sub)
            .ok()?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(is_md)
            .collect();
        nested.sort();
        nested.into_iter().next()
    })
}

fn engine_failed(detail: String) -> Pdf2MdError {
    Pdf2MdError::EngineFailed {
        engine: "marker".to_string(),
        detail,
    }
}
