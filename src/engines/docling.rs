//! Conversion through a short-lived `docling-serve` process.
//!
//! The server is started on a local port, polled until `/health` answers,
//! sent the document once, and always stopped afterwards.

use crate::engines::{require_binary, write_output};
use crate::error::Pdf2MdError;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

pub const DEFAULT_PORT: u16 = 5010;
const BINARY: &str = "docling-serve";
const HEALTH_ATTEMPTS: u32 = 30;
const HEALTH_INTERVAL: Duration = Duration::from_secs(1);
const CONVERT_TIMEOUT: Duration = Duration::from_secs(300);

pub async fn convert(input: &Path, output: &Path, port: u16) -> Result<(), Pdf2MdError> {
    let binary = require_binary(BINARY, "Use --engine marker or --engine native instead.")?;
    let base_url = format!("http://localhost:{port}");

    info!("Starting {} on port {}", BINARY, port);
    let mut server = Command::new(&binary)
        .arg("--port")
        .arg(port.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| engine_failed(format!("failed to start {BINARY}: {e}")))?;

    let result = async {
        wait_until_healthy(&base_url).await?;
        let markdown = request_markdown(&base_url, input).await?;
        write_output(output, &markdown)
    }
    .await;

    stop(&mut server).await;
    result
}

async fn wait_until_healthy(base_url: &str) -> Result<(), Pdf2MdError> {
    let client = reqwest::Client::builder()
        .timeout(HEALTH_INTERVAL * 2)
        .build()
        .map_err(|e| engine_failed(e.to_string()))?;
    let url = format!("{base_url}/health");

    for attempt in 1..=HEALTH_ATTEMPTS {
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!("{} ready after {} attempts", BINARY, attempt);
                return Ok(());
            }
            Ok(resp) => debug!("Health check {}: HTTP {}", attempt, resp.status()),
            Err(e) => debug!("Health check {}: {}", attempt, e),
        }
        tokio::time::sleep(HEALTH_INTERVAL).await;
    }
    Err(engine_failed(format!(
        "{BINARY} did not become healthy after {HEALTH_ATTEMPTS} attempts"
    )))
}

async fn request_markdown(base_url: &str, input: &Path) -> Result<String, Pdf2MdError> {
    let bytes = tokio::fs::read(input)
        .await
        .map_err(|e| engine_failed(format!("{}: {e}", input.display())))?;
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());

    let part = reqwest::multipart::Part::bytes(bytes)
        .file_name(file_name)
        .mime_str("application/pdf")
        .map_err(|e| engine_failed(e.to_string()))?;
    let form = reqwest::multipart::Form::new()
        .part("file", part)
        .text("output_format", "markdown")
        .text("include_images", "false")
        .text("include_tables", "true")
        .text("chunking", "false");

    let client = reqwest::Client::builder()
        .timeout(CONVERT_TIMEOUT)
        .build()
        .map_err(|e| engine_failed(e.to_string()))?;
    let response = client
        .post(format!("{base_url}/convert"))
        .multipart(form)
        .send()
        .await
        .map_err(|e| engine_failed(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| engine_failed(e.to_string()))?;
    if !status.is_success() {
        return Err(engine_failed(format!("HTTP {status}: {}", body.trim())));
    }
    Ok(extract_markdown(&body))
}

/// Pick the Markdown out of a `/convert` response.
///
/// Takes the first non-empty `markdown`, `content` or `text` string of a JSON
/// object; anything else is returned as is.
pub fn extract_markdown(body: &str) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["markdown", "content", "text"] {
            if let Some(text) = map.get(key).and_then(|v| v.as_str()) {
                if !text.is_empty() {
                    return text.to_string();
                }
            }
        }
    }
    body.to_string()
}

async fn stop(server: &mut Child) {
    if let Err(e) = server.kill().await {
        warn!("Failed to stop {}: {}", BINARY, e);
    } else {
        debug!("Stopped {}", BINARY);
    }
}

fn engine_failed(detail: String) -> Pdf2MdError {
    Pdf2MdError::EngineFailed {
        engine: "docling".to_string(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_field_wins() {
        let body = r##"{"markdown": "# Title", "content": "other"}"##;
        assert_eq!(extract_markdown(body), "# Title");
    }

    #[test]
    fn empty_fields_fall_through() {
        let body = r#"{"markdown": "", "content": null, "text": "plain"}"#;
        assert_eq!(extract_markdown(body), "plain");
    }

    #[test]
    fn non_object_bodies_are_returned_raw() {
        assert_eq!(extract_markdown("# Raw\n"), "# Raw\n");
        assert_eq!(extract_markdown("[1, 2]"), "[1, 2]");
        let no_fields = r#"{"status": "ok"}"#;
        assert_eq!(extract_markdown(no_fields), no_fields);
    }
}
