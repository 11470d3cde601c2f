//! End-to-end integration tests for tocmd.
//!
//! These tests use real PDF files in `./test_cases/` and need a pdfium
//! library. They are gated behind the `E2E_ENABLED` environment variable so
//! they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=. cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_inspect -- --nocapture

use futures::StreamExt;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tocmd::{
    convert, convert_stream, convert_to_file, inspect, plan, ChunkProgress,
    ConversionConfig, ConversionProgressCallback, HeaderStrategy, ImageMode, ImageOptions,
    Pdf2MdError, TableStrategy,
};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

/// Assert a chunk file passes basic quality checks.
fn assert_markdown_quality(md: &str, context: &str) {
    assert!(!md.trim().is_empty(), "[{context}] Markdown is empty");

    let invisible = ['\u{200B}', '\u{FEFF}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{00AD}'];
    for ch in invisible {
        assert!(
            !md.contains(ch),
            "[{context}] Output contains invisible char U+{:04X}",
            ch as u32
        );
    }

    assert!(
        !md.lines().any(|l| l.ends_with(' ') || l.ends_with('\t')),
        "[{context}] Output has trailing whitespace"
    );

    println!("[{context}] ✓  {} bytes, quality checks passed", md.len());
}

/// Route library logs to the test output; `RUST_LOG=tocmd=debug` for detail.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

fn config_for(out: &Path) -> ConversionConfig {
    ConversionConfig::builder()
        .output_dir(out)
        .workers(4)
        .build()
        .unwrap()
}

#[derive(Default)]
struct CountingCallback {
    started: AtomicUsize,
    completed: AtomicUsize,
    errors: AtomicUsize,
    finished: AtomicUsize,
}

impl ConversionProgressCallback for CountingCallback {
    fn on_conversion_start(&self, total_chunks: usize, _total_pages: usize) {
        self.started.store(total_chunks, Ordering::SeqCst);
    }
    fn on_chunk_complete(&self, progress: &ChunkProgress) {
        assert!(progress.status_line().contains("Completed:"));
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_chunk_error(&self, _progress: &ChunkProgress, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
    fn on_conversion_complete(&self, _total_chunks: usize, success_count: usize) {
        self.finished.store(success_count, Ordering::SeqCst);
    }
}

// ── Inspect ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_inspect_arxiv_paper() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));

    let meta = inspect(path.to_str().unwrap(), &ConversionConfig::default())
        .await
        .expect("inspect() should succeed");

    assert_eq!(meta.page_count, 15, "Attention paper should have 15 pages");
    assert!(!meta.pdf_version.is_empty());
    println!("Metadata: {:?}", meta);
}

#[tokio::test]
async fn test_inspect_nonexistent() {
    let result = inspect("/definitely/not/a/real/file.pdf", &ConversionConfig::default()).await;
    assert!(matches!(result, Err(Pdf2MdError::FileNotFound { .. })));
}

// ── Planning ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_plan_covers_document() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));
    let dir = tempfile::tempdir().unwrap();

    let p = plan(path.to_str().unwrap(), &config_for(dir.path()))
        .await
        .expect("plan() should succeed");

    assert_eq!(p.total_pages, 15);
    assert!(!p.chunks.is_empty());
    for chunk in &p.chunks {
        assert!(chunk.start_page < chunk.end_page, "empty chunk {chunk:?}");
        assert!(chunk.end_page <= p.total_pages);
    }
    if !p.from_toc {
        // Size-based chunks tile the document exactly.
        assert_eq!(p.chunks[0].start_page, 0);
        assert_eq!(p.chunks.last().unwrap().end_page, 15);
    }
    // Nothing was written.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_small_chunks_split_the_document() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));
    let dir = tempfile::tempdir().unwrap();
    let config = ConversionConfig::builder()
        .output_dir(dir.path())
        .max_chunk_size(1)
        .build()
        .unwrap();

    let p = plan(path.to_str().unwrap(), &config).await.unwrap();
    // One byte per chunk forces one page per chunk.
    assert!(p.chunks.iter().all(|c| c.page_count() == 1));
}

// ── Chunked conversion ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_convert_writes_chunks_and_index() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let callback = Arc::new(CountingCallback::default());
    let config = ConversionConfig::builder()
        .output_dir(dir.path())
        .workers(4)
        .progress_callback(callback.clone() as Arc<dyn ConversionProgressCallback>)
        .build()
        .unwrap();

    let output = convert(path.to_str().unwrap(), &config)
        .await
        .expect("convert() should succeed");

    assert_eq!(output.stats.total_chunks, output.plan.chunks.len());
    assert_eq!(
        output.stats.succeeded_chunks + output.stats.failed_chunks,
        output.stats.total_chunks
    );
    assert_eq!(callback.started.load(Ordering::SeqCst), output.stats.total_chunks);
    assert_eq!(
        callback.completed.load(Ordering::SeqCst),
        output.stats.succeeded_chunks
    );
    assert_eq!(callback.errors.load(Ordering::SeqCst), output.stats.failed_chunks);
    assert_eq!(
        callback.finished.load(Ordering::SeqCst),
        output.stats.succeeded_chunks
    );

    // Every chunk file exists, is unique and clean.
    let mut names = HashSet::new();
    for chunk in output.chunks.iter().filter(|c| c.is_ok()) {
        assert!(names.insert(chunk.file.clone()), "duplicate file {}", chunk.file);
        assert!(chunk.file.starts_with("attention_is_all_you_need-"));
        let md = std::fs::read_to_string(dir.path().join(&chunk.file)).unwrap();
        assert_eq!(md.len(), chunk.bytes);
        assert_markdown_quality(&md, &chunk.title);
    }
    assert!(!dir
        .path()
        .read_dir()
        .unwrap()
        .any(|e| e.unwrap().path().extension().is_some_and(|x| x == "tmp")));

    // The index links every successful chunk.
    assert_eq!(
        output.index_file,
        dir.path().join("attention_is_all_you_need-index.md")
    );
    let index = std::fs::read_to_string(&output.index_file).unwrap();
    assert!(index.starts_with("# attention_is_all_you_need\n\n## Table of Contents\n\n"));
    for name in &names {
        assert!(index.contains(&format!("(./{name})")), "index misses {name}");
    }
}

#[tokio::test]
async fn test_convert_json_serialisable() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));
    let dir = tempfile::tempdir().unwrap();

    let output = convert(path.to_str().unwrap(), &config_for(dir.path()))
        .await
        .unwrap();
    let json = serde_json::to_string(&output).expect("ConversionOutput serialises");
    assert!(json.contains("\"chunks\""));
    assert!(json.contains("\"index_file\""));
}

#[tokio::test]
async fn test_convert_without_headers_or_tables() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));
    let dir = tempfile::tempdir().unwrap();
    let config = ConversionConfig::builder()
        .output_dir(dir.path())
        .header_strategy(HeaderStrategy::None)
        .table_strategy(TableStrategy::None)
        .build()
        .unwrap();

    let output = convert(path.to_str().unwrap(), &config).await.unwrap();
    for chunk in output.chunks.iter().filter(|c| c.is_ok()) {
        let md = std::fs::read_to_string(dir.path().join(&chunk.file)).unwrap();
        assert!(
            !md.lines().any(|l| l.starts_with('#')),
            "[{}] headers were disabled",
            chunk.title
        );
        assert!(!md.contains("| --- |"), "[{}] tables were disabled", chunk.title);
    }
}

#[tokio::test]
async fn test_written_images_are_linked() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));
    let dir = tempfile::tempdir().unwrap();
    let config = ConversionConfig::builder()
        .output_dir(dir.path())
        .images(ImageOptions {
            mode: ImageMode::Write,
            ..Default::default()
        })
        .build()
        .unwrap();

    let output = convert(path.to_str().unwrap(), &config).await.unwrap();
    if output.stats.total_images == 0 {
        println!("SKIP: document has no raster images");
        return;
    }
    // Nested outline chunks share pages, so one file can back several links.
    let written = std::fs::read_dir(dir.path().join("images")).unwrap().count();
    assert!(written > 0 && written <= output.stats.total_images);
}

// ── Streaming ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_stream_yields_every_chunk_without_index() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path());

    let expected = plan(path.to_str().unwrap(), &config).await.unwrap().chunks.len();
    let results: Vec<_> = convert_stream(path.to_str().unwrap(), &config)
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(results.len(), expected);
    assert!(results.iter().any(|r| r.is_ok()));
    assert!(!dir.path().join("attention_is_all_you_need-index.md").exists());
}

// ── Single file ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_convert_to_single_file() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("nested/attention.md");

    let stats = convert_to_file(path.to_str().unwrap(), &out, &ConversionConfig::default())
        .await
        .unwrap();

    assert_eq!(stats.total_pages, 15);
    let md = std::fs::read_to_string(&out).unwrap();
    assert_eq!(md.len() as u64, stats.total_bytes);
    assert_markdown_quality(&md, "single file");
    assert!(md.contains("Attention"));
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_not_a_pdf_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let fake = dir.path().join("fake.pdf");
    std::fs::write(&fake, "<html>not a pdf</html>").unwrap();

    let result = convert(fake.to_str().unwrap(), &config_for(dir.path())).await;
    assert!(matches!(result, Err(Pdf2MdError::NotAPdf { .. })));
}
