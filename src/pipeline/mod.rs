//! Pipeline stages for TOC-aware PDF-to-Markdown conversion.
//!
//! Each submodule implements one step. The pdfium-facing code is confined to
//! [`engine`], [`toc`] and [`extract`]; everything downstream works on plain
//! data and is tested without a PDF.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ toc ──▶ plan ──▶ worker × N ──▶ index
//! (URL/path) (outline) (chunks)  │            (links)
//!                                ├─ extract  (pdfium → PageContent)
//!                                ├─ layout   (lines, tables, headers, images)
//!                                └─ cleanup  (textual heuristics)
//! ```
//!
//! 1. [`input`]  : canonicalise the user-supplied path or URL to a local file
//! 2. [`toc`]    : read the outline into flat `TocEntry` records
//! 3. [`plan`]   : size chunks from the TOC and sampled bytes-per-page
//! 4. [`worker`] : convert chunks in parallel; each opens its own document
//! 5. [`cleanup`] : deterministic text rules applied to every chunk
//! 6. [`index`]  : write the table of contents linking the chunk files

pub mod cleanup;
pub mod engine;
pub mod extract;
pub mod headers;
pub mod images;
pub mod index;
pub mod input;
pub mod layout;
pub mod plan;
pub mod tables;
pub mod toc;
pub mod worker;
