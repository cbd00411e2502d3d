//! Pipeline stages for Markdown image enhancement.
//!
//! Each submodule implements one transformation step and is testable on its
//! own.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ resolve ──▶ pool ──▶ inject ──▶ chunk ──▶ embed
//! (md/zip/pdf) (files)   (VLM)   (annot.)   (headers)  (optional)
//! ```
//!
//! 1. [`source`]  load Markdown from a `.md` file, a zip archive, or a PDF
//!    ([`pdf`] runs pdfium inside `spawn_blocking`)
//! 2. [`resolve`] map every unique image target to a local file, downloading
//!    remote ones; unresolvable targets are dropped
//! 3. [`pool`]    describe images concurrently through [`vision`], which
//!    owns retries and the failure sentinel; [`encode`] base64-wraps the bytes
//! 4. [`inject`]  append each description after its image reference
//! 5. [`chunk`]   split the enhanced text at H1–H3 headers
//! 6. [`embed`]   attach vectors when an embedder is available

pub mod chunk;
pub mod embed;
pub mod encode;
pub mod inject;
pub mod pdf;
pub mod pool;
pub mod resolve;
pub mod source;
pub mod vision;
