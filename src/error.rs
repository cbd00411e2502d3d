//! Error types for the edgequake-md-enhance library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`EnhanceError`]: **fatal**, the run cannot proceed at all (input not
//!   found, unsupported extension, archive without Markdown, provider not
//!   configured). Returned as `Err(EnhanceError)` from [`crate::enhance`].
//!
//! * [`ImageError`]: **non-fatal**, a single image could not be resolved or
//!   described. The image is dropped (resolution) or annotated with the
//!   failure sentinel (description); every other image is unaffected.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-md-enhance library.
#[derive(Debug, Error)]
pub enum EnhanceError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Input extension is not one of `.md`, `.zip`, `.pdf`.
    #[error("Unsupported file type: '{extension}'\nExpected a .pdf, .md or .zip file.")]
    UnsupportedFileType { extension: String },

    /// A zip archive was extracted but contains no Markdown file.
    #[error("No Markdown file found in the archive '{path}'")]
    NoMarkdownInArchive { path: PathBuf },

    /// The zip archive could not be opened or extracted.
    #[error("Failed to extract archive '{path}': {detail}")]
    ArchiveExtractFailed { path: PathBuf, detail: String },

    /// A source file exists but could not be read as UTF-8 text.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The file has a `.pdf` extension but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// pdfium could not parse the document.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is normally downloaded automatically on first run.\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy."
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write a file in the output directory.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single image.
///
/// Resolution errors drop the image from the working set; description errors
/// are replaced by [`crate::prompts::DESCRIPTION_FAILED_SENTINEL`].
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ImageError {
    /// A local image reference does not point at an existing file.
    #[error("Image not found: '{target}' (looked in {path:?})")]
    NotFound { target: String, path: PathBuf },

    /// A remote image could not be downloaded.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// The vision model call failed.
    #[error("Description failed for '{target}' on attempt {attempt}: {detail}")]
    DescribeFailed {
        target: String,
        attempt: u32,
        detail: String,
    },

    /// The vision model call exceeded the per-request timeout.
    #[error("Description timed out for '{target}' after {secs}s")]
    Timeout { target: String, secs: u64 },
}

/// Failure of a single vision-model request.
///
/// Returned by [`crate::pipeline::vision::VisionModel::describe`]; the worker
/// retries on any variant.
#[derive(Debug, Error)]
pub enum VisionError {
    /// Transport, authentication or API error reported by the provider.
    #[error("provider error: {0}")]
    Provider(String),

    /// The provider answered but the completion carried no text.
    #[error("empty response from model")]
    EmptyResponse,
}

/// Failure of one embedding request.
///
/// Returned by [`crate::pipeline::embed::ChunkEmbedder::embed_batch`]; any
/// variant leaves the chunks text-only.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// Transport, authentication or API error reported by the provider.
    #[error("provider error: {0}")]
    Provider(String),

    /// The embedder returned a different number of vectors than inputs.
    #[error("expected {expected} vectors, got {got}")]
    CountMismatch { expected: usize, got: usize },
}
