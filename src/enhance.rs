//! Whole-document enhancement entry points.
//!
//! [`enhance`] runs the pipeline end to end: load the source, resolve its
//! images, describe them concurrently, inject the descriptions, write the
//! `_enhanced.md` copy, chunk, and optionally embed. Only structural problems
//! are fatal; per-image failures degrade into dropped images or sentinels.

use crate::config::EnhanceConfig;
use crate::error::EnhanceError;
use crate::output::{DescriptionMap, EnhancementOutput, EnhancementStats};
use crate::pipeline::{chunk, embed, inject, pool, resolve, source, vision};
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// File name of the enhanced Markdown copy written to the output directory.
pub const ENHANCED_FILE_NAME: &str = "_enhanced.md";

/// Enhance a Markdown, zip or PDF document.
///
/// # Arguments
/// * `input` — path to a `.md`, `.zip` or `.pdf` file
/// * `output_dir` — receives `_enhanced.md`, downloaded and extracted files
/// * `config` — run configuration
///
/// # Errors
/// Returns `Err(EnhanceError)` only for fatal errors:
/// - input missing or of an unsupported type
/// - archive without Markdown, unreadable PDF
/// - images present but no vision provider configured
/// - the output directory is not writable
pub async fn enhance(
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &EnhanceConfig,
) -> Result<EnhancementOutput, EnhanceError> {
    let total_start = Instant::now();
    let input = input.as_ref();
    let output_dir = output_dir.as_ref();
    info!("Starting enhancement: {}", input.display());

    // ── Step 1: Load source ──────────────────────────────────────────────
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| EnhanceError::OutputWriteFailed {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
    let doc = source::load_source(input, output_dir).await?;

    // ── Step 2: Resolve images ───────────────────────────────────────────
    let (images, images_found) = match doc.images {
        Some(images) => {
            let found = images.len();
            (images, found)
        }
        None => {
            let found = resolve::extract_image_targets(&doc.text).len();
            let scratch = output_dir.join(resolve::DOWNLOAD_DIR);
            let images = resolve::resolve_images(&doc.text, &doc.document_dir, &scratch, config).await;
            (images, found)
        }
    };

    // ── Step 3: Describe ─────────────────────────────────────────────────
    let describe_start = Instant::now();
    let descriptions = if images.is_empty() {
        info!("No images to describe");
        DescriptionMap::new()
    } else {
        let model = vision::resolve_vision_model(config)?;
        pool::describe_all(&images, model, config, |done, total| {
            debug!("Described {}/{}", done, total);
        })
        .await
    };
    let describe_duration_ms = describe_start.elapsed().as_millis() as u64;

    // ── Step 4: Inject and persist ───────────────────────────────────────
    let content = inject::inject_descriptions(&doc.text, &descriptions);
    let enhanced_path = output_dir.join(ENHANCED_FILE_NAME);
    write_atomic(&enhanced_path, &content)?;
    info!("Enhanced Markdown saved to {}", enhanced_path.display());

    // ── Step 5: Chunk and embed ──────────────────────────────────────────
    let source_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut chunks = chunk::chunk_markdown(&content, &source_name, &config.chunking);
    info!("Split into {} chunks", chunks.len());

    let embedded = match embed::probe_embedder(config) {
        Some(embedder) => embed::embed_chunks(&mut chunks, embedder.as_ref()).await,
        None => false,
    };

    // ── Step 6: Stats ────────────────────────────────────────────────────
    let stats = EnhancementStats {
        images_found,
        images_described: images.len(),
        images_dropped: images_found.saturating_sub(images.len()),
        descriptions_failed: descriptions.values().filter(|r| r.failed).count(),
        chunk_count: chunks.len(),
        embedded,
        describe_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Enhancement complete: {}/{} images described, {} chunks, {}ms total",
        stats.images_described - stats.descriptions_failed,
        stats.images_found,
        stats.chunk_count,
        stats.total_duration_ms
    );

    Ok(EnhancementOutput {
        content,
        images,
        chunks,
        stats,
    })
}

/// Synchronous wrapper around [`enhance`].
///
/// Creates a temporary tokio runtime internally.
pub fn enhance_sync(
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &EnhanceConfig,
) -> Result<EnhancementOutput, EnhanceError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| EnhanceError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(enhance(input, output_dir, config))
}

/// Write `content` to `path` via a temp file in the same directory + rename.
fn write_atomic(path: &Path, content: &str) -> Result<(), EnhanceError> {
    let write_failed = |e: std::io::Error| EnhanceError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_failed)?;
    tmp.write_all(content.as_bytes()).map_err(write_failed)?;
    tmp.persist(path).map_err(|e| write_failed(e.error))?;
    Ok(())
}
