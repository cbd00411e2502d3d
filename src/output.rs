//! Value records flowing between pipeline stages and the final result.
//!
//! Every record here is produced by one stage and owned by the next. Field
//! names on the wire (`relative_path`, `absolute_path`, `metadata.chapter`)
//! are what downstream ingestion code reads, so the serde renames are part of
//! the contract.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Where an image reference points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageOrigin {
    /// A path relative to (or absolute on) the local filesystem.
    Local,
    /// An `http://` or `https://` URL, downloaded to the scratch directory.
    Remote,
}

/// One unique image found in the document, resolved to a local file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    /// The link target exactly as written in the Markdown.
    #[serde(rename = "relative_path")]
    pub raw_target: String,
    /// Local file holding the image bytes.
    #[serde(rename = "absolute_path")]
    pub resolved_location: PathBuf,
    pub origin: ImageOrigin,
}

impl ImageReference {
    pub fn local(raw_target: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            raw_target: raw_target.into(),
            resolved_location: path.into(),
            origin: ImageOrigin::Local,
        }
    }

    pub fn remote(raw_target: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            raw_target: raw_target.into(),
            resolved_location: path.into(),
            origin: ImageOrigin::Remote,
        }
    }
}

/// Outcome of describing one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionResult {
    /// Join key back to [`ImageReference::raw_target`].
    pub raw_target: String,
    /// Model output, or [`crate::prompts::DESCRIPTION_FAILED_SENTINEL`].
    pub description: String,
    /// Requests sent for this image (1 on first-try success).
    pub attempts: u32,
    /// `true` when `description` is the failure sentinel.
    pub failed: bool,
}

/// Mapping `raw_target → result`, total over the images given to the pool.
///
/// A `BTreeMap` keeps iteration order independent of completion order, which
/// makes injection deterministic.
pub type DescriptionMap = BTreeMap<String, DescriptionResult>;

/// Per-chunk metadata as stored next to the chunk text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Originating document name, identical for every chunk of one run.
    #[serde(rename = "source")]
    pub source_name: String,
    /// Title of the nearest enclosing header.
    #[serde(rename = "chapter")]
    pub chapter_label: String,
}

/// A contiguous header-delimited passage of the enhanced document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Raw text, starting with its header line when it has one.
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Present only when an embedder ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    pub fn source_name(&self) -> &str {
        &self.metadata.source_name
    }

    pub fn chapter_label(&self) -> &str {
        &self.metadata.chapter_label
    }
}

/// One out-of-band progress notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Percent complete, 0–100.
    pub progress: u8,
    pub message: String,
}

impl ProgressUpdate {
    /// Build an update for `completed` of `total` items.
    pub fn from_counts(completed: usize, total: usize, message: impl Into<String>) -> Self {
        let progress = if total == 0 {
            100
        } else {
            ((completed.min(total) * 100) / total) as u8
        };
        Self {
            progress,
            message: message.into(),
        }
    }
}

/// Counters describing one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancementStats {
    /// Unique image targets (or extracted PDF images) found.
    pub images_found: usize,
    /// Images that resolved and were sent to the vision model.
    pub images_described: usize,
    /// Images dropped during resolution.
    pub images_dropped: usize,
    /// Images annotated with the failure sentinel.
    pub descriptions_failed: usize,
    pub chunk_count: usize,
    /// Whether the chunks carry embeddings.
    pub embedded: bool,
    pub describe_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Final structured result of [`crate::enhance`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancementOutput {
    /// The enhanced Markdown text.
    pub content: String,
    /// Images that were described (in resolution order).
    pub images: Vec<ImageReference>,
    /// Ordered chunks of `content`.
    pub chunks: Vec<Chunk>,
    pub stats: EnhancementStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_reference_uses_wire_names() {
        let img = ImageReference::local("img/a.png", "/docs/img/a.png");
        let json = serde_json::to_value(&img).unwrap();
        assert_eq!(json["relative_path"], "img/a.png");
        assert_eq!(json["absolute_path"], "/docs/img/a.png");
        assert_eq!(json["origin"], "local");
    }

    #[test]
    fn chunk_without_embedding_omits_field() {
        let chunk = Chunk {
            content: "# A\nHello\n".into(),
            metadata: ChunkMetadata {
                source_name: "notes.md".into(),
                chapter_label: "A".into(),
            },
            embedding: None,
        };
        let json = serde_json::to_value(&chunk).unwrap();
        assert!(json.get("embedding").is_none());
        assert_eq!(json["metadata"]["source"], "notes.md");
        assert_eq!(json["metadata"]["chapter"], "A");
    }

    #[test]
    fn progress_from_counts() {
        assert_eq!(ProgressUpdate::from_counts(1, 4, "x").progress, 25);
        assert_eq!(ProgressUpdate::from_counts(3, 3, "x").progress, 100);
        assert_eq!(ProgressUpdate::from_counts(1, 3, "x").progress, 33);
        assert_eq!(ProgressUpdate::from_counts(0, 0, "x").progress, 100);
    }
}
