//! # edgequake-md-enhance
//!
//! Prepare documents for retrieval-augmented generation: every image in a
//! Markdown document gets a Vision-LLM description injected right after it,
//! and the enhanced text is split into header-delimited chunks, optionally
//! embedded.
//!
//! ## Pipeline Overview
//!
//! ```text
//! .md / .zip / .pdf
//!  │
//!  ├─ 1. Source   read Markdown, unzip an archive, or extract PDF text + images
//!  ├─ 2. Resolve  image links → local files (remote images downloaded)
//!  ├─ 3. Describe concurrent VLM calls with retry; failures → sentinel text
//!  ├─ 4. Inject   `> **[AI图解]** …` after each image reference
//!  ├─ 5. Chunk    split at H1–H3 headers
//!  └─ 6. Embed    optional vectors per chunk
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_md_enhance::{enhance, EnhanceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = EnhanceConfig::default();
//!     let output = enhance("notes.md", "out/", &config).await?;
//!     println!("{} chunks", output.chunks.len());
//!     eprintln!("{}/{} images described",
//!         output.stats.images_described - output.stats.descriptions_failed,
//!         output.stats.images_found);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mdenhance` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod enhance;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ChunkConfig, EnhanceConfig, EnhanceConfigBuilder};
pub use enhance::{enhance, enhance_sync};
pub use error::{EmbedError, EnhanceError, ImageError, VisionError};
pub use output::{
    Chunk, ChunkMetadata, DescriptionMap, DescriptionResult, EnhancementOutput, EnhancementStats,
    ImageOrigin, ImageReference, ProgressUpdate,
};
pub use pipeline::chunk::chunk_markdown;
pub use pipeline::embed::{ChunkEmbedder, ProviderEmbedder};
pub use pipeline::inject::inject_descriptions;
pub use pipeline::pool::{describe_all, describe_stream};
pub use pipeline::resolve::resolve_images;
pub use pipeline::vision::{LlmVisionModel, VisionModel};
pub use progress::{EnhanceProgressCallback, NoopProgressCallback, ProgressCallback};
