//! Optional chunk embedding.
//!
//! The capability is probed once per run by [`probe_embedder`]. When no
//! embedder is available, or the embedder fails, chunks stay text-only and
//! the run still succeeds.

use crate::config::EnhanceConfig;
use crate::error::EmbedError;
use crate::output::Chunk;
use crate::pipeline::vision::{is_unrequested_mock, mock_requested};
use async_trait::async_trait;
use edgequake_llm::{EmbeddingProvider, ProviderFactory};
use std::sync::Arc;
use tracing::{info, warn};

/// A text-embedding model: one fixed-length vector per input string.
#[async_trait]
pub trait ChunkEmbedder: Send + Sync {
    /// Model identifier, used in logs.
    fn model_name(&self) -> &str;

    /// Embed a batch of texts, returning vectors in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

/// [`ChunkEmbedder`] backed by an `edgequake-llm` embedding provider.
pub struct ProviderEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    label: String,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }
}

#[async_trait]
impl ChunkEmbedder for ProviderEmbedder {
    fn model_name(&self) -> &str {
        &self.label
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        self.provider
            .embed(texts)
            .await
            .map_err(|e| EmbedError::Provider(e.to_string()))
    }
}

/// Find the embedder for this run, if any.
///
/// An explicit `config.embedder` wins; `config.embeddings = false` disables
/// probing; otherwise the provider factory is asked once. The factory's mock
/// fallback is treated as absent unless `EDGEQUAKE_LLM_PROVIDER=mock`.
pub fn probe_embedder(config: &EnhanceConfig) -> Option<Arc<dyn ChunkEmbedder>> {
    if let Some(ref embedder) = config.embedder {
        return Some(Arc::clone(embedder));
    }
    if !config.embeddings {
        info!("Embeddings disabled; chunks will be text-only");
        return None;
    }

    match ProviderFactory::from_env() {
        Ok((_llm, embedding)) if is_unrequested_mock(embedding.name(), mock_requested()) => {
            warn!("No embedding provider available (no API key found). Chunks will be text-only.");
            None
        }
        Ok((_llm, embedding)) => {
            let label = embedding.model().to_string();
            Some(Arc::new(ProviderEmbedder::new(embedding, label)))
        }
        Err(e) => {
            warn!(
                "No embedding provider available ({}). Chunks will be text-only.",
                e
            );
            None
        }
    }
}

/// Attach an embedding to every chunk.
///
/// Returns `true` when embeddings were attached. On any failure the chunks
/// are left without embeddings and the failure is logged.
pub async fn embed_chunks(chunks: &mut [Chunk], embedder: &dyn ChunkEmbedder) -> bool {
    if chunks.is_empty() {
        return false;
    }

    info!(
        "Generating embeddings for {} chunks with {}",
        chunks.len(),
        embedder.model_name()
    );
    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();

    let vectors = match embedder.embed_batch(&texts).await {
        Ok(v) => v,
        Err(e) => {
            warn!("Embedding failed ({}). Chunks will be text-only.", e);
            return false;
        }
    };

    if vectors.len() != chunks.len() {
        let e = EmbedError::CountMismatch {
            expected: chunks.len(),
            got: vectors.len(),
        };
        warn!("Embedding failed ({}). Chunks will be text-only.", e);
        return false;
    }

    for (chunk, vector) in chunks.iter_mut().zip(vectors) {
        chunk.embedding = Some(vector);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ChunkMetadata;

    struct Fixed {
        dim: usize,
        short_by: usize,
    }

    #[async_trait]
    impl ChunkEmbedder for Fixed {
        fn model_name(&self) -> &str {
            "fixed"
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            Ok(texts
                .iter()
                .skip(self.short_by)
                .map(|t| vec![t.len() as f32; self.dim])
                .collect())
        }
    }

    struct Broken;

    #[async_trait]
    impl ChunkEmbedder for Broken {
        fn model_name(&self) -> &str {
            "broken"
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            Err(EmbedError::Provider("model not loaded".into()))
        }
    }

    fn chunks() -> Vec<Chunk> {
        ["# A\nalpha\n", "# B\nbeta\n"]
            .iter()
            .map(|c| Chunk {
                content: c.to_string(),
                metadata: ChunkMetadata {
                    source_name: "doc.md".into(),
                    chapter_label: "x".into(),
                },
                embedding: None,
            })
            .collect()
    }

    #[tokio::test]
    async fn attaches_one_vector_per_chunk() {
        let mut cs = chunks();
        assert!(embed_chunks(&mut cs, &Fixed { dim: 3, short_by: 0 }).await);
        assert_eq!(cs[0].embedding.as_deref(), Some(&[10.0, 10.0, 10.0][..]));
        assert_eq!(cs[1].embedding.as_ref().map(|v| v.len()), Some(3));
    }

    #[tokio::test]
    async fn failure_leaves_chunks_text_only() {
        let mut cs = chunks();
        assert!(!embed_chunks(&mut cs, &Broken).await);
        assert!(cs.iter().all(|c| c.embedding.is_none()));
    }

    #[tokio::test]
    async fn count_mismatch_leaves_chunks_text_only() {
        let mut cs = chunks();
        assert!(!embed_chunks(&mut cs, &Fixed { dim: 2, short_by: 1 }).await);
        assert!(cs.iter().all(|c| c.embedding.is_none()));
    }

    #[test]
    fn disabled_probe_returns_none() {
        let config = EnhanceConfig::builder().embeddings(false).build().unwrap();
        assert!(probe_embedder(&config).is_none());
    }

    #[test]
    fn explicit_embedder_wins() {
        let config = EnhanceConfig::builder()
            .embeddings(false)
            .embedder(Arc::new(Fixed { dim: 1, short_by: 0 }))
            .build()
            .unwrap();
        let found = probe_embedder(&config).expect("explicit embedder");
        assert_eq!(found.model_name(), "fixed");
    }
}
