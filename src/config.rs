//! Configuration types for document enhancement.
//!
//! All behaviour is controlled through [`EnhanceConfig`], built via its
//! [`EnhanceConfigBuilder`]. The binary fills it once at startup from CLI
//! flags and environment variables; the library never reads ambient state
//! mid-pipeline except through the provider factory fallback.

use crate::error::EnhanceError;
use crate::pipeline::embed::ChunkEmbedder;
use crate::pipeline::vision::VisionModel;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Model used when a provider is named without a model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Configuration for one enhancement run.
///
/// Built via [`EnhanceConfig::builder()`] or using [`EnhanceConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_md_enhance::EnhanceConfig;
///
/// let config = EnhanceConfig::builder()
///     .concurrency(8)
///     .model("gpt-4.1-mini")
///     .max_attempts(5)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 8);
/// ```
#[derive(Clone)]
pub struct EnhanceConfig {
    /// Number of concurrent describe requests. Default: 4.
    pub concurrency: usize,

    /// LLM model identifier, e.g. "gpt-4.1-nano", "qwen-vl-max".
    /// If None, uses [`DEFAULT_MODEL`] for named providers.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, uses `ProviderFactory::from_env()`.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed vision model. Takes precedence over every provider
    /// setting; used to plug in custom clients and test doubles.
    pub vision_model: Option<Arc<dyn VisionModel>>,

    /// Sampling temperature. Default: None (provider default).
    pub temperature: Option<f32>,

    /// Maximum tokens generated per description. Default: 500.
    pub max_tokens: usize,

    /// Describe attempts per image, including the first. Default: 3.
    pub max_attempts: u32,

    /// Linear backoff unit in milliseconds. Default: 1000.
    ///
    /// After failed attempt `n` the worker waits `n * retry_backoff_ms`
    /// before trying again (1 s, then 2 s).
    pub retry_backoff_ms: u64,

    /// Per describe-request timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Timeout for downloading one remote image in seconds. Default: 30.
    pub download_timeout_secs: u64,

    /// Custom describe prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Chunking thresholds and default chapter label.
    pub chunking: ChunkConfig,

    /// Probe for an embedding provider when no embedder is set. Default: true.
    pub embeddings: bool,

    /// Pre-constructed embedder. Takes precedence over probing.
    pub embedder: Option<Arc<dyn ChunkEmbedder>>,

    /// Receives per-image progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            model: None,
            provider_name: None,
            provider: None,
            vision_model: None,
            temperature: None,
            max_tokens: 500,
            max_attempts: 3,
            retry_backoff_ms: 1000,
            api_timeout_secs: 60,
            download_timeout_secs: 30,
            system_prompt: None,
            chunking: ChunkConfig::default(),
            embeddings: true,
            embedder: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for EnhanceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnhanceConfig")
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("vision_model", &self.vision_model.as_ref().map(|_| "<dyn VisionModel>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("chunking", &self.chunking)
            .field("embeddings", &self.embeddings)
            .field("embedder", &self.embedder.as_ref().map(|e| e.model_name().to_string()))
            .finish()
    }
}

impl EnhanceConfig {
    /// Create a new builder for `EnhanceConfig`.
    pub fn builder() -> EnhanceConfigBuilder {
        EnhanceConfigBuilder {
            config: Self::default(),
        }
    }

    /// The describe prompt in effect.
    pub fn describe_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .unwrap_or(crate::prompts::DEFAULT_DESCRIBE_PROMPT)
    }
}

/// Builder for [`EnhanceConfig`].
pub struct EnhanceConfigBuilder {
    config: EnhanceConfig,
}

impl fmt::Debug for EnhanceConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnhanceConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl EnhanceConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn vision_model(mut self, model: Arc<dyn VisionModel>) -> Self {
        self.config.vision_model = Some(model);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn chunking(mut self, chunking: ChunkConfig) -> Self {
        self.config.chunking = chunking;
        self
    }

    pub fn embeddings(mut self, enabled: bool) -> Self {
        self.config.embeddings = enabled;
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn ChunkEmbedder>) -> Self {
        self.config.embedder = Some(embedder);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<EnhanceConfig, EnhanceError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(EnhanceError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.max_attempts == 0 {
            return Err(EnhanceError::InvalidConfig(
                "max_attempts must be ≥ 1".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(EnhanceError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.chunking.default_chapter.trim().is_empty() {
            return Err(EnhanceError::InvalidConfig(
                "default chapter label must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Chunking ─────────────────────────────────────────────────────────────

/// Size thresholds for header chunking.
///
/// A chunk closed by a following header is kept only when its trimmed length
/// exceeds `min_chunk_chars`; the last chunk of the document uses the lower
/// `min_final_chunk_chars` bar. Lengths count Unicode scalar values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Default: 50.
    pub min_chunk_chars: usize,
    /// Default: 20.
    pub min_final_chunk_chars: usize,
    /// Chapter label for text before the first header. Default: "Introduction".
    pub default_chapter: String,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            min_chunk_chars: 50,
            min_final_chunk_chars: 20,
            default_chapter: "Introduction".to_string(),
        }
    }
}
