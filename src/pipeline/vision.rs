//! Vision-model interaction: describe one image, with retry.
//!
//! [`VisionModel`] is the seam between the worker pool and the network. The
//! production implementation, [`LlmVisionModel`], wraps an
//! `edgequake_llm::LLMProvider`; tests and embedders of this library can plug
//! in their own.
//!
//! ## Retry Strategy
//!
//! Each image gets `max_attempts` requests. After failed attempt `n` the
//! worker sleeps `n * retry_backoff_ms` (linear: 1 s, 2 s with the default
//! unit). When every attempt failed the image is annotated with
//! [`DESCRIPTION_FAILED_SENTINEL`] instead of failing the batch.

use crate::config::{EnhanceConfig, DEFAULT_MODEL};
use crate::error::{EnhanceError, ImageError, VisionError};
use crate::output::{DescriptionResult, ImageReference};
use crate::pipeline::encode::encode_image_file;
use crate::prompts::DESCRIPTION_FAILED_SENTINEL;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// A vision-capable model that turns one image plus a prompt into text.
///
/// Implementations must be stateless per call: a single instance is shared
/// by every worker of the pool.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Human-readable model identifier, used in logs.
    fn model_name(&self) -> &str;

    /// Send one request and return the generated text.
    async fn describe(
        &self,
        prompt: &str,
        image: ImageData,
        max_tokens: usize,
    ) -> Result<String, VisionError>;
}

/// [`VisionModel`] backed by an `edgequake-llm` chat provider.
pub struct LlmVisionModel {
    provider: Arc<dyn LLMProvider>,
    label: String,
    temperature: Option<f32>,
}

impl LlmVisionModel {
    /// The label is the provider's own model ID.
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        let label = provider.model().to_string();
        Self {
            provider,
            label,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl VisionModel for LlmVisionModel {
    fn model_name(&self) -> &str {
        &self.label
    }

    /// The prompt and the image travel in a single user message; several
    /// OpenAI-compatible vision endpoints ignore system messages.
    async fn describe(
        &self,
        prompt: &str,
        image: ImageData,
        max_tokens: usize,
    ) -> Result<String, VisionError> {
        let messages = vec![ChatMessage::user_with_images(prompt, vec![image])];
        let options = CompletionOptions {
            temperature: self.temperature,
            max_tokens: Some(max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| VisionError::Provider(e.to_string()))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );

        if response.content.trim().is_empty() {
            return Err(VisionError::EmptyResponse);
        }
        Ok(response.content)
    }
}

/// Describe one image, retrying with linear backoff.
///
/// Always returns a `DescriptionResult` and never propagates the error upward,
/// so a single bad image doesn't abort the batch.
pub async fn describe_image(
    model: &dyn VisionModel,
    image: &ImageReference,
    config: &EnhanceConfig,
) -> DescriptionResult {
    let start = Instant::now();
    let target = image.raw_target.as_str();

    let data = match encode_image_file(&image.resolved_location).await {
        Ok(data) => data,
        Err(e) => {
            warn!(
                "{}: cannot read {}: {}",
                target,
                image.resolved_location.display(),
                e
            );
            return failed_result(target, 0);
        }
    };

    let prompt = config.describe_prompt();
    let per_call = Duration::from_secs(config.api_timeout_secs);

    for attempt in 1..=config.max_attempts {
        let call = model.describe(prompt, data.clone(), config.max_tokens);
        let err = match timeout(per_call, call).await {
            Ok(Ok(text)) if !text.trim().is_empty() => {
                debug!(
                    "{}: described in {:?} ({} attempt(s))",
                    target,
                    start.elapsed(),
                    attempt
                );
                return DescriptionResult {
                    raw_target: target.to_string(),
                    description: text.trim().to_string(),
                    attempts: attempt,
                    failed: false,
                };
            }
            Ok(Ok(_)) => ImageError::DescribeFailed {
                target: target.to_string(),
                attempt,
                detail: VisionError::EmptyResponse.to_string(),
            },
            Ok(Err(e)) => ImageError::DescribeFailed {
                target: target.to_string(),
                attempt,
                detail: e.to_string(),
            },
            Err(_) => ImageError::Timeout {
                target: target.to_string(),
                secs: config.api_timeout_secs,
            },
        };

        warn!("Attempt {}/{} failed: {}", attempt, config.max_attempts, err);

        if attempt < config.max_attempts {
            let backoff = config.retry_backoff_ms * u64::from(attempt);
            sleep(Duration::from_millis(backoff)).await;
        }
    }

    warn!(
        "{}: giving up after {} attempts",
        target, config.max_attempts
    );
    failed_result(target, config.max_attempts)
}

fn failed_result(target: &str, attempts: u32) -> DescriptionResult {
    DescriptionResult {
        raw_target: target.to_string(),
        description: DESCRIPTION_FAILED_SENTINEL.to_string(),
        attempts,
        failed: true,
    }
}

/// Name `edgequake-llm` gives its placeholder provider.
pub(crate) const MOCK_PROVIDER: &str = "mock";

/// `true` when the caller asked for the mock provider through
/// `EDGEQUAKE_LLM_PROVIDER`.
pub(crate) fn mock_requested() -> bool {
    std::env::var("EDGEQUAKE_LLM_PROVIDER")
        .map(|p| p.trim().eq_ignore_ascii_case(MOCK_PROVIDER))
        .unwrap_or(false)
}

/// `ProviderFactory::from_env` falls back to the mock provider when no key is
/// set. That fallback counts as "no provider" unless the mock was requested.
pub(crate) fn is_unrequested_mock(provider_name: &str, requested: bool) -> bool {
    provider_name == MOCK_PROVIDER && !requested
}

fn create_vision_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, EnhanceError> {
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        EnhanceError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })
}

fn auto_detect_failed(detail: impl std::fmt::Display) -> EnhanceError {
    EnhanceError::ProviderNotConfigured {
        provider: "auto".to_string(),
        hint: format!(
            "No LLM provider could be auto-detected from environment.\n\
            Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
            Error: {}",
            detail
        ),
    }
}

/// Resolve the vision model, from most-specific to least-specific.
///
/// 1. **Pre-built vision model** (`config.vision_model`).
/// 2. **Pre-built provider** (`config.provider`).
/// 3. **Named provider + model** (`config.provider_name`), API key read by
///    [`ProviderFactory::create_llm_provider`] from the provider's variable.
/// 4. **`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`** when both are set.
/// 5. **OpenAI** when `OPENAI_API_KEY` is set, with `config.model`.
/// 6. **Full auto-detection** (`ProviderFactory::from_env`). Its mock
///    fallback is rejected unless `EDGEQUAKE_LLM_PROVIDER=mock`.
pub fn resolve_vision_model(config: &EnhanceConfig) -> Result<Arc<dyn VisionModel>, EnhanceError> {
    if let Some(ref model) = config.vision_model {
        return Ok(Arc::clone(model));
    }

    let provider = resolve_provider(config)?;
    info!(
        "Using vision model: {} ({})",
        provider.model(),
        provider.name()
    );
    Ok(Arc::new(
        LlmVisionModel::new(provider).with_temperature(config.temperature),
    ))
}

fn resolve_provider(config: &EnhanceConfig) -> Result<Arc<dyn LLMProvider>, EnhanceError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_vision_provider(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) = ProviderFactory::from_env().map_err(auto_detect_failed)?;
    if is_unrequested_mock(llm_provider.name(), mock_requested()) {
        return Err(auto_detect_failed("no API key found in the environment"));
    }
    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Scripted {
        fail_first: u32,
        calls: AtomicU32,
        reply: &'static str,
    }

    #[async_trait]
    impl VisionModel for Scripted {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn describe(
            &self,
            _prompt: &str,
            _image: ImageData,
            max_tokens: usize,
        ) -> Result<String, VisionError> {
            assert_eq!(max_tokens, 500);
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_first {
                Err(VisionError::Provider(format!("HTTP 503 on call {n}")))
            } else {
                Ok(self.reply.to_string())
            }
        }
    }

    fn fast_config() -> EnhanceConfig {
        EnhanceConfig::builder().retry_backoff_ms(1).build().unwrap()
    }

    fn image_in(dir: &tempfile::TempDir) -> ImageReference {
        let path = dir.path().join("a.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\nfake").unwrap();
        ImageReference::local("a.png", path)
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let dir = tempfile::tempdir().unwrap();
        let model = Scripted {
            fail_first: 2,
            calls: AtomicU32::new(0),
            reply: "  a binary tree with 3 nodes \n",
        };
        let result = describe_image(&model, &image_in(&dir), &fast_config()).await;
        assert!(!result.failed);
        assert_eq!(result.attempts, 3);
        assert_eq!(result.description, "a binary tree with 3 nodes");
    }

    #[tokio::test]
    async fn records_sentinel_after_exhausting_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let model = Scripted {
            fail_first: u32::MAX,
            calls: AtomicU32::new(0),
            reply: "",
        };
        let result = describe_image(&model, &image_in(&dir), &fast_config()).await;
        assert!(result.failed);
        assert_eq!(result.description, DESCRIPTION_FAILED_SENTINEL);
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn empty_reply_counts_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let model = Scripted {
            fail_first: 0,
            calls: AtomicU32::new(0),
            reply: "   ",
        };
        let result = describe_image(&model, &image_in(&dir), &fast_config()).await;
        assert!(result.failed);
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unreadable_image_skips_the_model() {
        let model = Scripted {
            fail_first: 0,
            calls: AtomicU32::new(0),
            reply: "never",
        };
        let img = ImageReference::local("gone.png", "/definitely/not/here/gone.png");
        let result = describe_image(&model, &img, &fast_config()).await;
        assert!(result.failed);
        assert_eq!(result.attempts, 0);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_grows_linearly_between_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let model = Scripted {
            fail_first: u32::MAX,
            calls: AtomicU32::new(0),
            reply: "",
        };
        let config = EnhanceConfig::builder()
            .retry_backoff_ms(1000)
            .build()
            .unwrap();

        let started = tokio::time::Instant::now();
        let result = describe_image(&model, &image_in(&dir), &config).await;

        assert!(result.failed);
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
        // 1 unit after attempt 1, 2 units after attempt 2, none after the last.
        assert_eq!(started.elapsed(), Duration::from_millis(3 * 1000));
    }

    #[test]
    fn mock_fallback_counts_as_unconfigured() {
        assert!(is_unrequested_mock("mock", false));
        assert!(!is_unrequested_mock("mock", true));
        assert!(!is_unrequested_mock("openai", false));
    }

    #[test]
    fn named_provider_uses_its_model_id() {
        let config = EnhanceConfig::builder()
            .provider_name("mock")
            .build()
            .unwrap();
        let resolved = resolve_vision_model(&config).expect("mock is requested by name");
        assert_eq!(resolved.model_name(), "mock-model");
    }

    #[test]
    fn preset_vision_model_wins() {
        let model: Arc<dyn VisionModel> = Arc::new(Scripted {
            fail_first: 0,
            calls: AtomicU32::new(0),
            reply: "x",
        });
        let config = EnhanceConfig::builder()
            .vision_model(Arc::clone(&model))
            .provider_name("definitely-not-a-provider")
            .build()
            .unwrap();
        let resolved = resolve_vision_model(&config).expect("preset model is used");
        assert_eq!(resolved.model_name(), "scripted");
    }
}
