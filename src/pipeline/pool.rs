//! Bounded concurrent description of a batch of images.
//!
//! [`describe_stream`] turns the image list into a stream of
//! [`DescriptionResult`]s with at most `config.concurrency` requests in
//! flight, yielding each result as soon as it completes. [`describe_all`]
//! drains that stream on the calling task: it is the only place results are
//! aggregated, so the map is never written concurrently, and progress is
//! reported per item while other requests are still running.

use crate::config::EnhanceConfig;
use crate::output::{DescriptionMap, DescriptionResult, ImageReference, ProgressUpdate};
use crate::pipeline::vision::{describe_image, VisionModel};
use crate::prompts::describe_progress_message;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of description results in completion order.
pub type DescriptionStream = Pin<Box<dyn Stream<Item = DescriptionResult> + Send>>;

/// Describe every image concurrently, yielding results as they complete.
///
/// Completion order is unspecified. Every input image yields exactly one item.
pub fn describe_stream(
    images: Vec<ImageReference>,
    model: Arc<dyn VisionModel>,
    config: &EnhanceConfig,
) -> DescriptionStream {
    let concurrency = config.concurrency.max(1);
    let config = config.clone();

    let s = stream::iter(images.into_iter().map(move |image| {
        let model = Arc::clone(&model);
        let cfg = config.clone();
        async move { describe_image(model.as_ref(), &image, &cfg).await }
    }))
    .buffer_unordered(concurrency);

    Box::pin(s)
}

/// Describe every image and collect a mapping `raw_target → result`.
///
/// `on_progress(completed, total)` fires once per image, right after it
/// completes, with strictly increasing `completed`. The configured
/// [`crate::progress::EnhanceProgressCallback`] receives the same events.
pub async fn describe_all<F>(
    images: &[ImageReference],
    model: Arc<dyn VisionModel>,
    config: &EnhanceConfig,
    mut on_progress: F,
) -> DescriptionMap
where
    F: FnMut(usize, usize),
{
    let total = images.len();
    let mut results = DescriptionMap::new();
    if total == 0 {
        return results;
    }

    info!(
        "Describing {} images with {} (concurrency {})",
        total,
        model.model_name(),
        config.concurrency
    );
    let callback = config.progress_callback.as_ref();
    if let Some(cb) = callback {
        cb.on_enhance_start(total);
    }

    let mut stream = describe_stream(images.to_vec(), model, config);
    let mut completed = 0;

    while let Some(result) = stream.next().await {
        completed += 1;

        if let Some(cb) = callback {
            if result.failed {
                cb.on_image_failed(completed, total, &result.raw_target);
            } else {
                cb.on_image_complete(completed, total, &result.raw_target);
            }
            cb.on_progress(&ProgressUpdate::from_counts(
                completed,
                total,
                describe_progress_message(completed, total),
            ));
        }
        on_progress(completed, total);
        info!("Progress: {}/{} images processed", completed, total);

        results.insert(result.raw_target.clone(), result);
    }

    let succeeded = results.values().filter(|r| !r.failed).count();
    if let Some(cb) = callback {
        cb.on_enhance_complete(total, succeeded);
    }
    info!("Described {}/{} images", succeeded, total);

    results
}
