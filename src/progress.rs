//! Progress-callback trait for per-image enhancement events.
//!
//! Inject an [`Arc<dyn EnhanceProgressCallback>`] via
//! [`crate::config::EnhanceConfigBuilder::progress_callback`] to receive
//! events while images are being described. Progress travels on this side
//! channel only; the final [`crate::output::EnhancementOutput`] never carries
//! it.
//!
//! # Example
//!
//! ```rust
//! use edgequake_md_enhance::{EnhanceConfig, EnhanceProgressCallback, ProgressUpdate};
//! use std::sync::Arc;
//!
//! struct PrintProgress;
//!
//! impl EnhanceProgressCallback for PrintProgress {
//!     fn on_progress(&self, update: &ProgressUpdate) {
//!         eprintln!("{}% {}", update.progress, update.message);
//!     }
//! }
//!
//! let config = EnhanceConfig::builder()
//!     .progress_callback(Arc::new(PrintProgress))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::ProgressUpdate;
use std::sync::Arc;

/// Called by the pipeline as images are described.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events are delivered from the single coordinating
/// task that drains the worker pool, so they never arrive concurrently, but
/// the trait is `Send + Sync` because that task may run on any runtime thread.
pub trait EnhanceProgressCallback: Send + Sync {
    /// Called once before the first describe request.
    ///
    /// # Arguments
    /// * `total_images` — number of images that will be described
    fn on_enhance_start(&self, total_images: usize) {
        let _ = total_images;
    }

    /// Called when an image received a real description.
    ///
    /// # Arguments
    /// * `completed`  — images finished so far, including this one
    /// * `total`      — images in the batch
    /// * `raw_target` — the link target as written in the document
    fn on_image_complete(&self, completed: usize, total: usize, raw_target: &str) {
        let _ = (completed, total, raw_target);
    }

    /// Called when an image fell back to the failure sentinel.
    fn on_image_failed(&self, completed: usize, total: usize, raw_target: &str) {
        let _ = (completed, total, raw_target);
    }

    /// Called after every completed image with a percent/message update.
    fn on_progress(&self, update: &ProgressUpdate) {
        let _ = update;
    }

    /// Called once after all images have been attempted.
    ///
    /// # Arguments
    /// * `total`         — images in the batch
    /// * `success_count` — images that received a real description
    fn on_enhance_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl EnhanceProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::EnhanceConfig`].
pub type ProgressCallback = Arc<dyn EnhanceProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        completes: AtomicUsize,
        failures: AtomicUsize,
        updates: Mutex<Vec<u8>>,
    }

    impl EnhanceProgressCallback for TrackingCallback {
        fn on_image_complete(&self, _completed: usize, _total: usize, _raw_target: &str) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_image_failed(&self, _completed: usize, _total: usize, _raw_target: &str) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }

        fn on_progress(&self, update: &ProgressUpdate) {
            self.updates.lock().unwrap().push(update.progress);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_enhance_start(2);
        cb.on_image_complete(1, 2, "a.png");
        cb.on_image_failed(2, 2, "b.png");
        cb.on_progress(&ProgressUpdate::from_counts(2, 2, "done"));
        cb.on_enhance_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_image_complete(1, 2, "a.png");
        tracker.on_progress(&ProgressUpdate::from_counts(1, 2, ""));
        tracker.on_image_failed(2, 2, "b.png");
        tracker.on_progress(&ProgressUpdate::from_counts(2, 2, ""));

        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.failures.load(Ordering::SeqCst), 1);
        assert_eq!(*tracker.updates.lock().unwrap(), vec![50, 100]);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_enhance_start(10);
        cb.on_image_complete(1, 10, "x.png");
    }
}
