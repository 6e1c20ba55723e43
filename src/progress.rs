//! Progress-callback trait for per-slide events.
//!
//! Inject an [`Arc<dyn DigestProgressCallback>`] via
//! [`crate::config::DigestConfigBuilder::progress_callback`] to receive events
//! as the pipeline renders the deck and works through its slides. The CLI
//! drives its progress bar from these.
//!
//! # Example
//!
//! ```rust
//! use deck_digest::{DigestConfig, DigestProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl DigestProgressCallback for Counter {
//!     fn on_slide_complete(&self, slide: usize, total: usize, summary_len: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("slide {slide}/{total}: {summary_len} chars");
//!     }
//! }
//!
//! let config = DigestConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// Coarse phases of a run, reported before the per-slide events start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestStage {
    /// Deck → PDF.
    Rendering,
    /// PDF → one image per slide.
    Rasterizing,
    /// OCR and summarisation, slide by slide.
    Summarizing,
}

impl fmt::Display for DigestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DigestStage::Rendering => "rendering",
            DigestStage::Rasterizing => "rasterizing",
            DigestStage::Summarizing => "summarizing",
        })
    }
}

/// Called by the pipeline as it processes a deck.
///
/// All methods have no-op defaults. With `concurrency > 1` the slide
/// methods may be called from several tasks at once, so shared state needs
/// a `Mutex` or atomics.
pub trait DigestProgressCallback: Send + Sync {
    /// Called once, before rendering.
    fn on_run_start(&self, deck_name: &str) {
        let _ = deck_name;
    }

    /// Called when the pipeline enters a new stage.
    fn on_stage(&self, stage: DigestStage) {
        let _ = stage;
    }

    /// Called before a slide's text is extracted.
    ///
    /// * `slide`: 1-based slide index
    /// * `total`: slides in the deck
    fn on_slide_start(&self, slide: usize, total: usize) {
        let _ = (slide, total);
    }

    /// Called when a slide ends with a summary or the no-text placeholder.
    fn on_slide_complete(&self, slide: usize, total: usize, summary_len: usize) {
        let _ = (slide, total, summary_len);
    }

    /// Called when a slide ends with the error placeholder.
    fn on_slide_error(&self, slide: usize, total: usize, error: &str) {
        let _ = (slide, total, error);
    }

    /// Called once after every slide has been attempted.
    ///
    /// * `failed`: slides holding the error placeholder
    fn on_run_complete(&self, total: usize, failed: usize) {
        let _ = (total, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl DigestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DigestConfig`].
pub type ProgressCallback = Arc<dyn DigestProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        stages: Mutex<Vec<DigestStage>>,
        completes: AtomicUsize,
        errors: AtomicUsize,
        failed_total: AtomicUsize,
    }

    impl DigestProgressCallback for Recorder {
        fn on_stage(&self, stage: DigestStage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_slide_complete(&self, _slide: usize, _total: usize, _len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_slide_error(&self, _slide: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_run_complete(&self, _total: usize, failed: usize) {
            self.failed_total.store(failed, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start("talk.pptx");
        cb.on_stage(DigestStage::Rendering);
        cb.on_slide_start(1, 3);
        cb.on_slide_complete(1, 3, 42);
        cb.on_slide_error(2, 3, "rate limited");
        cb.on_run_complete(3, 1);
    }

    #[test]
    fn recorder_receives_events_through_arc_dyn() {
        let recorder = Arc::new(Recorder::default());
        let cb: ProgressCallback = recorder.clone();

        cb.on_stage(DigestStage::Rendering);
        cb.on_stage(DigestStage::Summarizing);
        cb.on_slide_complete(1, 2, 10);
        cb.on_slide_error(2, 2, "boom");
        cb.on_run_complete(2, 1);

        assert_eq!(
            *recorder.stages.lock().unwrap(),
            vec![DigestStage::Rendering, DigestStage::Summarizing]
        );
        assert_eq!(recorder.completes.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.errors.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.failed_total.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stage_display() {
        assert_eq!(DigestStage::Rasterizing.to_string(), "rasterizing");
    }
}
