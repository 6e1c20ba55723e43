//! Streaming API: emit slides as they are summarised.
//!
//! Unlike [`crate::digest::summarize_deck`], which returns once every slide
//! is done, [`summarize_stream`] yields each [`SlideResult`] as soon as it
//! is ready. Rendering and rasterisation happen before the stream is
//! returned, so fatal errors still surface as `Err`. Items are always
//! emitted in slide order, also when `concurrency > 1`.
//!
//! The working area lives inside the stream and is removed when the stream
//! is dropped, whether or not it was consumed to the end.

use crate::config::DigestConfig;
use crate::digest::{DigestRequest, Pipeline, StageTimings};
use crate::error::DigestError;
use crate::output::SlideResult;
use crate::pipeline::input;
use crate::progress::DigestStage;
use crate::workspace::WorkingArea;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of slide results.
pub type SlideStream = Pin<Box<dyn Stream<Item = SlideResult> + Send>>;

/// Summarise a deck, streaming slides in order as they complete.
///
/// # Returns
/// - `Ok(SlideStream)`: one item per slide, in slide order
/// - `Err(DigestError)`: caller error, or the deck could not be rendered or
///   rasterised
///
/// # Example
/// ```rust,no_run
/// use deck_digest::{summarize_stream, DigestConfig, DigestRequest};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let request = DigestRequest::parse("talk.pptx", "gemini", "bullet-points", Some("key"))?;
/// let mut slides = summarize_stream(request, &DigestConfig::default()).await?;
/// while let Some(slide) = slides.next().await {
///     println!("--- Slide {} ---\n{}", slide.slide_index, slide.summary);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn summarize_stream(
    request: DigestRequest,
    config: &DigestConfig,
) -> Result<SlideStream, DigestError> {
    Arc::new(Pipeline::new(config.clone())?)
        .stream(request)
        .await
}

impl Pipeline {
    /// Streaming counterpart of [`Pipeline::digest`].
    pub async fn stream(
        self: Arc<Self>,
        request: DigestRequest,
    ) -> Result<SlideStream, DigestError> {
        info!("Starting streaming digest: {}", request.source.display_name());
        input::validate_source(&request.source)?;
        let ctx = self.slide_context(request.provider, request.style, &request.credential)?;

        let area = Arc::new(WorkingArea::create(self.config().work_dir.as_deref())?);
        let deck = input::resolve_deck(
            &request.source,
            &area,
            self.config().download_timeout_secs,
        )
        .await?;
        if let Some(cb) = &self.config().progress_callback {
            cb.on_run_start(&deck.original_name);
        }

        let mut timings = StageTimings::default();
        let images = self.prepare(&deck, &area, &mut timings).await?;
        let total = images.len();
        self.stage(DigestStage::Summarizing);

        let concurrency = self.config().concurrency;
        if concurrency > 1 {
            let s = stream::iter(images)
                .map(move |image| {
                    let this = Arc::clone(&self);
                    let area = Arc::clone(&area);
                    let ctx = ctx.clone();
                    async move {
                        let _area = area;
                        this.process_slide(&image, total, &ctx).await
                    }
                })
                .buffered(concurrency);
            Ok(Box::pin(s))
        } else {
            let previous_called = Arc::new(AtomicBool::new(false));
            let s = stream::iter(images).then(move |image| {
                let this = Arc::clone(&self);
                let area = Arc::clone(&area);
                let ctx = ctx.clone();
                let previous_called = Arc::clone(&previous_called);
                async move {
                    let _area = area;
                    if previous_called.load(Ordering::SeqCst) {
                        this.pause_between_calls().await;
                    }
                    let result = this.process_slide(&image, total, &ctx).await;
                    previous_called.store(result.attempts > 0, Ordering::SeqCst);
                    result
                }
            });
            Ok(Box::pin(s))
        }
    }
}
