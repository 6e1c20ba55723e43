//! The pipeline orchestrator and the eager (whole-deck) entry points.
//!
//! [`Pipeline`] wires the four collaborators together: a
//! [`DocumentRenderer`], a [`PageRasterizer`], a [`TextExtractor`] and one
//! [`SummaryProvider`] per [`ProviderKind`]. Production code gets the real
//! ones from [`Pipeline::new`]; tests inject mocks through
//! [`Pipeline::builder`].
//!
//! Rendering and rasterisation failures abort the run. Everything after
//! that is isolated per slide: a slide that cannot be read or summarised
//! gets [`ERROR_PLACEHOLDER`] and the run moves on, so the result always has
//! exactly one entry per page, in page order.
//!
//! Use [`crate::stream::summarize_stream`] instead to receive slides as they
//! finish.

use crate::config::DigestConfig;
use crate::error::{DigestError, SlideError};
use crate::output::{
    DeckDigest, DigestStats, OutputFormat, SlideResult, SlideStatus, ERROR_PLACEHOLDER,
};
use crate::pipeline::input::{self, Deck, DeckSource};
use crate::pipeline::ocr::{TesseractExtractor, TextExtractor};
use crate::pipeline::postprocess::clean_ocr_text;
use crate::pipeline::rasterize::{create_rasterizer, index_pages, PageRasterizer, SlideImage};
use crate::pipeline::render::{render_document, DocumentRenderer, SofficeRenderer};
use crate::pipeline::summarize::{summarize, RetryPolicy};
use crate::pipeline::thumbnail::make_thumbnail;
use crate::progress::DigestStage;
use crate::prompts::DEFAULT_SYSTEM_PROMPT;
use crate::provider::{
    build_http_client, create_provider, Credential, ProviderKind, SummaryProvider,
};
use crate::style::SummaryStyle;
use crate::workspace::WorkingArea;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

// ── Request ──────────────────────────────────────────────────────────────

/// What the caller wants summarised, and how.
#[derive(Debug, Clone)]
pub struct DigestRequest {
    pub source: DeckSource,
    pub provider: ProviderKind,
    pub style: SummaryStyle,
    pub credential: Credential,
}

impl DigestRequest {
    pub fn new(
        source: DeckSource,
        provider: ProviderKind,
        style: SummaryStyle,
        credential: Credential,
    ) -> Self {
        Self {
            source,
            provider,
            style,
            credential,
        }
    }

    /// Validate free-text identifiers at the service boundary.
    ///
    /// Checks run in order provider, style, credential, so the first
    /// problem reported is the one the caller would fix first. Nothing
    /// external is touched.
    pub fn parse(
        input: &str,
        provider: &str,
        style: &str,
        credential: Option<&str>,
    ) -> Result<Self, DigestError> {
        let provider: ProviderKind = provider.parse()?;
        let style: SummaryStyle = style.parse()?;
        let credential = credential
            .and_then(|k| Credential::new(k))
            .ok_or_else(|| provider.missing_credential())?;
        Ok(Self::new(
            DeckSource::from_input(input),
            provider,
            style,
            credential,
        ))
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────────

/// Per-run settings shared by every slide.
#[derive(Clone)]
pub(crate) struct SlideContext {
    provider: Arc<dyn SummaryProvider>,
    style: SummaryStyle,
    credential: Credential,
    policy: RetryPolicy,
    system_prompt: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct StageTimings {
    render_ms: u64,
    rasterize_ms: u64,
    summarize_ms: u64,
}

/// The deck → summaries orchestrator.
pub struct Pipeline {
    config: DigestConfig,
    renderer: Arc<dyn DocumentRenderer>,
    rasterizer: Arc<dyn PageRasterizer>,
    extractor: Arc<dyn TextExtractor>,
    providers: HashMap<ProviderKind, Arc<dyn SummaryProvider>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut providers: Vec<_> = self.providers.keys().copied().collect();
        providers.sort_by_key(|k| k.as_str());
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("providers", &providers)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Pipeline with soffice, the configured rasteriser, tesseract and both
    /// HTTP providers.
    pub fn new(config: DigestConfig) -> Result<Self, DigestError> {
        Self::builder(config).build()
    }

    /// Start from `config` and override individual collaborators.
    pub fn builder(config: DigestConfig) -> PipelineBuilder {
        PipelineBuilder {
            config,
            renderer: None,
            rasterizer: None,
            extractor: None,
            providers: HashMap::new(),
        }
    }

    pub fn config(&self) -> &DigestConfig {
        &self.config
    }

    /// The provider registered for `kind`.
    pub fn provider(&self, kind: ProviderKind) -> Result<Arc<dyn SummaryProvider>, DigestError> {
        self.providers
            .get(&kind)
            .cloned()
            .ok_or(DigestError::ProviderNotConfigured { provider: kind })
    }

    /// Summarise every slide of an already-resolved deck.
    ///
    /// The returned vector has one entry per page, ordered `1..=N`.
    pub async fn run(
        &self,
        deck: &Deck,
        area: &WorkingArea,
        provider: ProviderKind,
        style: SummaryStyle,
        credential: &Credential,
    ) -> Result<Vec<SlideResult>, DigestError> {
        let (slides, _) = self
            .run_timed(deck, area, provider, style, credential)
            .await?;
        Ok(slides)
    }

    /// Resolve the request's deck into a fresh working area, run it, and
    /// assemble the digest. The working area is removed before returning,
    /// on success and on error alike.
    pub async fn digest(&self, request: &DigestRequest) -> Result<DeckDigest, DigestError> {
        let total_start = Instant::now();
        input::validate_source(&request.source)?;
        let provider = self.provider(request.provider)?;

        let area = WorkingArea::create(self.config.work_dir.as_deref())?;
        let deck =
            input::resolve_deck(&request.source, &area, self.config.download_timeout_secs).await?;

        let (slides, timings) = self
            .run_timed(
                &deck,
                &area,
                request.provider,
                request.style,
                &request.credential,
            )
            .await?;
        area.close();

        let mut stats = DigestStats::from_slides(&slides);
        stats.render_duration_ms = timings.render_ms;
        stats.rasterize_duration_ms = timings.rasterize_ms;
        stats.summarize_duration_ms = timings.summarize_ms;
        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

        info!(
            "Digest complete: {}/{} slides summarised, {} empty, {} failed, {}ms total",
            stats.summarized_slides,
            stats.total_slides,
            stats.empty_slides,
            stats.failed_slides,
            stats.total_duration_ms
        );

        Ok(DeckDigest {
            deck_name: deck.original_name,
            provider: request.provider,
            model: provider.model().to_string(),
            style: request.style,
            slides,
            stats,
        })
    }

    async fn run_timed(
        &self,
        deck: &Deck,
        area: &WorkingArea,
        provider: ProviderKind,
        style: SummaryStyle,
        credential: &Credential,
    ) -> Result<(Vec<SlideResult>, StageTimings), DigestError> {
        let ctx = self.slide_context(provider, style, credential)?;
        if let Some(cb) = &self.config.progress_callback {
            cb.on_run_start(&deck.original_name);
        }

        let mut timings = StageTimings::default();
        let images = self.prepare(deck, area, &mut timings).await?;
        let total = images.len();

        self.stage(DigestStage::Summarizing);
        let summarize_start = Instant::now();
        let slides = if self.config.concurrency > 1 {
            self.process_concurrent(&images, &ctx).await
        } else {
            self.process_sequential(&images, &ctx).await
        };
        timings.summarize_ms = summarize_start.elapsed().as_millis() as u64;

        let failed = slides.iter().filter(|s| s.is_failed()).count();
        if let Some(cb) = &self.config.progress_callback {
            cb.on_run_complete(total, failed);
        }
        Ok((slides, timings))
    }

    pub(crate) fn slide_context(
        &self,
        provider: ProviderKind,
        style: SummaryStyle,
        credential: &Credential,
    ) -> Result<SlideContext, DigestError> {
        Ok(SlideContext {
            provider: self.provider(provider)?,
            style,
            credential: credential.clone(),
            policy: RetryPolicy::from_config(&self.config),
            system_prompt: self
                .config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        })
    }

    /// Render and rasterise: the two fatal stages.
    pub(crate) async fn prepare(
        &self,
        deck: &Deck,
        area: &WorkingArea,
        timings: &mut StageTimings,
    ) -> Result<Vec<SlideImage>, DigestError> {
        self.stage(DigestStage::Rendering);
        let render_start = Instant::now();
        let pdf = render_document(self.renderer.as_ref(), deck, area).await?;
        timings.render_ms = render_start.elapsed().as_millis() as u64;
        info!("Rendered {} in {}ms", deck.original_name, timings.render_ms);

        self.stage(DigestStage::Rasterizing);
        let raster_start = Instant::now();
        let pages = self.rasterizer.rasterize(&pdf, &area.image_dir()).await?;
        let images = index_pages(pages);
        timings.rasterize_ms = raster_start.elapsed().as_millis() as u64;

        if images.is_empty() {
            return Err(DigestError::EmptyDocument { pdf });
        }
        info!(
            "Rasterised {} slides in {}ms",
            images.len(),
            timings.rasterize_ms
        );
        Ok(images)
    }

    async fn process_sequential(
        &self,
        images: &[SlideImage],
        ctx: &SlideContext,
    ) -> Vec<SlideResult> {
        let total = images.len();
        let mut results = Vec::with_capacity(total);
        let mut previous_called = false;
        for image in images {
            if previous_called {
                self.pause_between_calls().await;
            }
            let result = self.process_slide(image, total, ctx).await;
            previous_called = result.attempts > 0;
            results.push(result);
        }
        results
    }

    async fn process_concurrent(
        &self,
        images: &[SlideImage],
        ctx: &SlideContext,
    ) -> Vec<SlideResult> {
        let total = images.len();
        let mut results: Vec<SlideResult> = stream::iter(
            images
                .iter()
                .map(|image| self.process_slide(image, total, ctx)),
        )
        .buffer_unordered(self.config.concurrency)
        .collect()
        .await;
        results.sort_by_key(|r| r.slide_index);
        results
    }

    pub(crate) async fn pause_between_calls(&self) {
        if self.config.call_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.call_delay_ms)).await;
        }
    }

    /// Extract, summarise and package one slide. Never fails.
    pub(crate) async fn process_slide(
        &self,
        image: &SlideImage,
        total: usize,
        ctx: &SlideContext,
    ) -> SlideResult {
        let start = Instant::now();
        let slide = image.index;
        if let Some(cb) = &self.config.progress_callback {
            cb.on_slide_start(slide, total);
        }

        let thumbnail = make_thumbnail(image, &self.config.thumbnails).await;

        let raw = match self.extractor.extract(&image.path).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Slide {}: text extraction failed: {}", slide, e);
                let error = SlideError::ExtractionFailed {
                    slide,
                    detail: e.to_string(),
                };
                if let Some(cb) = &self.config.progress_callback {
                    cb.on_slide_error(slide, total, &error.to_string());
                }
                return SlideResult {
                    slide_index: slide,
                    summary: ERROR_PLACEHOLDER.to_string(),
                    thumbnail,
                    text_chars: 0,
                    attempts: 0,
                    status: SlideStatus::Failed,
                    error: Some(error),
                    input_tokens: 0,
                    output_tokens: 0,
                    duration_ms: start.elapsed().as_millis() as u64,
                };
            }
        };

        let text = clean_ocr_text(&raw);
        debug!("Slide {}: {} chars of text", slide, text.chars().count());

        let outcome = summarize(
            ctx.provider.as_ref(),
            &text,
            ctx.style,
            &ctx.credential,
            &ctx.policy,
            &ctx.system_prompt,
        )
        .await;

        let (summary, error) = match outcome.status {
            SlideStatus::Failed => {
                let detail = outcome
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown error".to_string());
                (
                    ERROR_PLACEHOLDER.to_string(),
                    Some(SlideError::SummaryFailed {
                        slide,
                        attempts: outcome.attempts,
                        detail,
                    }),
                )
            }
            _ => (outcome.summary, None),
        };

        if let Some(cb) = &self.config.progress_callback {
            match &error {
                None => cb.on_slide_complete(slide, total, summary.len()),
                Some(e) => cb.on_slide_error(slide, total, &e.to_string()),
            }
        }

        SlideResult {
            slide_index: slide,
            summary,
            thumbnail,
            text_chars: text.chars().count(),
            attempts: outcome.attempts,
            status: outcome.status,
            error,
            input_tokens: outcome.input_tokens,
            output_tokens: outcome.output_tokens,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    pub(crate) fn stage(&self, stage: DigestStage) {
        debug!("Stage: {}", stage);
        if let Some(cb) = &self.config.progress_callback {
            cb.on_stage(stage);
        }
    }
}

/// Builder for [`Pipeline`]; unset collaborators get the real implementations.
pub struct PipelineBuilder {
    config: DigestConfig,
    renderer: Option<Arc<dyn DocumentRenderer>>,
    rasterizer: Option<Arc<dyn PageRasterizer>>,
    extractor: Option<Arc<dyn TextExtractor>>,
    providers: HashMap<ProviderKind, Arc<dyn SummaryProvider>>,
}

impl PipelineBuilder {
    pub fn renderer(mut self, renderer: Arc<dyn DocumentRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Register a provider under its own [`SummaryProvider::kind`].
    ///
    /// Once any provider is registered, only registered kinds are
    /// available; the HTTP defaults are used only when none is.
    pub fn provider(mut self, provider: Arc<dyn SummaryProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    pub fn build(self) -> Result<Pipeline, DigestError> {
        let config = self.config;

        let providers = if self.providers.is_empty() {
            let client = build_http_client(&config)?;
            ProviderKind::ALL
                .iter()
                .map(|&kind| (kind, create_provider(kind, &config, client.clone())))
                .collect()
        } else {
            self.providers
        };

        Ok(Pipeline {
            renderer: self.renderer.unwrap_or_else(|| {
                Arc::new(SofficeRenderer::new(
                    config.soffice_program.clone(),
                    config.render_timeout_secs,
                ))
            }),
            rasterizer: self
                .rasterizer
                .unwrap_or_else(|| create_rasterizer(&config)),
            extractor: self
                .extractor
                .unwrap_or_else(|| Arc::new(TesseractExtractor::from_config(&config))),
            providers,
            config,
        })
    }
}

// ── Entry points ─────────────────────────────────────────────────────────

/// Summarise a deck with the real collaborators.
///
/// # Returns
/// `Ok(DeckDigest)` whenever the deck could be rendered and rasterised,
/// even if some slides failed (check `digest.stats.failed_slides`, or call
/// [`DeckDigest::into_result`]).
///
/// # Example
/// ```rust,no_run
/// use deck_digest::{summarize_deck, DigestConfig, DigestRequest};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let key = std::env::var("OPENAI_API_KEY").ok();
/// let request = DigestRequest::parse("talk.pptx", "openai", "concise", key.as_deref())?;
/// let digest = summarize_deck(&request, &DigestConfig::default()).await?;
/// print!("{}", digest.to_text());
/// # Ok(())
/// # }
/// ```
pub async fn summarize_deck(
    request: &DigestRequest,
    config: &DigestConfig,
) -> Result<DeckDigest, DigestError> {
    info!("Starting digest: {}", request.source.display_name());
    Pipeline::new(config.clone())?.digest(request).await
}

/// Summarise a deck held in memory. `file_name` supplies the extension.
pub async fn summarize_deck_bytes(
    file_name: impl Into<String>,
    bytes: Vec<u8>,
    provider: ProviderKind,
    style: SummaryStyle,
    credential: Credential,
    config: &DigestConfig,
) -> Result<DeckDigest, DigestError> {
    let request = DigestRequest::new(
        DeckSource::Bytes {
            file_name: file_name.into(),
            bytes,
        },
        provider,
        style,
        credential,
    );
    summarize_deck(&request, config).await
}

/// Synchronous wrapper around [`summarize_deck`].
///
/// Creates a temporary tokio runtime internally.
pub fn summarize_deck_sync(
    request: &DigestRequest,
    config: &DigestConfig,
) -> Result<DeckDigest, DigestError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DigestError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(summarize_deck(request, config))
}

/// Summarise a deck and write it in `format` to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn summarize_deck_to_file(
    request: &DigestRequest,
    output_path: impl AsRef<Path>,
    format: OutputFormat,
    config: &DigestConfig,
) -> Result<DigestStats, DigestError> {
    let digest = summarize_deck(request, config).await?;
    write_atomic(output_path.as_ref(), &digest.render(format)?).await?;
    Ok(digest.stats)
}

/// Write `contents` to `path` via a sibling temp file and rename.
pub async fn write_atomic(path: &Path, contents: &str) -> Result<(), DigestError> {
    let write_err = |source: std::io::Error| DigestError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    if let Err(e) = tokio::fs::write(&tmp_path, contents).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_checks_provider_first() {
        let err = DigestRequest::parse("talk.pptx", "claude", "haiku", None).unwrap_err();
        assert!(matches!(err, DigestError::UnknownProvider { .. }));
    }

    #[test]
    fn parse_checks_style_before_credential() {
        let err = DigestRequest::parse("talk.pptx", "openai", "haiku", None).unwrap_err();
        assert!(matches!(err, DigestError::InvalidStyle { .. }));
    }

    #[test]
    fn parse_rejects_missing_or_blank_credential() {
        let err = DigestRequest::parse("talk.pptx", "gemini", "concise", Some("  ")).unwrap_err();
        match err {
            DigestError::MissingCredential { provider, env_var, .. } => {
                assert_eq!(provider, ProviderKind::Gemini);
                assert_eq!(env_var, "GEMINI_API_KEY");
            }
            other => panic!("expected MissingCredential, got {other:?}"),
        }
    }

    #[test]
    fn parse_builds_request() {
        let req =
            DigestRequest::parse("https://x.test/a.pptx", "gemini", "bullet-points", Some("k"))
                .unwrap();
        assert_eq!(req.provider, ProviderKind::Gemini);
        assert_eq!(req.style, SummaryStyle::BulletPoints);
        assert_eq!(req.source, DeckSource::Url("https://x.test/a.pptx".into()));
    }

    #[test]
    fn default_pipeline_has_both_providers() {
        let pipeline = Pipeline::new(DigestConfig::default()).unwrap();
        assert_eq!(pipeline.provider(ProviderKind::OpenAi).unwrap().model(), "gpt-3.5-turbo");
        assert_eq!(
            pipeline.provider(ProviderKind::Gemini).unwrap().model(),
            "models/gemini-2.5-flash-preview-04-17"
        );
    }

    #[tokio::test]
    async fn write_atomic_creates_parents_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/nested/digest.md");
        write_atomic(&path, "# Deck\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Deck\n");
        assert!(!dir.path().join("out/nested/digest.md.tmp").exists());
    }

    #[tokio::test]
    async fn write_atomic_failure_leaves_target_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("digest.md");
        // A directory squatting on the temp name makes the write fail.
        std::fs::create_dir(dir.path().join("digest.md.tmp")).unwrap();

        let err = write_atomic(&path, "# Deck\n").await.unwrap_err();
        assert!(matches!(err, DigestError::OutputWriteFailed { .. }));
        assert!(!path.exists());
    }
}
