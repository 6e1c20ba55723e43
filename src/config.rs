//! Configuration types for deck summarisation.
//!
//! Every pipeline knob lives in [`DigestConfig`], built via its
//! [`DigestConfigBuilder`]. The config holds no credentials: API keys travel
//! with each [`crate::digest::DigestRequest`], so one config can serve many
//! callers.

use crate::error::DigestError;
use crate::progress::ProgressCallback;
use crate::provider::{gemini, openai};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Configuration for summarising a deck.
///
/// Built via [`DigestConfig::builder()`] or using [`DigestConfig::default()`].
///
/// # Example
/// ```rust
/// use deck_digest::DigestConfig;
///
/// let config = DigestConfig::builder()
///     .dpi(150)
///     .concurrency(4)
///     .openai_model("gpt-4o-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct DigestConfig {
    /// Rasterisation DPI. Range: 72–600. Default: 200.
    ///
    /// Tesseract reads body text reliably from about 150 DPI upwards; 200
    /// leaves headroom for small footers and chart labels.
    pub dpi: u32,

    /// Longest edge of a rasterised slide in pixels (pdfium only). Default: 4000.
    ///
    /// A 16:9 slide at 200 DPI is roughly 2667 × 1500 px, well under the cap.
    /// The cap only matters for oversized poster-style pages.
    pub max_rendered_pixels: u32,

    /// Which rasteriser turns the PDF into page images. Default: pdfium.
    pub rasterizer: RasterBackend,

    /// Explicit pdfium library (file or directory). Falls back to
    /// `PDFIUM_LIB_PATH`, then the system library.
    pub pdfium_library_path: Option<PathBuf>,

    /// LibreOffice executable. Default: `soffice`.
    pub soffice_program: String,

    /// poppler `pdftoppm` executable. Default: `pdftoppm`.
    pub pdftoppm_program: String,

    /// Tesseract executable. Default: `tesseract`.
    pub tesseract_program: String,

    /// Tesseract language packs, joined with `+`. Default: `["eng"]`.
    pub ocr_languages: Vec<String>,

    /// Kill the renderer after this many seconds. Default: 180.
    pub render_timeout_secs: u64,

    /// Kill a single OCR invocation after this many seconds. Default: 60.
    pub ocr_timeout_secs: u64,

    /// Slides processed at once. Default: 1 (sequential).
    ///
    /// Above 1, slides are extracted and summarised concurrently and
    /// [`call_delay_ms`](Self::call_delay_ms) no longer applies.
    pub concurrency: usize,

    /// Pause between consecutive provider calls in sequential mode. Default: 1000.
    pub call_delay_ms: u64,

    /// Wait before retrying a rate-limited call. Default: 5000.
    ///
    /// A `Retry-After` header from the provider takes precedence when it
    /// asks for longer.
    pub rate_limit_backoff_ms: u64,

    /// Extra attempts allowed after a rate limit. Range: 0–3. Default: 1.
    ///
    /// With the default a slide makes at most two calls.
    pub max_rate_limit_retries: u32,

    /// Per-call HTTP timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Sampling temperature. Default: 0.3.
    pub temperature: f32,

    /// Maximum tokens per summary. Default: 1024.
    pub max_tokens: u32,

    /// Default: `gpt-3.5-turbo`. For o-series and gpt-5 models the limit is
    /// sent as `max_completion_tokens` and `temperature` is omitted.
    pub openai_model: String,

    /// Default: `models/gemini-2.5-flash-preview-04-17`.
    pub gemini_model: String,

    /// Default: `https://api.openai.com/v1`.
    pub openai_base_url: String,

    /// Default: `https://generativelanguage.googleapis.com`.
    pub gemini_base_url: String,

    /// Custom system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// How slide thumbnails survive the working area. Default: reference only.
    pub thumbnails: ThumbnailMode,

    /// Parent directory for the per-run working area. Default: system temp dir.
    pub work_dir: Option<PathBuf>,

    /// Download timeout for URL decks in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            max_rendered_pixels: 4000,
            rasterizer: RasterBackend::default(),
            pdfium_library_path: None,
            soffice_program: "soffice".into(),
            pdftoppm_program: "pdftoppm".into(),
            tesseract_program: "tesseract".into(),
            ocr_languages: vec!["eng".into()],
            render_timeout_secs: 180,
            ocr_timeout_secs: 60,
            concurrency: 1,
            call_delay_ms: 1000,
            rate_limit_backoff_ms: 5000,
            max_rate_limit_retries: 1,
            api_timeout_secs: 60,
            temperature: 0.3,
            max_tokens: 1024,
            openai_model: openai::DEFAULT_MODEL.into(),
            gemini_model: gemini::DEFAULT_MODEL.into(),
            openai_base_url: openai::DEFAULT_BASE_URL.into(),
            gemini_base_url: gemini::DEFAULT_BASE_URL.into(),
            system_prompt: None,
            thumbnails: ThumbnailMode::default(),
            work_dir: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DigestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestConfig")
            .field("dpi", &self.dpi)
            .field("rasterizer", &self.rasterizer)
            .field("ocr_languages", &self.ocr_languages)
            .field("concurrency", &self.concurrency)
            .field("call_delay_ms", &self.call_delay_ms)
            .field("rate_limit_backoff_ms", &self.rate_limit_backoff_ms)
            .field("max_rate_limit_retries", &self.max_rate_limit_retries)
            .field("openai_model", &self.openai_model)
            .field("gemini_model", &self.gemini_model)
            .field("thumbnails", &self.thumbnails)
            .field("work_dir", &self.work_dir)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn DigestProgressCallback>"),
            )
            .finish()
    }
}

impl DigestConfig {
    /// Create a new builder for `DigestConfig`.
    pub fn builder() -> DigestConfigBuilder {
        DigestConfigBuilder {
            config: Self::default(),
        }
    }

    /// The `-l` argument for tesseract.
    pub fn ocr_language_arg(&self) -> String {
        self.ocr_languages.join("+")
    }
}

/// Builder for [`DigestConfig`].
#[derive(Debug)]
pub struct DigestConfigBuilder {
    config: DigestConfig,
}

impl DigestConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn rasterizer(mut self, backend: RasterBackend) -> Self {
        self.config.rasterizer = backend;
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn soffice_program(mut self, program: impl Into<String>) -> Self {
        self.config.soffice_program = program.into();
        self
    }

    pub fn pdftoppm_program(mut self, program: impl Into<String>) -> Self {
        self.config.pdftoppm_program = program.into();
        self
    }

    pub fn tesseract_program(mut self, program: impl Into<String>) -> Self {
        self.config.tesseract_program = program.into();
        self
    }

    /// Accepts `eng+deu` style strings as well as single codes.
    pub fn ocr_languages(mut self, langs: impl AsRef<str>) -> Self {
        self.config.ocr_languages = langs
            .as_ref()
            .split(['+', ','])
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs;
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn call_delay_ms(mut self, ms: u64) -> Self {
        self.config.call_delay_ms = ms;
        self
    }

    pub fn rate_limit_backoff_ms(mut self, ms: u64) -> Self {
        self.config.rate_limit_backoff_ms = ms;
        self
    }

    pub fn max_rate_limit_retries(mut self, n: u32) -> Self {
        self.config.max_rate_limit_retries = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn openai_model(mut self, model: impl Into<String>) -> Self {
        self.config.openai_model = model.into();
        self
    }

    pub fn gemini_model(mut self, model: impl Into<String>) -> Self {
        self.config.gemini_model = model.into();
        self
    }

    pub fn openai_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.openai_base_url = url.into();
        self
    }

    pub fn gemini_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.gemini_base_url = url.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn thumbnails(mut self, mode: ThumbnailMode) -> Self {
        self.config.thumbnails = mode;
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = Some(dir.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DigestConfig, DigestError> {
        let c = &self.config;
        if !(72..=600).contains(&c.dpi) {
            return Err(DigestError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(DigestError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.max_rate_limit_retries > 3 {
            return Err(DigestError::InvalidConfig(format!(
                "Rate-limit retries must be 0–3, got {}",
                c.max_rate_limit_retries
            )));
        }
        if c.ocr_languages.is_empty() {
            return Err(DigestError::InvalidConfig(
                "At least one OCR language is required".into(),
            ));
        }
        if c.openai_model.trim().is_empty() || c.gemini_model.trim().is_empty() {
            return Err(DigestError::InvalidConfig("Model names must not be empty".into()));
        }
        if c.render_timeout_secs == 0
            || c.ocr_timeout_secs == 0
            || c.api_timeout_secs == 0
            || c.download_timeout_secs == 0
        {
            return Err(DigestError::InvalidConfig(
                "Timeouts must be at least one second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// PDF rasterisation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterBackend {
    /// In-process pdfium, run on the blocking pool. (default)
    #[default]
    Pdfium,
    /// poppler's `pdftoppm` subprocess.
    Pdftoppm,
}

impl FromStr for RasterBackend {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pdfium" => Ok(RasterBackend::Pdfium),
            "pdftoppm" | "poppler" => Ok(RasterBackend::Pdftoppm),
            other => Err(DigestError::InvalidConfig(format!(
                "Unknown rasterizer '{other}' (expected pdfium or pdftoppm)"
            ))),
        }
    }
}

/// What a [`crate::output::SlideResult`] keeps of its slide image once the
/// working area is gone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThumbnailMode {
    /// File name only. (default)
    #[default]
    Reference,
    /// Downscaled PNG as a base64 `data:` URI.
    Embed { max_width: u32 },
    /// Copy each image into this directory.
    Export(PathBuf),
}

impl ThumbnailMode {
    pub const DEFAULT_EMBED_WIDTH: u32 = 320;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sequential_with_single_retry() {
        let c = DigestConfig::default();
        assert_eq!(c.dpi, 200);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.max_rate_limit_retries, 1);
        assert_eq!(c.rate_limit_backoff_ms, 5000);
        assert_eq!(c.call_delay_ms, 1000);
        assert_eq!(c.render_timeout_secs, 180);
        assert_eq!(c.openai_model, "gpt-3.5-turbo");
        assert_eq!(c.gemini_model, "models/gemini-2.5-flash-preview-04-17");
        assert_eq!(c.rasterizer, RasterBackend::Pdfium);
    }

    #[test]
    fn builder_rejects_out_of_range_values() {
        assert!(DigestConfig::builder().dpi(50).build().is_err());
        assert!(DigestConfig::builder().dpi(601).build().is_err());
        assert!(DigestConfig::builder().concurrency(0).build().is_err());
        assert!(DigestConfig::builder()
            .max_rate_limit_retries(4)
            .build()
            .is_err());
        assert!(DigestConfig::builder().ocr_languages("  ").build().is_err());
        assert!(DigestConfig::builder().openai_model("").build().is_err());
    }

    #[test]
    fn every_timeout_must_be_positive() {
        assert!(DigestConfig::builder().render_timeout_secs(0).build().is_err());
        assert!(DigestConfig::builder().ocr_timeout_secs(0).build().is_err());
        assert!(DigestConfig::builder().api_timeout_secs(0).build().is_err());
        assert!(DigestConfig::builder()
            .download_timeout_secs(0)
            .build()
            .is_err());
        assert!(DigestConfig::builder()
            .api_timeout_secs(1)
            .download_timeout_secs(1)
            .build()
            .is_ok());
    }

    #[test]
    fn invalid_config_is_caller_error() {
        let err = DigestConfig::builder().concurrency(0).build().unwrap_err();
        assert!(err.is_caller_error());
    }

    #[test]
    fn ocr_languages_split_on_plus_and_comma() {
        let c = DigestConfig::builder()
            .ocr_languages("eng+deu, fra")
            .build()
            .unwrap();
        assert_eq!(c.ocr_languages, vec!["eng", "deu", "fra"]);
        assert_eq!(c.ocr_language_arg(), "eng+deu+fra");
    }

    #[test]
    fn raster_backend_parses() {
        assert_eq!("PDFium".parse::<RasterBackend>().unwrap(), RasterBackend::Pdfium);
        assert_eq!("poppler".parse::<RasterBackend>().unwrap(), RasterBackend::Pdftoppm);
        assert!("ghostscript".parse::<RasterBackend>().is_err());
    }

    #[test]
    fn debug_hides_callback_object() {
        let dbg = format!("{:?}", DigestConfig::default());
        assert!(dbg.contains("DigestConfig"));
        assert!(dbg.contains("progress_callback: None"));
    }
}
