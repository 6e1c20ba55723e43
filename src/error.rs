//! Error types for the deck-digest library.
//!
//! Three layers of failure, matching the three layers of the pipeline:
//!
//! * [`DigestError`]: **fatal**. The run cannot proceed at all: bad caller
//!   input, a deck that cannot be rendered or rasterised, a working area that
//!   cannot be created. Returned as `Err(DigestError)` from the top-level
//!   `summarize_*` functions and never accompanied by partial results.
//!
//! * [`SlideError`]: **non-fatal**. One slide failed (OCR crashed, provider
//!   rejected the call) but every other slide is fine. Stored inside
//!   [`crate::output::SlideResult`] next to an error placeholder so results
//!   stay gap-free and in deck order.
//!
//! * [`ProviderError`]: the classification of a single summarisation call.
//!   Only [`ProviderError::RateLimited`] is transient; the retry loop in
//!   [`crate::pipeline::summarize`] uses [`ProviderError::is_transient`] to
//!   decide whether a second attempt is allowed.
//!
//! [`ToolError`] describes a failed external program (`soffice`,
//! `pdftoppm`, `tesseract`) and is wrapped by whichever layer invoked it.

use crate::provider::ProviderKind;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the deck-digest library.
///
/// Per-slide failures use [`SlideError`] and are stored in
/// [`crate::output::SlideResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum DigestError {
    // ── Caller-input errors ───────────────────────────────────────────────
    /// Style identifier is not one of the supported summary styles.
    #[error("Unknown summary style '{style}'\nExpected one of: concise, detailed, bullet-points.")]
    InvalidStyle { style: String },

    /// Provider identifier is not one of the supported providers.
    #[error("Unknown provider '{provider}'\nExpected one of: openai, gemini.")]
    UnknownProvider { provider: String },

    /// No credential was supplied for the selected provider.
    #[error("{provider} API key is required.\nPass --{flag}-key or set {env_var}.")]
    MissingCredential {
        provider: ProviderKind,
        flag: &'static str,
        env_var: &'static str,
    },

    /// Deck file was not found at the given path.
    #[error("Deck not found: '{path}'\nCheck the path exists and is readable.")]
    DeckNotFound { path: PathBuf },

    /// Process does not have read permission on the deck.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The deck's extension is not a presentation or PDF format.
    #[error("Unsupported deck '{name}'\nSupported formats: ppt, pptx, pps, ppsx, odp, key, pdf.")]
    UnsupportedDeck { name: String },

    /// The pipeline was built without an implementation for this provider.
    #[error("Provider '{provider}' is not configured on this pipeline")]
    ProviderNotConfigured { provider: ProviderKind },

    // ── Download errors ───────────────────────────────────────────────────
    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Working area ──────────────────────────────────────────────────────
    /// The scoped temporary directory for this run could not be prepared.
    #[error("Failed to prepare working area: {source}")]
    WorkingArea {
        #[source]
        source: std::io::Error,
    },

    // ── Rendering (deck → PDF) ────────────────────────────────────────────
    /// The document renderer could not convert the deck.
    #[error("Rendering '{deck}' to PDF failed: {source}")]
    RenderFailed {
        deck: PathBuf,
        #[source]
        source: ToolError,
    },

    /// The renderer exited cleanly but left no PDF behind.
    #[error("Renderer produced no PDF at '{expected}'\nThe deck may be corrupt or password-protected.")]
    RenderedDocumentMissing { expected: PathBuf },

    // ── Rasterisation (PDF → images) ──────────────────────────────────────
    /// pdfium or pdftoppm failed to produce page images.
    #[error("Rasterisation of '{pdf}' failed: {detail}")]
    RasterisationFailed { pdf: PathBuf, detail: String },

    /// The rasteriser subprocess failed.
    #[error("Rasterising '{pdf}' failed: {source}")]
    RasterToolFailed {
        pdf: PathBuf,
        #[source]
        source: ToolError,
    },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium (file or directory).\n\
  • Install pdfium system-wide.\n\
  • Use --rasterizer pdftoppm (requires poppler-utils).\n"
    )]
    PdfiumBindingFailed(String),

    /// The rendered document has no pages.
    #[error("'{pdf}' contains no pages to summarise")]
    EmptyDocument { pdf: PathBuf },

    // ── Output ────────────────────────────────────────────────────────────
    /// Some slides failed; returned by [`crate::output::DeckDigest::into_result`].
    #[error("{failed}/{total} slides failed during summarisation")]
    PartialFailure { failed: usize, total: usize },

    /// Could not serialise the digest.
    #[error("Failed to serialise digest: {0}")]
    Serialise(#[from] serde_json::Error),

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DigestError {
    /// True for errors caused by what the caller supplied rather than by the
    /// deck or the environment. These are raised before any external call.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            DigestError::InvalidStyle { .. }
                | DigestError::UnknownProvider { .. }
                | DigestError::MissingCredential { .. }
                | DigestError::DeckNotFound { .. }
                | DigestError::PermissionDenied { .. }
                | DigestError::UnsupportedDeck { .. }
                | DigestError::InvalidConfig(_)
        )
    }
}

/// A failed invocation of an external program.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The program could not be found.
    #[error("'{tool}' was not found.\n{hint}")]
    NotFound { tool: String, hint: String },

    /// The program exited with a non-zero status.
    #[error("'{tool}' exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },

    /// The program did not finish within its timeout and was killed.
    #[error("'{tool}' timed out after {secs}s")]
    TimedOut { tool: String, secs: u64 },

    /// Spawning or waiting on the program failed.
    #[error("Failed to run '{tool}': {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

/// Classified failure of a single summarisation call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// HTTP 429 / `RESOURCE_EXHAUSTED`: the only transient failure.
    #[error("{provider}: rate limit exceeded")]
    RateLimited {
        provider: ProviderKind,
        retry_after_secs: Option<u64>,
    },

    /// HTTP 401/403 or an invalid key: retrying cannot help.
    #[error("{provider}: authentication failed: {detail}")]
    Auth {
        provider: ProviderKind,
        detail: String,
    },

    /// Any other non-success response from the service.
    #[error("{provider}: API error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Api {
        provider: ProviderKind,
        status: Option<u16>,
        message: String,
    },

    /// The request never produced a response.
    #[error("{provider}: network error: {detail}")]
    Network {
        provider: ProviderKind,
        detail: String,
    },

    /// The response arrived but could not be read as a completion.
    #[error("{provider}: malformed response: {detail}")]
    MalformedResponse {
        provider: ProviderKind,
        detail: String,
    },
}

impl ProviderError {
    /// Whether a bounded retry may turn this failure into a success.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }
}

/// A non-fatal error for a single slide.
///
/// Stored alongside [`crate::output::SlideResult`] when a slide fails.
/// The run always continues with the next slide.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum SlideError {
    /// The text extractor failed on this slide's image.
    #[error("Slide {slide}: text extraction failed: {detail}")]
    ExtractionFailed { slide: usize, detail: String },

    /// The provider call failed permanently.
    #[error("Slide {slide}: summarisation failed after {attempts} attempt(s): {detail}")]
    SummaryFailed {
        slide: usize,
        attempts: u32,
        detail: String,
    },
}
