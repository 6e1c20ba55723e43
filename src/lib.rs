//! # deck-digest
//!
//! Summarise presentation decks slide by slide with a hosted LLM.
//!
//! ## Why this crate?
//!
//! Slide decks keep most of their content in text boxes, charts and
//! screenshots that plain text extraction either scrambles or misses. This
//! crate renders the deck the way a viewer sees it, reads each slide back
//! with OCR, and asks a language model for a short summary per slide.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Deck (.pptx / .ppt / .odp / .key / .pdf)
//!  │
//!  ├─ 1. Input      resolve local file, URL or uploaded bytes
//!  ├─ 2. Render     deck → PDF via headless LibreOffice (soffice)
//!  ├─ 3. Rasterise  PDF → one PNG per slide (pdfium or pdftoppm)
//!  ├─ 4. OCR        PNG → text via tesseract
//!  ├─ 5. Summarise  one OpenAI / Gemini call per slide, one retry on 429
//!  └─ 6. Output     ordered summaries + thumbnails + stats
//! ```
//!
//! A slide that cannot be read or summarised is marked with
//! [`ERROR_PLACEHOLDER`] and the run continues; only render and rasterise
//! failures abort the whole deck. All intermediate files live in a
//! [`WorkingArea`] that is removed when the run ends.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use deck_digest::{summarize_deck, DigestConfig, DigestRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let key = std::env::var("GEMINI_API_KEY").ok();
//!     let request = DigestRequest::parse("quarterly.pptx", "gemini", "concise", key.as_deref())?;
//!     let digest = summarize_deck(&request, &DigestConfig::default()).await?;
//!     print!("{}", digest.to_text());
//!     eprintln!("{} of {} slides failed",
//!         digest.stats.failed_slides,
//!         digest.stats.total_slides);
//!     Ok(())
//! }
//! ```
//!
//! ## External Programs
//!
//! | Program     | Needed for                         | Override                     |
//! |-------------|------------------------------------|------------------------------|
//! | `soffice`   | any non-PDF deck                   | `DigestConfig::soffice_program` |
//! | libpdfium   | rasterising (default backend)      | `PDFIUM_LIB_PATH`            |
//! | `pdftoppm`  | rasterising (`RasterBackend::Pdftoppm`) | `DigestConfig::pdftoppm_program` |
//! | `tesseract` | OCR                                | `DigestConfig::tesseract_program` |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `deckdigest` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! deck-digest = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod digest;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod stream;
pub mod style;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{DigestConfig, DigestConfigBuilder, RasterBackend, ThumbnailMode};
pub use digest::{
    summarize_deck, summarize_deck_bytes, summarize_deck_sync, summarize_deck_to_file,
    DigestRequest, Pipeline, PipelineBuilder,
};
pub use error::{DigestError, ProviderError, SlideError, ToolError};
pub use output::{
    DeckDigest, DigestStats, OutputFormat, SlideResult, SlideStatus, ThumbnailRef,
    ERROR_PLACEHOLDER, NO_TEXT_PLACEHOLDER,
};
pub use pipeline::input::DeckSource;
pub use progress::{DigestProgressCallback, DigestStage, NoopProgressCallback, ProgressCallback};
pub use provider::{Credential, ProviderKind, SummaryProvider};
pub use stream::{summarize_stream, SlideStream};
pub use style::SummaryStyle;
pub use workspace::WorkingArea;
