//! Result types: per-slide results, run statistics and the assembled digest.

use crate::error::{DigestError, SlideError};
use crate::provider::ProviderKind;
use crate::style::SummaryStyle;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::str::FromStr;

/// Summary recorded for a slide whose OCR text is empty.
pub const NO_TEXT_PLACEHOLDER: &str = "[No extractable text found on this slide.]";

/// Summary recorded for a slide that failed permanently.
pub const ERROR_PLACEHOLDER: &str = "[Error processing slide]";

/// How a slide's summary came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideStatus {
    /// The provider returned a summary.
    Summarized,
    /// OCR found no text; no call was made.
    NoText,
    /// Extraction or summarisation failed; the summary is the error placeholder.
    Failed,
}

/// What remains of a slide's image after the working area is removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailRef {
    /// `slide-0001.png` style name, always set.
    pub file_name: String,
    /// Persistent copy, when thumbnails are exported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// `data:image/png;base64,…`, when thumbnails are embedded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_uri: Option<String>,
}

/// Result for one slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideResult {
    /// 1-based slide index.
    pub slide_index: usize,
    /// The summary, or one of the placeholders.
    pub summary: String,
    pub thumbnail: ThumbnailRef,
    /// Characters of cleaned OCR text sent to the provider.
    pub text_chars: usize,
    /// Provider calls made for this slide (0 for no-text or extraction failure).
    pub attempts: u32,
    pub status: SlideStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SlideError>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Wall-clock time for extraction plus summarisation.
    pub duration_ms: u64,
}

impl SlideResult {
    pub fn is_failed(&self) -> bool {
        self.status == SlideStatus::Failed
    }
}

/// Aggregate numbers for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestStats {
    pub total_slides: usize,
    pub summarized_slides: usize,
    pub empty_slides: usize,
    pub failed_slides: usize,
    /// Provider calls beyond the first, summed over slides.
    pub rate_limit_retries: u32,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub render_duration_ms: u64,
    pub rasterize_duration_ms: u64,
    pub summarize_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl DigestStats {
    /// Counters derived from the slides. Durations are left at zero.
    pub fn from_slides(slides: &[SlideResult]) -> Self {
        let mut stats = DigestStats {
            total_slides: slides.len(),
            ..Default::default()
        };
        for s in slides {
            match s.status {
                SlideStatus::Summarized => stats.summarized_slides += 1,
                SlideStatus::NoText => stats.empty_slides += 1,
                SlideStatus::Failed => stats.failed_slides += 1,
            }
            stats.rate_limit_retries += s.attempts.saturating_sub(1);
            stats.total_input_tokens += u64::from(s.input_tokens);
            stats.total_output_tokens += u64::from(s.output_tokens);
        }
        stats
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckDigest {
    /// Deck name as supplied by the caller.
    pub deck_name: String,
    pub provider: ProviderKind,
    pub model: String,
    pub style: SummaryStyle,
    /// One entry per slide, ordered by `slide_index`.
    pub slides: Vec<SlideResult>,
    pub stats: DigestStats,
}

impl DeckDigest {
    /// Console format: a `--- Slide N ---` header followed by the summary.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for s in &self.slides {
            let _ = writeln!(out, "--- Slide {} ---", s.slide_index);
            let _ = writeln!(out, "{}", s.summary);
            out.push('\n');
        }
        out
    }

    /// Markdown with a heading per slide and an embedded thumbnail when available.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# {}", self.deck_name);
        out.push('\n');
        let _ = writeln!(
            out,
            "_{} slides · {} · {} · {}_",
            self.stats.total_slides,
            self.provider.display_name(),
            self.model,
            self.style
        );
        for s in &self.slides {
            out.push('\n');
            let _ = writeln!(out, "## Slide {}", s.slide_index);
            out.push('\n');
            if let Some(uri) = &s.thumbnail.data_uri {
                let _ = writeln!(out, "![Slide {}]({})", s.slide_index, uri);
                out.push('\n');
            } else if let Some(path) = &s.thumbnail.path {
                let _ = writeln!(out, "![Slide {}]({})", s.slide_index, path.display());
                out.push('\n');
            }
            let _ = writeln!(out, "{}", s.summary);
        }
        out
    }

    /// Pretty JSON.
    pub fn to_json(&self) -> Result<String, DigestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Render in the requested format.
    pub fn render(&self, format: OutputFormat) -> Result<String, DigestError> {
        match format {
            OutputFormat::Text => Ok(self.to_text()),
            OutputFormat::Markdown => Ok(self.to_markdown()),
            OutputFormat::Json => self.to_json(),
        }
    }

    /// Turn a run with failed slides into [`DigestError::PartialFailure`].
    pub fn into_result(self) -> Result<Self, DigestError> {
        if self.stats.failed_slides > 0 {
            Err(DigestError::PartialFailure {
                failed: self.stats.failed_slides,
                total: self.stats.total_slides,
            })
        } else {
            Ok(self)
        }
    }
}

/// Serialisation of a [`DeckDigest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Markdown,
    Json,
}

impl OutputFormat {
    /// Conventional file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            other => Err(DigestError::InvalidConfig(format!(
                "Unknown output format '{other}' (expected text, markdown or json)"
            ))),
        }
    }
}
