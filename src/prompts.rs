//! Prompts sent to the summarisation providers.
//!
//! Both providers receive the same two pieces: a short system prompt and a
//! user message made of the style instruction followed by the OCR text.
//! Callers can override the system prompt via
//! [`crate::config::DigestConfig::system_prompt`]; the constant here is used
//! only when no override is provided.

use crate::style::SummaryStyle;

/// Default system prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that summarizes \
presentation slides. The text you receive was extracted by OCR and may contain \
recognition errors, stray characters, or broken line wraps; read past them. \
Reply with the summary only, without preamble.";

/// Build the user message for one slide.
pub fn build_user_prompt(slide_text: &str, style: SummaryStyle) -> String {
    format!(
        "Below is OCR-extracted text from a presentation slide. {}:\n\n{}",
        style.instruction(),
        slide_text
    )
}
