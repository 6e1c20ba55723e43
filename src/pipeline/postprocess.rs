//! Deterministic text cleanup on both sides of the provider call.
//!
//! [`clean_ocr_text`] normalises what tesseract prints before it is put in a
//! prompt. [`clean_summary`] tidies what the model sends back. Each rule is a
//! pure `&str → String` pass so they can be tested and reordered in isolation.
//!
//! Rules must run in order: line endings before per-line trimming, and
//! invisible characters before the emptiness check so a slide holding only
//! a BOM counts as empty.

use once_cell::sync::Lazy;
use regex::Regex;

/// Normalise raw OCR output.
///
/// 1. Normalise line endings (CRLF/CR → LF)
/// 2. Drop form feeds tesseract emits between pages
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Trim trailing whitespace per line
/// 5. Collapse runs of blank lines to one
/// 6. Trim the whole text
///
/// Whitespace-only input becomes `""`.
pub fn clean_ocr_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = s.replace('\u{000C}', "\n");
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

/// Tidy a model response.
///
/// 1. Strip an outer code fence (some models wrap despite being told not to)
/// 2. Normalise line endings
/// 3. Trim trailing whitespace per line
/// 4. Trim the whole text
pub fn clean_summary(input: &str) -> String {
    let s = strip_outer_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    s.trim().to_string()
}

// ── Rule: strip outer fences ─────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md|text)?\n(.*)\n```\s*$").unwrap());

fn strip_outer_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule: line endings ───────────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule: trailing whitespace ────────────────────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule: blank lines ────────────────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule: invisible characters ───────────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}
