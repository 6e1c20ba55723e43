//! Pipeline stages for deck summarisation.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested alone and the external collaborators (renderer, rasteriser, OCR)
//! can be swapped for mocks behind their traits.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ rasterize ──▶ ocr ──▶ postprocess ──▶ summarize
//! (path/URL)  (soffice)  (pdfium)    (tesseract) (cleanup)    (LLM + retry)
//! ```
//!
//! 1. [`input`]: resolve a path, URL or byte upload to a local deck
//! 2. [`render`]: deck → PDF via headless LibreOffice (PDF decks skip it)
//! 3. [`rasterize`]: PDF → one PNG per page, indexed `1..=N`
//! 4. [`ocr`]: PNG → text via tesseract
//! 5. [`postprocess`]: normalise OCR text and model output
//! 6. [`summarize`]: one provider call per slide, retried once on rate limit
//!
//! [`thumbnail`] keeps something of each image once the working area is
//! gone; [`tool`] runs the external programs with a deadline.

pub mod input;
pub mod ocr;
pub mod postprocess;
pub mod rasterize;
pub mod render;
pub mod summarize;
pub mod thumbnail;
pub mod tool;
