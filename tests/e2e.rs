//! End-to-end tests against the real external programs and providers.
//!
//! These need LibreOffice, tesseract, libpdfium (or pdftoppm), a deck in
//! `./test_cases/` and an API key. They are gated behind the `E2E_ENABLED`
//! environment variable so they do not run in CI unless explicitly
//! requested.
//!
//! Run with:
//!   E2E_ENABLED=1 OPENAI_API_KEY=sk-... cargo test --test e2e -- --nocapture
//!
//! Use the pdftoppm backend when no libpdfium is installed:
//!   E2E_ENABLED=1 E2E_RASTERIZER=pdftoppm cargo test --test e2e -- --nocapture

use deck_digest::{
    summarize_deck, summarize_deck_to_file, summarize_stream, DigestConfig, DigestRequest,
    OutputFormat, RasterBackend, SlideStatus, ThumbnailMode, ERROR_PLACEHOLDER,
};
use futures::StreamExt;
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip unless E2E_ENABLED is set, the deck exists and `$key_var` is set.
/// Evaluates to `(deck_path, api_key)`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr, $key_var:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test deck not found: {}", p.display());
            return;
        }
        let key = match std::env::var($key_var) {
            Ok(k) if !k.trim().is_empty() => k,
            _ => {
                println!("SKIP: {} is not set", $key_var);
                return;
            }
        };
        (p, key)
    }};
}

fn e2e_config() -> DigestConfig {
    let rasterizer = std::env::var("E2E_RASTERIZER")
        .ok()
        .and_then(|r| r.parse().ok())
        .unwrap_or(RasterBackend::Pdfium);
    DigestConfig::builder()
        .rasterizer(rasterizer)
        .dpi(150)
        .build()
        .expect("valid e2e config")
}

fn assert_summaries_sane(digest: &deck_digest::DeckDigest, context: &str) {
    assert!(!digest.slides.is_empty(), "[{context}] no slides");
    for (i, slide) in digest.slides.iter().enumerate() {
        assert_eq!(slide.slide_index, i + 1, "[{context}] index gap");
        assert!(
            !slide.summary.trim().is_empty(),
            "[{context}] slide {} has an empty summary",
            slide.slide_index
        );
        assert_eq!(
            slide.summary,
            slide.summary.trim(),
            "[{context}] slide {} summary is not trimmed",
            slide.slide_index
        );
        if slide.status == SlideStatus::Failed {
            assert_eq!(slide.summary, ERROR_PLACEHOLDER);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_pptx_openai_concise() {
    let (deck, key) =
        e2e_skip_unless_ready!(test_cases_dir().join("sample.pptx"), "OPENAI_API_KEY");

    let request =
        DigestRequest::parse(deck.to_str().unwrap(), "openai", "concise", Some(&key)).unwrap();
    let digest = summarize_deck(&request, &e2e_config()).await.unwrap();

    assert_summaries_sane(&digest, "pptx/openai");
    println!("{}", digest.to_text());
    println!("stats: {:?}", digest.stats);
}

#[tokio::test]
async fn test_pptx_gemini_bullet_points() {
    let (deck, key) =
        e2e_skip_unless_ready!(test_cases_dir().join("sample.pptx"), "GEMINI_API_KEY");

    let request =
        DigestRequest::parse(deck.to_str().unwrap(), "gemini", "bullet-points", Some(&key))
            .unwrap();
    let digest = summarize_deck(&request, &e2e_config()).await.unwrap();

    assert_summaries_sane(&digest, "pptx/gemini");
    assert_eq!(digest.stats.failed_slides, 0, "{:?}", digest.stats);
}

#[tokio::test]
async fn test_pdf_deck_with_embedded_thumbnails() {
    let (deck, key) =
        e2e_skip_unless_ready!(test_cases_dir().join("sample.pdf"), "OPENAI_API_KEY");

    let mut config = e2e_config();
    config.thumbnails = ThumbnailMode::Embed { max_width: 160 };
    let request =
        DigestRequest::parse(deck.to_str().unwrap(), "openai", "detailed", Some(&key)).unwrap();
    let digest = summarize_deck(&request, &config).await.unwrap();

    assert_summaries_sane(&digest, "pdf/embed");
    for slide in &digest.slides {
        let uri = slide.thumbnail.data_uri.as_deref().unwrap_or_default();
        assert!(uri.starts_with("data:image/png;base64,"));
    }
}

#[tokio::test]
async fn test_stream_and_file_output() {
    let (deck, key) =
        e2e_skip_unless_ready!(test_cases_dir().join("sample.pptx"), "OPENAI_API_KEY");
    let config = e2e_config();

    let request =
        DigestRequest::parse(deck.to_str().unwrap(), "openai", "concise", Some(&key)).unwrap();
    let slides: Vec<_> = summarize_stream(request.clone(), &config)
        .await
        .unwrap()
        .collect()
        .await;
    assert!(!slides.is_empty());

    let out = tempfile::tempdir().unwrap();
    let path = out.path().join("sample.md");
    let stats = summarize_deck_to_file(&request, &path, OutputFormat::Markdown, &config)
        .await
        .unwrap();
    assert_eq!(stats.total_slides, slides.len());
    let md = std::fs::read_to_string(&path).unwrap();
    assert!(md.contains("Slide 1"));
}
