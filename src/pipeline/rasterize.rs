//! PDF rasterisation: one PNG per page.
//!
//! Two backends implement [`PageRasterizer`]:
//!
//! * [`PdfiumRasterizer`] renders in-process. pdfium is CPU-bound and
//!   blocking, so the whole document is rendered inside `spawn_blocking`
//!   to keep Tokio workers free.
//! * [`PdftoppmRasterizer`] shells out to poppler.
//!
//! Whatever a backend returns is passed through [`index_pages`], which
//! assigns the contiguous 1-based slide indices the rest of the pipeline
//! relies on.

use crate::config::{DigestConfig, RasterBackend};
use crate::error::DigestError;
use crate::pipeline::tool::run_tool;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

/// A rasterised slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideImage {
    /// 1-based position in the deck.
    pub index: usize,
    pub path: PathBuf,
}

/// Turns a PDF into page images written under `out_dir`.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Return the image paths; order is fixed up by [`index_pages`].
    async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, DigestError>;
}

/// Build the rasteriser selected in the config.
pub fn create_rasterizer(config: &DigestConfig) -> Arc<dyn PageRasterizer> {
    match config.rasterizer {
        RasterBackend::Pdfium => Arc::new(PdfiumRasterizer {
            dpi: config.dpi,
            max_pixels: config.max_rendered_pixels,
            library_path: config.pdfium_library_path.clone(),
        }),
        RasterBackend::Pdftoppm => Arc::new(PdftoppmRasterizer {
            program: config.pdftoppm_program.clone(),
            dpi: config.dpi,
            timeout_secs: config.render_timeout_secs,
        }),
    }
}

/// Order page images and number them `1..=N`.
///
/// Files are ordered by the trailing number of their stem (`slide-7`,
/// `slide-007`), falling back to the name, so unpadded and padded outputs
/// both come out in page order.
pub fn index_pages(mut paths: Vec<PathBuf>) -> Vec<SlideImage> {
    paths.sort_by(|a, b| {
        page_number(a)
            .cmp(&page_number(b))
            .then_with(|| a.file_name().cmp(&b.file_name()))
    });
    paths
        .into_iter()
        .enumerate()
        .map(|(i, path)| SlideImage { index: i + 1, path })
        .collect()
}

fn page_number(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    let digits: String = stem
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().ok()
}

/// File name for page `index` (1-based).
pub fn page_file_name(index: usize) -> String {
    format!("slide-{index:04}.png")
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// In-process rasteriser backed by pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    dpi: u32,
    max_pixels: u32,
    library_path: Option<PathBuf>,
}

#[async_trait]
impl PageRasterizer for PdfiumRasterizer {
    async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, DigestError> {
        let this = self.clone();
        let pdf = pdf.to_path_buf();
        let out_dir = out_dir.to_path_buf();

        tokio::task::spawn_blocking(move || this.rasterize_blocking(&pdf, &out_dir))
            .await
            .map_err(|e| DigestError::Internal(format!("Rasterise task panicked: {e}")))?
    }
}

impl PdfiumRasterizer {
    fn bind(&self) -> Result<Pdfium, DigestError> {
        let explicit = self
            .library_path
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

        let bindings = match explicit {
            Some(path) => {
                let lib = if path.is_dir() {
                    Pdfium::pdfium_platform_library_name_at_path(&path)
                } else {
                    path
                };
                debug!("Binding pdfium from {}", lib.display());
                Pdfium::bind_to_library(&lib)
            }
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| DigestError::PdfiumBindingFailed(format!("{e:?}")))?;

        Ok(Pdfium::new(bindings))
    }

    fn rasterize_blocking(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, DigestError> {
        let pdfium = self.bind()?;
        let document =
            pdfium
                .load_pdf_from_file(pdf, None)
                .map_err(|e| DigestError::RasterisationFailed {
                    pdf: pdf.to_path_buf(),
                    detail: format!("{e:?}"),
                })?;

        let pages = document.pages();
        info!("PDF loaded: {} pages", pages.len());

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(self.dpi as f32 / 72.0)
            .set_maximum_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        let mut written = Vec::with_capacity(pages.len() as usize);
        for (i, page) in pages.iter().enumerate() {
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                DigestError::RasterisationFailed {
                    pdf: pdf.to_path_buf(),
                    detail: format!("page {}: {e:?}", i + 1),
                }
            })?;
            let image = bitmap.as_image();
            let target = out_dir.join(page_file_name(i + 1));
            image
                .save_with_format(&target, image::ImageFormat::Png)
                .map_err(|e| DigestError::RasterisationFailed {
                    pdf: pdf.to_path_buf(),
                    detail: format!("writing {}: {e}", target.display()),
                })?;
            debug!(
                "Rendered page {} → {}x{} px",
                i + 1,
                image.width(),
                image.height()
            );
            written.push(target);
        }
        Ok(written)
    }
}

// ── pdftoppm ─────────────────────────────────────────────────────────────

/// Subprocess rasteriser backed by poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    program: String,
    dpi: u32,
    timeout_secs: u64,
}

impl PdftoppmRasterizer {
    pub fn new(program: impl Into<String>, dpi: u32, timeout_secs: u64) -> Self {
        Self {
            program: program.into(),
            dpi,
            timeout_secs,
        }
    }
}

#[async_trait]
impl PageRasterizer for PdftoppmRasterizer {
    async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, DigestError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-r")
            .arg(self.dpi.to_string())
            .arg("-png")
            .arg(pdf)
            .arg(out_dir.join("slide"));

        run_tool(cmd, &self.program, self.timeout_secs)
            .await
            .map_err(|source| DigestError::RasterToolFailed {
                pdf: pdf.to_path_buf(),
                source,
            })?;

        list_pngs(out_dir).await.map_err(|e| DigestError::RasterisationFailed {
            pdf: pdf.to_path_buf(),
            detail: format!("reading {}: {e}", out_dir.display()),
        })
    }
}

async fn list_pngs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut out = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("png"))
        {
            out.push(path);
        }
    }
    Ok(out)
}
