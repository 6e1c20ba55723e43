//! Document rendering: slide deck → PDF via headless LibreOffice.
//!
//! Each run points LibreOffice at a private user profile inside its working
//! area. Two `soffice` processes sharing a profile block on each other's
//! lock file, so isolating the profile is what makes concurrent runs safe.

use crate::error::{DigestError, ToolError};
use crate::pipeline::input::Deck;
use crate::pipeline::tool::run_tool;
use crate::workspace::WorkingArea;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Converts a deck into a single PDF inside the working area.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Render `deck` and return the path of the PDF it produced.
    async fn render(&self, deck: &Path, area: &WorkingArea) -> Result<PathBuf, DigestError>;
}

/// `soffice --headless --convert-to pdf`.
#[derive(Debug, Clone)]
pub struct SofficeRenderer {
    program: String,
    timeout_secs: u64,
}

impl SofficeRenderer {
    pub fn new(program: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            program: program.into(),
            timeout_secs,
        }
    }

    /// The full argument list, exposed for logging and tests.
    pub fn args(&self, deck: &Path, area: &WorkingArea) -> Vec<String> {
        vec![
            "--headless".into(),
            format!("-env:UserInstallation={}", file_url(&area.profile_dir())),
            "--convert-to".into(),
            "pdf".into(),
            "--outdir".into(),
            area.pdf_dir().to_string_lossy().into_owned(),
            deck.to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl DocumentRenderer for SofficeRenderer {
    async fn render(&self, deck: &Path, area: &WorkingArea) -> Result<PathBuf, DigestError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args(deck, area));

        run_tool(cmd, &self.program, self.timeout_secs)
            .await
            .map_err(|source| DigestError::RenderFailed {
                deck: deck.to_path_buf(),
                source,
            })?;

        let stem = deck
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "deck".to_string());
        let expected = area.pdf_dir().join(format!("{stem}.pdf"));
        if !expected.is_file() {
            return Err(DigestError::RenderedDocumentMissing { expected });
        }
        debug!("soffice wrote {}", expected.display());
        Ok(expected)
    }
}

/// Produce the run's PDF: copy a PDF deck, otherwise call the renderer.
pub async fn render_document(
    renderer: &dyn DocumentRenderer,
    deck: &Deck,
    area: &WorkingArea,
) -> Result<PathBuf, DigestError> {
    if deck.is_pdf() {
        let target = area.pdf_dir().join(format!("{}.pdf", deck.stem()));
        if deck.path != target {
            tokio::fs::copy(&deck.path, &target)
                .await
                .map_err(|source| DigestError::RenderFailed {
                    deck: deck.path.clone(),
                    source: ToolError::Io {
                        tool: "copy".into(),
                        source,
                    },
                })?;
        }
        info!("{} is already a PDF; renderer skipped", deck.original_name);
        return Ok(target);
    }

    info!("Rendering {} to PDF", deck.original_name);
    renderer.render(&deck.path, area).await
}

/// `file://` URL for a local directory, as LibreOffice expects.
fn file_url(path: &Path) -> String {
    let s = path.to_string_lossy().replace('\\', "/");
    if s.starts_with('/') {
        format!("file://{s}")
    } else {
        format!("file:///{s}")
    }
}
