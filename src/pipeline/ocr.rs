//! Text extraction from slide images.

use crate::config::DigestConfig;
use crate::error::ToolError;
use crate::pipeline::tool::run_tool;
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Best-effort OCR. An empty string is a valid result.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, image: &Path) -> Result<String, ToolError>;
}

/// `tesseract <image> stdout -l <langs>`.
#[derive(Debug, Clone)]
pub struct TesseractExtractor {
    program: String,
    languages: String,
    timeout_secs: u64,
}

impl TesseractExtractor {
    pub fn new(
        program: impl Into<String>,
        languages: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            program: program.into(),
            languages: languages.into(),
            timeout_secs,
        }
    }

    pub fn from_config(config: &DigestConfig) -> Self {
        Self::new(
            config.tesseract_program.clone(),
            config.ocr_language_arg(),
            config.ocr_timeout_secs,
        )
    }
}

#[async_trait]
impl TextExtractor for TesseractExtractor {
    async fn extract(&self, image: &Path) -> Result<String, ToolError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg(image).arg("stdout").arg("-l").arg(&self.languages);

        let output = run_tool(cmd, &self.program, self.timeout_secs).await?;
        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("OCR {}: {} chars", image.display(), text.len());
        Ok(text)
    }
}
