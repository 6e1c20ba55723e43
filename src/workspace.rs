//! Per-run working area.
//!
//! Every run owns one temporary directory holding the downloaded or copied
//! deck, the rendered PDF, the slide images and the LibreOffice profile.
//! It is a [`tempfile::TempDir`], so it disappears when the
//! [`WorkingArea`] is dropped on any exit path, unwinding included.

use crate::error::DigestError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

const PREFIX: &str = "deckdigest-";

/// Scoped directory owned by exactly one pipeline run.
#[derive(Debug)]
pub struct WorkingArea {
    dir: TempDir,
}

impl WorkingArea {
    /// Create a fresh area under `parent`, or the system temp dir.
    pub fn create(parent: Option<&Path>) -> Result<Self, DigestError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(PREFIX);
        let dir = match parent {
            Some(p) => {
                std::fs::create_dir_all(p).map_err(|source| DigestError::WorkingArea { source })?;
                builder.tempdir_in(p)
            }
            None => builder.tempdir(),
        }
        .map_err(|source| DigestError::WorkingArea { source })?;

        let area = Self { dir };
        for sub in [area.deck_dir(), area.pdf_dir(), area.image_dir()] {
            std::fs::create_dir_all(&sub).map_err(|source| DigestError::WorkingArea { source })?;
        }
        debug!("Working area: {}", area.path().display());
        Ok(area)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where input decks are placed (downloads, byte uploads, PDF copies).
    pub fn deck_dir(&self) -> PathBuf {
        self.path().join("deck")
    }

    /// Renderer output directory.
    pub fn pdf_dir(&self) -> PathBuf {
        self.path().join("pdf")
    }

    /// Rasteriser output directory.
    pub fn image_dir(&self) -> PathBuf {
        self.path().join("slides")
    }

    /// Isolated LibreOffice user profile; created by soffice on first use.
    pub fn profile_dir(&self) -> PathBuf {
        self.path().join("lo-profile")
    }

    /// Remove the area now and report failures instead of ignoring them.
    pub fn close(self) {
        let path = self.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Failed to remove working area {}: {}", path.display(), e);
        }
    }
}
