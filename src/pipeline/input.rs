//! Input resolution: turn what the caller supplied into a local deck file.
//!
//! A deck may arrive as a local path, an HTTP(S) URL or raw bytes with a
//! file name. Downloads and byte uploads are written into the run's
//! [`WorkingArea`] so they vanish with it. Local paths are used in place.
//!
//! Validation that needs no I/O beyond a metadata check (existence,
//! permissions, extension) is done by [`validate_source`] before the
//! working area is even created, so caller mistakes are reported without
//! touching any external tool.

use crate::error::DigestError;
use crate::workspace::WorkingArea;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Extensions accepted as decks. `pdf` skips the renderer.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["ppt", "pptx", "pps", "ppsx", "odp", "key", "pdf"];

/// Where a deck comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeckSource {
    /// A file on the local file system.
    Path(PathBuf),
    /// An `http://` or `https://` URL, downloaded into the working area.
    Url(String),
    /// In-memory contents; `file_name` supplies the extension.
    Bytes { file_name: String, bytes: Vec<u8> },
}

impl DeckSource {
    /// Interpret a CLI-style argument as a URL or a path.
    pub fn from_input(input: &str) -> Self {
        if is_url(input) {
            DeckSource::Url(input.to_string())
        } else {
            DeckSource::Path(PathBuf::from(input))
        }
    }

    /// The file name a user would recognise.
    pub fn display_name(&self) -> String {
        match self {
            DeckSource::Path(p) => p
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string()),
            DeckSource::Url(u) => url_file_name(u).unwrap_or_else(|| u.clone()),
            DeckSource::Bytes { file_name, .. } => file_name.clone(),
        }
    }
}

/// A deck ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    /// Local file to hand to the renderer.
    pub path: PathBuf,
    /// Name as supplied by the caller, for reports.
    pub original_name: String,
}

impl Deck {
    pub fn is_pdf(&self) -> bool {
        extension_of(&self.path).as_deref() == Some("pdf")
    }

    /// File stem used to name the rendered PDF.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "deck".to_string())
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Reject sources that can never succeed.
pub fn validate_source(source: &DeckSource) -> Result<(), DigestError> {
    match source {
        DeckSource::Path(path) => {
            check_extension(&path.to_string_lossy())?;
            check_readable(path)
        }
        DeckSource::Url(url) => {
            let name = url_file_name(url).unwrap_or_default();
            check_extension(&name).map_err(|_| DigestError::UnsupportedDeck { name: url.clone() })
        }
        DeckSource::Bytes { file_name, .. } => check_extension(file_name),
    }
}

/// Resolve `source` to a local file, writing into `area` when needed.
pub async fn resolve_deck(
    source: &DeckSource,
    area: &WorkingArea,
    download_timeout_secs: u64,
) -> Result<Deck, DigestError> {
    validate_source(source)?;
    match source {
        DeckSource::Path(path) => {
            debug!("Resolved local deck: {}", path.display());
            Ok(Deck {
                path: path.clone(),
                original_name: source.display_name(),
            })
        }
        DeckSource::Url(url) => download_url(url, area, download_timeout_secs).await,
        DeckSource::Bytes { file_name, bytes } => {
            let target = area.deck_dir().join(sanitize_file_name(file_name));
            tokio::fs::write(&target, bytes)
                .await
                .map_err(|source| DigestError::WorkingArea { source })?;
            debug!("Wrote {} bytes to {}", bytes.len(), target.display());
            Ok(Deck {
                path: target,
                original_name: file_name.clone(),
            })
        }
    }
}

fn check_extension(name: &str) -> Result<(), DigestError> {
    match extension_of(Path::new(name)) {
        Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(DigestError::UnsupportedDeck {
            name: name.to_string(),
        }),
    }
}

fn check_readable(path: &Path) -> Result<(), DigestError> {
    if !path.exists() {
        return Err(DigestError::DeckNotFound {
            path: path.to_path_buf(),
        });
    }
    match std::fs::File::open(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(DigestError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(DigestError::DeckNotFound {
            path: path.to_path_buf(),
        }),
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Download a URL into the working area's deck directory.
async fn download_url(
    url: &str,
    area: &WorkingArea,
    timeout_secs: u64,
) -> Result<Deck, DigestError> {
    info!("Downloading deck from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DigestError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DigestError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DigestError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(DigestError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let original_name = url_file_name(url).unwrap_or_else(|| "deck.pptx".to_string());
    let file_path = area.deck_dir().join(sanitize_file_name(&original_name));

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            DigestError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DigestError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|source| DigestError::WorkingArea { source })?;

    info!("Downloaded {} bytes to {}", bytes.len(), file_path.display());

    Ok(Deck {
        path: file_path,
        original_name,
    })
}

/// Last non-empty path segment of a URL, if it looks like a file name.
fn url_file_name(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    if last.is_empty() || !last.contains('.') {
        return None;
    }
    Some(last.to_string())
}

/// Keep only the final path component and replace anything outside
/// `[A-Za-z0-9._-]`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "deck".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/talk.pptx"));
        assert!(is_url("http://example.com/talk.pptx"));
        assert!(!is_url("/tmp/talk.pptx"));
        assert!(!is_url("talk.pptx"));
        assert!(!is_url(""));
    }

    #[test]
    fn from_input_distinguishes_urls() {
        assert_eq!(
            DeckSource::from_input("https://x.test/a.pptx"),
            DeckSource::Url("https://x.test/a.pptx".into())
        );
        assert_eq!(
            DeckSource::from_input("slides/a.pptx"),
            DeckSource::Path(PathBuf::from("slides/a.pptx"))
        );
    }

    #[test]
    fn missing_path_is_deck_not_found() {
        let err = validate_source(&DeckSource::Path("/no/such/deck.pptx".into())).unwrap_err();
        assert!(matches!(err, DigestError::DeckNotFound { .. }));
        assert!(err.is_caller_error());
    }

    #[test]
    fn unsupported_extension_is_rejected_before_existence_check() {
        let err = validate_source(&DeckSource::Path("/no/such/notes.docx".into())).unwrap_err();
        assert!(matches!(err, DigestError::UnsupportedDeck { .. }));
    }

    #[test]
    fn extensions_are_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Quarterly.PPTX");
        std::fs::write(&path, b"pk").unwrap();
        assert!(validate_source(&DeckSource::Path(path)).is_ok());
    }

    #[test]
    fn url_without_file_name_is_unsupported() {
        let err = validate_source(&DeckSource::Url("https://example.com/".into())).unwrap_err();
        assert!(matches!(err, DigestError::UnsupportedDeck { .. }));
        assert!(validate_source(&DeckSource::Url("https://example.com/d/talk.odp".into())).is_ok());
    }

    #[test]
    fn sanitize_strips_directories_and_odd_characters() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("Q3 review (final).pptx"), "Q3_review__final_.pptx");
        assert_eq!(sanitize_file_name(".hidden.pdf"), "hidden.pdf");
        assert_eq!(sanitize_file_name(""), "deck");
    }

    #[test]
    fn deck_stem_and_pdf_detection() {
        let deck = Deck {
            path: PathBuf::from("/tmp/Roadmap.PDF"),
            original_name: "Roadmap.PDF".into(),
        };
        assert!(deck.is_pdf());
        assert_eq!(deck.stem(), "Roadmap");
    }

    #[tokio::test]
    async fn bytes_are_written_into_working_area() {
        let area = WorkingArea::create(None).unwrap();
        let source = DeckSource::Bytes {
            file_name: "my deck.pptx".into(),
            bytes: b"PK\x03\x04".to_vec(),
        };
        let deck = resolve_deck(&source, &area, 5).await.unwrap();
        assert!(deck.path.starts_with(area.deck_dir()));
        assert_eq!(deck.original_name, "my deck.pptx");
        assert_eq!(std::fs::read(&deck.path).unwrap(), b"PK\x03\x04");
    }
}
