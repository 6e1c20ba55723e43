//! Running external programs with a deadline.
//!
//! soffice, pdftoppm and tesseract are all driven through [`run_tool`]. The
//! child is spawned with `kill_on_drop`, so when the timeout fires and the
//! wait future is dropped the process is killed rather than orphaned.

use crate::error::ToolError;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

const STDERR_PREVIEW_CHARS: usize = 500;

/// Run `cmd` to completion, capturing stdout and stderr.
///
/// A non-zero exit becomes [`ToolError::Failed`] carrying a stderr preview.
pub async fn run_tool(
    mut cmd: Command,
    tool: &str,
    timeout_secs: u64,
) -> Result<Output, ToolError> {
    cmd.kill_on_drop(true)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("Running {:?}", cmd.as_std());

    let child = cmd.spawn().map_err(|e| spawn_error(tool, e))?;

    let output = match timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await
    {
        Ok(result) => result.map_err(|source| ToolError::Io {
            tool: tool.to_string(),
            source,
        })?,
        Err(_) => {
            return Err(ToolError::TimedOut {
                tool: tool.to_string(),
                secs: timeout_secs,
            })
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ToolError::Failed {
            tool: tool.to_string(),
            status: output.status.to_string(),
            stderr: preview(stderr.trim()),
        });
    }

    Ok(output)
}

fn spawn_error(tool: &str, e: std::io::Error) -> ToolError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ToolError::NotFound {
            tool: tool.to_string(),
            hint: install_hint(tool).to_string(),
        }
    } else {
        ToolError::Io {
            tool: tool.to_string(),
            source: e,
        }
    }
}

/// Installation advice keyed on the program's file name.
pub fn install_hint(tool: &str) -> &'static str {
    let name = std::path::Path::new(tool)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(tool);
    match name {
        "soffice" | "libreoffice" => {
            "Install LibreOffice (apt install libreoffice-impress / brew install --cask libreoffice) \
             or pass --soffice /path/to/soffice."
        }
        "tesseract" => {
            "Install Tesseract (apt install tesseract-ocr / brew install tesseract) \
             or pass --tesseract /path/to/tesseract."
        }
        "pdftoppm" => "Install poppler (apt install poppler-utils / brew install poppler).",
        _ => "Check that the program is installed and on PATH.",
    }
}

fn preview(s: &str) -> String {
    if s.chars().count() <= STDERR_PREVIEW_CHARS {
        s.to_string()
    } else {
        let cut: String = s.chars().take(STDERR_PREVIEW_CHARS).collect();
        format!("{cut}\u{2026}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_program_is_not_found_with_hint() {
        let cmd = Command::new("definitely-not-a-real-tesseract-binary");
        let err = run_tool(cmd, "tesseract", 5).await.unwrap_err();
        match err {
            ToolError::NotFound { hint, .. } => assert!(hint.contains("Tesseract")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_failed_with_stderr() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo broken deck >&2; exit 3"]);
        let err = run_tool(cmd, "sh", 5).await.unwrap_err();
        match err {
            ToolError::Failed { stderr, .. } => assert_eq!(stderr, "broken deck"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_program_times_out() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let err = run_tool(cmd, "sleep", 1).await.unwrap_err();
        assert!(matches!(err, ToolError::TimedOut { secs: 1, .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_stdout() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "printf 'Hello slide'"]);
        let out = run_tool(cmd, "sh", 5).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&out.stdout), "Hello slide");
    }

    #[test]
    fn hint_uses_file_stem() {
        assert!(install_hint("/opt/libreoffice/program/soffice").contains("LibreOffice"));
        assert!(install_hint("pdftoppm").contains("poppler"));
    }
}
