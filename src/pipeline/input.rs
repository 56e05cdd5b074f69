//! Input resolution: turn a path or URL into a local PDF file.
//!
//! pdfium opens files, not byte streams, so a URL is downloaded into a
//! `TempDir` owned by the returned [`ResolvedInput`]; the directory is removed
//! when the input is dropped. Both paths check the `%PDF` magic before
//! returning so a misnamed HTML page fails with a clear error instead of a
//! pdfium parse failure.

use crate::error::Slide2ArticleError;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A PDF on the local file system.
#[derive(Debug)]
pub enum ResolvedInput {
    Local(PathBuf),
    /// Downloaded copy; `_dir` keeps the file alive.
    Downloaded { path: PathBuf, _dir: TempDir },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(path) => path,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve `input` to a local PDF, downloading it when it is a URL.
pub async fn resolve_input(
    input: &str,
    download_timeout_secs: u64,
) -> Result<ResolvedInput, Slide2ArticleError> {
    let input = input.trim();
    if input.is_empty() || (input.contains("://") && !is_url(input)) {
        return Err(Slide2ArticleError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download(input, download_timeout_secs).await
    } else {
        resolve_local(Path::new(input))
    }
}

fn resolve_local(path: &Path) -> Result<ResolvedInput, Slide2ArticleError> {
    let path = path.to_path_buf();
    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Slide2ArticleError::PermissionDenied { path });
        }
        Err(_) => return Err(Slide2ArticleError::FileNotFound { path }),
    };

    let mut head = [0u8; 4];
    let read = file.read(&mut head).unwrap_or(0);
    check_magic(&head[..read], &path)?;

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

async fn download(url: &str, timeout_secs: u64) -> Result<ResolvedInput, Slide2ArticleError> {
    info!("Downloading PDF from {}", url);
    let failed = |reason: String| Slide2ArticleError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Slide2ArticleError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;
    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            Slide2ArticleError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    let dir = TempDir::new().map_err(|e| Slide2ArticleError::Internal(e.to_string()))?;
    let path = dir.path().join(filename_from_url(url));
    check_magic(&bytes[..bytes.len().min(4)], &path)?;

    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| Slide2ArticleError::Internal(format!("Failed to write temp file: {e}")))?;
    info!("Downloaded {} bytes to {}", bytes.len(), path.display());

    Ok(ResolvedInput::Downloaded { path, _dir: dir })
}

fn check_magic(head: &[u8], path: &Path) -> Result<(), Slide2ArticleError> {
    if head == PDF_MAGIC {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    magic[..head.len()].copy_from_slice(head);
    Err(Slide2ArticleError::NotAPdf {
        path: path.to_path_buf(),
        magic,
    })
}

/// Last path segment of `url` when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|name| name.contains('.'))
        .unwrap_or_else(|| "slides.pdf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn url_detection() {
        assert!(is_url("https://example.com/deck.pdf"));
        assert!(is_url("http://example.com/deck.pdf"));
        assert!(!is_url("deck.pdf"));
        assert!(!is_url("ftp://example.com/deck.pdf"));
    }

    #[test]
    fn filename_from_url_path() {
        assert_eq!(filename_from_url("https://x.org/talks/rust.pdf?dl=1"), "rust.pdf");
        assert_eq!(filename_from_url("https://x.org/download/"), "slides.pdf");
    }

    #[tokio::test]
    async fn unsupported_scheme_is_invalid() {
        let err = resolve_input("ftp://x.org/a.pdf", 5).await.unwrap_err();
        assert!(matches!(err, Slide2ArticleError::InvalidInput { .. }));
        let err = resolve_input("  ", 5).await.unwrap_err();
        assert!(matches!(err, Slide2ArticleError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn missing_file() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, Slide2ArticleError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn local_file_magic_is_checked() {
        let mut html = tempfile::NamedTempFile::new().unwrap();
        html.write_all(b"<html>").unwrap();
        let err = resolve_input(html.path().to_str().unwrap(), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, Slide2ArticleError::NotAPdf { magic, .. } if &magic == b"<htm"));

        let mut pdf = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        pdf.write_all(b"%PDF-1.7\n").unwrap();
        let resolved = resolve_input(pdf.path().to_str().unwrap(), 5)
            .await
            .expect("pdf header accepted");
        assert_eq!(resolved.path(), pdf.path());
    }

    #[tokio::test]
    async fn short_file_is_not_a_pdf() {
        let mut tiny = tempfile::NamedTempFile::new().unwrap();
        tiny.write_all(b"%P").unwrap();
        let err = resolve_input(tiny.path().to_str().unwrap(), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, Slide2ArticleError::NotAPdf { .. }));
    }
}
