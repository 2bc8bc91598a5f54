//! Input resolution: read a user-supplied path or URL into memory.
//!
//! Every supported table format is small enough to parse from a byte
//! buffer, so both local files and downloads end up as an [`InputFile`]:
//! the raw bytes plus the file name, whose extension selects the parser.

use crate::error::QrBatchError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A fully-read input file.
#[derive(Debug, Clone)]
pub struct InputFile {
    /// Bare file name (no directories), e.g. `inventory.xlsx`.
    pub name: String,
    pub bytes: Vec<u8>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Lower-cased extension without the dot, or `""` when there is none.
    pub fn extension(&self) -> String {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string and read its contents.
///
/// URLs are downloaded (bounded by `timeout_secs`); anything else is treated
/// as a local path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<InputFile, QrBatchError> {
    if input.trim().is_empty() {
        return Err(QrBatchError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

/// Read a local file, mapping I/O failures to input errors.
async fn read_local(path_str: &str) -> Result<InputFile, QrBatchError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(QrBatchError::FileNotFound { path });
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(QrBatchError::PermissionDenied { path });
        }
        Err(_) => return Err(QrBatchError::FileNotFound { path }),
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path_str.to_string());

    debug!("Read local input: {} ({} bytes)", path.display(), bytes.len());
    Ok(InputFile { name, bytes })
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<InputFile, QrBatchError> {
    info!("Downloading input from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| QrBatchError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            QrBatchError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            QrBatchError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(QrBatchError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let name = extract_filename(url);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| QrBatchError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes as '{}'", bytes.len(), name);
    Ok(InputFile {
        name,
        bytes: bytes.to_vec(),
    })
}

/// Last path segment of the URL when it carries an extension.
///
/// Without one the parser cannot be chosen, so the name falls back to
/// `download` and ingestion reports an unsupported format.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "download".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/data.csv"));
        assert!(is_url("http://example.com/data.csv"));
        assert!(!is_url("/tmp/data.csv"));
        assert!(!is_url("data.csv"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_extract_filename() {
        assert_eq!(extract_filename("https://host/files/stock.xlsx"), "stock.xlsx");
        assert_eq!(extract_filename("https://host/files/stock.csv?v=2"), "stock.csv");
        assert_eq!(extract_filename("https://host/export"), "download");
    }

    #[test]
    fn test_extension_is_lowercased() {
        assert_eq!(InputFile::new("Report.XLSX", vec![]).extension(), "xlsx");
        assert_eq!(InputFile::new("noext", vec![]).extension(), "");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = resolve_input("/definitely/not/here.csv", 5).await.unwrap_err();
        assert!(matches!(err, QrBatchError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn local_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();

        let file = resolve_input(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(file.name, "rows.csv");
        assert_eq!(file.bytes, b"a,b\n1,2\n");
    }
}
