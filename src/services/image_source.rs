use crate::error::{AppError, ErrorKind};
use base64::Engine;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where the bytes of the image being classified come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// A photo captured to local storage.
    Local(PathBuf),
    /// One of the demo thumbnails.
    Remote(String),
}

impl ImageSource {
    /// `timeout` bounds a remote fetch from connect to the last body byte.
    pub async fn fetch(&self, client: &reqwest::Client, timeout: Duration) -> Result<Vec<u8>, AppError> {
        match self {
            ImageSource::Local(path) => tokio::fs::read(path).await.map_err(|e| {
                AppError::new(
                    ErrorKind::Io,
                    format!("Failed to read image {}: {}", path.display(), e),
                )
            }),
            ImageSource::Remote(url) => {
                let response = client.get(url).timeout(timeout).send().await.map_err(|e| {
                    AppError::new(ErrorKind::Fetch, format!("Failed to fetch {}: {}", url, e))
                })?;

                if !response.status().is_success() {
                    return Err(AppError::new(
                        ErrorKind::Fetch,
                        format!("Failed to fetch {}: HTTP {}", url, response.status()),
                    ));
                }

                let bytes = response.bytes().await.map_err(|e| {
                    AppError::new(ErrorKind::Fetch, format!("Failed to read body of {}: {}", url, e))
                })?;
                Ok(bytes.to_vec())
            }
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Local(path) => write!(f, "{}", path.display()),
            ImageSource::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// Read a local image and return it as a data URI the webview can show.
pub fn preview_data_uri(path: &Path) -> Result<String, AppError> {
    let bytes = std::fs::read(path).map_err(|e| {
        AppError::new(
            ErrorKind::Io,
            format!("Failed to read image {}: {}", path.display(), e),
        )
    })?;
    let mime = image::guess_format(&bytes)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream");
    let b64 = base64::engine::general_purpose::STANDARD.encode(&bytes);
    Ok(format!("data:{};base64,{}", mime, b64))
}
