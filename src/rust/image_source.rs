use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use image::DynamicImage;
use log::{info, warn};
use serde::Serialize;

use crate::classifier::ClassifierError;

/// Where the bytes of an image live. Never changes once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ImageReference {
    Url(String),
    File(PathBuf),
}

impl ImageReference {
    /// Interprets user input as a URL or a local path.
    ///
    /// Returns `None` for blank input, which callers treat as clearing the image.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        if input.starts_with("http://") || input.starts_with("https://") {
            Some(ImageReference::Url(input.to_string()))
        } else {
            Some(ImageReference::File(PathBuf::from(input)))
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageReference::Url(url) => f.write_str(url),
            ImageReference::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Upper bound for a whole image download.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Reads and decodes the image behind an [`ImageReference`].
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: reqwest::Client,
}

impl Default for ImageFetcher {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }
}

impl ImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetcher whose URL downloads give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client with timeout, using defaults: {}", e);
                reqwest::Client::new()
            });
        Self { client }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Reads the raw bytes of `reference`.
    pub async fn fetch_bytes(&self, reference: &ImageReference) -> Result<Vec<u8>, ClassifierError> {
        match reference {
            ImageReference::File(path) => tokio::fs::read(path).await.map_err(|e| {
                warn!("Failed to read {}: {}", path.display(), e);
                ClassifierError::ImageUnavailable(format!("{}: {}", path.display(), e))
            }),
            ImageReference::Url(url) => {
                info!("Downloading image from {}", url);
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| ClassifierError::ImageUnavailable(format!("{}: {}", url, e)))?;
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| ClassifierError::ImageUnavailable(format!("{}: {}", url, e)))?;
                Ok(bytes.to_vec())
            }
        }
    }

    /// Reads and decodes `reference`. Undecodable data is a classification failure.
    pub async fn fetch(&self, reference: &ImageReference) -> Result<DynamicImage, ClassifierError> {
        let bytes = self.fetch_bytes(reference).await?;
        decode(&bytes)
    }
}

pub fn decode(bytes: &[u8]) -> Result<DynamicImage, ClassifierError> {
    image::load_from_memory(bytes)
        .map_err(|e| ClassifierError::ClassificationFailed(format!("Malformed image: {}", e)))
}
