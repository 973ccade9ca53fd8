//! Fetching source images by URL, with retry.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use snap_core::{retry_with_backoff, ErrorKind, HasErrorKind, RetryConfig, MAX_UPLOAD_BYTES};
use thiserror::Error;
use url::Url;

/// Errors from fetching a remote image.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL is malformed or not http(s).
    #[error("invalid image URL: {0}")]
    InvalidUrl(String),
    /// Connection, timeout or body read failed.
    #[error("image request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The server answered with an error status.
    #[error("image request returned {0}")]
    Status(StatusCode),
    /// The body exceeds the upload limit.
    #[error("image too large: {0} bytes")]
    TooLarge(u64),
}

impl HasErrorKind for FetchError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl(_) | Self::TooLarge(_) => ErrorKind::Validation,
            Self::Http(_) => ErrorKind::Network,
            // Client errors will not change on retry.
            Self::Status(status) if status.is_client_error() => ErrorKind::Validation,
            Self::Status(_) => ErrorKind::ImageLoad,
        }
    }
}

/// A fetched image.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    /// Raw bytes.
    pub bytes: Vec<u8>,
    /// `Content-Type`, when sent.
    pub content_type: Option<String>,
}

/// HTTP client for source images.
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    http: Client,
    retry: RetryConfig,
}

impl ImageFetcher {
    /// Create a fetcher.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the TLS backend cannot initialize.
    pub fn new(retry: RetryConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(concat!("snapbeautify/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { http, retry })
    }

    /// Download `url`, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns the last [`FetchError`] once retries are exhausted, or the
    /// first non-retryable one.
    pub async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
        let url = Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(format!(
                "unsupported scheme {}",
                url.scheme()
            )));
        }

        retry_with_backoff(&self.retry, |attempt| {
            let url = url.clone();
            async move {
                tracing::debug!(%url, attempt, "Fetching image");
                self.fetch_once(url).await
            }
        })
        .await
    }

    async fn fetch_once(&self, url: Url) -> Result<FetchedImage, FetchError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        if let Some(len) = response.content_length() {
            if len > MAX_UPLOAD_BYTES {
                return Err(FetchError::TooLarge(len));
            }
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());
        let bytes = response.bytes().await?;
        let len = bytes.len() as u64;
        if len > MAX_UPLOAD_BYTES {
            return Err(FetchError::TooLarge(len));
        }
        Ok(FetchedImage {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}
