//! HTTP media fetcher with retry, backoff and no connection reuse.
//!
//! Bulk scans download thousands of attachments in one pass. Keeping idle
//! connections around for each CDN host piles up sockets, so the client is
//! built with an idle pool of zero: every download gets a fresh connection.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

use super::{FetchedMedia, MediaFetcher};
use crate::config::DetectorConfig;
use crate::error::{RepostError, Result};
use crate::media::{MediaKind, MediaRef};

/// Configuration for the HTTP media fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum retry attempts for transient errors.
    pub max_retries: u32,
    /// Initial retry interval.
    pub initial_interval: Duration,
    /// Maximum retry interval.
    pub max_interval: Duration,
    /// Largest accepted body in bytes.
    pub max_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&DetectorConfig::default())
    }
}

impl From<&DetectorConfig> for FetchConfig {
    fn from(config: &DetectorConfig) -> Self {
        Self {
            timeout: config.fetch_timeout,
            max_retries: config.max_retries,
            initial_interval: Duration::from_millis(250),
            max_interval: Duration::from_secs(5),
            max_bytes: config.max_media_bytes,
        }
    }
}

/// Media fetcher for http(s) and local `file://` URLs.
pub struct HttpMediaFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpMediaFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(0)
            .user_agent(concat!("repost/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RepostError::FetchError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    async fn fetch_remote(&self, media: &MediaRef) -> Result<FetchedMedia> {
        let backoff = self.build_backoff();

        retry_notify(
            backoff,
            || async move { self.fetch_once(media).await },
            |err: RepostError, duration: Duration| {
                warn!(
                    url = %media.url,
                    error = %err,
                    retry_after_ms = duration.as_millis() as u64,
                    "Retry scheduled"
                );
            },
        )
        .await
    }

    async fn fetch_once(
        &self,
        media: &MediaRef,
    ) -> std::result::Result<FetchedMedia, backoff::Error<RepostError>> {
        let start = Instant::now();

        let mut response = self.client.get(&media.url).send().await.map_err(|e| {
            let latency_ms = start.elapsed().as_millis() as u64;
            if is_transient_error(&e) {
                warn!(error = %e, latency_ms, "Transient error, will retry");
                backoff::Error::transient(RepostError::FetchError(format!(
                    "Transient error (will retry): {e}"
                )))
            } else {
                warn!(error = %e, latency_ms, "Permanent error, aborting");
                backoff::Error::permanent(RepostError::FetchError(format!(
                    "Request to {} failed: {e}",
                    media.url
                )))
            }
        })?;

        let status = response.status();
        debug!(status = %status, url = %media.url, "Received HTTP response");

        if !status.is_success() {
            let err = RepostError::FetchError(format!("{} returned status: {status}", media.url));
            return if is_transient_status(status) {
                Err(backoff::Error::transient(err))
            } else {
                Err(backoff::Error::permanent(err))
            };
        }

        if let Some(length) = response.content_length() {
            if length as usize > self.config.max_bytes {
                return Err(backoff::Error::permanent(self.too_large(length as usize)));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| media.content_type.clone());

        // Chunked bodies carry no length up front, so the cap is enforced while reading
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            backoff::Error::transient(RepostError::FetchError(format!(
                "Failed to read body of {}: {e}",
                media.url
            )))
        })? {
            let read = bytes.len() + chunk.len();
            if read > self.config.max_bytes {
                return Err(backoff::Error::permanent(self.too_large(read)));
            }
            bytes.extend_from_slice(&chunk);
        }

        debug!(
            bytes = bytes.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Download completed"
        );

        let kind = MediaKind::detect(content_type.as_deref(), &media.url, &bytes);
        Ok(FetchedMedia { bytes, kind })
    }

    async fn fetch_local(&self, media: &MediaRef, path: PathBuf) -> Result<FetchedMedia> {
        let metadata = tokio::fs::metadata(&path).await?;
        if metadata.len() as usize > self.config.max_bytes {
            return Err(self.too_large(metadata.len() as usize));
        }

        let bytes = tokio::fs::read(&path).await?;
        let kind = MediaKind::detect(media.content_type.as_deref(), &media.url, &bytes);
        Ok(FetchedMedia { bytes, kind })
    }

    fn too_large(&self, size: usize) -> RepostError {
        RepostError::FetchError(format!(
            "Media is at least {size} bytes, limit is {}",
            self.config.max_bytes
        ))
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            max_elapsed_time: Some(self.config.timeout * self.config.max_retries.max(1)),
            ..Default::default()
        }
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, media: &MediaRef) -> Result<FetchedMedia> {
        let url = Url::parse(&media.url)
            .map_err(|e| RepostError::FetchError(format!("Invalid URL {}: {e}", media.url)))?;

        match url.scheme() {
            "http" | "https" => self.fetch_remote(media).await,
            "file" => {
                let path = url.to_file_path().map_err(|_| {
                    RepostError::FetchError(format!("Invalid file URL: {}", media.url))
                })?;
                self.fetch_local(media, path).await
            }
            other => Err(RepostError::FetchError(format!(
                "Unsupported URL scheme: {other}"
            ))),
        }
    }
}

/// Check if a reqwest error is transient and should be retried.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Check if an HTTP status code indicates a transient error.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}
