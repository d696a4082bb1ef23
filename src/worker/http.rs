//! HTTP client for the actual file transfer

use bytes::{Bytes, BytesMut};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Too many redirects")]
    TooManyRedirects,

    #[error("Response exceeds size limit of {limit} bytes")]
    TooLarge { limit: u64 },
}

pub type Result<T> = std::result::Result<T, DownloadError>;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub user_agent: String,
    /// Transfers larger than this fail without retry.
    pub max_body_bytes: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            max_retries: 3,
            user_agent: format!("downpour/{}", env!("CARGO_PKG_VERSION")),
            max_body_bytes: 100 * 1024 * 1024,
        }
    }
}

/// HTTP downloader
pub struct HttpClient {
    client: Client,
    config: HttpConfig,
}

impl HttpClient {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| DownloadError::RequestFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Download a resource with retry. Size-limit violations are permanent
    /// and fail immediately.
    pub async fn download(&self, url: &str) -> Result<Bytes> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.download_once(url).await {
                Ok(bytes) => {
                    if attempts > 1 {
                        debug!(url, attempts, "Download succeeded after retry");
                    }
                    return Ok(bytes);
                }
                Err(e @ DownloadError::TooLarge { .. }) => return Err(e),
                Err(e) => {
                    if attempts >= self.config.max_retries {
                        warn!(url, attempts, error = %e, "Download failed after retries");
                        return Err(DownloadError::RequestFailed(format!(
                            "Failed after {} attempts: {}",
                            attempts, e
                        )));
                    }

                    warn!(url, attempts, error = %e, "Download failed, retrying");

                    // Exponential backoff: 1s, 2s, 4s
                    let backoff = Duration::from_secs(2u64.pow(attempts - 1));
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// Download once (no retry), reading the body chunk-wise against the
    /// size limit.
    async fn download_once(&self, url: &str) -> Result<Bytes> {
        debug!(url, "Starting download");

        let mut response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::Timeout
            } else if e.is_redirect() {
                DownloadError::TooManyRedirects
            } else {
                DownloadError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::RequestFailed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let limit = self.config.max_body_bytes;
        let mut body = BytesMut::new();
        loop {
            let chunk = response
                .chunk()
                .await
                .map_err(|e| DownloadError::RequestFailed(format!("Failed to read body: {}", e)))?;
            let Some(chunk) = chunk else { break };

            if body.len() as u64 + chunk.len() as u64 > limit {
                return Err(DownloadError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        debug!(url, size = body.len(), "Download completed");

        Ok(body.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_config_defaults() {
        let config = HttpConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_body_bytes, 100 * 1024 * 1024);
        assert!(config.user_agent.starts_with("downpour/"));
    }
}
