//! Descriptor fetch - retrieves the download descriptor from the
//! configured endpoint
//!
//! One narrow contract: GET the endpoint, parse the JSON body into a
//! [`DownloadDescriptor`]. A fetch failure is surfaced to the caller and
//! no job is ever submitted for it.

use crate::descriptor::{DescriptorError, DownloadDescriptor};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Descriptor request failed: {0}")]
    RequestFailed(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Descriptor endpoint returned HTTP {0}")]
    Status(u16),

    #[error("Descriptor body is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Descriptor is invalid: {0}")]
    Invalid(#[from] DescriptorError),
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Client for the descriptor endpoint
pub struct DescriptorClient {
    client: Client,
    endpoint: String,
}

impl DescriptorClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Fetch and validate the descriptor.
    pub async fn fetch(&self) -> Result<DownloadDescriptor> {
        debug!(endpoint = %self.endpoint, "Fetching download descriptor");

        let response = self.client.get(&self.endpoint).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::RequestFailed(e.to_string()))?;
        let descriptor: DownloadDescriptor = serde_json::from_slice(&body)?;
        descriptor.validate()?;

        info!(
            name = %descriptor.name,
            url = %descriptor.source_url,
            content_type = %descriptor.content_type,
            "Descriptor fetched"
        );
        Ok(descriptor)
    }
}
