//! Download descriptor - what to fetch and what to call it
//!
//! The descriptor endpoint serves JSON in two dialects: the current
//! snake_case form and the legacy camelCase keys (`downloadLink`,
//! `fileType`) older deployments still emit. Both deserialize into
//! [`DownloadDescriptor`].

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("Descriptor name must not be empty")]
    EmptyName,

    #[error("Invalid source URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid content type '{0}'")]
    InvalidContentType(String),
}

/// A single file to download: where it lives, what to name it, what it is.
///
/// Immutable once constructed; the scheduler takes ownership at submission
/// and embeds it in the job record for the job's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadDescriptor {
    pub name: String,
    #[serde(alias = "downloadLink")]
    pub source_url: String,
    #[serde(alias = "fileType")]
    pub content_type: String,
}

impl DownloadDescriptor {
    /// Build a validated descriptor.
    pub fn new(
        name: impl Into<String>,
        source_url: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Result<Self, DescriptorError> {
        let descriptor = Self {
            name: name.into(),
            source_url: source_url.into(),
            content_type: content_type.into(),
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Validate field contents. Called by [`DownloadDescriptor::new`] and
    /// again at submission time for descriptors that arrived via serde.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.name.trim().is_empty() {
            return Err(DescriptorError::EmptyName);
        }

        let url = Url::parse(&self.source_url).map_err(|e| DescriptorError::InvalidUrl {
            url: self.source_url.clone(),
            reason: e.to_string(),
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(DescriptorError::InvalidUrl {
                url: self.source_url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        self.content_type
            .parse::<mime::Mime>()
            .map_err(|_| DescriptorError::InvalidContentType(self.content_type.clone()))?;

        Ok(())
    }
}
