use super::models::Config;
use reqwest::Url;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid descriptor endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Worker count must be positive")]
    NoWorkers,

    #[error("Worker channel size must be positive")]
    EmptyChannel,

    #[error("Constraint poll budget must be positive")]
    NoPollBudget,

    #[error("Constraint poll interval must be positive")]
    ZeroPollInterval,

    #[error("max_artifact_bytes must be positive")]
    ZeroArtifactLimit,

    #[error("Storage root must not be empty for the local provider")]
    EmptyStorageRoot,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_fetch(config)?;
    validate_scheduler(config)?;
    validate_storage(config)?;
    Ok(())
}

fn validate_fetch(config: &Config) -> Result<(), ValidationError> {
    let endpoint = &config.fetch.endpoint;
    let url = Url::parse(endpoint).map_err(|e| ValidationError::InvalidEndpoint {
        endpoint: endpoint.clone(),
        reason: e.to_string(),
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ValidationError::InvalidEndpoint {
            endpoint: endpoint.clone(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(())
}

fn validate_scheduler(config: &Config) -> Result<(), ValidationError> {
    let scheduler = &config.scheduler;
    if scheduler.workers == 0 {
        return Err(ValidationError::NoWorkers);
    }
    if scheduler.channel_size == 0 {
        return Err(ValidationError::EmptyChannel);
    }
    if scheduler.constraint_poll_budget == 0 {
        return Err(ValidationError::NoPollBudget);
    }
    if scheduler.constraint_poll_interval.as_duration().is_zero() {
        return Err(ValidationError::ZeroPollInterval);
    }
    if scheduler.max_artifact_bytes.as_u64() == 0 {
        return Err(ValidationError::ZeroArtifactLimit);
    }
    Ok(())
}

fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    use super::models::StorageProvider;

    if config.storage.provider == StorageProvider::Local
        && config.storage.root.as_os_str().is_empty()
    {
        return Err(ValidationError::EmptyStorageRoot);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::{ByteSize, HumanDuration};

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_rejects_zero_workers() {
        let mut config = Config::default();
        config.scheduler.workers = 0;
        assert!(matches!(validate(&config), Err(ValidationError::NoWorkers)));
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        let mut config = Config::default();
        config.fetch.endpoint = "not a url".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidEndpoint { .. })
        ));

        config.fetch.endpoint = "ftp://host/download".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_budget_and_interval() {
        let mut config = Config::default();
        config.scheduler.constraint_poll_budget = 0;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::NoPollBudget)
        ));

        let mut config = Config::default();
        config.scheduler.constraint_poll_interval = HumanDuration::from_millis(0);
        assert!(matches!(
            validate(&config),
            Err(ValidationError::ZeroPollInterval)
        ));
    }

    #[test]
    fn test_rejects_zero_artifact_limit() {
        let mut config = Config::default();
        config.scheduler.max_artifact_bytes = ByteSize(0);
        assert!(matches!(
            validate(&config),
            Err(ValidationError::ZeroArtifactLimit)
        ));
    }
}
