//! Configuration management
//!
//! Layered configuration loaded from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Environment Variables
//!
//! Settings can be overridden with the pattern `DOWNPOUR__<section>__<key>`:
//! - `DOWNPOUR__SCHEDULER__WORKERS=4`
//! - `DOWNPOUR__FETCH__ENDPOINT=http://descriptors.internal/download`
//! - `DOWNPOUR__STORAGE__PROVIDER=memory`
//!
//! # Configuration File
//!
//! By default the configuration is loaded from `config/downpour.toml`;
//! override the location with the `DOWNPOUR_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{Config, FetchConfig, HttpSettings, SchedulerConfig, StorageConfig, StorageProvider};
pub use validation::ValidationError;

use crate::scheduler::GateConfig;
use crate::worker::http::HttpConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or
    /// validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Constraint gate settings for the scheduler.
    pub fn gate_config(&self) -> GateConfig {
        GateConfig {
            poll_interval: self.scheduler.constraint_poll_interval.as_duration(),
            poll_budget: self.scheduler.constraint_poll_budget,
        }
    }

    /// Transfer client settings for the worker pool.
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            connect_timeout: self.http.connect_timeout.as_duration(),
            request_timeout: self.http.request_timeout.as_duration(),
            max_retries: self.http.max_retries,
            user_agent: self.http.user_agent.clone(),
            max_body_bytes: self.scheduler.max_artifact_bytes.as_u64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[scheduler]
workers = 3
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.scheduler.workers, 3);
        // untouched sections keep their defaults
        assert_eq!(config.scheduler.job_key, "file-download");
    }

    #[test]
    fn test_validation_catches_zero_workers() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[scheduler]\nworkers = 0\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::NoWorkers)
        ));
    }

    #[test]
    fn test_gate_and_http_conversions() {
        let config = Config::default();

        let gate = config.gate_config();
        assert_eq!(gate.poll_interval, std::time::Duration::from_millis(500));
        assert_eq!(gate.poll_budget, 20);

        let http = config.http_config();
        assert_eq!(http.max_body_bytes, 100 * 1024 * 1024);
        assert_eq!(http.max_retries, 3);
    }
}
