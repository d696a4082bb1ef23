use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "DOWNPOUR_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/downpour.toml";
const ENV_PREFIX: &str = "DOWNPOUR";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_from_sources(config_path)
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    // Start with defaults (handled by struct Default implementations)
    // Add TOML file if it exists (optional)
    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // Add environment variable overrides
    // DOWNPOUR__SCHEDULER__WORKERS -> scheduler.workers
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::models::StorageProvider;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.scheduler.workers, 2);
        assert_eq!(config.scheduler.job_key, "file-download");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[fetch]
endpoint = "http://descriptors.internal/download"
request_timeout = "5s"

[scheduler]
workers = 4
constraint_poll_interval = "250ms"
max_artifact_bytes = "10MB"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.fetch.endpoint, "http://descriptors.internal/download");
        assert_eq!(config.scheduler.workers, 4);
        assert_eq!(
            config.scheduler.constraint_poll_interval.as_duration(),
            std::time::Duration::from_millis(250)
        );
        assert_eq!(
            config.scheduler.max_artifact_bytes.as_u64(),
            10 * 1024 * 1024
        );
    }

    #[test]
    fn test_full_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[fetch]
endpoint = "http://descriptors.internal/download"

[scheduler]
workers = 2
channel_size = 50
journal_path = "data/journal"
constraint_poll_interval = "500ms"
constraint_poll_budget = 10
max_artifact_bytes = "100MB"
job_key = "file-download"

[storage]
provider = "memory"

[http]
connect_timeout = "5s"
request_timeout = "30s"
max_retries = 2
user_agent = "downpour-test/0.1"

[constraints]
require_network = true
require_battery_not_low = false
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.scheduler.channel_size, 50);
        assert_eq!(config.scheduler.constraint_poll_budget, 10);
        assert_eq!(config.storage.provider, StorageProvider::Memory);
        assert_eq!(config.http.max_retries, 2);
        assert_eq!(config.http.user_agent, "downpour-test/0.1");
        assert!(config.constraints.require_network);
        assert!(!config.constraints.require_battery_not_low);
    }
}
