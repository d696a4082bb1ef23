use crate::constraints::ConstraintPolicy;
use crate::humanize::{ByteSize, HumanDuration};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub http: HttpSettings,
    /// Constraint policy applied to CLI submissions.
    #[serde(default)]
    pub constraints: ConstraintPolicy,
}

/// Descriptor endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_fetch_timeout")]
    pub request_timeout: HumanDuration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout: default_fetch_timeout(),
        }
    }
}

fn default_endpoint() -> String {
    "http://rest-testing.epizy.com/index.php/welcome/download".to_string()
}

fn default_fetch_timeout() -> HumanDuration {
    HumanDuration::from_millis(10_000)
}

/// Scheduler and constraint-gate configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_channel_size")]
    pub channel_size: usize,
    /// Job journal location; unset disables persistence.
    #[serde(default = "default_journal_path")]
    pub journal_path: Option<PathBuf>,
    #[serde(default = "default_poll_interval")]
    pub constraint_poll_interval: HumanDuration,
    #[serde(default = "default_poll_budget")]
    pub constraint_poll_budget: u32,
    #[serde(default = "default_max_artifact_bytes")]
    pub max_artifact_bytes: ByteSize,
    /// Job key the CLI submits under.
    #[serde(default = "default_job_key")]
    pub job_key: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            channel_size: default_channel_size(),
            journal_path: default_journal_path(),
            constraint_poll_interval: default_poll_interval(),
            constraint_poll_budget: default_poll_budget(),
            max_artifact_bytes: default_max_artifact_bytes(),
            job_key: default_job_key(),
        }
    }
}

fn default_workers() -> usize {
    2
}

fn default_channel_size() -> usize {
    100
}

fn default_journal_path() -> Option<PathBuf> {
    Some(PathBuf::from("data/journal"))
}

fn default_poll_interval() -> HumanDuration {
    HumanDuration::from_millis(500)
}

fn default_poll_budget() -> u32 {
    20
}

fn default_max_artifact_bytes() -> ByteSize {
    ByteSize(100 * 1024 * 1024) // 100 MB
}

fn default_job_key() -> String {
    "file-download".to_string()
}

/// Storage provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    Memory,
    #[default]
    Local,
}

/// Artifact storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub provider: StorageProvider,
    /// Root directory for the local provider.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::default(),
            root: default_storage_root(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("data/artifacts")
}

/// Transfer HTTP client settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpSettings {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: HumanDuration,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: HumanDuration,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_connect_timeout() -> HumanDuration {
    HumanDuration::from_millis(10_000)
}

fn default_request_timeout() -> HumanDuration {
    HumanDuration::from_millis(60_000)
}

fn default_max_retries() -> u32 {
    3
}

fn default_user_agent() -> String {
    format!("downpour/{}", env!("CARGO_PKG_VERSION"))
}
