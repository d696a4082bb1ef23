//! CLI command implementations: the fetch -> submit -> watch flow

use downpour::config::{Config, StorageProvider};
use downpour::descriptor::DownloadDescriptor;
use downpour::fetch::DescriptorClient;
use downpour::scheduler::journal::Journal;
use downpour::scheduler::{ConflictPolicy, JobState, Scheduler};
use downpour::storage::StorageClient;
use tracing::info;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fetch the descriptor from the configured endpoint, then run it.
pub async fn download(config: Config, key: Option<String>) -> Result<(), AnyError> {
    let client = DescriptorClient::new(
        &config.fetch.endpoint,
        config.fetch.request_timeout.as_duration(),
    )?;
    let descriptor = client.fetch().await?;
    submit(config, descriptor, key).await
}

/// Submit one download and follow its state until terminal.
pub async fn submit(
    config: Config,
    descriptor: DownloadDescriptor,
    key: Option<String>,
) -> Result<(), AnyError> {
    let key = key.unwrap_or_else(|| config.scheduler.job_key.clone());
    let scheduler = build_scheduler(&config).await?;

    let handle = scheduler
        .submit(
            &key,
            descriptor,
            config.constraints,
            ConflictPolicy::Keep,
        )
        .await?;
    println!("submitted job {} under key {}", handle.id, key);

    let mut stream = scheduler.subscribe(&handle).await?;
    let mut outcome: Result<(), AnyError> = Ok(());
    while let Some(record) = stream.next().await {
        match record.state {
            JobState::Queued => println!("queued (attempt {})", record.attempt),
            JobState::Running => println!("downloading..."),
            JobState::Succeeded => {
                let location = record.artifact_location.as_deref().unwrap_or("");
                println!("succeeded: {}", location);
                // opening the artifact is a caller concern; a missing viewer
                // must never feed back into job state
                info!(location, "Artifact ready to open");
            }
            JobState::Failed => {
                let reason = record
                    .failure_reason
                    .unwrap_or_else(|| "unknown".to_string());
                println!("failed: {}", reason);
                outcome = Err(format!("download failed: {}", reason).into());
            }
        }
    }

    scheduler.shutdown().await?;
    outcome
}

/// Print the journaled record for a job id.
pub fn status(config: Config, job_id: &str) -> Result<(), AnyError> {
    let Some(path) = config.scheduler.journal_path else {
        return Err("no journal configured; job state is not persisted".into());
    };

    let journal = Journal::open(path)?;
    match journal.get(job_id)? {
        Some(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        None => Err(format!("unknown job: {}", job_id).into()),
    }
}

async fn build_scheduler(config: &Config) -> Result<Scheduler, AnyError> {
    let storage = match config.storage.provider {
        StorageProvider::Memory => StorageClient::in_memory(),
        StorageProvider::Local => StorageClient::local(&config.storage.root)?,
    };

    let mut builder = Scheduler::builder()
        .storage(storage)
        .gate(config.gate_config())
        .http(config.http_config())
        .workers(config.scheduler.workers)
        .channel_size(config.scheduler.channel_size);

    if let Some(path) = &config.scheduler.journal_path {
        builder = builder.journal_path(path);
    }

    Ok(builder.build().await?)
}
