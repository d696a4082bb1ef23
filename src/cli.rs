use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "downpour")]
#[command(about = "Background file download scheduler", long_about = None)]
pub struct Cli {
    /// Configuration file (default: config/downpour.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch the descriptor from the configured endpoint and download it
    Download(DownloadArgs),
    /// Download an explicitly given resource, skipping the descriptor fetch
    Submit(SubmitArgs),
    /// Print the journaled record for a job
    Status(StatusArgs),
}

#[derive(clap::Args, Debug)]
pub struct DownloadArgs {
    /// Job key to submit under (default: scheduler.job_key from config)
    #[arg(long)]
    pub key: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct SubmitArgs {
    /// Artifact name
    #[arg(long)]
    pub name: String,

    /// Source URL to download
    #[arg(long)]
    pub url: String,

    /// MIME content type of the resource
    #[arg(long, default_value = "application/octet-stream")]
    pub content_type: String,

    /// Job key to submit under (default: scheduler.job_key from config)
    #[arg(long)]
    pub key: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct StatusArgs {
    /// Job id as printed at submission
    pub job_id: String,
}
