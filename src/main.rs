mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use downpour::config::Config;
use downpour::descriptor::DownloadDescriptor;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Download(args) => commands::download(config, args.key).await?,
        Commands::Submit(args) => {
            let descriptor = DownloadDescriptor::new(args.name, args.url, args.content_type)?;
            commands::submit(config, descriptor, args.key).await?;
        }
        Commands::Status(args) => commands::status(config, &args.job_id)?,
    }

    Ok(())
}
