pub mod cli;
pub mod core;
pub mod pipeline;
pub mod providers;

use anyhow::Result;
use std::path::PathBuf;
use tracing::{debug, info};

pub enum AppCommand {
    /// Partition the export by year.
    Split { source: Option<PathBuf> },
    /// Build the rate table for the years found in the export.
    Rates { source: Option<PathBuf> },
    /// Rewrite the partitions with ruble salaries.
    Normalize,
    /// Split, fetch rates and normalize in one go.
    Run { source: Option<PathBuf> },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("vacnorm starting...");

    let config = match config_path {
        Some(path) => crate::core::config::AppConfig::load_from_path(path)?,
        None => crate::core::config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Split { source } => {
            cli::split::run(&config, source.as_deref())?;
        }
        AppCommand::Rates { source } => {
            let source = source.unwrap_or_else(|| config.source.clone());
            let partitioned = pipeline::partition::parse_source(&source)?;
            let provider = providers::CbrRateProvider::from_config(&config.providers.cbr)?;
            cli::rates::run(&config, &partitioned, &provider).await?;
        }
        AppCommand::Normalize => {
            cli::normalize::run(&config).await?;
        }
        AppCommand::Run { source } => {
            let provider = providers::CbrRateProvider::from_config(&config.providers.cbr)?;
            let partitioned = cli::split::run(&config, source.as_deref())?;
            // Normalization only ever sees a complete rate table
            cli::rates::run(&config, &partitioned, &provider).await?;
            drop(partitioned);
            cli::normalize::run(&config).await?;
        }
    }

    info!("vacnorm finished");
    Ok(())
}
