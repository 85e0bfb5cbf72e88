use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use vacnorm::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for vacnorm::AppCommand {
    fn from(cmd: Commands) -> vacnorm::AppCommand {
        match cmd {
            Commands::Split { source } => vacnorm::AppCommand::Split { source },
            Commands::Rates { source } => vacnorm::AppCommand::Rates { source },
            Commands::Normalize => vacnorm::AppCommand::Normalize,
            Commands::Run { source } => vacnorm::AppCommand::Run { source },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Split the vacancy export into one file per year
    Split {
        /// Vacancy export to read instead of the configured one
        #[arg(short, long)]
        source: Option<PathBuf>,
    },
    /// Fetch monthly exchange rates and write the rate table
    Rates {
        /// Vacancy export to read instead of the configured one
        #[arg(short, long)]
        source: Option<PathBuf>,
    },
    /// Convert the salaries of every year partition into rubles
    Normalize,
    /// Split, fetch rates and normalize
    Run {
        /// Vacancy export to read instead of the configured one
        #[arg(short, long)]
        source: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => vacnorm::cli::setup::setup(),
        Some(cmd) => vacnorm::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
