mod commands;
mod config;
mod logging;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use logging::init_logging;

#[derive(clap::Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
pub struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(long, short, default_value = "burrow.yaml", env = "BURROW_CONFIG")]
    config: PathBuf,
}

#[derive(clap::Subcommand)]
pub(crate) enum Commands {
    /// Interactively create a config file and host keys
    Setup,
    /// Validate config file
    Check,
    /// Run Burrow
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Setup => crate::commands::setup::command(&cli).await,
        Commands::Check => crate::commands::check::command(&cli).await,
        Commands::Run => crate::commands::run::command(&cli).await,
    }
}
