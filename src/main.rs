//! filmbotctl - schedule sync and health alerting for the Filmbot appliance

use anyhow::Result;
use clap::Parser;
use filmbot_control::cli::{self, Cli, Commands};
use filmbot_control::config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let default_filter = if std::env::var("FILMBOTCTL_DEBUG").is_ok() {
        "filmbot_control=debug"
    } else {
        "filmbot_control=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Sync(args) => cli::sync::run(&config, args).await,
        Commands::Schedules(args) => cli::schedules::run(&config, args).await,
        Commands::Health { command } => cli::health::run(&config, command).await,
    }
}
