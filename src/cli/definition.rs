//! CLI definitions for filmbotctl

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::health::HealthCommands;
use super::schedules::SchedulesArgs;
use super::sync::SyncArgs;
use crate::config::CONFIG_ENV;

#[derive(Parser)]
#[command(name = "filmbotctl")]
#[command(about = "Recording schedules and health alerting for the Filmbot appliance")]
#[command(version)]
pub struct Cli {
    /// Path to the appliance config file
    #[arg(long, global = true, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install, update and remove recording timers to match the config
    Sync(SyncArgs),

    /// Show the configured schedules as they would be compiled
    #[command(alias = "ls")]
    Schedules(SchedulesArgs),

    /// Sample appliance health and send alerts
    Health {
        #[command(subcommand)]
        command: HealthCommands,
    },
}
