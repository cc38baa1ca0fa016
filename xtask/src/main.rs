//! xtask - Development tasks for filmbot-control

use clap::{Parser, Subcommand};
use std::fs;
use std::path::Path;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Development tasks for filmbot-control")]
struct Xtask {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate CLI documentation from clap definitions
    GenDocs,
    /// Write the default configuration file to docs/config.example.toml
    GenConfig,
}

fn main() {
    let args = Xtask::parse();
    match args.command {
        Commands::GenDocs => generate_cli_docs(),
        Commands::GenConfig => generate_example_config(),
    }
}

fn generate_cli_docs() {
    let markdown = clap_markdown::help_markdown::<filmbot_control::cli::Cli>();

    let docs_dir = Path::new("docs/cli");
    fs::create_dir_all(docs_dir).expect("Failed to create docs/cli directory");

    let output_path = docs_dir.join("reference.md");
    fs::write(&output_path, markdown).expect("Failed to write CLI reference");

    println!("Generated CLI documentation at {}", output_path.display());
}

fn generate_example_config() {
    let config = filmbot_control::config::Config::default();
    let content = toml::to_string_pretty(&config).expect("Failed to serialize default config");

    fs::create_dir_all("docs").expect("Failed to create docs directory");
    let output_path = Path::new("docs/config.example.toml");
    fs::write(output_path, content).expect("Failed to write example config");

    println!("Generated example config at {}", output_path.display());
}
