// crates/aludel-cli/src/main.rs
//
// CLI entrypoint for the Aludel scenario simulator.
//
// Loads configuration, initializes tracing, and dispatches to the `run` and
// `check` subcommands.

mod commands;
mod config;
mod output;
mod scenario;

use clap::{Parser, Subcommand};
use commands::check::CheckCmd;
use commands::run::RunCmd;
use config::{SimConfig, DEFAULT_CONFIG_PATH};
use output::OutputFormat;

/// Aludel reward engine simulator.
#[derive(Parser, Debug)]
#[command(
    name = "aludel",
    version = "0.1.0",
    about = "Replay staking scenarios against the Aludel reward engine"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Output format: table or json. Overrides the configured format.
    #[arg(long, global = true)]
    output: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Replay a scenario and report step outcomes and final accounting.
    Run(RunCmd),

    /// Parse and validate a scenario without running it.
    Check(CheckCmd),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let (config, load_error) = match SimConfig::load(&cli.config) {
        Ok(cfg) => (cfg, None),
        Err(e) => (SimConfig::default(), Some(e.to_string())),
    };

    // RUST_LOG wins over the configured level. Logs go to stderr so JSON
    // output on stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match load_error {
        None => tracing::info!("Loaded configuration from {}", cli.config),
        Some(e) => tracing::warn!(
            "Could not load config from {}: {}. Using defaults.",
            cli.config,
            e
        ),
    }

    let format: OutputFormat = cli
        .output
        .as_deref()
        .unwrap_or(config.output.as_str())
        .parse()?;

    match &cli.command {
        Commands::Run(cmd) => commands::run::run(cmd, &config, format).await?,
        Commands::Check(cmd) => commands::check::run(cmd, format)?,
    }

    Ok(())
}
