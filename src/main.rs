//! Case triage batch runner - Main Entry Point
//!
//! Exit status is 1 when configuration or any setup stage fails, 0 otherwise,
//! even if individual cases failed.

use case_triage::config::TriageConfig;
use case_triage::observability::init_default_logging;
use case_triage::pipeline::TriageRunner;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info};

/// Triage CRM support cases through the classification service
#[derive(Parser)]
#[command(name = "case-triage")]
#[command(about = "Classify recent CRM cases and write the results back")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "CASE_TRIAGE_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process one batch of cases
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging(cli.verbose);

    info!("Starting case-triage v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_triage(&config).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(
    config_path: Option<&Path>,
) -> Result<TriageConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(TriageConfig::load_from_file(path)?);
    }

    let default_paths = ["triage.toml", "config/triage.toml"];
    for path_str in default_paths {
        let path = Path::new(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(TriageConfig::load_from_file(path)?);
        }
    }

    Err("No configuration file found. Provide one with -c/--config or create triage.toml".into())
}

async fn run_triage(config: &TriageConfig) -> Result<(), Box<dyn std::error::Error>> {
    let runner = TriageRunner::from_config(config)?;
    let summary = runner.run().await?;

    info!(
        processed = summary.processed(),
        succeeded = summary.succeeded(),
        failed = summary.failed(),
        "{}",
        summary.summary_line()
    );
    Ok(())
}

fn handle_config_command(
    config: &TriageConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
