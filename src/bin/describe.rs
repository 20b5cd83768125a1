//! kuba-graphite-describe
//!
//! Prints the function metadata document consumed by compatibility tooling.
//!
//! ```bash
//! kuba-graphite-describe                       # all functions, JSON
//! kuba-graphite-describe functions -n sumSeries --pretty
//! kuba-graphite-describe list
//! kuba-graphite-describe -c graphite.toml check-config
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info};

use kuba_graphite::config::EngineConfig;
use kuba_graphite::functions::FunctionRegistry;

// =============================================================================
// CLI Definition
// =============================================================================

/// Describe the Graphite functions this build provides
#[derive(Parser)]
#[command(name = "kuba-graphite-describe")]
#[command(version)]
#[command(about = "Graphite function metadata for the Kuba query engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (overrides KUBA_GRAPHITE_CONFIG)
    #[arg(short, long, global = true, env = "KUBA_GRAPHITE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print function descriptions as JSON (default)
    Functions {
        /// Only this function
        #[arg(short, long)]
        name: Option<String>,

        /// Indent the output
        #[arg(long)]
        pretty: bool,
    },

    /// Print registered function names, one per line
    List,

    /// Validate the configuration file and exit
    CheckConfig,
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn load_config(cli: &Cli) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => EngineConfig::from_file_with_env(path)?,
        None => EngineConfig::from_env(),
    };
    config.validate()?;
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    debug!(?config, "configuration loaded");
    let registry = FunctionRegistry::with_defaults(&config);
    info!(functions = registry.len(), "registry built");

    match cli.command.unwrap_or(Commands::Functions {
        name: None,
        pretty: false,
    }) {
        Commands::Functions { name, pretty } => {
            let mut descriptions = registry.descriptions();
            if let Some(name) = name {
                descriptions.retain(|k, _| *k == name);
                if descriptions.is_empty() {
                    return Err(format!("unknown function: {}", name).into());
                }
            }
            let out = if pretty {
                serde_json::to_string_pretty(&descriptions)?
            } else {
                serde_json::to_string(&descriptions)?
            };
            println!("{}", out);
        },
        Commands::List => {
            for name in registry.names() {
                println!("{}", name);
            }
        },
        Commands::CheckConfig => {
            println!("Configuration is valid!");
            println!();
            println!("Consolidation:");
            println!(
                "  Nudge start time: {}",
                config.consolidation.nudge_start_time_on_aggregation
            );
            println!(
                "  Highest bucket timestamp: {}",
                config.consolidation.use_buckets_highest_timestamp_on_aggregation
            );
            println!("Alignment:");
            println!("  Extrapolate points: {}", config.alignment.extrapolate_points);
            println!("Functions:");
            println!("  Registered: {}", registry.len());
            match &config.functions.alias_by_redis {
                Some(path) => println!("  aliasByRedis config: {}", path.display()),
                None => println!("  aliasByRedis: disabled"),
            }
            println!("  Log level: {}", config.logging.level);
        },
    }
    Ok(())
}
