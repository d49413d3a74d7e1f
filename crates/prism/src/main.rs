//! Prism CLI - apply batches of image effects.
//!
//! Prism reads a batch of per-image add/remove effect instructions, works out
//! each image's final set of effects, and applies them through an image
//! backend.
//!
//! # Usage
//!
//! ```bash
//! # Apply a batch to images under ./photos, writing results to ./out
//! prism process batch.json --images ./photos --output-dir ./out
//!
//! # Check what a batch would do without touching any file
//! prism process batch.json --dry-run -f jsonl
//!
//! # List known effects
//! prism effects
//!
//! # View configuration
//! prism config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Prism - apply batches of image effects.
#[derive(Parser, Debug)]
#[command(name = "prism")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply a batch of effect operations to images
    Process(cli::process::ProcessArgs),

    /// List the effects a batch may reference
    Effects,

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match prism_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `prism config path`."
            );
            prism_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Prism v{}", prism_core::VERSION);

    match cli.command {
        Commands::Process(args) => cli::process::execute(args, config).await,
        Commands::Effects => cli::effects::execute(&config),
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
