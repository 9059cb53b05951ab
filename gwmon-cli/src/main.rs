//! gwmon CLI - inspect and exercise gateway monitor files.

mod commands;
mod logging;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// gwmon - shared-memory counters for a network gateway.
#[derive(Parser)]
#[command(name = "gwmon")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect a monitor file
    Inspect {
        /// Path to the monitor file
        path: PathBuf,

        /// List every counter with its current value
        #[arg(short, long)]
        counters: bool,

        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a monitor file and tick a counter per owner until Ctrl-C
    Publish {
        /// Gateway identifier
        #[arg(short, long)]
        gateway_id: String,

        /// Monitored service name (repeatable)
        #[arg(short, long = "service")]
        services: Vec<String>,

        /// Directory for the monitor file
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Tick interval in milliseconds
        #[arg(short, long, default_value = "1000")]
        interval_ms: u64,

        /// Counters per owner (multiple of 8); defaults to the full buffers
        #[arg(long)]
        capacity: Option<u32>,
    },

    /// Print the resolved monitor file path
    Path {
        /// Gateway identifier
        #[arg(short, long)]
        gateway_id: Option<String>,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&logging::LoggingConfig::from_verbosity(cli.verbose))?;

    match cli.command {
        Commands::Inspect {
            path,
            counters,
            json,
        } => commands::inspect::run(&path, counters, json),
        Commands::Publish {
            gateway_id,
            services,
            dir,
            interval_ms,
            capacity,
        } => {
            commands::publish::run(commands::publish::PublishOptions {
                gateway_id,
                services,
                directory: dir,
                interval: Duration::from_millis(interval_ms.max(1)),
                capacity,
            })
            .await
        }
        Commands::Path { gateway_id } => commands::path::run(gateway_id.as_deref()),
        Commands::Version => commands::version::run(),
    }
}
