//! Poolwatch CLI
//!
//! Command-line interface for querying schedd queues and collector ads.

mod commands;
mod config;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "poolwatch")]
#[command(about = "Batch-scheduler pool monitoring CLI", long_about = None)]
struct Cli {
    /// Directory holding condor_q and condor_status
    #[arg(long, env = "POOLWATCH_CONDOR_BIN")]
    condor_bin: Option<PathBuf>,

    /// Do not remember schedd location decisions
    #[arg(long, env = "POOLWATCH_NO_LOCATION_CACHE")]
    no_location_cache: bool,

    /// Directory for the on-disk store
    #[arg(long, env = "POOLWATCH_STORE_DIR")]
    store_dir: Option<PathBuf>,

    /// Seconds a store entry stays fresh
    #[arg(long, env = "POOLWATCH_STORE_TTL", default_value_t = 3600)]
    store_ttl: u64,

    /// Request (true) or refuse (false) integrity checking
    #[arg(long, env = "POOLWATCH_REQUIRE_INTEGRITY")]
    require_integrity: Option<bool>,

    /// Request (true) or refuse (false) encryption
    #[arg(long, env = "POOLWATCH_REQUIRE_ENCRYPTION")]
    require_encryption: Option<bool>,

    /// Print JSON instead of text
    #[arg(long, global = true, env = "POOLWATCH_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "poolwatch=info,poolwatch_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let settings = Settings {
        condor_bin: cli.condor_bin,
        location_cache: !cli.no_location_cache,
        store_dir: cli.store_dir,
        store_ttl: cli.store_ttl,
        require_integrity: cli.require_integrity,
        require_encryption: cli.require_encryption,
        json: cli.json,
    };

    handle_command(cli.command, &settings)
}
