//! BeaconNode - BeaconMesh node runtime

use anyhow::Result;
use beaconnode::{Config, Node};
use clap::Parser;
use std::io;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "beaconnode")]
#[command(about = "BeaconMesh indoor positioning node", version)]
struct Args {
    /// Configuration file
    #[arg(short, long, env = "BEACONNODE_CONFIG")]
    config: Option<PathBuf>,

    /// Write a default configuration and exit
    #[arg(long)]
    init: bool,

    /// Log filter, overrides the configured level
    #[arg(short, long, env = "BEACONNODE_LOG")]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Simulated time to run for, overrides the configured duration
    #[arg(short, long)]
    duration: Option<u64>,
}

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.init {
        let config = Config::create_default(args.config)?;
        println!("Configuration written to {}", config.config_path().display());
        return Ok(());
    }

    let mut config = Config::load(args.config)?;
    if let Some(duration) = args.duration {
        config.simulation.duration = Some(duration);
    }

    let level = args.log_level.unwrap_or_else(|| config.logging.level.clone());
    init_logging(&level, args.json_logs || config.logging.json);

    info!("Starting BeaconNode");
    info!("Configuration: {}", config.config_path().display());

    let mut node = Node::new(config)?;
    node.run(io::stdout().lock()).await
}
