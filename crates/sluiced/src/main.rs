//! `sluiced` — the Sluice gateway daemon.
//!
//! Discovers the storage fleet, admits every node, builds the placement ring
//! and serves the object API.
//!
//! # Usage
//!
//! ```text
//! sluiced start                          # discover nodes via docker, serve on :3000
//! sluiced start -c sluice.toml           # with a config file
//! sluiced start --memory 3 -l 127.0.0.1:3000   # local in-memory fleet
//! sluiced config                         # print the effective configuration
//! sluiced locate abc123                  # show which node owns a key
//! ```

mod config;
mod fleet;
mod telemetry;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sluice_http::{GatewayConfig, GatewayServer};
use sluice_types::ObjectKey;
use tracing::{info, warn};

use config::CliConfig;
use fleet::FleetSource;

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "sluiced", version, about = "Sluice object storage gateway")]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the Docker engine address (e.g. "unix:///var/run/docker.sock").
    #[arg(long, global = true)]
    docker_host: Option<String>,

    /// Use N in-memory storage nodes instead of discovering containers.
    #[arg(short, long, global = true, value_name = "N")]
    memory: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway.
    Start {
        /// Override the HTTP listen address (e.g. "127.0.0.1:3000").
        #[arg(short = 'l', long)]
        listen: Option<String>,
    },

    /// Print the effective configuration.
    Config,

    /// Show which partition and node an object key maps to.
    Locate {
        /// Object key.
        key: String,
    },
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", capitalize(&format!("{e:#}")));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = CliConfig::load(cli.config.as_deref())?;
    config.apply_env(std::env::vars_os().filter_map(|(k, v)| {
        Some((k.into_string().ok()?, v.into_string().ok()?))
    }))?;

    // CLI args override file and environment values.
    if let Some(host) = cli.docker_host {
        config.discovery.docker_host = host;
    }
    if let Commands::Start {
        listen: Some(addr), ..
    } = &cli.command
    {
        config.server.listen_addr = addr.clone();
    }
    config.validate()?;

    let source = FleetSource::from_flag(cli.memory);
    match cli.command {
        Commands::Start { .. } => {
            telemetry::init(&config.log.level);
            cmd_start(config, source).await
        }
        Commands::Config => cmd_config(&config),
        Commands::Locate { key } => {
            telemetry::init(&config.log.level);
            cmd_locate(&config, &source, &key).await
        }
    }
}

/// Uppercase the first character of an error message.
fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// -----------------------------------------------------------------------
// sluiced start
// -----------------------------------------------------------------------

async fn cmd_start(config: CliConfig, source: FleetSource) -> Result<()> {
    info!("starting sluiced");
    info!(
        listen = %config.server.listen_addr,
        pattern = %config.discovery.name_pattern,
        partitions = config.ring.partition_count,
        replication = config.ring.replication_factor,
        load = config.ring.load,
        bucket = %config.storage.bucket,
        "gateway configuration"
    );

    let directory = fleet::build_directory(&config, &source).await?;
    for node in directory.members() {
        info!(node = %node, "serving node");
    }

    let server = GatewayServer::new(GatewayConfig {
        directory: Arc::new(directory),
        bucket: config.storage.bucket.clone(),
        chunked_upload_limit: config.chunked_upload_limit(),
    });

    server
        .serve_with_shutdown(&config.server.listen_addr, shutdown_signal())
        .await
        .context("failed to start gateway")?;

    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => warn!(error = %e, "failed to listen for ctrl-c"),
    }
}

// -----------------------------------------------------------------------
// sluiced config
// -----------------------------------------------------------------------

fn cmd_config(config: &CliConfig) -> Result<()> {
    let rendered = config.to_toml().context("failed to render config")?;
    print!("{rendered}");
    Ok(())
}

// -----------------------------------------------------------------------
// sluiced locate
// -----------------------------------------------------------------------

async fn cmd_locate(config: &CliConfig, source: &FleetSource, key: &str) -> Result<()> {
    let key = ObjectKey::parse(key).with_context(|| format!("invalid key {key:?}"))?;
    let directory = fleet::build_directory(config, source).await?;

    let partition = config.ring_config().partition_of(key.as_bytes());
    let (_, node) = directory.locate(&key)?;

    println!("key:       {key}");
    println!("partition: {partition}/{}", config.ring.partition_count);
    println!("node:      {node}");
    println!("members:   {}", directory.len());
    Ok(())
}
