// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! keeper - command-line client for a coordination ensemble

mod commands;
mod error;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{demo, lock, node, watch};
use keeper_client::Client;
use keeper_core::ClientConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use crate::error::CliError;

#[derive(Parser)]
#[command(
    name = "keeper",
    version,
    about = "Keeper - client for a coordination ensemble"
)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Comma-separated host:port list of ensemble members
    #[arg(long, short = 's', global = true)]
    server: Option<String>,

    /// Session timeout to request, e.g. "30s"
    #[arg(long, global = true, value_parser = humantime::parse_duration)]
    session_timeout: Option<Duration>,

    /// How long to wait for a connection, e.g. "5s"
    #[arg(long, global = true, value_parser = humantime::parse_duration)]
    connection_timeout: Option<Duration>,

    /// Log debug output to stderr (repeat for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a node
    Create(node::CreateArgs),
    /// Print a node's data
    Get {
        path: String,
    },
    /// Replace a node's data
    Set {
        path: String,
        data: String,
    },
    /// List a node's children
    Ls(node::LsArgs),
    /// Show a node's metadata
    Stat(node::StatArgs),
    /// Delete a node
    Rm(node::RmArgs),
    /// Hold a lock until interrupted
    Lock(lock::LockArgs),
    /// Print a node's data every time it changes
    Watch(watch::WatchArgs),
    /// Walk through the basic operations under a scratch path
    Demo(demo::DemoArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<CliError>() {
                Some(err) => eprint!("{}", err),
                None => eprintln!("error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let client = Client::connect(config.clone())
        .await
        .map_err(|e| CliError::connect_failed(&config, e))?;

    let result = dispatch(&client, cli.command).await;
    client.close().await;
    result
}

async fn dispatch(client: &Client, command: Commands) -> Result<()> {
    match command {
        Commands::Create(args) => node::create(client, args).await,
        Commands::Get { path } => node::get(client, &path).await,
        Commands::Set { path, data } => node::set(client, &path, &data).await,
        Commands::Ls(args) => node::ls(client, args).await,
        Commands::Stat(args) => node::stat(client, args).await,
        Commands::Rm(args) => node::rm(client, args).await,
        Commands::Lock(args) => lock::lock(client, args).await,
        Commands::Watch(args) => watch::watch(client, args).await,
        Commands::Demo(args) => demo::demo(client, &args, &mut std::io::stdout()).await,
    }
}

/// File, then `KEEPER_*` environment, then flags
fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    let mut config = config.with_env_overrides()?;

    if let Some(server) = &cli.server {
        config.connect_string = server.clone();
    }
    if let Some(timeout) = cli.session_timeout {
        config.session_timeout = timeout;
    }
    if let Some(timeout) = cli.connection_timeout {
        config.connection_timeout = timeout;
    }
    config.validate()?;
    Ok(config)
}

fn setup_logging(verbose: u8) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
