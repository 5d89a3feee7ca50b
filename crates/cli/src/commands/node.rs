// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-node commands

use crate::output::{self, NodeStat, OutputFormat};
use anyhow::{bail, Result};
use clap::Args;
use keeper_client::{Client, CreateOptions, DeleteOptions};
use keeper_core::CreateMode;

#[derive(Args)]
pub struct CreateArgs {
    /// Path of the node; sequential modes append a suffix
    pub path: String,
    /// Initial data
    #[arg(default_value = "")]
    pub data: String,
    /// persistent, persistent-sequential, ephemeral or ephemeral-sequential
    #[arg(long, default_value_t = CreateMode::Persistent)]
    pub mode: CreateMode,
    /// Create missing parent nodes
    #[arg(long, short = 'p')]
    pub parents: bool,
}

#[derive(Args)]
pub struct LsArgs {
    pub path: String,
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct StatArgs {
    pub path: String,
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct RmArgs {
    pub path: String,
    /// Delete the node's children first
    #[arg(long, short = 'r')]
    pub recursive: bool,
    /// Keep retrying until the delete is confirmed
    #[arg(long)]
    pub guaranteed: bool,
}

pub async fn create(client: &Client, args: CreateArgs) -> Result<()> {
    let mut options = CreateOptions::new(args.mode);
    if args.parents {
        options = options.with_parents();
    }
    let created = client
        .create(&args.path, args.data.as_bytes(), options)
        .await?;
    println!("{}", created);
    Ok(())
}

pub async fn get(client: &Client, path: &str) -> Result<()> {
    let data = client.get_data(path).await?;
    println!("{}", String::from_utf8_lossy(&data));
    Ok(())
}

pub async fn set(client: &Client, path: &str, data: &str) -> Result<()> {
    let stat = client.set_data(path, data.as_bytes(), None).await?;
    tracing::debug!(path, version = stat.version, "data updated");
    Ok(())
}

pub async fn ls(client: &Client, args: LsArgs) -> Result<()> {
    let children = client.get_children(&args.path).await?;
    output::print_list(&children, OutputFormat::from_json_flag(args.json));
    Ok(())
}

pub async fn stat(client: &Client, args: StatArgs) -> Result<()> {
    let Some(stat) = client.exists(&args.path).await? else {
        bail!("node does not exist: {}", args.path);
    };
    let node = NodeStat {
        path: &args.path,
        stat,
    };
    output::print(&node, OutputFormat::from_json_flag(args.json));
    Ok(())
}

pub async fn rm(client: &Client, args: RmArgs) -> Result<()> {
    let mut options = DeleteOptions::new();
    if args.recursive {
        options = options.with_children();
    }
    if args.guaranteed {
        options = options.guaranteed();
    }
    client.delete(&args.path, options).await?;
    Ok(())
}
