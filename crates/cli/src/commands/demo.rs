// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Guided tour of the basic node operations

use anyhow::{bail, Result};
use clap::Args;
use keeper_client::{Client, CreateOptions, DeleteOptions};
use keeper_core::{path, CreateMode};
use std::io::Write;

#[derive(Args)]
pub struct DemoArgs {
    /// Scratch node the demo works under; must not exist
    #[arg(long, default_value = "/keeper-demo")]
    pub root: String,
    /// Leave the scratch node in place afterwards
    #[arg(long)]
    pub keep: bool,
}

pub async fn demo(client: &Client, args: &DemoArgs, out: &mut impl Write) -> Result<()> {
    let root = args.root.as_str();
    if client.exists(root).await?.is_some() {
        bail!("{} already exists; pick another --root", root);
    }

    let created = client
        .create(root, b"", CreateOptions::default().with_parents())
        .await?;
    writeln!(out, "created persistent node {}", created)?;

    let stat = client.set_data(root, b"test", None).await?;
    writeln!(out, "set data on {} (version {})", root, stat.version)?;

    let sequential = client
        .create(
            &path::join(root, "ps-"),
            b"ps",
            CreateOptions::new(CreateMode::PersistentSequential),
        )
        .await?;
    writeln!(out, "created persistent-sequential node {}", sequential)?;

    let ephemeral = client
        .create(
            &path::join(root, "es-"),
            b"es",
            CreateOptions::new(CreateMode::EphemeralSequential),
        )
        .await?;
    writeln!(out, "created ephemeral-sequential node {}", ephemeral)?;

    let children = client.get_children(root).await?;
    writeln!(out, "children of {}: {}", root, children.join(", "))?;

    let data = client.get_data(&sequential).await?;
    writeln!(
        out,
        "data of {}: {}",
        sequential,
        String::from_utf8_lossy(&data)
    )?;

    let nested = path::join(root, "parent/child");
    let created = client
        .create(&nested, b"", CreateOptions::default().with_parents())
        .await?;
    writeln!(out, "created {} with its parents", created)?;

    let parent = path::join(root, "parent");
    client
        .delete(&parent, DeleteOptions::new().guaranteed().with_children())
        .await?;
    writeln!(out, "deleted {} and its children", parent)?;

    if !args.keep {
        client
            .delete(root, DeleteOptions::new().guaranteed().with_children())
            .await?;
        writeln!(out, "removed {}", root)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "demo_tests.rs"]
mod tests;
