// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watch command

use anyhow::Result;
use clap::Args;
use keeper_client::Client;
use keeper_recipes::{ChildData, NodeCache};
use tokio::sync::mpsc;

#[derive(Args)]
pub struct WatchArgs {
    /// Node to follow; it need not exist yet
    pub path: String,
}

pub async fn watch(client: &Client, args: WatchArgs) -> Result<()> {
    let cache = NodeCache::new(client.clone(), &args.path);
    let (tx, mut changes) = mpsc::unbounded_channel();
    cache.add_listener(move || {
        let _ = tx.send(());
    });
    cache.start().await?;
    print_snapshot(&args.path, cache.current()?.as_ref());

    let result = loop {
        tokio::select! {
            changed = changes.recv() => {
                if changed.is_none() {
                    break Ok(());
                }
                match cache.current() {
                    Ok(snapshot) => print_snapshot(&args.path, snapshot.as_ref()),
                    Err(e) => break Err(e.into()),
                }
            }
            _ = tokio::signal::ctrl_c() => break Ok(()),
        }
    };
    cache.stop().await;
    result
}

fn print_snapshot(path: &str, snapshot: Option<&ChildData>) {
    match snapshot {
        Some(node) => println!(
            "{} (version {}): {}",
            path,
            node.stat.version,
            String::from_utf8_lossy(&node.data)
        ),
        None => println!("{} does not exist", path),
    }
}
