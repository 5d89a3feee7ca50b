// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock command

use super::session_ended;
use crate::error::CliError;
use anyhow::Result;
use clap::Args;
use keeper_client::{Client, SessionEvent};
use keeper_core::KeeperError;
use keeper_recipes::{InterProcessMutex, InterProcessReadWriteLock};
use std::time::Duration;

#[derive(Args)]
pub struct LockArgs {
    /// Lock path
    pub path: String,
    /// Take the shared side of a read-write lock
    #[arg(long, conflicts_with = "write")]
    pub read: bool,
    /// Take the exclusive side of a read-write lock
    #[arg(long)]
    pub write: bool,
    /// Give up if the lock is not acquired in time, e.g. "10s"
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,
    /// Release after holding this long instead of waiting for Ctrl-C
    #[arg(long, value_parser = humantime::parse_duration)]
    pub hold: Option<Duration>,
}

pub async fn lock(client: &Client, args: LockArgs) -> Result<()> {
    let mutex = if args.read || args.write {
        let rw = InterProcessReadWriteLock::new(client.clone(), &args.path);
        if args.read {
            rw.read_lock().clone()
        } else {
            rw.write_lock().clone()
        }
    } else {
        InterProcessMutex::new(client.clone(), &args.path)
    };

    let mut handle = match mutex.acquire(args.timeout).await {
        Ok(handle) => handle,
        Err(KeeperError::LockTimeout { path }) => {
            let waited = args.timeout.unwrap_or_default();
            return Err(CliError::lock_timeout(&path, waited).into());
        }
        Err(e) => return Err(e.into()),
    };
    println!("acquired {}", handle.path());

    let hold = async {
        match args.hold {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::select! {
        _ = hold => {}
        _ = tokio::signal::ctrl_c() => {}
        event = session_ended(client) => {
            if event == SessionEvent::Expired {
                anyhow::bail!("session expired; lock {} was lost", handle.path());
            }
        }
    }

    handle.release().await?;
    println!("released {}", handle.path());
    Ok(())
}
