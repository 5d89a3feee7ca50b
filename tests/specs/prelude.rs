// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for the behavioral specs.

#![allow(dead_code, unused_imports)]

pub use keeper_client::{
    Client, ConnectionState, CreateOptions, DeleteOptions, FakeEnsemble, SessionEvent,
};
pub use keeper_core::{path, CreateMode, KeeperError, RetryConfig};
pub use keeper_recipes::{
    InterProcessMutex, InterProcessReadWriteLock, LockHandle, LockState, NodeCache,
};
pub use std::time::Duration;

use std::future::Future;

/// Upper bound for anything a spec waits on
pub const WAIT: Duration = Duration::from_secs(5);

pub async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(WAIT, fut)
        .await
        .expect("timed out waiting")
}

/// Poll `check` until it holds, bounded by [`WAIT`]
pub async fn eventually(mut check: impl FnMut() -> bool) {
    within(async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
}

/// An in-process ensemble plus the clients connected to it
#[derive(Clone, Default)]
pub struct Cluster {
    pub ensemble: FakeEnsemble,
}

impl Cluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn client(&self) -> Client {
        self.ensemble.client().await.expect("client connects")
    }

    pub async fn clients(&self, n: usize) -> Vec<Client> {
        let mut clients = Vec::with_capacity(n);
        for _ in 0..n {
            clients.push(self.client().await);
        }
        clients
    }
}

/// Attempts the client's retry policy allows before giving up
pub fn retry_count(client: &Client) -> u32 {
    match client.config().retry {
        RetryConfig::NTimes { count, .. } => count,
        RetryConfig::OneTime { .. } => 1,
        _ => panic!("specs run with a bounded retry policy"),
    }
}
