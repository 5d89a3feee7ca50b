// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::driver::{LockDriver, StandardLockDriver};
use super::handle::LockHandle;
use super::internals::LockInternals;
use keeper_client::Client;
use keeper_core::Result;
use std::sync::Arc;
use std::time::Duration;

/// Exclusive lock shared across processes
#[derive(Clone)]
pub struct InterProcessMutex {
    internals: LockInternals,
}

impl InterProcessMutex {
    pub fn new(client: Client, path: impl Into<String>) -> Self {
        Self::with_driver(client, path, Arc::new(StandardLockDriver::mutex()))
    }

    /// Lock whose admission rules come from `driver`
    pub fn with_driver(client: Client, path: impl Into<String>, driver: Arc<dyn LockDriver>) -> Self {
        Self {
            internals: LockInternals::new(client, path, driver),
        }
    }

    pub fn path(&self) -> &str {
        self.internals.base_path()
    }

    /// Wait for the lock
    ///
    /// With a timeout, fails with `LockTimeout` once it elapses; without
    /// one, waits until the lock is held or the session ends.
    pub async fn acquire(&self, timeout: Option<Duration>) -> Result<LockHandle> {
        self.internals.acquire(timeout).await
    }
}

impl std::fmt::Debug for InterProcessMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterProcessMutex")
            .field("path", &self.path())
            .finish()
    }
}
