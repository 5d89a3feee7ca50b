// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::driver::StandardLockDriver;
use super::handle::LockHandle;
use super::internals::LockInternals;
use keeper_client::Client;
use keeper_core::Result;
use std::sync::Arc;
use std::time::Duration;

/// Up to `max_leases` concurrent holders, admitted in queue order
#[derive(Clone)]
pub struct InterProcessSemaphore {
    internals: LockInternals,
    max_leases: usize,
}

impl InterProcessSemaphore {
    pub fn new(client: Client, path: impl Into<String>, max_leases: usize) -> Self {
        let driver = StandardLockDriver::new("lease-", max_leases);
        let max_leases = driver.max_leases();
        Self {
            internals: LockInternals::new(client, path, Arc::new(driver)),
            max_leases,
        }
    }

    pub fn path(&self) -> &str {
        self.internals.base_path()
    }

    pub fn max_leases(&self) -> usize {
        self.max_leases
    }

    /// Wait for a lease; release it through the returned handle
    pub async fn acquire(&self, timeout: Option<Duration>) -> Result<LockHandle> {
        self.internals.acquire(timeout).await
    }
}

impl std::fmt::Debug for InterProcessSemaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterProcessSemaphore")
            .field("path", &self.path())
            .field("max_leases", &self.max_leases)
            .finish()
    }
}
