// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use keeper_client::{Client, DeleteOptions};
use keeper_core::{KeeperError, Result};
use std::fmt;

/// Where a contender's node stands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockState {
    /// Node created, waiting for its turn
    Pending,
    Held,
    Released,
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LockState::Pending => "pending",
            LockState::Held => "held",
            LockState::Released => "released",
        };
        f.write_str(name)
    }
}

/// Ownership of one lock node
///
/// Dropping a handle that still owns its node deletes the node in the
/// background, so a cancelled acquisition or a forgotten release never
/// blocks the queue behind it.
pub struct LockHandle {
    client: Client,
    path: String,
    state: LockState,
}

impl LockHandle {
    pub(crate) fn pending(client: Client, path: String) -> Self {
        Self {
            client,
            path,
            state: LockState::Pending,
        }
    }

    pub(crate) fn mark_held(&mut self) {
        self.state = LockState::Held;
    }

    /// Full path of the lock node
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Current state; a handle whose session ended reports `Released`
    pub fn state(&self) -> LockState {
        if self.state != LockState::Released && self.client.state().is_terminal() {
            return LockState::Released;
        }
        self.state
    }

    pub fn is_held(&self) -> bool {
        self.state() == LockState::Held
    }

    /// Delete the lock node
    ///
    /// Releasing twice is a no-op. A node that is already gone, or whose
    /// session ended, counts as released.
    pub async fn release(&mut self) -> Result<()> {
        if self.state == LockState::Released {
            return Ok(());
        }
        let result = self
            .client
            .delete(&self.path, DeleteOptions::new().guaranteed())
            .await;
        match result {
            Ok(()) => {}
            Err(KeeperError::NodeMissing { .. })
            | Err(KeeperError::SessionExpired)
            | Err(KeeperError::Closed) => {
                tracing::debug!(path = %self.path, "lock node already gone");
            }
            Err(e) => return Err(e),
        }
        self.state = LockState::Released;
        tracing::debug!(path = %self.path, "lock released");
        Ok(())
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if self.state == LockState::Released || self.client.state().is_terminal() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(path = %self.path, "lock handle dropped outside a runtime");
            return;
        };
        let client = self.client.clone();
        let path = std::mem::take(&mut self.path);
        tracing::debug!(path = %path, state = %self.state, "releasing dropped lock handle");
        runtime.spawn(async move {
            if let Err(e) = client.delete(&path, DeleteOptions::new().guaranteed()).await {
                if !e.is_node_missing() {
                    tracing::warn!(path = %path, error = %e, "failed to release dropped lock");
                }
            }
        });
    }
}

impl fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockHandle")
            .field("path", &self.path)
            .field("state", &self.state)
            .finish()
    }
}
