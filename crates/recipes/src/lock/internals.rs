// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue mechanics shared by every lock flavour

use super::driver::{sort_participants, Decision, LockDriver};
use super::handle::LockHandle;
use keeper_client::{protection_id, Client, CreateOptions};
use keeper_core::{path, CreateMode, KeeperError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::Instrument;

#[derive(Clone)]
pub(crate) struct LockInternals {
    client: Client,
    base_path: String,
    driver: Arc<dyn LockDriver>,
}

impl LockInternals {
    pub(crate) fn new(client: Client, base_path: impl Into<String>, driver: Arc<dyn LockDriver>) -> Self {
        Self {
            client,
            base_path: base_path.into(),
            driver,
        }
    }

    pub(crate) fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Join the queue and wait for this contender's turn
    ///
    /// On timeout or failure the contender's node is deleted before the
    /// error is returned.
    pub(crate) async fn acquire(&self, timeout: Option<Duration>) -> Result<LockHandle> {
        path::validate(&self.base_path, false)?;
        let span = tracing::debug_span!("keeper.lock", path = %self.base_path, lock = self.driver.lock_name());
        async {
            let deadline = timeout.map(|t| Instant::now() + t);
            let guard = CreateGuard::new(self.client.clone(), &self.base_path);
            let ours = self
                .client
                .create_protected(
                    &path::join(&self.base_path, self.driver.lock_name()),
                    &[],
                    CreateOptions::new(CreateMode::EphemeralSequential).with_parents(),
                    &guard.id,
                )
                .await?;
            guard.disarm();
            let mut handle = LockHandle::pending(self.client.clone(), ours);

            let turn = self.wait_turn(path::node_name(handle.path()));
            let outcome = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, turn)
                    .await
                    .unwrap_or_else(|_| {
                        Err(KeeperError::LockTimeout {
                            path: self.base_path.clone(),
                        })
                    }),
                None => turn.await,
            };

            match outcome {
                Ok(()) => {
                    handle.mark_held();
                    tracing::debug!(node = handle.path(), "lock acquired");
                    Ok(handle)
                }
                Err(e) => {
                    tracing::debug!(node = handle.path(), error = %e, "lock not acquired");
                    if let Err(cleanup) = handle.release().await {
                        tracing::warn!(node = handle.path(), error = %cleanup, "failed to remove lock node");
                    }
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn wait_turn(&self, ours: &str) -> Result<()> {
        loop {
            let (children, queue_watch) = if self.driver.watches_queue() {
                let (children, watch) = self.client.get_children_watch(&self.base_path).await?;
                (children, Some(watch))
            } else {
                (self.client.get_children(&self.base_path).await?, None)
            };
            let siblings = sort_participants(self.driver.as_ref(), children);
            let ahead = match self.driver.decide(&siblings, ours)? {
                Decision::Acquired => return Ok(()),
                Decision::Wait { watch } => watch,
            };

            if let Some(queue_watch) = queue_watch {
                tracing::trace!(ahead = %ahead, "waiting for the queue to move");
                queue_watch.changed().await?;
                continue;
            }

            let (stat, watch) = self
                .client
                .exists_watch(&path::join(&self.base_path, &ahead))
                .await?;
            if stat.is_none() {
                // released between the listing and the watch
                continue;
            }
            tracing::trace!(ahead = %ahead, "waiting for predecessor");
            watch.changed().await?;
        }
    }
}

/// Deletes a contender's node when its create never reported back
///
/// The create may have applied before its reply was lost. Until the handle
/// takes ownership of the node, dropping the guard removes whatever child
/// carries its protection id.
struct CreateGuard {
    client: Client,
    parent: String,
    id: String,
    armed: bool,
}

impl CreateGuard {
    fn new(client: Client, parent: &str) -> Self {
        Self {
            client,
            parent: parent.to_string(),
            id: protection_id(),
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CreateGuard {
    fn drop(&mut self) {
        if !self.armed || self.client.state().is_terminal() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(parent = %self.parent, "lock create abandoned outside a runtime");
            return;
        };
        let client = self.client.clone();
        let parent = std::mem::take(&mut self.parent);
        let id = std::mem::take(&mut self.id);
        tracing::debug!(parent = %parent, id = %id, "cleaning up abandoned lock create");
        runtime.spawn(async move {
            if let Err(e) = client.delete_protected(&parent, &id).await {
                tracing::warn!(parent = %parent, error = %e, "failed to clean up abandoned lock create");
            }
        });
    }
}
