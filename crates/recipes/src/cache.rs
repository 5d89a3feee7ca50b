// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Locally cached view of a single node
//!
//! A [`NodeCache`] keeps the latest data and `Stat` of one path. A background
//! task re-reads the node whenever its watch fires and tells listeners when
//! the snapshot actually changed. Listeners get no payload: rapid changes are
//! coalesced, so they read [`NodeCache::current`] themselves.

use keeper_client::{Client, Watch};
use keeper_core::{path, KeeperError, Result, Stat};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Snapshot of a node held by the cache
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChildData {
    pub path: String,
    pub stat: Stat,
    pub data: Vec<u8>,
}

/// Callback invoked after the cached snapshot changed
pub trait NodeCacheListener: Send + Sync + 'static {
    fn node_changed(&self);
}

impl<F> NodeCacheListener for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn node_changed(&self) {
        self()
    }
}

/// Registration handle returned by [`NodeCache::add_listener`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CacheStatus {
    Latent,
    Running,
    Stopped,
    Expired,
}

struct Shared {
    path: String,
    status: Mutex<CacheStatus>,
    snapshot: Mutex<Option<ChildData>>,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn NodeCacheListener>)>>,
    next_listener: AtomicU64,
}

impl Shared {
    fn status(&self) -> CacheStatus {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_status(&self, status: CacheStatus) {
        *self.status.lock().unwrap_or_else(|e| e.into_inner()) = status;
    }

    /// Swap in `next`, returning whether it differs from what was cached
    fn swap(&self, next: Option<ChildData>) -> bool {
        let mut snapshot = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        let changed = match (snapshot.as_ref(), next.as_ref()) {
            (None, None) => false,
            (Some(old), Some(new)) => {
                old.stat.mzxid != new.stat.mzxid || old.stat.version != new.stat.version
            }
            _ => true,
        };
        *snapshot = next;
        changed
    }

    fn notify(&self) {
        // clone out so listeners may add or remove listeners
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener.node_changed();
        }
    }
}

/// Cache of one node's data, kept current through watches
pub struct NodeCache {
    client: Client,
    shared: Arc<Shared>,
    stop: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl NodeCache {
    pub fn new(client: Client, path: impl Into<String>) -> Self {
        Self {
            client,
            shared: Arc::new(Shared {
                path: path.into(),
                status: Mutex::new(CacheStatus::Latent),
                snapshot: Mutex::new(None),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(0),
            }),
            stop: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &str {
        &self.shared.path
    }

    /// Populate the cache and start following changes
    ///
    /// The initial fetch completes before this returns, so `current()` is
    /// valid immediately afterwards. A cache can be started once.
    pub async fn start(&self) -> Result<()> {
        path::validate(&self.shared.path, false)?;
        {
            let mut status = self.shared.status.lock().unwrap_or_else(|e| e.into_inner());
            if *status != CacheStatus::Latent {
                return Err(KeeperError::CacheAlreadyStarted {
                    path: self.shared.path.clone(),
                });
            }
            *status = CacheStatus::Running;
        }

        let (snapshot, watch) = match refresh(&self.client, &self.shared.path).await {
            Ok(fetched) => fetched,
            Err(e) => {
                let mut status = self.shared.status.lock().unwrap_or_else(|e| e.into_inner());
                if *status == CacheStatus::Running {
                    *status = CacheStatus::Latent;
                }
                return Err(e);
            }
        };

        // stop() marks the status under this lock, so it cannot slip between
        // the check and the spawn
        let mut stop = self.stop.lock().unwrap_or_else(|e| e.into_inner());
        if self.shared.status() != CacheStatus::Running {
            tracing::debug!(path = %self.shared.path, "node cache stopped while starting");
            return Ok(());
        }
        self.shared.swap(snapshot);

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(follow(
            self.client.clone(),
            Arc::clone(&self.shared),
            watch,
            stop_rx,
        ));
        *stop = Some(stop_tx);
        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(task);
        tracing::debug!(path = %self.shared.path, "node cache started");
        Ok(())
    }

    /// Latest snapshot; `None` when the node does not exist
    pub fn current(&self) -> Result<Option<ChildData>> {
        match self.shared.status() {
            CacheStatus::Running => Ok(self
                .shared
                .snapshot
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone()),
            CacheStatus::Expired => Err(KeeperError::SessionExpired),
            CacheStatus::Latent | CacheStatus::Stopped => Err(KeeperError::CacheNotRunning {
                path: self.shared.path.clone(),
            }),
        }
    }

    pub fn add_listener(&self, listener: impl NodeCacheListener) -> ListenerId {
        let id = ListenerId(self.shared.next_listener.fetch_add(1, Ordering::Relaxed));
        self.shared
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(listener)));
        id
    }

    /// Unregister a listener; returns whether it was registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .shared
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Stop following the node and drop its watch
    ///
    /// Later calls to `current()` fail with `CacheNotRunning`.
    pub async fn stop(&self) {
        let stop = {
            let mut stop = self.stop.lock().unwrap_or_else(|e| e.into_inner());
            if self.shared.status() == CacheStatus::Running {
                self.shared.set_status(CacheStatus::Stopped);
            }
            stop.take()
        };
        if let Some(stop) = stop {
            let _ = stop.send(());
        }
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = task {
            let _ = task.await;
            tracing::debug!(path = %self.shared.path, "node cache stopped");
        }
    }
}

impl Drop for NodeCache {
    fn drop(&mut self) {
        // dropping the stop sender ends the follow task
        self.stop.get_mut().unwrap_or_else(|e| e.into_inner()).take();
    }
}

impl std::fmt::Debug for NodeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeCache")
            .field("path", &self.shared.path)
            .field("status", &self.shared.status())
            .finish()
    }
}

/// Read the node and arm the next watch
///
/// A missing node arms an existence watch instead. If the node appears
/// between the two reads, read it again.
async fn refresh(client: &Client, node: &str) -> Result<(Option<ChildData>, Watch)> {
    loop {
        match client.get_data_watch(node).await {
            Ok((data, stat, watch)) => {
                let snapshot = ChildData {
                    path: node.to_string(),
                    stat,
                    data,
                };
                return Ok((Some(snapshot), watch));
            }
            Err(e) if e.is_node_missing() => {
                let (stat, watch) = client.exists_watch(node).await?;
                if stat.is_none() {
                    return Ok((None, watch));
                }
            }
            Err(e) => return Err(e),
        }
    }
}

async fn follow(
    client: Client,
    shared: Arc<Shared>,
    mut watch: Watch,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        let fired = tokio::select! {
            _ = &mut stop => return,
            fired = watch.changed() => fired,
        };
        if let Err(e) = fired {
            finish(&shared, e);
            return;
        }

        watch = loop {
            let attempt = tokio::select! {
                _ = &mut stop => return,
                attempt = refresh(&client, &shared.path) => attempt,
            };
            match attempt {
                Ok((snapshot, next)) => {
                    if shared.swap(snapshot) {
                        tracing::debug!(path = %shared.path, "node cache changed");
                        shared.notify();
                    }
                    break next;
                }
                Err(e) if e.is_retryable() => {
                    tracing::warn!(path = %shared.path, error = %e, "node cache refresh failed");
                    let pause = client.config().retry.interval();
                    tokio::select! {
                        _ = &mut stop => return,
                        _ = tokio::time::sleep(pause) => {}
                    }
                }
                Err(e) => {
                    finish(&shared, e);
                    return;
                }
            }
        };
    }
}

/// Record why the cache ended and let listeners observe it
fn finish(shared: &Shared, error: KeeperError) {
    let status = match error {
        KeeperError::SessionExpired => CacheStatus::Expired,
        _ => CacheStatus::Stopped,
    };
    tracing::info!(path = %shared.path, error = %error, "node cache ended");
    shared.set_status(status);
    shared.notify();
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
