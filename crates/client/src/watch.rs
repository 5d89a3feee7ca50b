// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot watches
//!
//! A watch fires at most once: the first matching notification consumes it.
//! Watches survive reconnects (they are re-armed with a SetWatches request)
//! and are failed with the terminal state when the session ends.

use crate::protocol::{Request, WatcherEvent};
use keeper_core::{KeeperError, Result};
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Kind of change a notification reports
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Session state change with no node involved
    None,
    NodeCreated,
    NodeDeleted,
    NodeDataChanged,
    NodeChildrenChanged,
}

impl EventType {
    pub fn as_i32(self) -> i32 {
        match self {
            EventType::None => -1,
            EventType::NodeCreated => 1,
            EventType::NodeDeleted => 2,
            EventType::NodeDataChanged => 3,
            EventType::NodeChildrenChanged => 4,
        }
    }

    pub fn from_i32(code: i32) -> Option<Self> {
        let event_type = match code {
            -1 => EventType::None,
            1 => EventType::NodeCreated,
            2 => EventType::NodeDeleted,
            3 => EventType::NodeDataChanged,
            4 => EventType::NodeChildrenChanged,
            _ => return None,
        };
        Some(event_type)
    }
}

/// Session state reported alongside a notification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeeperState {
    Disconnected,
    SyncConnected,
    Expired,
    /// Local only: the client was closed
    Closed,
}

impl KeeperState {
    pub fn as_i32(self) -> i32 {
        match self {
            KeeperState::Disconnected => 0,
            KeeperState::SyncConnected => 3,
            KeeperState::Expired => -112,
            KeeperState::Closed => 7,
        }
    }

    pub fn from_i32(code: i32) -> Option<Self> {
        let state = match code {
            0 => KeeperState::Disconnected,
            3 => KeeperState::SyncConnected,
            -112 => KeeperState::Expired,
            7 => KeeperState::Closed,
            _ => return None,
        };
        Some(state)
    }
}

/// A delivered notification
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchedEvent {
    pub event_type: EventType,
    pub state: KeeperState,
    pub path: String,
}

impl WatchedEvent {
    pub fn node(event_type: EventType, path: impl Into<String>) -> Self {
        Self {
            event_type,
            state: KeeperState::SyncConnected,
            path: path.into(),
        }
    }

    /// Translate a wire event, `None` when either code is unknown
    pub fn from_wire(event: WatcherEvent) -> Option<Self> {
        Some(Self {
            event_type: EventType::from_i32(event.event_type)?,
            state: KeeperState::from_i32(event.state)?,
            path: event.path,
        })
    }

    pub fn to_wire(&self) -> WatcherEvent {
        WatcherEvent {
            event_type: self.event_type.as_i32(),
            state: self.state.as_i32(),
            path: self.path.clone(),
        }
    }
}

/// Which registration list a watch lives in
///
/// Exists calls on a missing node register an `Exist` watch; on a present
/// node they register a `Data` watch, same as get_data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WatchKind {
    Data,
    Exist,
    Child,
}

/// Pending one-shot notification for a single path
#[derive(Debug)]
pub struct Watch {
    path: String,
    rx: oneshot::Receiver<WatchedEvent>,
}

impl Watch {
    pub(crate) fn new(path: impl Into<String>, rx: oneshot::Receiver<WatchedEvent>) -> Self {
        Self {
            path: path.into(),
            rx,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Wait for the node to change
    ///
    /// Fails with `SessionExpired` or `Closed` when the session ends before
    /// the node changes.
    pub async fn changed(self) -> Result<WatchedEvent> {
        let event = self.rx.await.map_err(|_| KeeperError::Closed)?;
        match event.state {
            KeeperState::Expired => Err(KeeperError::SessionExpired),
            KeeperState::Closed => Err(KeeperError::Closed),
            _ => Ok(event),
        }
    }
}

type Waiters = HashMap<String, Vec<oneshot::Sender<WatchedEvent>>>;

/// Registrations between full sweeps for dropped watches
pub const PRUNE_EVERY: usize = 64;

/// Watches registered on the current session
#[derive(Debug, Default)]
pub struct WatchRegistry {
    data: Waiters,
    exist: Waiters,
    child: Waiters,
    registered: usize,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn list_mut(&mut self, kind: WatchKind) -> &mut Waiters {
        match kind {
            WatchKind::Data => &mut self.data,
            WatchKind::Exist => &mut self.exist,
            WatchKind::Child => &mut self.child,
        }
    }

    /// Add a watch, dropping registrations on `path` whose `Watch` is gone
    ///
    /// Every [`PRUNE_EVERY`] registrations the whole registry is pruned, so
    /// abandoned watches on nodes that never change do not accumulate.
    pub fn register(&mut self, kind: WatchKind, path: &str, tx: oneshot::Sender<WatchedEvent>) {
        let waiters = self.list_mut(kind).entry(path.to_string()).or_default();
        waiters.retain(|tx| !tx.is_closed());
        waiters.push(tx);

        self.registered += 1;
        if self.registered % PRUNE_EVERY == 0 {
            self.prune();
        }
    }

    /// Deliver a node notification, returning how many watches fired
    pub fn dispatch(&mut self, event: &WatchedEvent) -> usize {
        let kinds: &[WatchKind] = match event.event_type {
            EventType::None => &[],
            EventType::NodeCreated | EventType::NodeDataChanged => {
                &[WatchKind::Data, WatchKind::Exist]
            }
            EventType::NodeDeleted => &[WatchKind::Data, WatchKind::Exist, WatchKind::Child],
            EventType::NodeChildrenChanged => &[WatchKind::Child],
        };

        let mut fired = 0;
        for &kind in kinds {
            let Some(waiters) = self.list_mut(kind).remove(&event.path) else {
                continue;
            };
            for tx in waiters {
                if tx.send(event.clone()).is_ok() {
                    fired += 1;
                }
            }
        }
        fired
    }

    /// Fail every watch with `state`, leaving the registry empty
    pub fn fail_all(&mut self, state: KeeperState) {
        for waiters in [&mut self.data, &mut self.exist, &mut self.child] {
            for (path, txs) in waiters.drain() {
                for tx in txs {
                    let _ = tx.send(WatchedEvent {
                        event_type: EventType::None,
                        state,
                        path: path.clone(),
                    });
                }
            }
        }
    }

    /// Drop registrations whose `Watch` has been dropped
    pub fn prune(&mut self) {
        for waiters in [&mut self.data, &mut self.exist, &mut self.child] {
            waiters.retain(|_, txs| {
                txs.retain(|tx| !tx.is_closed());
                !txs.is_empty()
            });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.exist.is_empty() && self.child.is_empty()
    }

    pub fn len(&self) -> usize {
        [&self.data, &self.exist, &self.child]
            .iter()
            .flat_map(|waiters| waiters.values())
            .map(Vec::len)
            .sum()
    }

    /// Request that re-arms every live watch on a new connection
    pub fn set_watches(&mut self, relative_zxid: i64) -> Option<Request> {
        self.prune();
        if self.is_empty() {
            return None;
        }
        let paths = |waiters: &Waiters| {
            let mut paths: Vec<String> = waiters.keys().cloned().collect();
            paths.sort();
            paths
        };
        Some(Request::SetWatches {
            relative_zxid,
            data: paths(&self.data),
            exist: paths(&self.exist),
            child: paths(&self.child),
        })
    }
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
