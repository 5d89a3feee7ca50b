// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Acquisition rules for sequence-ordered locks
//!
//! Every contender creates an ephemeral-sequential node under the lock path.
//! A driver looks at the siblings, sorted by sequence number, and decides
//! whether a contender holds the lock or which sibling it must wait on.
//! Exclusive waiters watch only their predecessor, so a release wakes a
//! single waiter.

use keeper_core::{path, KeeperError, Result};

/// Node name used by the read side of a read-write lock
pub const READ_LOCK_NAME: &str = "__READ__";

/// Node name used by the write side of a read-write lock
pub const WRITE_LOCK_NAME: &str = "__WRIT__";

/// Outcome of evaluating one contender against its siblings
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Acquired,
    /// Wait for the named sibling to go away, then evaluate again
    Wait { watch: String },
}

/// Rules deciding who holds a lock
pub trait LockDriver: Send + Sync + 'static {
    /// Name of the nodes this driver creates, before the sequence suffix
    fn lock_name(&self) -> &str;

    /// Whether `name` takes part in this lock's queue
    fn participates(&self, name: &str) -> bool;

    /// Decide for `ours` given participants sorted by sequence number
    fn decide(&self, siblings: &[String], ours: &str) -> Result<Decision>;

    /// Whether a waiter must watch the whole queue instead of one sibling
    ///
    /// Needed when the release of any of several holders can admit it.
    fn watches_queue(&self) -> bool {
        false
    }
}

/// Participants among `children`, sorted by sequence number
///
/// Names without a sequence suffix are ignored.
pub fn sort_participants(driver: &dyn LockDriver, children: Vec<String>) -> Vec<String> {
    let mut participants: Vec<(u64, String)> = children
        .into_iter()
        .filter(|name| driver.participates(name))
        .filter_map(|name| path::sequence(&name).map(|seq| (seq, name)))
        .collect();
    participants.sort();
    participants.into_iter().map(|(_, name)| name).collect()
}

fn position(siblings: &[String], ours: &str) -> Result<usize> {
    siblings
        .iter()
        .position(|name| name == ours)
        .ok_or_else(|| KeeperError::NodeMissing {
            path: ours.to_string(),
        })
}

fn is_named(name: &str, lock_name: &str) -> bool {
    path::unprotected(name).starts_with(lock_name)
}

/// The lowest `max_leases` contenders hold the lock
///
/// With one lease this is an exclusive mutex and a waiter watches its
/// predecessor. With more, any holder's release can admit a waiter, so
/// waiters watch the queue; `Wait` then names the holder `max_leases` places
/// ahead.
#[derive(Clone, Debug)]
pub struct StandardLockDriver {
    name: String,
    max_leases: usize,
}

impl StandardLockDriver {
    pub fn new(name: impl Into<String>, max_leases: usize) -> Self {
        Self {
            name: name.into(),
            max_leases: max_leases.max(1),
        }
    }

    pub fn mutex() -> Self {
        Self::new("lock-", 1)
    }

    pub fn max_leases(&self) -> usize {
        self.max_leases
    }
}

impl LockDriver for StandardLockDriver {
    fn lock_name(&self) -> &str {
        &self.name
    }

    fn participates(&self, name: &str) -> bool {
        is_named(name, &self.name)
    }

    fn decide(&self, siblings: &[String], ours: &str) -> Result<Decision> {
        let index = position(siblings, ours)?;
        if index < self.max_leases {
            return Ok(Decision::Acquired);
        }
        Ok(Decision::Wait {
            watch: siblings[index - self.max_leases].clone(),
        })
    }

    fn watches_queue(&self) -> bool {
        self.max_leases > 1
    }
}

/// Readers share the lock until a writer queued ahead of them
#[derive(Clone, Copy, Debug, Default)]
pub struct ReadLockDriver;

impl LockDriver for ReadLockDriver {
    fn lock_name(&self) -> &str {
        READ_LOCK_NAME
    }

    fn participates(&self, name: &str) -> bool {
        is_named(name, READ_LOCK_NAME) || is_named(name, WRITE_LOCK_NAME)
    }

    fn decide(&self, siblings: &[String], ours: &str) -> Result<Decision> {
        let index = position(siblings, ours)?;
        // writers hold in queue order, so the nearest one ahead goes last
        let writer = siblings[..index]
            .iter()
            .rev()
            .find(|name| is_named(name, WRITE_LOCK_NAME));
        Ok(match writer {
            Some(writer) => Decision::Wait {
                watch: writer.clone(),
            },
            None => Decision::Acquired,
        })
    }
}

/// Writers hold the lock alone, behind every earlier reader and writer
#[derive(Clone, Copy, Debug, Default)]
pub struct WriteLockDriver;

impl LockDriver for WriteLockDriver {
    fn lock_name(&self) -> &str {
        WRITE_LOCK_NAME
    }

    fn participates(&self, name: &str) -> bool {
        is_named(name, READ_LOCK_NAME) || is_named(name, WRITE_LOCK_NAME)
    }

    fn decide(&self, siblings: &[String], ours: &str) -> Result<Decision> {
        let index = position(siblings, ours)?;
        Ok(match index.checked_sub(1) {
            Some(ahead) => Decision::Wait {
                watch: siblings[ahead].clone(),
            },
            None => Decision::Acquired,
        })
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
