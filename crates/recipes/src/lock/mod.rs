// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fair distributed locks
//!
//! Contenders queue as ephemeral-sequential nodes under a lock path and are
//! admitted strictly in sequence order. Locks are not reentrant: every
//! `acquire` joins the queue with a new node.

mod driver;
mod handle;
mod internals;
mod mutex;
mod rwlock;
mod semaphore;

pub use driver::{
    sort_participants, Decision, LockDriver, ReadLockDriver, StandardLockDriver, WriteLockDriver,
    READ_LOCK_NAME, WRITE_LOCK_NAME,
};
pub use handle::{LockHandle, LockState};
pub use mutex::InterProcessMutex;
pub use rwlock::InterProcessReadWriteLock;
pub use semaphore::InterProcessSemaphore;

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
