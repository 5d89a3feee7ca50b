// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! keeper-recipes: coordination recipes built on a keeper session
//!
//! - [`NodeCache`] mirrors one node locally and notifies listeners on change
//! - [`InterProcessMutex`], [`InterProcessReadWriteLock`] and
//!   [`InterProcessSemaphore`] are fair, sequence-ordered locks

pub mod cache;
pub mod lock;

pub use cache::{ChildData, ListenerId, NodeCache, NodeCacheListener};
pub use lock::{
    Decision, InterProcessMutex, InterProcessReadWriteLock, InterProcessSemaphore, LockDriver,
    LockHandle, LockState, ReadLockDriver, StandardLockDriver, WriteLockDriver,
};
