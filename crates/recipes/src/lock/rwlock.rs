// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::driver::{ReadLockDriver, WriteLockDriver};
use super::mutex::InterProcessMutex;
use keeper_client::Client;
use std::sync::Arc;

/// Shared/exclusive lock over a single lock path
///
/// Readers and writers share one queue. A reader is admitted once no writer
/// is queued ahead of it; a writer once it is first in line. Neither side
/// gets priority beyond its place in the queue.
#[derive(Clone, Debug)]
pub struct InterProcessReadWriteLock {
    read: InterProcessMutex,
    write: InterProcessMutex,
}

impl InterProcessReadWriteLock {
    pub fn new(client: Client, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            read: InterProcessMutex::with_driver(client.clone(), path.clone(), Arc::new(ReadLockDriver)),
            write: InterProcessMutex::with_driver(client, path, Arc::new(WriteLockDriver)),
        }
    }

    pub fn read_lock(&self) -> &InterProcessMutex {
        &self.read
    }

    pub fn write_lock(&self) -> &InterProcessMutex {
        &self.write
    }
}
