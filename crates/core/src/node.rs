// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node model: create modes, metadata and access control

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a node is created
///
/// Sequential modes append a ten digit, monotonically increasing suffix to the
/// requested name. Ephemeral nodes are removed when the creating session ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreateMode {
    #[default]
    Persistent,
    PersistentSequential,
    Ephemeral,
    EphemeralSequential,
}

impl CreateMode {
    // wire flags: bit 0 = ephemeral, bit 1 = sequential
    const EPHEMERAL_FLAG: i32 = 1;
    const SEQUENTIAL_FLAG: i32 = 2;

    pub fn is_ephemeral(self) -> bool {
        matches!(self, CreateMode::Ephemeral | CreateMode::EphemeralSequential)
    }

    pub fn is_sequential(self) -> bool {
        matches!(
            self,
            CreateMode::PersistentSequential | CreateMode::EphemeralSequential
        )
    }

    /// Flags value sent in a create request
    pub fn flags(self) -> i32 {
        let mut flags = 0;
        if self.is_ephemeral() {
            flags |= Self::EPHEMERAL_FLAG;
        }
        if self.is_sequential() {
            flags |= Self::SEQUENTIAL_FLAG;
        }
        flags
    }

    pub fn from_flags(flags: i32) -> Option<Self> {
        match flags {
            0 => Some(CreateMode::Persistent),
            1 => Some(CreateMode::Ephemeral),
            2 => Some(CreateMode::PersistentSequential),
            3 => Some(CreateMode::EphemeralSequential),
            _ => None,
        }
    }
}

impl fmt::Display for CreateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CreateMode::Persistent => "persistent",
            CreateMode::PersistentSequential => "persistent-sequential",
            CreateMode::Ephemeral => "ephemeral",
            CreateMode::EphemeralSequential => "ephemeral-sequential",
        };
        f.write_str(name)
    }
}

impl FromStr for CreateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "persistent" => Ok(CreateMode::Persistent),
            "persistent-sequential" => Ok(CreateMode::PersistentSequential),
            "ephemeral" => Ok(CreateMode::Ephemeral),
            "ephemeral-sequential" => Ok(CreateMode::EphemeralSequential),
            other => Err(format!("unknown create mode: {}", other)),
        }
    }
}

/// Metadata the ensemble keeps for every node
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    /// Transaction that created the node
    pub czxid: i64,
    /// Transaction that last modified the node's data
    pub mzxid: i64,
    /// Creation time, milliseconds since the epoch
    pub ctime: i64,
    /// Last modification time, milliseconds since the epoch
    pub mtime: i64,
    /// Number of data changes
    pub version: i32,
    /// Number of child list changes
    pub cversion: i32,
    /// Number of ACL changes
    pub aversion: i32,
    /// Owning session for ephemeral nodes, 0 otherwise
    pub ephemeral_owner: i64,
    pub data_length: i32,
    pub num_children: i32,
    /// Transaction that last modified the child list
    pub pzxid: i64,
}

impl Stat {
    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral_owner != 0
    }
}

/// A single access control entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acl {
    pub perms: i32,
    pub scheme: String,
    pub id: String,
}

impl Acl {
    pub const PERM_ALL: i32 = 0x1f;

    /// `world:anyone` with every permission
    pub fn open_unsafe() -> Vec<Acl> {
        vec![Acl {
            perms: Self::PERM_ALL,
            scheme: "world".to_string(),
            id: "anyone".to_string(),
        }]
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
