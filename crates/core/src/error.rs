// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared by the client and the recipes

use crate::config::ConfigError;
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the keeper crates
pub type Result<T, E = KeeperError> = std::result::Result<T, E>;

/// Wire error codes of the coordination protocol
pub mod codes {
    pub const OK: i32 = 0;
    pub const SYSTEM_ERROR: i32 = -1;
    pub const CONNECTION_LOSS: i32 = -4;
    pub const MARSHALLING_ERROR: i32 = -5;
    pub const UNIMPLEMENTED: i32 = -6;
    pub const OPERATION_TIMEOUT: i32 = -7;
    pub const BAD_ARGUMENTS: i32 = -8;
    pub const NO_NODE: i32 = -101;
    pub const BAD_VERSION: i32 = -103;
    pub const NO_CHILDREN_FOR_EPHEMERALS: i32 = -108;
    pub const NODE_EXISTS: i32 = -110;
    pub const NOT_EMPTY: i32 = -111;
    pub const SESSION_EXPIRED: i32 = -112;
}

/// Errors surfaced by keeper operations
#[derive(Debug, Error)]
pub enum KeeperError {
    #[error("connection timeout: no ensemble member answered within {0:?}")]
    ConnectionTimeout(Duration),

    #[error("connection to the ensemble was lost")]
    ConnectionLoss,

    #[error("operation timed out")]
    OperationTimeout,

    #[error("session expired")]
    SessionExpired,

    #[error("node already exists: {path}")]
    NodeExists { path: String },

    #[error("node does not exist: {path}")]
    NodeMissing { path: String },

    #[error("version conflict on {path}")]
    VersionConflict { path: String },

    #[error("node has children: {path}")]
    NotEmpty { path: String },

    #[error("ephemeral node cannot have children: {path}")]
    NoChildrenForEphemerals { path: String },

    #[error("timed out waiting for lock under {path}")]
    LockTimeout { path: String },

    #[error("cache for {path} is not running")]
    CacheNotRunning { path: String },

    #[error("cache for {path} was already started")]
    CacheAlreadyStarted { path: String },

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("client is closed")]
    Closed,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("server error {code} on {path}")]
    Server { code: i32, path: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl KeeperError {
    /// Map a non-zero reply code to an error for `path`
    ///
    /// Returns `None` for [`codes::OK`].
    pub fn from_code(code: i32, path: &str) -> Option<Self> {
        let path = path.to_string();
        let err = match code {
            codes::OK => return None,
            codes::CONNECTION_LOSS => KeeperError::ConnectionLoss,
            codes::OPERATION_TIMEOUT => KeeperError::OperationTimeout,
            codes::SESSION_EXPIRED => KeeperError::SessionExpired,
            codes::NO_NODE => KeeperError::NodeMissing { path },
            codes::NODE_EXISTS => KeeperError::NodeExists { path },
            codes::BAD_VERSION => KeeperError::VersionConflict { path },
            codes::NOT_EMPTY => KeeperError::NotEmpty { path },
            codes::NO_CHILDREN_FOR_EPHEMERALS => KeeperError::NoChildrenForEphemerals { path },
            code => KeeperError::Server { code, path },
        };
        Some(err)
    }

    /// Wire code an ensemble replies with for this error
    pub fn code(&self) -> i32 {
        match self {
            KeeperError::ConnectionLoss | KeeperError::ConnectionTimeout(_) => {
                codes::CONNECTION_LOSS
            }
            KeeperError::OperationTimeout => codes::OPERATION_TIMEOUT,
            KeeperError::SessionExpired => codes::SESSION_EXPIRED,
            KeeperError::NodeExists { .. } => codes::NODE_EXISTS,
            KeeperError::NodeMissing { .. } => codes::NO_NODE,
            KeeperError::VersionConflict { .. } => codes::BAD_VERSION,
            KeeperError::NotEmpty { .. } => codes::NOT_EMPTY,
            KeeperError::NoChildrenForEphemerals { .. } => codes::NO_CHILDREN_FOR_EPHEMERALS,
            KeeperError::InvalidPath { .. } | KeeperError::Config(_) => codes::BAD_ARGUMENTS,
            KeeperError::Protocol(_) => codes::MARSHALLING_ERROR,
            KeeperError::Server { code, .. } => *code,
            KeeperError::LockTimeout { .. }
            | KeeperError::CacheNotRunning { .. }
            | KeeperError::CacheAlreadyStarted { .. }
            | KeeperError::Closed
            | KeeperError::Io(_) => codes::SYSTEM_ERROR,
        }
    }

    /// Transient failures that a retry policy may retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KeeperError::ConnectionLoss | KeeperError::OperationTimeout
        )
    }

    /// Failures after which the session can never serve another request
    pub fn is_terminal(&self) -> bool {
        matches!(self, KeeperError::SessionExpired | KeeperError::Closed)
    }

    pub fn is_node_missing(&self) -> bool {
        matches!(self, KeeperError::NodeMissing { .. })
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
