// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! keeper-core: shared model for the keeper coordination client
//!
//! This crate provides:
//! - Znode paths, create modes and node metadata (`Stat`)
//! - The error taxonomy shared by the client and the recipes
//! - Pluggable retry policies
//! - Client configuration loaded from TOML and the environment
//! - A clock abstraction for testable session liveness tracking

pub mod clock;
pub mod config;
pub mod error;
pub mod node;
pub mod path;
pub mod retry;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ClientConfig, ConfigError, HostPort, RetryConfig};
pub use error::{KeeperError, Result};
pub use node::{Acl, CreateMode, Stat};
pub use retry::{
    ExponentialBackoffRetry, RetryForever, RetryNTimes, RetryOneTime, RetryPolicy,
    RetryUntilElapsed,
};
