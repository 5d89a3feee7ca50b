// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! keeper-client: session-based client for a coordination ensemble
//!
//! A [`Client`] owns one session. A background task keeps the session's
//! connection alive, fails over between ensemble members, and re-arms
//! watches after a reconnect. Path operations retry transient failures under
//! the configured retry policy.

mod client;
pub mod connector;
mod ops;
pub mod protocol;
mod session;
pub mod state;
pub mod watch;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use client::Client;
pub use connector::{Connector, TcpConnector, TracedConnector};
pub use ops::{protection_id, CreateOptions, DeleteOptions};
pub use session::SessionStatus;
pub use state::{ConnectionState, SessionEvent};
pub use watch::{EventType, KeeperState, Watch, WatchedEvent};

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeEnsemble;
