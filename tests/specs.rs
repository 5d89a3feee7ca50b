// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Behavioral specifications for keeper.
//!
//! These tests are black-box: they drive the public client and recipe APIs
//! against an in-process ensemble and observe the namespace it holds.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// node/
#[path = "specs/node/create.rs"]
mod node_create;
#[path = "specs/node/delete.rs"]
mod node_delete;
#[path = "specs/node/ephemeral.rs"]
mod node_ephemeral;
#[path = "specs/node/sequential.rs"]
mod node_sequential;

// lock/
#[path = "specs/lock/mutex.rs"]
mod lock_mutex;
#[path = "specs/lock/read_write.rs"]
mod lock_read_write;

// cache/
#[path = "specs/cache/listener.rs"]
mod cache_listener;
