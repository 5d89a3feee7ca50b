// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations

pub mod demo;
pub mod lock;
pub mod node;
pub mod watch;

use keeper_client::{Client, SessionEvent};
use tokio::sync::broadcast::error::RecvError;

/// Resolve once the client's session has ended
pub(crate) async fn session_ended(client: &Client) -> SessionEvent {
    let mut events = client.subscribe();
    if client.state().is_terminal() {
        return SessionEvent::Closed;
    }
    loop {
        match events.recv().await {
            Ok(event @ (SessionEvent::Expired | SessionEvent::Closed)) => return event,
            Ok(_) | Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => return SessionEvent::Closed,
        }
    }
}
