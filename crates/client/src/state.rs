// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session state machine
//!
//! The session task feeds connection lifecycle inputs into [`SessionTracker`]
//! and publishes the resulting events. The tracker itself never does I/O, so
//! the expiry rules can be exercised with a fake clock.

use keeper_core::Clock;
use std::fmt;
use std::time::{Duration, Instant};

/// Where the session currently stands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No session yet, first connection attempt in progress
    Connecting,
    Connected,
    /// Session established earlier, connection lost, trying to resume it
    Reconnecting,
    /// The ensemble discarded the session
    Expired,
    /// Closed by the caller
    Closed,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }

    /// No further transitions happen out of a terminal state
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Expired | ConnectionState::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Expired => "expired",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Session lifecycle notifications delivered to subscribers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// First connection established a new session
    Connected { session_id: i64 },
    /// Connection lost; the session may still be alive on the ensemble
    Suspended,
    /// Same session resumed on a new connection
    Reconnected,
    Expired,
    Closed,
}

/// Inputs that drive session transitions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionInput {
    /// Handshake completed with the negotiated timeout
    Established { session_id: i64, timeout: Duration },
    /// Any frame received from the ensemble
    Heard,
    /// Connection dropped or went silent
    Lost,
    /// Ensemble refused to resume the session
    Rejected,
    Close,
    /// Periodic check for local expiry
    Tick,
}

/// Pure session state with its liveness bookkeeping
#[derive(Clone, Debug)]
pub struct SessionTracker {
    pub state: ConnectionState,
    /// Zero until the first handshake completes
    pub session_id: i64,
    pub negotiated_timeout: Duration,
    pub last_contact: Option<Instant>,
}

impl SessionTracker {
    pub fn new(requested_timeout: Duration) -> Self {
        Self {
            state: ConnectionState::Connecting,
            session_id: 0,
            negotiated_timeout: requested_timeout,
            last_contact: None,
        }
    }

    /// Whether the ensemble must have discarded the session by now
    ///
    /// Only meaningful while reconnecting: with no contact for longer than the
    /// negotiated timeout the session cannot have survived.
    pub fn is_locally_expired(&self, clock: &impl Clock) -> bool {
        self.state == ConnectionState::Reconnecting
            && self
                .last_contact
                .is_some_and(|at| clock.since(at) > self.negotiated_timeout)
    }

    /// Pure state transition function
    pub fn transition(
        &self,
        input: SessionInput,
        clock: &impl Clock,
    ) -> (SessionTracker, Vec<SessionEvent>) {
        let mut next = self.clone();
        let mut events = Vec::new();

        if self.state.is_terminal() {
            return (next, events);
        }

        match input {
            SessionInput::Established {
                session_id,
                timeout,
            } => {
                match self.state {
                    ConnectionState::Connecting => {
                        events.push(SessionEvent::Connected { session_id })
                    }
                    ConnectionState::Reconnecting => events.push(SessionEvent::Reconnected),
                    _ => {}
                }
                next.state = ConnectionState::Connected;
                next.session_id = session_id;
                next.negotiated_timeout = timeout;
                next.last_contact = Some(clock.now());
            }
            SessionInput::Heard => {
                if self.state.is_connected() {
                    next.last_contact = Some(clock.now());
                }
            }
            SessionInput::Lost => {
                if self.state.is_connected() {
                    next.state = ConnectionState::Reconnecting;
                    events.push(SessionEvent::Suspended);
                }
            }
            SessionInput::Rejected => {
                next.state = ConnectionState::Expired;
                events.push(SessionEvent::Expired);
            }
            SessionInput::Close => {
                next.state = ConnectionState::Closed;
                events.push(SessionEvent::Closed);
            }
            SessionInput::Tick => {
                if self.is_locally_expired(clock) {
                    next.state = ConnectionState::Expired;
                    events.push(SessionEvent::Expired);
                }
            }
        }

        (next, events)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
