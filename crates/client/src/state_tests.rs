// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use keeper_core::FakeClock;
use yare::parameterized;

const TIMEOUT: Duration = Duration::from_secs(6);

fn connected(clock: &FakeClock) -> SessionTracker {
    let (tracker, _) = SessionTracker::new(TIMEOUT).transition(
        SessionInput::Established {
            session_id: 42,
            timeout: TIMEOUT,
        },
        clock,
    );
    tracker
}

#[test]
fn first_handshake_emits_connected() {
    let clock = FakeClock::new();
    let (tracker, events) = SessionTracker::new(TIMEOUT).transition(
        SessionInput::Established {
            session_id: 42,
            timeout: Duration::from_secs(4),
        },
        &clock,
    );

    assert_eq!(tracker.state, ConnectionState::Connected);
    assert_eq!(tracker.session_id, 42);
    assert_eq!(tracker.negotiated_timeout, Duration::from_secs(4));
    assert_eq!(events, vec![SessionEvent::Connected { session_id: 42 }]);
}

#[test]
fn loss_suspends_and_resume_reconnects() {
    let clock = FakeClock::new();
    let tracker = connected(&clock);

    let (tracker, events) = tracker.transition(SessionInput::Lost, &clock);
    assert_eq!(tracker.state, ConnectionState::Reconnecting);
    assert_eq!(events, vec![SessionEvent::Suspended]);

    let (tracker, events) = tracker.transition(
        SessionInput::Established {
            session_id: 42,
            timeout: TIMEOUT,
        },
        &clock,
    );
    assert_eq!(tracker.state, ConnectionState::Connected);
    assert_eq!(events, vec![SessionEvent::Reconnected]);
}

#[test]
fn repeated_loss_suspends_once() {
    let clock = FakeClock::new();
    let (tracker, _) = connected(&clock).transition(SessionInput::Lost, &clock);
    let (tracker, events) = tracker.transition(SessionInput::Lost, &clock);
    assert_eq!(tracker.state, ConnectionState::Reconnecting);
    assert!(events.is_empty());
}

#[test]
fn silence_past_timeout_expires_locally() {
    let clock = FakeClock::new();
    let (tracker, _) = connected(&clock).transition(SessionInput::Lost, &clock);

    clock.advance(TIMEOUT);
    let (tracker, events) = tracker.transition(SessionInput::Tick, &clock);
    assert_eq!(tracker.state, ConnectionState::Reconnecting);
    assert!(events.is_empty());

    clock.advance(Duration::from_millis(1));
    let (tracker, events) = tracker.transition(SessionInput::Tick, &clock);
    assert_eq!(tracker.state, ConnectionState::Expired);
    assert_eq!(events, vec![SessionEvent::Expired]);
}

#[test]
fn contact_while_connected_defers_expiry() {
    let clock = FakeClock::new();
    let tracker = connected(&clock);

    clock.advance(TIMEOUT);
    let (tracker, _) = tracker.transition(SessionInput::Heard, &clock);
    let (tracker, _) = tracker.transition(SessionInput::Lost, &clock);

    clock.advance(TIMEOUT / 2);
    let (tracker, events) = tracker.transition(SessionInput::Tick, &clock);
    assert_eq!(tracker.state, ConnectionState::Reconnecting);
    assert!(events.is_empty());
}

#[test]
fn ticks_never_expire_a_connected_session() {
    let clock = FakeClock::new();
    let tracker = connected(&clock);
    clock.advance(TIMEOUT * 10);
    let (tracker, events) = tracker.transition(SessionInput::Tick, &clock);
    assert_eq!(tracker.state, ConnectionState::Connected);
    assert!(events.is_empty());
}

#[test]
fn rejection_expires() {
    let clock = FakeClock::new();
    let (tracker, _) = connected(&clock).transition(SessionInput::Lost, &clock);
    let (tracker, events) = tracker.transition(SessionInput::Rejected, &clock);
    assert_eq!(tracker.state, ConnectionState::Expired);
    assert_eq!(events, vec![SessionEvent::Expired]);
}

#[parameterized(
    expired = { SessionInput::Rejected, ConnectionState::Expired },
    closed = { SessionInput::Close, ConnectionState::Closed },
)]
fn terminal_states_absorb_every_input(terminate: SessionInput, terminal: ConnectionState) {
    let clock = FakeClock::new();
    let (tracker, _) = connected(&clock).transition(terminate, &clock);
    assert_eq!(tracker.state, terminal);

    for input in [
        SessionInput::Established {
            session_id: 1,
            timeout: TIMEOUT,
        },
        SessionInput::Heard,
        SessionInput::Lost,
        SessionInput::Rejected,
        SessionInput::Close,
        SessionInput::Tick,
    ] {
        let (next, events) = tracker.transition(input, &clock);
        assert_eq!(next.state, terminal);
        assert!(events.is_empty());
    }
}

#[test]
fn state_display_names() {
    assert_eq!(ConnectionState::Reconnecting.to_string(), "reconnecting");
    assert!(ConnectionState::Closed.is_terminal());
    assert!(!ConnectionState::Connecting.is_terminal());
}
