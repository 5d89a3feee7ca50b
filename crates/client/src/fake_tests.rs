// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::protocol::WatcherEvent;
use bytes::Bytes;

fn open_session(ensemble: &mut Ensemble) -> (i64, mpsc::UnboundedReceiver<Outbound>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let request = ConnectRequest {
        protocol_version: 0,
        last_zxid_seen: 0,
        timeout_ms: 10_000,
        session_id: 0,
        passwd: vec![0; 16],
        read_only: false,
    };
    let (response, accepted) = ensemble.accept(&request, tx);
    let (session_id, _) = accepted.unwrap();
    assert_eq!(response.session_id, session_id);
    (session_id, rx)
}

fn next_watch_event(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> WatcherEvent {
    let Ok(Outbound::Frame(frame)) = rx.try_recv() else {
        panic!("expected a frame");
    };
    let mut frame: Bytes = frame.freeze();
    let header = ReplyHeader::decode(&mut frame).unwrap();
    assert_eq!(header.xid, xid::WATCH_EVENT);
    WatcherEvent::decode(&mut frame).unwrap()
}

#[test]
fn sequence_suffix_follows_parent_child_version() {
    let mut ensemble = Ensemble::default();
    let (session, _rx) = open_session(&mut ensemble);
    ensemble
        .create_node(session, "/q", Vec::new(), CreateMode::Persistent)
        .unwrap();

    let first = ensemble
        .create_node(session, "/q/n-", Vec::new(), CreateMode::PersistentSequential)
        .unwrap();
    ensemble.delete_node(&first, -1).unwrap();
    let second = ensemble
        .create_node(session, "/q/n-", Vec::new(), CreateMode::PersistentSequential)
        .unwrap();

    assert_eq!(first, "/q/n-0000000000");
    // deletes bump the child version too, so suffixes never repeat
    assert_eq!(second, "/q/n-0000000002");
}

#[test]
fn create_reports_wire_error_codes() {
    let mut ensemble = Ensemble::default();
    let (session, _rx) = open_session(&mut ensemble);

    assert_eq!(
        ensemble
            .create_node(session, "/a/b", Vec::new(), CreateMode::Persistent)
            .unwrap_err()
            .code(),
        codes::NO_NODE
    );
    ensemble
        .create_node(session, "/e", Vec::new(), CreateMode::Ephemeral)
        .unwrap();
    assert_eq!(
        ensemble
            .create_node(session, "/e", Vec::new(), CreateMode::Persistent)
            .unwrap_err()
            .code(),
        codes::NODE_EXISTS
    );
    assert_eq!(
        ensemble
            .create_node(session, "/e/c", Vec::new(), CreateMode::Persistent)
            .unwrap_err()
            .code(),
        codes::NO_CHILDREN_FOR_EPHEMERALS
    );
    assert_eq!(
        ensemble
            .create_node(session, "bad", Vec::new(), CreateMode::Persistent)
            .unwrap_err()
            .code(),
        codes::BAD_ARGUMENTS
    );
}

#[test]
fn delete_and_set_report_wire_error_codes() {
    let mut ensemble = Ensemble::default();
    let (session, _rx) = open_session(&mut ensemble);
    ensemble
        .create_node(session, "/p", Vec::new(), CreateMode::Persistent)
        .unwrap();
    ensemble
        .create_node(session, "/p/c", Vec::new(), CreateMode::Persistent)
        .unwrap();

    let code = |err: KeeperError| err.code();
    assert_eq!(code(ensemble.delete_node("/p", -1).unwrap_err()), codes::NOT_EMPTY);
    assert_eq!(code(ensemble.delete_node("/p/c", 7).unwrap_err()), codes::BAD_VERSION);
    assert_eq!(code(ensemble.delete_node("/none", -1).unwrap_err()), codes::NO_NODE);
    assert_eq!(
        code(ensemble.set_data("/p/c", Vec::new(), 3).unwrap_err()),
        codes::BAD_VERSION
    );
    assert_eq!(
        code(ensemble.set_data("/none", Vec::new(), -1).unwrap_err()),
        codes::NO_NODE
    );
}

#[test]
fn ending_a_session_removes_its_ephemerals() {
    let mut ensemble = Ensemble::default();
    let (mine, _rx1) = open_session(&mut ensemble);
    let (other, _rx2) = open_session(&mut ensemble);
    ensemble
        .create_node(mine, "/mine", Vec::new(), CreateMode::Ephemeral)
        .unwrap();
    ensemble
        .create_node(other, "/theirs", Vec::new(), CreateMode::Ephemeral)
        .unwrap();

    ensemble.end_session(mine);

    assert!(!ensemble.nodes.contains_key("/mine"));
    assert!(ensemble.nodes.contains_key("/theirs"));
    assert!(!ensemble.sessions.contains_key(&mine));
}

#[test]
fn watches_fire_once_across_sessions() {
    let mut ensemble = Ensemble::default();
    let (writer, _wrx) = open_session(&mut ensemble);
    let (watcher, mut rx) = open_session(&mut ensemble);
    ensemble
        .create_node(writer, "/w", Vec::new(), CreateMode::Persistent)
        .unwrap();
    ensemble.watches_mut(watcher).unwrap().data.insert("/w".to_string());

    ensemble.set_data("/w", b"x".to_vec(), -1).unwrap();
    ensemble.set_data("/w", b"y".to_vec(), -1).unwrap();

    let event = next_watch_event(&mut rx);
    assert_eq!(event.event_type, EventType::NodeDataChanged.as_i32());
    assert_eq!(event.path, "/w");
    assert!(rx.try_recv().is_err());
}

#[test]
fn set_watches_reports_missed_changes() {
    let mut ensemble = Ensemble::default();
    let (session, mut rx) = open_session(&mut ensemble);
    ensemble
        .create_node(session, "/stale", Vec::new(), CreateMode::Persistent)
        .unwrap();
    let seen = ensemble.zxid;
    ensemble.set_data("/stale", b"new".to_vec(), -1).unwrap();
    ensemble
        .create_node(session, "/quiet", Vec::new(), CreateMode::Persistent)
        .unwrap();
    let quiet_zxid = ensemble.zxid;

    ensemble.set_watches(
        session,
        seen,
        vec!["/stale".to_string(), "/gone".to_string()],
        vec!["/quiet".to_string()],
        vec![],
    );

    let mut events: Vec<(i32, String)> = (0..3)
        .map(|_| {
            let event = next_watch_event(&mut rx);
            (event.event_type, event.path)
        })
        .collect();
    events.sort();
    assert_eq!(
        events,
        vec![
            (EventType::NodeCreated.as_i32(), "/quiet".to_string()),
            (EventType::NodeDeleted.as_i32(), "/gone".to_string()),
            (EventType::NodeDataChanged.as_i32(), "/stale".to_string()),
        ]
    );
    assert!(quiet_zxid > seen);
    assert_eq!(ensemble.watches_mut(session).unwrap().len(), 0);
}

#[test]
fn set_watches_arms_unchanged_paths() {
    let mut ensemble = Ensemble::default();
    let (session, mut rx) = open_session(&mut ensemble);
    ensemble
        .create_node(session, "/same", Vec::new(), CreateMode::Persistent)
        .unwrap();

    ensemble.set_watches(
        session,
        ensemble.zxid,
        vec!["/same".to_string()],
        vec!["/absent".to_string()],
        vec!["/same".to_string()],
    );

    assert!(rx.try_recv().is_err());
    assert_eq!(ensemble.watches_mut(session).unwrap().len(), 3);
}

#[test]
fn resuming_with_a_bad_password_is_rejected() {
    let mut ensemble = Ensemble::default();
    let (session, _rx) = open_session(&mut ensemble);
    let (tx, _rx2) = mpsc::unbounded_channel();
    let request = ConnectRequest {
        protocol_version: 0,
        last_zxid_seen: 0,
        timeout_ms: 10_000,
        session_id: session,
        passwd: vec![0xff; 16],
        read_only: false,
    };

    let (response, accepted) = ensemble.accept(&request, tx);
    assert!(response.is_expired());
    assert!(accepted.is_none());
}
