// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process ensemble for tests
//!
//! `FakeEnsemble` is a single-server namespace that speaks the real wire
//! protocol over in-memory duplex streams. It implements [`Connector`], so a
//! [`Client`] exercises its full session, retry and watch machinery against
//! it. Faults are injected per request:
//!
//! - `fail_next_requests(n)`: drop the connection before applying the request
//! - `drop_next_responses(n)`: apply the request, then drop the connection
//!   instead of replying
//!
//! Pings, set-watches and close-session requests are never faulted.

use crate::client::Client;
use crate::connector::{BoxTransport, Connector};
use crate::protocol::{
    encode_reply, read_message, write_message, xid, ConnectRequest, ConnectResponse, ReplyHeader,
    Request, RequestHeader, Response,
};
use crate::watch::{EventType, WatchedEvent};
use async_trait::async_trait;
use bytes::BytesMut;
use keeper_core::error::codes;
use keeper_core::{path, ClientConfig, CreateMode, HostPort, KeeperError, Result, RetryConfig, Stat};
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

const DUPLEX_CAPACITY: usize = 64 * 1024;
const FIRST_SESSION_ID: i64 = 0x1_0000;

/// Configuration tuned for tests: short timeouts and fast retries
pub fn test_config() -> ClientConfig {
    ClientConfig::new("fake:2181")
        .with_session_timeout(Duration::from_secs(4))
        .with_connection_timeout(Duration::from_secs(1))
        .with_retry(RetryConfig::NTimes {
            count: 3,
            interval: Duration::from_millis(10),
        })
}

enum Outbound {
    Frame(BytesMut),
    Close,
}

struct Conn {
    id: u64,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Conn {
    fn send(&self, frame: BytesMut) {
        let _ = self.tx.send(Outbound::Frame(frame));
    }

    fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }
}

#[derive(Default)]
struct Watches {
    data: HashSet<String>,
    exist: HashSet<String>,
    child: HashSet<String>,
}

impl Watches {
    fn len(&self) -> usize {
        self.data.len() + self.exist.len() + self.child.len()
    }
}

struct Session {
    passwd: Vec<u8>,
    timeout_ms: i32,
    conn: Option<Conn>,
    watches: Watches,
}

struct Node {
    data: Vec<u8>,
    stat: Stat,
    children: BTreeSet<String>,
}

impl Node {
    fn new(data: Vec<u8>, zxid: i64, owner: i64) -> Self {
        let now = now_ms();
        Self {
            stat: Stat {
                czxid: zxid,
                mzxid: zxid,
                ctime: now,
                mtime: now,
                ephemeral_owner: owner,
                data_length: data.len() as i32,
                pzxid: zxid,
                ..Stat::default()
            },
            data,
            children: BTreeSet::new(),
        }
    }

    fn stat(&self) -> Stat {
        Stat {
            num_children: self.children.len() as i32,
            ..self.stat
        }
    }
}

#[derive(PartialEq, Eq)]
enum Disposition {
    Continue,
    Disconnect,
}

struct Ensemble {
    nodes: BTreeMap<String, Node>,
    sessions: HashMap<i64, Session>,
    zxid: i64,
    next_session: i64,
    next_conn: u64,
    handshakes: usize,
    refuse: bool,
    fail_next: u32,
    drop_next: u32,
}

impl Default for Ensemble {
    fn default() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(path::ROOT.to_string(), Node::new(Vec::new(), 0, 0));
        Self {
            nodes,
            sessions: HashMap::new(),
            zxid: 0,
            next_session: FIRST_SESSION_ID,
            next_conn: 0,
            handshakes: 0,
            refuse: false,
            fail_next: 0,
            drop_next: 0,
        }
    }
}

fn missing(path: &str) -> KeeperError {
    KeeperError::NodeMissing {
        path: path.to_string(),
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn watch_frame(event: &WatchedEvent) -> BytesMut {
    let mut buf = BytesMut::with_capacity(32);
    ReplyHeader {
        xid: xid::WATCH_EVENT,
        zxid: -1,
        err: codes::OK,
    }
    .encode(&mut buf);
    event.to_wire().encode(&mut buf);
    buf
}

impl Ensemble {
    fn accept(
        &mut self,
        request: &ConnectRequest,
        tx: mpsc::UnboundedSender<Outbound>,
    ) -> (ConnectResponse, Option<(i64, u64)>) {
        self.handshakes += 1;
        self.next_conn += 1;
        let conn = Conn {
            id: self.next_conn,
            tx,
        };

        if request.session_id != 0 {
            return match self.sessions.get_mut(&request.session_id) {
                Some(session) if session.passwd == request.passwd => {
                    if let Some(old) = session.conn.replace(conn) {
                        old.close();
                    }
                    session.watches = Watches::default();
                    let response = ConnectResponse {
                        protocol_version: 0,
                        timeout_ms: session.timeout_ms,
                        session_id: request.session_id,
                        passwd: session.passwd.clone(),
                        read_only: false,
                    };
                    (response, Some((request.session_id, self.next_conn)))
                }
                _ => {
                    let response = ConnectResponse {
                        protocol_version: 0,
                        timeout_ms: 0,
                        session_id: 0,
                        passwd: vec![0; 16],
                        read_only: false,
                    };
                    (response, None)
                }
            };
        }

        let session_id = self.next_session;
        self.next_session += 1;
        let passwd = rand::thread_rng().gen::<[u8; 16]>().to_vec();
        let timeout_ms = request.timeout_ms.max(1);
        self.sessions.insert(
            session_id,
            Session {
                passwd: passwd.clone(),
                timeout_ms,
                conn: Some(conn),
                watches: Watches::default(),
            },
        );
        let response = ConnectResponse {
            protocol_version: 0,
            timeout_ms,
            session_id,
            passwd,
            read_only: false,
        };
        (response, Some((session_id, self.next_conn)))
    }

    /// Connection ended; forget it unless a newer one replaced it
    fn detach(&mut self, session_id: i64, conn_id: u64) {
        if let Some(session) = self.sessions.get_mut(&session_id) {
            if session.conn.as_ref().is_some_and(|c| c.id == conn_id) {
                self.drop_connection(session_id);
            }
        }
    }

    fn drop_connection(&mut self, session_id: i64) {
        if let Some(session) = self.sessions.get_mut(&session_id) {
            if let Some(conn) = session.conn.take() {
                conn.close();
            }
            // watches live on the connection; clients re-arm them
            session.watches = Watches::default();
        }
    }

    fn end_session(&mut self, session_id: i64) {
        let owned: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.stat.ephemeral_owner == session_id)
            .map(|(path, _)| path.clone())
            .collect();
        for path in owned.iter().rev() {
            let _ = self.delete_node(path, -1);
        }
        if let Some(session) = self.sessions.remove(&session_id) {
            if let Some(conn) = session.conn {
                conn.close();
            }
        }
    }

    /// Fire and consume the watches a change to `path` triggers
    fn fire(&mut self, path: &str, event_type: EventType) {
        let (data, exist, child) = match event_type {
            EventType::NodeCreated | EventType::NodeDataChanged => (true, true, false),
            EventType::NodeDeleted => (true, true, true),
            EventType::NodeChildrenChanged => (false, false, true),
            EventType::None => return,
        };
        let event = WatchedEvent::node(event_type, path);
        for session in self.sessions.values_mut() {
            let mut hit = false;
            if data {
                hit |= session.watches.data.remove(path);
            }
            if exist {
                hit |= session.watches.exist.remove(path);
            }
            if child {
                hit |= session.watches.child.remove(path);
            }
            if hit {
                if let Some(conn) = &session.conn {
                    conn.send(watch_frame(&event));
                }
            }
        }
    }

    fn send_to(&self, session_id: i64, frame: BytesMut) {
        if let Some(conn) = self
            .sessions
            .get(&session_id)
            .and_then(|s| s.conn.as_ref())
        {
            conn.send(frame);
        }
    }

    fn watches_mut(&mut self, session_id: i64) -> Option<&mut Watches> {
        self.sessions.get_mut(&session_id).map(|s| &mut s.watches)
    }

    fn create_node(
        &mut self,
        session_id: i64,
        path: &str,
        data: Vec<u8>,
        mode: CreateMode,
    ) -> Result<String> {
        path::validate(path, mode.is_sequential())?;
        let Some(parent_path) = path::parent(path) else {
            return Err(KeeperError::NodeExists {
                path: path.to_string(),
            });
        };
        let parent_path = parent_path.to_string();
        let Some(parent) = self.nodes.get(&parent_path) else {
            return Err(KeeperError::NodeMissing {
                path: path.to_string(),
            });
        };
        if parent.stat.is_ephemeral() {
            return Err(KeeperError::NoChildrenForEphemerals {
                path: path.to_string(),
            });
        }

        let actual = if mode.is_sequential() {
            format!(
                "{}{}",
                path,
                path::format_sequence(parent.stat.cversion.max(0) as u64)
            )
        } else {
            path.to_string()
        };
        if self.nodes.contains_key(&actual) {
            return Err(KeeperError::NodeExists { path: actual });
        }

        self.zxid += 1;
        let owner = if mode.is_ephemeral() { session_id } else { 0 };
        self.nodes
            .insert(actual.clone(), Node::new(data, self.zxid, owner));
        if let Some(parent) = self.nodes.get_mut(&parent_path) {
            parent.children.insert(path::node_name(&actual).to_string());
            parent.stat.cversion += 1;
            parent.stat.pzxid = self.zxid;
        }

        self.fire(&actual, EventType::NodeCreated);
        self.fire(&parent_path, EventType::NodeChildrenChanged);
        Ok(actual)
    }

    fn delete_node(&mut self, path: &str, version: i32) -> Result<()> {
        if path == path::ROOT {
            return Err(KeeperError::InvalidPath {
                path: path.to_string(),
                reason: "cannot delete the root",
            });
        }
        let Some(node) = self.nodes.get(path) else {
            return Err(missing(path));
        };
        if version != -1 && version != node.stat.version {
            return Err(KeeperError::VersionConflict {
                path: path.to_string(),
            });
        }
        if !node.children.is_empty() {
            return Err(KeeperError::NotEmpty {
                path: path.to_string(),
            });
        }

        self.zxid += 1;
        self.nodes.remove(path);
        let parent_path = path::parent(path).unwrap_or(path::ROOT).to_string();
        if let Some(parent) = self.nodes.get_mut(&parent_path) {
            parent.children.remove(path::node_name(path));
            parent.stat.cversion += 1;
            parent.stat.pzxid = self.zxid;
        }

        self.fire(path, EventType::NodeDeleted);
        self.fire(&parent_path, EventType::NodeChildrenChanged);
        Ok(())
    }

    fn set_data(&mut self, path: &str, data: Vec<u8>, version: i32) -> Result<Stat> {
        let zxid = self.zxid + 1;
        let Some(node) = self.nodes.get_mut(path) else {
            return Err(missing(path));
        };
        if version != -1 && version != node.stat.version {
            return Err(KeeperError::VersionConflict {
                path: path.to_string(),
            });
        }
        node.stat.data_length = data.len() as i32;
        node.data = data;
        node.stat.version += 1;
        node.stat.mzxid = zxid;
        node.stat.mtime = now_ms();
        let stat = node.stat();
        self.zxid = zxid;

        self.fire(path, EventType::NodeDataChanged);
        Ok(stat)
    }

    /// Re-arm watches from a reconnecting client, firing any it missed
    fn set_watches(
        &mut self,
        session_id: i64,
        relative_zxid: i64,
        data: Vec<String>,
        exist: Vec<String>,
        child: Vec<String>,
    ) {
        let mut missed = Vec::new();
        let mut armed = Watches::default();

        for path in data {
            match self.nodes.get(&path) {
                None => missed.push(WatchedEvent::node(EventType::NodeDeleted, path)),
                Some(node) if node.stat.mzxid > relative_zxid => {
                    missed.push(WatchedEvent::node(EventType::NodeDataChanged, path))
                }
                Some(_) => {
                    armed.data.insert(path);
                }
            }
        }
        for path in exist {
            if self.nodes.contains_key(&path) {
                missed.push(WatchedEvent::node(EventType::NodeCreated, path));
            } else {
                armed.exist.insert(path);
            }
        }
        for path in child {
            match self.nodes.get(&path) {
                None => missed.push(WatchedEvent::node(EventType::NodeDeleted, path)),
                Some(node) if node.stat.pzxid > relative_zxid => {
                    missed.push(WatchedEvent::node(EventType::NodeChildrenChanged, path))
                }
                Some(_) => {
                    armed.child.insert(path);
                }
            }
        }

        for event in &missed {
            self.send_to(session_id, watch_frame(event));
        }
        if let Some(watches) = self.watches_mut(session_id) {
            watches.data.extend(armed.data);
            watches.exist.extend(armed.exist);
            watches.child.extend(armed.child);
        }
    }

    fn handle(&mut self, session_id: i64, conn_id: u64, xid: i32, request: Request) -> Disposition {
        let current = self
            .sessions
            .get(&session_id)
            .and_then(|s| s.conn.as_ref())
            .is_some_and(|c| c.id == conn_id);
        if !current {
            return Disposition::Disconnect;
        }

        let faultable = !matches!(
            request,
            Request::Ping | Request::SetWatches { .. } | Request::CloseSession
        );
        if faultable && self.fail_next > 0 {
            self.fail_next -= 1;
            self.drop_connection(session_id);
            return Disposition::Disconnect;
        }

        let result: Result<Response> = match request {
            Request::Create {
                path, data, mode, ..
            } => self
                .create_node(session_id, &path, data, mode)
                .map(|path| Response::Create { path }),
            Request::Delete { path, version } => {
                self.delete_node(&path, version).map(|()| Response::Empty)
            }
            Request::Exists { path, watch } => {
                let stat = self.nodes.get(&path).map(Node::stat);
                if watch {
                    if let Some(watches) = self.watches_mut(session_id) {
                        match stat {
                            Some(_) => watches.data.insert(path.clone()),
                            None => watches.exist.insert(path.clone()),
                        };
                    }
                }
                stat.map(Response::Stat).ok_or_else(|| missing(&path))
            }
            Request::GetData { path, watch } => match self.nodes.get(&path) {
                Some(node) => {
                    let response = Response::Data {
                        data: node.data.clone(),
                        stat: node.stat(),
                    };
                    if watch {
                        if let Some(watches) = self.watches_mut(session_id) {
                            watches.data.insert(path);
                        }
                    }
                    Ok(response)
                }
                None => Err(missing(&path)),
            },
            Request::SetData {
                path,
                data,
                version,
            } => self.set_data(&path, data, version).map(Response::Stat),
            Request::GetChildren { path, watch } => match self.nodes.get(&path) {
                Some(node) => {
                    let children = node.children.iter().cloned().collect();
                    if watch {
                        if let Some(watches) = self.watches_mut(session_id) {
                            watches.child.insert(path);
                        }
                    }
                    Ok(Response::Children(children))
                }
                None => Err(missing(&path)),
            },
            Request::SetWatches {
                relative_zxid,
                data,
                exist,
                child,
            } => {
                self.set_watches(session_id, relative_zxid, data, exist, child);
                Ok(Response::Empty)
            }
            Request::Ping => Ok(Response::Empty),
            Request::CloseSession => {
                let header = ReplyHeader {
                    xid,
                    zxid: self.zxid,
                    err: codes::OK,
                };
                // reply first so the client sees the ack before the close
                self.send_to(session_id, encode_reply(header, None));
                self.end_session(session_id);
                return Disposition::Disconnect;
            }
        };

        if faultable && self.drop_next > 0 {
            self.drop_next -= 1;
            self.drop_connection(session_id);
            return Disposition::Disconnect;
        }

        let header = ReplyHeader {
            xid,
            zxid: self.zxid,
            err: result.as_ref().err().map_or(codes::OK, KeeperError::code),
        };
        self.send_to(session_id, encode_reply(header, result.ok().as_ref()));
        Disposition::Continue
    }
}

/// In-process ensemble speaking the wire protocol
#[derive(Clone, Default)]
pub struct FakeEnsemble {
    inner: Arc<Mutex<Ensemble>>,
}

impl FakeEnsemble {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Ensemble> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Connect a client with [`test_config`]
    pub async fn client(&self) -> Result<Client> {
        self.client_with(test_config()).await
    }

    pub async fn client_with(&self, config: ClientConfig) -> Result<Client> {
        Client::connect_with(config, Arc::new(self.clone())).await
    }

    /// Refuse new connections while set
    pub fn refuse_connections(&self, refuse: bool) {
        self.lock().refuse = refuse;
    }

    /// Drop the connection instead of applying the next `n` requests
    pub fn fail_next_requests(&self, n: u32) {
        self.lock().fail_next = n;
    }

    /// Apply the next `n` requests but drop the connection instead of replying
    pub fn drop_next_responses(&self, n: u32) {
        self.lock().drop_next = n;
    }

    /// Discard a session as if it timed out, removing its ephemeral nodes
    pub fn expire_session(&self, session_id: i64) {
        self.lock().end_session(session_id);
    }

    /// Drop a session's connection, keeping the session alive
    pub fn disconnect(&self, session_id: i64) {
        self.lock().drop_connection(session_id);
    }

    pub fn exists(&self, path: &str) -> bool {
        self.lock().nodes.contains_key(path)
    }

    pub fn node_data(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().nodes.get(path).map(|node| node.data.clone())
    }

    pub fn stat(&self, path: &str) -> Option<Stat> {
        self.lock().nodes.get(path).map(Node::stat)
    }

    pub fn children(&self, path: &str) -> Vec<String> {
        self.lock()
            .nodes
            .get(path)
            .map(|node| node.children.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Session owning an ephemeral node
    pub fn ephemeral_owner(&self, path: &str) -> Option<i64> {
        self.lock()
            .nodes
            .get(path)
            .map(|node| node.stat.ephemeral_owner)
            .filter(|owner| *owner != 0)
    }

    /// Live sessions, sorted
    pub fn session_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.lock().sessions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Handshakes accepted or rejected so far
    pub fn connection_count(&self) -> usize {
        self.lock().handshakes
    }

    /// Watches the server holds for a session
    pub fn watch_count(&self, session_id: i64) -> usize {
        self.lock()
            .sessions
            .get(&session_id)
            .map(|s| s.watches.len())
            .unwrap_or(0)
    }

    async fn serve(self, stream: DuplexStream) {
        let (mut reader, mut writer) = tokio::io::split(stream);
        let Ok(frame) = read_message(&mut reader).await else {
            return;
        };
        let Ok(request) = ConnectRequest::decode(frame) else {
            return;
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (response, accepted) = self.lock().accept(&request, tx);
        let mut buf = BytesMut::with_capacity(48);
        response.encode(&mut buf);
        if write_message(&mut writer, &buf).await.is_err() {
            return;
        }
        let Some((session_id, conn_id)) = accepted else {
            return;
        };

        tokio::spawn(async move {
            while let Some(outbound) = rx.recv().await {
                match outbound {
                    Outbound::Frame(frame) => {
                        if write_message(&mut writer, &frame).await.is_err() {
                            break;
                        }
                    }
                    Outbound::Close => break,
                }
            }
            let _ = writer.shutdown().await;
        });

        loop {
            let Ok(mut frame) = read_message(&mut reader).await else {
                break;
            };
            let Ok(header) = RequestHeader::decode(&mut frame) else {
                break;
            };
            let Ok(request) = Request::decode(header.op, &mut frame) else {
                break;
            };
            if self.lock().handle(session_id, conn_id, header.xid, request)
                == Disposition::Disconnect
            {
                break;
            }
        }
        self.lock().detach(session_id, conn_id);
    }
}

#[async_trait]
impl Connector for FakeEnsemble {
    async fn connect(&self, _addr: &HostPort) -> io::Result<BoxTransport> {
        if self.lock().refuse {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "fake ensemble refusing connections",
            ));
        }
        let (client, server) = tokio::io::duplex(DUPLEX_CAPACITY);
        tokio::spawn(self.clone().serve(server));
        Ok(Box::new(client))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
