// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection task
//!
//! A single task owns the connection to the ensemble. It performs the
//! handshake, multiplexes requests by xid, keeps the session alive with pings,
//! routes watch notifications, and reconnects to the next ensemble member
//! when the connection drops. Callers talk to it through [`Command`]s.

use crate::connector::{BoxTransport, Connector};
use crate::protocol::{
    encode_request, read_message, write_message, xid, ConnectRequest, ConnectResponse, OpCode,
    ProtocolError, ReplyHeader, Request, Response, WatcherEvent,
};
use crate::state::{ConnectionState, SessionEvent, SessionInput, SessionTracker};
use crate::watch::{EventType, KeeperState, WatchKind, WatchRegistry, WatchedEvent};
use bytes::{Bytes, BytesMut};
use keeper_core::error::codes;
use keeper_core::{ClientConfig, HostPort, KeeperError, Result, SystemClock};
use rand::Rng;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::WriteHalf;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;

const BACKOFF_MIN: Duration = Duration::from_millis(50);
const BACKOFF_MAX: Duration = Duration::from_secs(1);

/// How long close waits for the ensemble to acknowledge closeSession
const CLOSE_GRACE: Duration = Duration::from_secs(1);

const PASSWD_LEN: usize = 16;

type Writer = WriteHalf<BoxTransport>;
type Frames = mpsc::Receiver<std::result::Result<Bytes, ProtocolError>>;

/// Requests from client handles to the connection task
pub(crate) enum Command {
    Submit {
        request: Request,
        watcher: Option<oneshot::Sender<WatchedEvent>>,
        reply: oneshot::Sender<Result<Response>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Snapshot of the session published to client handles
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: ConnectionState,
    pub session_id: i64,
}

impl From<ProtocolError> for KeeperError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Truncated | ProtocolError::Malformed(_) => {
                KeeperError::Protocol(err.to_string())
            }
            ProtocolError::FrameTooLarge(_) => KeeperError::Protocol(err.to_string()),
            ProtocolError::Io(_) | ProtocolError::ConnectionClosed => KeeperError::ConnectionLoss,
        }
    }
}

/// Ensemble members tried round-robin from a random starting point
struct HostRing {
    hosts: Vec<HostPort>,
    next: usize,
}

impl HostRing {
    fn new(hosts: Vec<HostPort>) -> Self {
        let next = if hosts.len() > 1 {
            rand::thread_rng().gen_range(0..hosts.len())
        } else {
            0
        };
        Self { hosts, next }
    }

    fn next(&mut self) -> Option<HostPort> {
        let host = self.hosts.get(self.next % self.hosts.len().max(1))?.clone();
        self.next = self.next.wrapping_add(1);
        Some(host)
    }
}

/// Why the task stopped serving
enum Exit {
    Closed(Option<oneshot::Sender<()>>),
    Expired,
}

/// How a served connection ended
enum Outcome {
    Lost,
    Exit(Exit),
}

/// In-flight request awaiting its reply
struct Pending {
    op: OpCode,
    path: String,
    watcher: Option<oneshot::Sender<WatchedEvent>>,
    reply: oneshot::Sender<Result<Response>>,
}

enum Step {
    Frame(Option<std::result::Result<Bytes, ProtocolError>>),
    Command(Option<Command>),
    Timer,
}

pub(crate) struct SessionTask {
    config: ClientConfig,
    hosts: HostRing,
    connector: Arc<dyn Connector>,
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<SessionStatus>,
    events: broadcast::Sender<SessionEvent>,
    tracker: SessionTracker,
    clock: SystemClock,
    watches: WatchRegistry,
    passwd: Vec<u8>,
    last_zxid: i64,
    next_xid: i32,
}

impl SessionTask {
    pub(crate) fn new(
        config: ClientConfig,
        hosts: Vec<HostPort>,
        connector: Arc<dyn Connector>,
        commands: mpsc::UnboundedReceiver<Command>,
        status: watch::Sender<SessionStatus>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let tracker = SessionTracker::new(config.session_timeout);
        Self {
            config,
            hosts: HostRing::new(hosts),
            connector,
            commands,
            status,
            events,
            tracker,
            clock: SystemClock,
            watches: WatchRegistry::new(),
            passwd: vec![0; PASSWD_LEN],
            last_zxid: 0,
            next_xid: 1,
        }
    }

    pub(crate) async fn run(mut self) {
        let exit = loop {
            let transport = match self.establish().await {
                Ok(transport) => transport,
                Err(exit) => break exit,
            };
            match self.serve(transport).await {
                Outcome::Lost => continue,
                Outcome::Exit(exit) => break exit,
            }
        };

        let terminal = match exit {
            Exit::Closed(reply) => {
                self.apply(SessionInput::Close);
                self.watches.fail_all(KeeperState::Closed);
                if let Some(reply) = reply {
                    let _ = reply.send(());
                }
                KeeperError::Closed
            }
            Exit::Expired => {
                self.apply(SessionInput::Rejected);
                self.watches.fail_all(KeeperState::Expired);
                KeeperError::SessionExpired
            }
        };

        // anything queued behind the exit gets the terminal error
        self.commands.close();
        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Submit { reply, .. } => {
                    let _ = reply.send(Err(clone_terminal(&terminal)));
                }
                Command::Close { reply } => {
                    let _ = reply.send(());
                }
            }
        }
    }

    fn apply(&mut self, input: SessionInput) {
        let (next, events) = self.tracker.transition(input, &self.clock);
        self.tracker = next;
        self.status.send_replace(SessionStatus {
            state: self.tracker.state,
            session_id: self.tracker.session_id,
        });
        for event in events {
            tracing::info!(
                session_id = %format!("{:#x}", self.tracker.session_id),
                ?event,
                "session event"
            );
            let _ = self.events.send(event);
        }
    }

    fn next_xid(&mut self) -> i32 {
        let xid = self.next_xid;
        self.next_xid = match self.next_xid.checked_add(1) {
            Some(next) => next,
            None => 1,
        };
        xid
    }

    /// Run `fut` while answering commands that arrive without a connection
    async fn offline<F: Future>(&mut self, fut: F) -> std::result::Result<F::Output, Exit> {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                output = &mut fut => return Ok(output),
                command = self.commands.recv() => match command {
                    Some(Command::Submit { reply, .. }) => {
                        let _ = reply.send(Err(KeeperError::ConnectionLoss));
                    }
                    Some(Command::Close { reply }) => return Err(Exit::Closed(Some(reply))),
                    None => return Err(Exit::Closed(None)),
                },
            }
        }
    }

    /// Connect and handshake with the next ensemble member until one accepts
    async fn establish(&mut self) -> std::result::Result<BoxTransport, Exit> {
        let mut backoff = BACKOFF_MIN;
        loop {
            self.apply(SessionInput::Tick);
            if self.tracker.state == ConnectionState::Expired {
                return Err(Exit::Expired);
            }

            let Some(addr) = self.hosts.next() else {
                return Err(Exit::Closed(None));
            };
            let request = ConnectRequest {
                protocol_version: 0,
                last_zxid_seen: self.last_zxid,
                timeout_ms: self.config.session_timeout.as_millis().min(i32::MAX as u128) as i32,
                session_id: self.tracker.session_id,
                passwd: self.passwd.clone(),
                read_only: false,
            };
            let attempt = handshake(
                Arc::clone(&self.connector),
                addr.clone(),
                request,
                self.config.connection_timeout,
            );

            match self.offline(attempt).await? {
                Ok((_, response)) if response.is_expired() => {
                    tracing::warn!(%addr, "ensemble rejected the session");
                    return Err(Exit::Expired);
                }
                Ok((transport, response)) => {
                    self.passwd = response.passwd;
                    self.apply(SessionInput::Established {
                        session_id: response.session_id,
                        timeout: Duration::from_millis(response.timeout_ms as u64),
                    });
                    tracing::debug!(
                        %addr,
                        timeout_ms = response.timeout_ms,
                        "connection established"
                    );
                    return Ok(transport);
                }
                Err(e) => {
                    tracing::debug!(%addr, error = %e, "connection attempt failed");
                    let jitter = rand::thread_rng().gen_range(0..=backoff.as_millis() as u64 / 2);
                    let delay = backoff + Duration::from_millis(jitter);
                    self.offline(tokio::time::sleep(delay)).await?;
                    backoff = (backoff * 2).min(BACKOFF_MAX);
                }
            }
        }
    }

    /// Serve one established connection until it is lost or the session ends
    async fn serve(&mut self, transport: BoxTransport) -> Outcome {
        let (mut reader, mut writer) = tokio::io::split(transport);
        let (frame_tx, mut frames) = mpsc::channel(64);
        let reader_task = tokio::spawn(async move {
            loop {
                let frame = read_message(&mut reader).await;
                let failed = frame.is_err();
                if frame_tx.send(frame).await.is_err() || failed {
                    break;
                }
            }
        });

        let mut pending = HashMap::new();
        let outcome = self.exchange(&mut writer, &mut frames, &mut pending).await;
        reader_task.abort();

        let error = match &outcome {
            Outcome::Lost => {
                tracing::warn!(in_flight = pending.len(), "connection lost");
                self.apply(SessionInput::Lost);
                KeeperError::ConnectionLoss
            }
            Outcome::Exit(Exit::Expired) => KeeperError::SessionExpired,
            Outcome::Exit(Exit::Closed(_)) => KeeperError::Closed,
        };
        for (_, request) in pending.drain() {
            let _ = request.reply.send(Err(clone_terminal(&error)));
        }
        outcome
    }

    async fn exchange(
        &mut self,
        writer: &mut Writer,
        frames: &mut Frames,
        pending: &mut HashMap<i32, Pending>,
    ) -> Outcome {
        let timeout = self.tracker.negotiated_timeout;
        let ping_interval = timeout / 3;
        let read_timeout = timeout * 2 / 3;
        let mut last_sent = Instant::now();
        let mut last_heard = Instant::now();

        if let Some(request) = self.watches.set_watches(self.last_zxid) {
            tracing::debug!(watches = self.watches.len(), "re-arming watches");
            if send(writer, xid::SET_WATCHES, &request).await.is_err() {
                return Outcome::Lost;
            }
            last_sent = Instant::now();
        }

        loop {
            let deadline = (last_sent + ping_interval).min(last_heard + read_timeout);
            let step = tokio::select! {
                frame = frames.recv() => Step::Frame(frame),
                command = self.commands.recv() => Step::Command(command),
                _ = tokio::time::sleep_until(deadline) => Step::Timer,
            };

            match step {
                Step::Frame(Some(Ok(frame))) => {
                    last_heard = Instant::now();
                    self.apply(SessionInput::Heard);
                    if let Err(e) = self.handle_frame(frame, pending) {
                        tracing::warn!(error = %e, "bad frame from ensemble");
                        return Outcome::Lost;
                    }
                }
                Step::Frame(Some(Err(e))) => {
                    tracing::debug!(error = %e, "read failed");
                    return Outcome::Lost;
                }
                Step::Frame(None) => return Outcome::Lost,
                Step::Command(Some(Command::Submit {
                    request,
                    watcher,
                    reply,
                })) => {
                    let xid = self.next_xid();
                    tracing::trace!(xid, op = request.op().name(), path = request.path(), "send");
                    if send(writer, xid, &request).await.is_err() {
                        let _ = reply.send(Err(KeeperError::ConnectionLoss));
                        return Outcome::Lost;
                    }
                    last_sent = Instant::now();
                    pending.insert(
                        xid,
                        Pending {
                            op: request.op(),
                            path: request.path().to_string(),
                            watcher,
                            reply,
                        },
                    );
                }
                Step::Command(Some(Command::Close { reply })) => {
                    self.close_session(writer, frames).await;
                    return Outcome::Exit(Exit::Closed(Some(reply)));
                }
                Step::Command(None) => {
                    self.close_session(writer, frames).await;
                    return Outcome::Exit(Exit::Closed(None));
                }
                Step::Timer => {
                    let now = Instant::now();
                    if now >= last_heard + read_timeout {
                        tracing::warn!(
                            silent_ms = now.duration_since(last_heard).as_millis() as u64,
                            "no response from ensemble"
                        );
                        return Outcome::Lost;
                    }
                    if now >= last_sent + ping_interval {
                        tracing::trace!("ping");
                        if send(writer, xid::PING, &Request::Ping).await.is_err() {
                            return Outcome::Lost;
                        }
                        last_sent = now;
                    }
                }
            }
        }
    }

    fn handle_frame(
        &mut self,
        mut frame: Bytes,
        pending: &mut HashMap<i32, Pending>,
    ) -> std::result::Result<(), ProtocolError> {
        let header = ReplyHeader::decode(&mut frame)?;
        if header.zxid > self.last_zxid {
            self.last_zxid = header.zxid;
        }

        match header.xid {
            xid::PING | xid::SET_WATCHES => {}
            xid::WATCH_EVENT => {
                let wire = WatcherEvent::decode(&mut frame)?;
                let Some(event) = WatchedEvent::from_wire(wire) else {
                    return Err(ProtocolError::Malformed("unknown watch event".to_string()));
                };
                if event.event_type != EventType::None {
                    let fired = self.watches.dispatch(&event);
                    tracing::debug!(path = %event.path, kind = ?event.event_type, fired, "watch event");
                }
            }
            xid => {
                let Some(request) = pending.remove(&xid) else {
                    tracing::debug!(xid, "reply for unknown request");
                    return Ok(());
                };
                let result = match KeeperError::from_code(header.err, &request.path) {
                    Some(err) => {
                        // exists on a missing node still arms a watch for its creation
                        if header.err == codes::NO_NODE && request.op == OpCode::Exists {
                            if let Some(watcher) = request.watcher {
                                self.watches.register(WatchKind::Exist, &request.path, watcher);
                            }
                        }
                        Err(err)
                    }
                    None => {
                        let response = Response::decode(request.op, &mut frame)?;
                        if let Some(watcher) = request.watcher {
                            let kind = match request.op {
                                OpCode::GetChildren => WatchKind::Child,
                                _ => WatchKind::Data,
                            };
                            self.watches.register(kind, &request.path, watcher);
                        }
                        Ok(response)
                    }
                };
                let _ = request.reply.send(result);
            }
        }
        Ok(())
    }

    /// Ask the ensemble to end the session and wait briefly for the ack
    async fn close_session(&mut self, writer: &mut Writer, frames: &mut Frames) {
        let close_xid = self.next_xid();
        if send(writer, close_xid, &Request::CloseSession).await.is_err() {
            return;
        }
        let acked = tokio::time::timeout(CLOSE_GRACE, async {
            while let Some(Ok(mut frame)) = frames.recv().await {
                if ReplyHeader::decode(&mut frame).is_ok_and(|h| h.xid == close_xid) {
                    return true;
                }
            }
            false
        })
        .await;
        tracing::debug!(acked = matches!(acked, Ok(true)), "session closed");
    }
}

async fn send(
    writer: &mut Writer,
    xid: i32,
    request: &Request,
) -> std::result::Result<(), ProtocolError> {
    let frame = encode_request(xid, request);
    write_message(writer, &frame).await
}

/// Connect to `addr` and exchange the session handshake within `limit`
async fn handshake(
    connector: Arc<dyn Connector>,
    addr: HostPort,
    request: ConnectRequest,
    limit: Duration,
) -> Result<(BoxTransport, ConnectResponse)> {
    let attempt = async {
        let mut transport = connector.connect(&addr).await?;
        let mut buf = BytesMut::with_capacity(48);
        request.encode(&mut buf);
        write_message(&mut transport, &buf).await?;
        let frame = read_message(&mut transport).await?;
        let response = ConnectResponse::decode(frame)?;
        Ok::<_, KeeperError>((transport, response))
    };
    tokio::time::timeout(limit, attempt)
        .await
        .map_err(|_| KeeperError::ConnectionTimeout(limit))?
}

/// Terminal errors are plain variants, so they can be recreated per waiter
fn clone_terminal(err: &KeeperError) -> KeeperError {
    match err {
        KeeperError::SessionExpired => KeeperError::SessionExpired,
        KeeperError::Closed => KeeperError::Closed,
        _ => KeeperError::ConnectionLoss,
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
