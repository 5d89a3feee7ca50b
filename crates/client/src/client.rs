// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client handle

use crate::connector::{Connector, TcpConnector, TracedConnector};
use crate::protocol::{Request, Response};
use crate::session::{Command, SessionStatus, SessionTask};
use crate::state::{ConnectionState, SessionEvent};
use crate::watch::WatchedEvent;
use keeper_core::{ClientConfig, KeeperError, Result, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

/// Buffered session events per subscriber before the oldest are dropped
const EVENT_CAPACITY: usize = 64;

/// Handle to one session with the ensemble
///
/// Clones share the session. The session is closed by [`Client::close`] or
/// once every handle has been dropped.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SessionStatus>,
    events: broadcast::Sender<SessionEvent>,
    retry: Arc<dyn RetryPolicy>,
    config: ClientConfig,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = *self.inner.status.borrow();
        f.debug_struct("Client")
            .field("connect_string", &self.inner.config.connect_string)
            .field("state", &status.state)
            .field("session_id", &status.session_id)
            .finish()
    }
}

impl Client {
    /// Connect over TCP and wait for the session to be established
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        Self::connect_with(config, Arc::new(TracedConnector::new(TcpConnector))).await
    }

    /// Connect through `connector`
    ///
    /// Fails with `ConnectionTimeout` when no ensemble member accepts a
    /// session within the connection timeout.
    pub async fn connect_with(config: ClientConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        config.validate()?;
        let hosts = config.hosts()?;

        let (commands, rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(SessionStatus {
            state: ConnectionState::Connecting,
            session_id: 0,
        });
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let task = SessionTask::new(
            config.clone(),
            hosts,
            connector,
            rx,
            status_tx,
            events.clone(),
        );
        tokio::spawn(task.run());

        let client = Client {
            inner: Arc::new(ClientInner {
                commands,
                status,
                events,
                retry: config.retry.policy(),
                config,
            }),
        };

        let timeout = client.inner.config.connection_timeout;
        if let Err(e) = client.wait_connected(timeout).await {
            tracing::warn!(
                connect_string = %client.inner.config.connect_string,
                error = %e,
                "initial connection failed"
            );
            client.close().await;
            return Err(e);
        }
        Ok(client)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn retry_policy(&self) -> &Arc<dyn RetryPolicy> {
        &self.inner.retry
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.status.borrow().state
    }

    /// Session id assigned by the ensemble, zero before the first handshake
    pub fn session_id(&self) -> i64 {
        self.inner.status.borrow().session_id
    }

    /// Session lifecycle events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Wait until the session is connected
    ///
    /// Fails with `ConnectionTimeout` after `timeout`, or with the terminal
    /// error if the session has ended.
    pub async fn wait_connected(&self, timeout: Duration) -> Result<()> {
        let mut status = self.inner.status.clone();
        let waited = tokio::time::timeout(
            timeout,
            status.wait_for(|s| s.state.is_connected() || s.state.is_terminal()),
        )
        .await;
        let state = match waited {
            Err(_) => return Err(KeeperError::ConnectionTimeout(timeout)),
            Ok(Err(_)) => return Err(self.terminal_error()),
            Ok(Ok(status)) => status.state,
        };
        if state.is_connected() {
            Ok(())
        } else {
            Err(terminal_error(state))
        }
    }

    /// Close the session
    ///
    /// Ephemeral nodes owned by the session are removed by the ensemble.
    /// Closing an already closed client does nothing.
    pub async fn close(&self) {
        let (reply, rx) = oneshot::channel();
        if self.inner.commands.send(Command::Close { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Send one request on the current connection, without retries
    pub(crate) async fn submit(
        &self,
        request: Request,
        watcher: Option<oneshot::Sender<WatchedEvent>>,
    ) -> Result<Response> {
        let (reply, rx) = oneshot::channel();
        self.inner
            .commands
            .send(Command::Submit {
                request,
                watcher,
                reply,
            })
            .map_err(|_| self.terminal_error())?;
        rx.await.map_err(|_| self.terminal_error())?
    }

    fn terminal_error(&self) -> KeeperError {
        terminal_error(self.state())
    }
}

fn terminal_error(state: ConnectionState) -> KeeperError {
    match state {
        ConnectionState::Expired => KeeperError::SessionExpired,
        _ => KeeperError::Closed,
    }
}
