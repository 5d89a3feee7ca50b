// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport to ensemble members

use async_trait::async_trait;
use keeper_core::HostPort;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::Instrument;

/// Byte stream the session speaks the wire protocol over
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + 'static> Transport for T {}

pub type BoxTransport = Box<dyn Transport>;

/// Opens connections to ensemble members
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, addr: &HostPort) -> io::Result<BoxTransport>;
}

/// Plain TCP connections
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, addr: &HostPort) -> io::Result<BoxTransport> {
        let stream = TcpStream::connect((addr.host.as_str(), addr.port)).await?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }
}

/// Wrapper that adds tracing to any Connector
#[derive(Clone, Debug)]
pub struct TracedConnector<C> {
    inner: C,
}

impl<C> TracedConnector<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<C: Connector> Connector for TracedConnector<C> {
    async fn connect(&self, addr: &HostPort) -> io::Result<BoxTransport> {
        let span = tracing::debug_span!("keeper.connect", %addr);
        async {
            let start = std::time::Instant::now();
            let result = self.inner.connect(addr).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(_) => tracing::debug!(elapsed_ms, "connected"),
                Err(e) => tracing::debug!(elapsed_ms, error = %e, "connect failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "connector_tests.rs"]
mod tests;
