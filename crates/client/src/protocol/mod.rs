// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol spoken with the ensemble
//!
//! Wire format: 4-byte length prefix (big-endian) + jute-encoded payload.
//! Every payload after the handshake starts with a request or reply header;
//! replies are correlated with requests by `xid`.

mod jute;
mod records;

pub use jute::{JuteRead, JuteWrite};
pub use records::{
    xid, ConnectRequest, ConnectResponse, OpCode, ReplyHeader, Request, RequestHeader, Response,
    WatcherEvent,
};

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame accepted from the peer
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Frame of {0} bytes exceeds the limit")]
    FrameTooLarge(usize),

    #[error("Message truncated")]
    Truncated,

    #[error("Malformed message: {0}")]
    Malformed(String),
}

/// Read one length-prefixed frame
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Bytes, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed);
        }
        Err(e) => return Err(ProtocolError::Io(e)),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }

    let mut buffer = BytesMut::zeroed(len);
    match reader.read_exact(&mut buffer).await {
        Ok(_) => Ok(buffer.freeze()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(ProtocolError::ConnectionClosed)
        }
        Err(e) => Err(ProtocolError::Io(e)),
    }
}

/// Write one length-prefixed frame
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    if data.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(data.len()));
    }
    let len = data.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Payload of a request frame: header followed by the request body
pub fn encode_request(xid: i32, request: &Request) -> BytesMut {
    let mut buf = BytesMut::with_capacity(64);
    RequestHeader {
        xid,
        op: request.op(),
    }
    .encode(&mut buf);
    request.encode_body(&mut buf);
    buf
}

/// Payload of a reply frame; the body is only written on success
pub fn encode_reply(header: ReplyHeader, response: Option<&Response>) -> BytesMut {
    let mut buf = BytesMut::with_capacity(64);
    header.encode(&mut buf);
    if let Some(response) = response {
        response.encode(&mut buf);
    }
    buf
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
