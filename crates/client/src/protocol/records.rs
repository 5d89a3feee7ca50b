// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request, response and event records

use super::jute::{JuteRead, JuteWrite};
use super::ProtocolError;
use bytes::{BufMut, Bytes, BytesMut};
use keeper_core::{Acl, CreateMode, Stat};

/// Reserved transaction ids
pub mod xid {
    /// Server-initiated watch notification
    pub const WATCH_EVENT: i32 = -1;
    pub const PING: i32 = -2;
    pub const SET_WATCHES: i32 = -8;
}

/// Operation codes carried in request headers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpCode {
    Create,
    Delete,
    Exists,
    GetData,
    SetData,
    GetChildren,
    Ping,
    SetWatches,
    CloseSession,
}

impl OpCode {
    pub fn as_i32(self) -> i32 {
        match self {
            OpCode::Create => 1,
            OpCode::Delete => 2,
            OpCode::Exists => 3,
            OpCode::GetData => 4,
            OpCode::SetData => 5,
            OpCode::GetChildren => 8,
            OpCode::Ping => 11,
            OpCode::SetWatches => 101,
            OpCode::CloseSession => -11,
        }
    }

    pub fn from_i32(code: i32) -> Option<Self> {
        let op = match code {
            1 => OpCode::Create,
            2 => OpCode::Delete,
            3 => OpCode::Exists,
            4 => OpCode::GetData,
            5 => OpCode::SetData,
            8 => OpCode::GetChildren,
            11 => OpCode::Ping,
            101 => OpCode::SetWatches,
            -11 => OpCode::CloseSession,
            _ => return None,
        };
        Some(op)
    }

    pub fn name(self) -> &'static str {
        match self {
            OpCode::Create => "create",
            OpCode::Delete => "delete",
            OpCode::Exists => "exists",
            OpCode::GetData => "get_data",
            OpCode::SetData => "set_data",
            OpCode::GetChildren => "get_children",
            OpCode::Ping => "ping",
            OpCode::SetWatches => "set_watches",
            OpCode::CloseSession => "close_session",
        }
    }
}

/// First message a client sends on a fresh connection
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectRequest {
    pub protocol_version: i32,
    /// Highest transaction the client has seen, so a new server does not
    /// serve it stale state
    pub last_zxid_seen: i64,
    pub timeout_ms: i32,
    /// Zero to open a new session, otherwise the session to resume
    pub session_id: i64,
    pub passwd: Vec<u8>,
    pub read_only: bool,
}

impl ConnectRequest {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.protocol_version);
        buf.put_i64(self.last_zxid_seen);
        buf.put_i32(self.timeout_ms);
        buf.put_i64(self.session_id);
        buf.put_jute_buffer(&self.passwd);
        buf.put_jute_bool(self.read_only);
    }

    pub fn decode(mut buf: Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            protocol_version: buf.jute_i32()?,
            last_zxid_seen: buf.jute_i64()?,
            timeout_ms: buf.jute_i32()?,
            session_id: buf.jute_i64()?,
            passwd: buf.jute_buffer()?,
            // older clients omit the flag
            read_only: buf.jute_bool().unwrap_or(false),
        })
    }
}

/// Server answer to a [`ConnectRequest`]
///
/// A non-positive `timeout_ms` means the requested session has expired.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectResponse {
    pub protocol_version: i32,
    pub timeout_ms: i32,
    pub session_id: i64,
    pub passwd: Vec<u8>,
    pub read_only: bool,
}

impl ConnectResponse {
    pub fn is_expired(&self) -> bool {
        self.timeout_ms <= 0
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.protocol_version);
        buf.put_i32(self.timeout_ms);
        buf.put_i64(self.session_id);
        buf.put_jute_buffer(&self.passwd);
        buf.put_jute_bool(self.read_only);
    }

    pub fn decode(mut buf: Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            protocol_version: buf.jute_i32()?,
            timeout_ms: buf.jute_i32()?,
            session_id: buf.jute_i64()?,
            passwd: buf.jute_buffer()?,
            read_only: buf.jute_bool().unwrap_or(false),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestHeader {
    pub xid: i32,
    pub op: OpCode,
}

impl RequestHeader {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.xid);
        buf.put_i32(self.op.as_i32());
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        let xid = buf.jute_i32()?;
        let code = buf.jute_i32()?;
        let op = OpCode::from_i32(code)
            .ok_or_else(|| ProtocolError::Malformed(format!("unknown opcode {}", code)))?;
        Ok(Self { xid, op })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplyHeader {
    pub xid: i32,
    pub zxid: i64,
    pub err: i32,
}

impl ReplyHeader {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.xid);
        buf.put_i64(self.zxid);
        buf.put_i32(self.err);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            xid: buf.jute_i32()?,
            zxid: buf.jute_i64()?,
            err: buf.jute_i32()?,
        })
    }
}

/// Body of a client request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    Create {
        path: String,
        data: Vec<u8>,
        acl: Vec<Acl>,
        mode: CreateMode,
    },
    Delete {
        path: String,
        version: i32,
    },
    Exists {
        path: String,
        watch: bool,
    },
    GetData {
        path: String,
        watch: bool,
    },
    SetData {
        path: String,
        data: Vec<u8>,
        version: i32,
    },
    GetChildren {
        path: String,
        watch: bool,
    },
    /// Re-arm watches on a new connection
    SetWatches {
        relative_zxid: i64,
        data: Vec<String>,
        exist: Vec<String>,
        child: Vec<String>,
    },
    Ping,
    CloseSession,
}

impl Request {
    pub fn op(&self) -> OpCode {
        match self {
            Request::Create { .. } => OpCode::Create,
            Request::Delete { .. } => OpCode::Delete,
            Request::Exists { .. } => OpCode::Exists,
            Request::GetData { .. } => OpCode::GetData,
            Request::SetData { .. } => OpCode::SetData,
            Request::GetChildren { .. } => OpCode::GetChildren,
            Request::SetWatches { .. } => OpCode::SetWatches,
            Request::Ping => OpCode::Ping,
            Request::CloseSession => OpCode::CloseSession,
        }
    }

    /// Path the request targets, empty for session-level requests
    pub fn path(&self) -> &str {
        match self {
            Request::Create { path, .. }
            | Request::Delete { path, .. }
            | Request::Exists { path, .. }
            | Request::GetData { path, .. }
            | Request::SetData { path, .. }
            | Request::GetChildren { path, .. } => path,
            Request::SetWatches { .. } | Request::Ping | Request::CloseSession => "",
        }
    }

    pub fn encode_body(&self, buf: &mut BytesMut) {
        match self {
            Request::Create {
                path,
                data,
                acl,
                mode,
            } => {
                buf.put_jute_string(path);
                buf.put_jute_buffer(data);
                buf.put_jute_acls(acl);
                buf.put_i32(mode.flags());
            }
            Request::Delete { path, version } => {
                buf.put_jute_string(path);
                buf.put_i32(*version);
            }
            Request::Exists { path, watch }
            | Request::GetData { path, watch }
            | Request::GetChildren { path, watch } => {
                buf.put_jute_string(path);
                buf.put_jute_bool(*watch);
            }
            Request::SetData {
                path,
                data,
                version,
            } => {
                buf.put_jute_string(path);
                buf.put_jute_buffer(data);
                buf.put_i32(*version);
            }
            Request::SetWatches {
                relative_zxid,
                data,
                exist,
                child,
            } => {
                buf.put_i64(*relative_zxid);
                buf.put_jute_strings(data);
                buf.put_jute_strings(exist);
                buf.put_jute_strings(child);
            }
            Request::Ping | Request::CloseSession => {}
        }
    }

    /// Decode the body that follows a request header with `op`
    pub fn decode(op: OpCode, buf: &mut Bytes) -> Result<Self, ProtocolError> {
        let request = match op {
            OpCode::Create => {
                let path = buf.jute_string()?;
                let data = buf.jute_buffer()?;
                let acl = buf.jute_acls()?;
                let flags = buf.jute_i32()?;
                let mode = CreateMode::from_flags(flags).ok_or_else(|| {
                    ProtocolError::Malformed(format!("unknown create flags {}", flags))
                })?;
                Request::Create {
                    path,
                    data,
                    acl,
                    mode,
                }
            }
            OpCode::Delete => Request::Delete {
                path: buf.jute_string()?,
                version: buf.jute_i32()?,
            },
            OpCode::Exists => Request::Exists {
                path: buf.jute_string()?,
                watch: buf.jute_bool()?,
            },
            OpCode::GetData => Request::GetData {
                path: buf.jute_string()?,
                watch: buf.jute_bool()?,
            },
            OpCode::SetData => Request::SetData {
                path: buf.jute_string()?,
                data: buf.jute_buffer()?,
                version: buf.jute_i32()?,
            },
            OpCode::GetChildren => Request::GetChildren {
                path: buf.jute_string()?,
                watch: buf.jute_bool()?,
            },
            OpCode::SetWatches => Request::SetWatches {
                relative_zxid: buf.jute_i64()?,
                data: buf.jute_strings()?,
                exist: buf.jute_strings()?,
                child: buf.jute_strings()?,
            },
            OpCode::Ping => Request::Ping,
            OpCode::CloseSession => Request::CloseSession,
        };
        Ok(request)
    }
}

/// Body of a successful reply
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    /// Actual path of the created node, including any sequence suffix
    Create { path: String },
    Stat(Stat),
    Data { data: Vec<u8>, stat: Stat },
    Children(Vec<String>),
    Empty,
}

impl Response {
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            Response::Create { path } => buf.put_jute_string(path),
            Response::Stat(stat) => buf.put_jute_stat(stat),
            Response::Data { data, stat } => {
                buf.put_jute_buffer(data);
                buf.put_jute_stat(stat);
            }
            Response::Children(children) => buf.put_jute_strings(children),
            Response::Empty => {}
        }
    }

    /// Decode the body of a successful reply to `op`
    pub fn decode(op: OpCode, buf: &mut Bytes) -> Result<Self, ProtocolError> {
        let response = match op {
            OpCode::Create => Response::Create {
                path: buf.jute_string()?,
            },
            OpCode::Exists | OpCode::SetData => Response::Stat(buf.jute_stat()?),
            OpCode::GetData => Response::Data {
                data: buf.jute_buffer()?,
                stat: buf.jute_stat()?,
            },
            OpCode::GetChildren => Response::Children(buf.jute_strings()?),
            OpCode::Delete | OpCode::Ping | OpCode::SetWatches | OpCode::CloseSession => {
                Response::Empty
            }
        };
        Ok(response)
    }
}

/// Watch notification as it travels on the wire
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatcherEvent {
    pub event_type: i32,
    pub state: i32,
    pub path: String,
}

impl WatcherEvent {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.event_type);
        buf.put_i32(self.state);
        buf.put_jute_string(&self.path);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            event_type: buf.jute_i32()?,
            state: buf.jute_i32()?,
            path: buf.jute_string()?,
        })
    }
}
