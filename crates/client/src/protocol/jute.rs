// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Jute primitive encoding
//!
//! Integers are big-endian, booleans one byte, and strings/buffers an `i32`
//! length followed by the bytes, where a length of -1 encodes null (read back
//! as empty). Vectors are an `i32` count followed by the items.

use super::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use keeper_core::{Acl, Stat};

/// Encoding of jute primitives
pub trait JuteWrite {
    fn put_jute_bool(&mut self, value: bool);
    fn put_jute_buffer(&mut self, value: &[u8]);
    fn put_jute_string(&mut self, value: &str);
    fn put_jute_strings(&mut self, values: &[String]);
    fn put_jute_stat(&mut self, stat: &Stat);
    fn put_jute_acls(&mut self, acls: &[Acl]);
}

impl JuteWrite for BytesMut {
    fn put_jute_bool(&mut self, value: bool) {
        self.put_u8(u8::from(value));
    }

    fn put_jute_buffer(&mut self, value: &[u8]) {
        self.put_i32(value.len() as i32);
        self.put_slice(value);
    }

    fn put_jute_string(&mut self, value: &str) {
        self.put_jute_buffer(value.as_bytes());
    }

    fn put_jute_strings(&mut self, values: &[String]) {
        self.put_i32(values.len() as i32);
        for value in values {
            self.put_jute_string(value);
        }
    }

    fn put_jute_stat(&mut self, stat: &Stat) {
        self.put_i64(stat.czxid);
        self.put_i64(stat.mzxid);
        self.put_i64(stat.ctime);
        self.put_i64(stat.mtime);
        self.put_i32(stat.version);
        self.put_i32(stat.cversion);
        self.put_i32(stat.aversion);
        self.put_i64(stat.ephemeral_owner);
        self.put_i32(stat.data_length);
        self.put_i32(stat.num_children);
        self.put_i64(stat.pzxid);
    }

    fn put_jute_acls(&mut self, acls: &[Acl]) {
        self.put_i32(acls.len() as i32);
        for acl in acls {
            self.put_i32(acl.perms);
            self.put_jute_string(&acl.scheme);
            self.put_jute_string(&acl.id);
        }
    }
}

/// Decoding of jute primitives, failing on truncated input
pub trait JuteRead {
    fn jute_i32(&mut self) -> Result<i32, ProtocolError>;
    fn jute_i64(&mut self) -> Result<i64, ProtocolError>;
    fn jute_bool(&mut self) -> Result<bool, ProtocolError>;
    fn jute_buffer(&mut self) -> Result<Vec<u8>, ProtocolError>;
    fn jute_string(&mut self) -> Result<String, ProtocolError>;
    fn jute_strings(&mut self) -> Result<Vec<String>, ProtocolError>;
    fn jute_stat(&mut self) -> Result<Stat, ProtocolError>;
    fn jute_acls(&mut self) -> Result<Vec<Acl>, ProtocolError>;
}

impl JuteRead for Bytes {
    fn jute_i32(&mut self) -> Result<i32, ProtocolError> {
        if self.remaining() < 4 {
            return Err(ProtocolError::Truncated);
        }
        Ok(self.get_i32())
    }

    fn jute_i64(&mut self) -> Result<i64, ProtocolError> {
        if self.remaining() < 8 {
            return Err(ProtocolError::Truncated);
        }
        Ok(self.get_i64())
    }

    fn jute_bool(&mut self) -> Result<bool, ProtocolError> {
        if !self.has_remaining() {
            return Err(ProtocolError::Truncated);
        }
        Ok(self.get_u8() != 0)
    }

    fn jute_buffer(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let len = self.jute_i32()?;
        if len < 0 {
            return Ok(Vec::new());
        }
        let len = len as usize;
        if self.remaining() < len {
            return Err(ProtocolError::Truncated);
        }
        Ok(self.split_to(len).to_vec())
    }

    fn jute_string(&mut self) -> Result<String, ProtocolError> {
        let bytes = self.jute_buffer()?;
        String::from_utf8(bytes).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    fn jute_strings(&mut self) -> Result<Vec<String>, ProtocolError> {
        let count = self.jute_i32()?;
        if count < 0 {
            return Ok(Vec::new());
        }
        // each string needs at least its length prefix
        if self.remaining() < count as usize * 4 {
            return Err(ProtocolError::Truncated);
        }
        (0..count).map(|_| self.jute_string()).collect()
    }

    fn jute_stat(&mut self) -> Result<Stat, ProtocolError> {
        Ok(Stat {
            czxid: self.jute_i64()?,
            mzxid: self.jute_i64()?,
            ctime: self.jute_i64()?,
            mtime: self.jute_i64()?,
            version: self.jute_i32()?,
            cversion: self.jute_i32()?,
            aversion: self.jute_i32()?,
            ephemeral_owner: self.jute_i64()?,
            data_length: self.jute_i32()?,
            num_children: self.jute_i32()?,
            pzxid: self.jute_i64()?,
        })
    }

    fn jute_acls(&mut self) -> Result<Vec<Acl>, ProtocolError> {
        let count = self.jute_i32()?;
        if count < 0 {
            return Ok(Vec::new());
        }
        if self.remaining() < count as usize * 12 {
            return Err(ProtocolError::Truncated);
        }
        (0..count)
            .map(|_| {
                Ok(Acl {
                    perms: self.jute_i32()?,
                    scheme: self.jute_string()?,
                    id: self.jute_string()?,
                })
            })
            .collect()
    }
}
