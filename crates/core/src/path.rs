// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Znode path handling
//!
//! Paths are absolute, '/'-delimited and never end in a slash (except the
//! root). Sequential nodes carry a fixed-width decimal suffix assigned by the
//! ensemble; protected nodes carry a `_c_<uuid>-` prefix chosen by the client
//! so a create whose response was lost can be found again.

use crate::error::KeeperError;

pub const ROOT: &str = "/";

/// Width of the zero-padded suffix appended to sequential nodes
pub const SEQUENCE_DIGITS: usize = 10;

/// Marker that starts a protected node name
pub const PROTECTED_PREFIX: &str = "_c_";

/// Check that `path` names a node
///
/// With `sequential` set the path may end in '/', in which case the node name
/// is just the sequence suffix.
pub fn validate(path: &str, sequential: bool) -> Result<(), KeeperError> {
    let invalid = |reason: &'static str| KeeperError::InvalidPath {
        path: path.to_string(),
        reason,
    };

    if path.is_empty() {
        return Err(invalid("path is empty"));
    }
    if !path.starts_with('/') {
        return Err(invalid("path must start with '/'"));
    }
    if path == ROOT {
        return Ok(());
    }
    if path.contains('\0') {
        return Err(invalid("path contains a NUL character"));
    }

    let body = match path.strip_suffix('/') {
        Some(body) if sequential => body,
        Some(_) => return Err(invalid("path must not end with '/'")),
        None => path,
    };
    if body.is_empty() {
        return Ok(());
    }

    for segment in body[1..].split('/') {
        match segment {
            "" => return Err(invalid("empty path segment")),
            "." | ".." => return Err(invalid("relative path segment")),
            _ => {}
        }
    }
    Ok(())
}

/// Parent of `path`, `None` for the root
pub fn parent(path: &str) -> Option<&str> {
    if path == ROOT {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some(ROOT),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Last segment of `path`
pub fn node_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Join a parent path and a child name
pub fn join(parent: &str, child: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, child)
    } else {
        format!("{}/{}", parent, child)
    }
}

/// Proper ancestors of `path`, outermost first, excluding the root
///
/// `/a/b/c` yields `["/a", "/a/b"]`.
pub fn ancestors(path: &str) -> Vec<&str> {
    let Some(parent) = parent(path).filter(|p| *p != ROOT) else {
        return Vec::new();
    };
    parent
        .match_indices('/')
        .map(|(idx, _)| idx)
        .filter(|&idx| idx > 0)
        .map(|idx| &parent[..idx])
        .chain(std::iter::once(parent))
        .collect()
}

/// Sequence number carried by a sequential node name
pub fn sequence(name: &str) -> Option<u64> {
    let suffix = name.get(name.len().checked_sub(SEQUENCE_DIGITS)?..)?;
    if !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Suffix the ensemble appends for sequence number `n`
pub fn format_sequence(n: u64) -> String {
    format!("{:0width$}", n, width = SEQUENCE_DIGITS)
}

/// Protected form of a node name: `_c_<id>-<name>`
pub fn protect(id: &str, name: &str) -> String {
    format!("{}{}-{}", PROTECTED_PREFIX, id, name)
}

/// Whether `name` was created under protection id `id`
pub fn is_protected_by(name: &str, id: &str) -> bool {
    name.strip_prefix(PROTECTED_PREFIX)
        .and_then(|rest| rest.strip_prefix(id))
        .is_some_and(|rest| rest.starts_with('-'))
}

/// Node name with any protection prefix removed
pub fn unprotected(name: &str) -> &str {
    match name.strip_prefix(PROTECTED_PREFIX) {
        // a uuid holds exactly four dashes; the fifth closes the prefix
        Some(rest) => rest
            .match_indices('-')
            .nth(4)
            .map(|(idx, _)| &rest[idx + 1..])
            .unwrap_or(name),
        None => name,
    }
}

#[cfg(test)]
#[path = "path_tests.rs"]
mod tests;
