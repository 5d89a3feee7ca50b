// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output formatting for CLI commands

use keeper_core::Stat;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Print output in the specified format
pub fn print<T: Serialize + fmt::Display>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", value),
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(value) {
                println!("{}", json);
            }
        }
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + fmt::Display>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            for item in items {
                println!("{}", item);
            }
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(items) {
                println!("{}", json);
            }
        }
    }
}

/// A node's path and metadata
#[derive(Serialize)]
pub struct NodeStat<'a> {
    pub path: &'a str,
    #[serde(flatten)]
    pub stat: Stat,
}

impl fmt::Display for NodeStat<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.stat;
        writeln!(f, "{}", self.path)?;
        writeln!(f, "  czxid:          {:#x}", s.czxid)?;
        writeln!(f, "  mzxid:          {:#x}", s.mzxid)?;
        writeln!(f, "  pzxid:          {:#x}", s.pzxid)?;
        writeln!(f, "  ctime:          {}", s.ctime)?;
        writeln!(f, "  mtime:          {}", s.mtime)?;
        writeln!(f, "  version:        {}", s.version)?;
        writeln!(f, "  cversion:       {}", s.cversion)?;
        writeln!(f, "  aversion:       {}", s.aversion)?;
        writeln!(f, "  ephemeralOwner: {:#x}", s.ephemeral_owner)?;
        writeln!(f, "  dataLength:     {}", s.data_length)?;
        write!(f, "  numChildren:    {}", s.num_children)
    }
}
