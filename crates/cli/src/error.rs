// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-friendly error display with context and suggestions.
//!
//! Each error says what went wrong, why it might have happened, and how to
//! fix it.

use keeper_core::{ClientConfig, KeeperError};
use std::fmt;
use std::time::Duration;

/// Error with context and recovery suggestions for user-friendly display.
#[derive(Debug)]
pub struct CliError {
    /// What went wrong
    pub message: String,
    /// Why it might have happened
    pub context: Vec<String>,
    /// How to fix it
    pub suggestions: Vec<String>,
    /// Original error if any
    pub source: Option<KeeperError>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
            source: None,
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_source(mut self, source: KeeperError) -> Self {
        self.source = Some(source);
        self
    }

    /// The client could not establish a session
    pub fn connect_failed(config: &ClientConfig, err: KeeperError) -> Self {
        let error = CliError::new(format!("Failed to connect to {}", config.connect_string));
        let error = match &err {
            KeeperError::ConnectionTimeout(waited) => error
                .with_context(format!(
                    "No ensemble member answered within {}",
                    humantime::format_duration(*waited)
                ))
                .with_suggestion("Check the member list: keeper --server host1:2181,host2:2181 ...")
                .with_suggestion("Allow more time: keeper --connection-timeout 30s ..."),
            KeeperError::SessionExpired => error
                .with_context("The ensemble rejected the session during the handshake")
                .with_suggestion("Retry; a new session will be requested"),
            other => error.with_context(other.to_string()),
        };
        error.with_source(err)
    }

    /// A lock acquisition ran out of time
    pub fn lock_timeout(path: &str, waited: Duration) -> Self {
        CliError::new(format!("Timed out waiting for lock '{}'", path))
            .with_context(format!(
                "Still queued after {}",
                humantime::format_duration(waited)
            ))
            .with_suggestion(format!("See who is queued: keeper ls {}", path))
            .with_suggestion("Wait longer: keeper lock --timeout 5m ...")
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            for ctx in &self.context {
                writeln!(f, "  -> {}", ctx)?;
            }
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            writeln!(f, "suggestions:")?;
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}
