// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration
//!
//! Values come from a TOML file, then `KEEPER_*` environment variables, then
//! whatever the caller sets explicitly:
//!
//! ```toml
//! connect_string = "zk1:2181,zk2:2181,zk3:2181"
//! session_timeout = "60s"
//! connection_timeout = "15s"
//!
//! [retry]
//! kind = "n_times"
//! count = 3
//! interval = "1s"
//! ```

use crate::retry::{
    ExponentialBackoffRetry, RetryForever, RetryNTimes, RetryOneTime, RetryPolicy,
    RetryUntilElapsed,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 2181;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },

    #[error("invalid ensemble address {0:?}")]
    Address(String),

    #[error("connect string is empty")]
    EmptyConnectString,

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}

/// One `host:port` member of the ensemble
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HostPort {
    pub host: String,
    pub port: u16,
}

impl HostPort {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse a comma-separated connect string
    pub fn parse_list(connect_string: &str) -> Result<Vec<HostPort>, ConfigError> {
        let hosts = connect_string
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<HostPort>, _>>()?;
        if hosts.is_empty() {
            return Err(ConfigError::EmptyConnectString);
        }
        Ok(hosts)
    }
}

impl FromStr for HostPort {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ConfigError::Address(s.to_string());

        // [v6::addr]:port
        if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(bad)?;
            let port = match tail.strip_prefix(':') {
                Some(port) => port.parse().map_err(|_| bad())?,
                None if tail.is_empty() => DEFAULT_PORT,
                None => return Err(bad()),
            };
            return Ok(HostPort::new(host, port));
        }

        let (host, port) = match s.rsplit_once(':') {
            Some((host, port)) => (host, port.parse().map_err(|_| bad())?),
            None => (s, DEFAULT_PORT),
        };
        if host.is_empty() || host.contains(['/', ':', ' ']) {
            return Err(bad());
        }
        Ok(HostPort::new(host, port))
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Retry policy selection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryConfig {
    NTimes {
        count: u32,
        #[serde(with = "humantime_serde")]
        interval: Duration,
    },
    OneTime {
        #[serde(with = "humantime_serde")]
        interval: Duration,
    },
    UntilElapsed {
        #[serde(with = "humantime_serde")]
        max_elapsed: Duration,
        #[serde(with = "humantime_serde")]
        interval: Duration,
    },
    Exponential {
        #[serde(with = "humantime_serde")]
        base: Duration,
        max_retries: u32,
        #[serde(with = "humantime_serde")]
        max_interval: Duration,
    },
    Forever {
        #[serde(with = "humantime_serde")]
        interval: Duration,
    },
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig::NTimes {
            count: 3,
            interval: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    /// Build the policy this configuration describes
    pub fn policy(&self) -> Arc<dyn RetryPolicy> {
        match *self {
            RetryConfig::NTimes { count, interval } => Arc::new(RetryNTimes::new(count, interval)),
            RetryConfig::OneTime { interval } => Arc::new(RetryOneTime::new(interval)),
            RetryConfig::UntilElapsed {
                max_elapsed,
                interval,
            } => Arc::new(RetryUntilElapsed::new(max_elapsed, interval)),
            RetryConfig::Exponential {
                base,
                max_retries,
                max_interval,
            } => Arc::new(ExponentialBackoffRetry::new(base, max_retries, max_interval)),
            RetryConfig::Forever { interval } => Arc::new(RetryForever::new(interval)),
        }
    }

    /// Base delay between attempts
    pub fn interval(&self) -> Duration {
        match *self {
            RetryConfig::NTimes { interval, .. }
            | RetryConfig::OneTime { interval }
            | RetryConfig::UntilElapsed { interval, .. }
            | RetryConfig::Forever { interval } => interval,
            RetryConfig::Exponential { base, .. } => base,
        }
    }
}

/// Settings for one client session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Comma-separated `host:port` list of ensemble members
    pub connect_string: String,
    /// Session timeout requested from the ensemble
    #[serde(with = "humantime_serde")]
    pub session_timeout: Duration,
    /// How long to wait for a connection before an attempt fails
    #[serde(with = "humantime_serde")]
    pub connection_timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_string: format!("127.0.0.1:{}", DEFAULT_PORT),
            session_timeout: Duration::from_secs(60),
            connection_timeout: Duration::from_secs(15),
            retry: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(connect_string: impl Into<String>) -> Self {
        Self {
            connect_string: connect_string.into(),
            ..Self::default()
        }
    }

    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        Self::from_toml_str(&text)
    }

    /// Apply `KEEPER_*` overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|var| std::env::var(var).ok())
    }

    /// Apply `KEEPER_*` overrides read through `lookup`
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let millis = |var: &'static str| -> Result<Option<Duration>, ConfigError> {
            lookup(var)
                .map(|value| {
                    value
                        .parse::<u64>()
                        .map(Duration::from_millis)
                        .map_err(|_| ConfigError::Env { var, value })
                })
                .transpose()
        };

        if let Some(hosts) = lookup("KEEPER_CONNECT_STRING") {
            self.connect_string = hosts;
        }
        if let Some(timeout) = millis("KEEPER_SESSION_TIMEOUT_MS")? {
            self.session_timeout = timeout;
        }
        if let Some(timeout) = millis("KEEPER_CONNECTION_TIMEOUT_MS")? {
            self.connection_timeout = timeout;
        }

        let count = lookup("KEEPER_RETRY_COUNT")
            .map(|value| {
                value.parse::<u32>().map_err(|_| ConfigError::Env {
                    var: "KEEPER_RETRY_COUNT",
                    value,
                })
            })
            .transpose()?;
        let interval = millis("KEEPER_RETRY_INTERVAL_MS")?;
        if count.is_some() || interval.is_some() {
            let (default_count, default_interval) = match self.retry {
                RetryConfig::NTimes { count, interval } => (count, interval),
                ref other => (3, other.interval()),
            };
            self.retry = RetryConfig::NTimes {
                count: count.unwrap_or(default_count),
                interval: interval.unwrap_or(default_interval),
            };
        }

        Ok(self)
    }

    /// Reject configurations the client cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.hosts()?;
        if self.session_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("session_timeout"));
        }
        if self.connection_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("connection_timeout"));
        }
        Ok(())
    }

    /// Ensemble members named by the connect string
    pub fn hosts(&self) -> Result<Vec<HostPort>, ConfigError> {
        HostPort::parse_list(&self.connect_string)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
