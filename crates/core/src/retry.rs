// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry policies for transient failures
//!
//! A policy is consulted after every retryable failure with the zero-based
//! index of the attempt that just failed and the time spent so far. Policies
//! hold no per-operation state, so one instance is shared by every concurrent
//! operation on a client.

use rand::Rng;
use std::fmt::Debug;
use std::time::Duration;

/// Decides whether a failed attempt is retried and after what delay
pub trait RetryPolicy: Debug + Send + Sync {
    /// `Some(delay)` to retry after `delay`, `None` to give up
    fn should_retry(&self, attempt: u32, elapsed: Duration) -> Option<Duration>;
}

/// Retry up to `count` times with a fixed delay between attempts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryNTimes {
    count: u32,
    interval: Duration,
}

impl RetryNTimes {
    pub fn new(count: u32, interval: Duration) -> Self {
        Self { count, interval }
    }
}

impl RetryPolicy for RetryNTimes {
    fn should_retry(&self, attempt: u32, _elapsed: Duration) -> Option<Duration> {
        (attempt < self.count).then_some(self.interval)
    }
}

/// Retry exactly once
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryOneTime {
    interval: Duration,
}

impl RetryOneTime {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl RetryPolicy for RetryOneTime {
    fn should_retry(&self, attempt: u32, _elapsed: Duration) -> Option<Duration> {
        (attempt == 0).then_some(self.interval)
    }
}

/// Retry with a fixed delay until `max_elapsed` has passed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryUntilElapsed {
    max_elapsed: Duration,
    interval: Duration,
}

impl RetryUntilElapsed {
    pub fn new(max_elapsed: Duration, interval: Duration) -> Self {
        Self {
            max_elapsed,
            interval,
        }
    }
}

impl RetryPolicy for RetryUntilElapsed {
    fn should_retry(&self, _attempt: u32, elapsed: Duration) -> Option<Duration> {
        (elapsed < self.max_elapsed).then_some(self.interval)
    }
}

/// Retry indefinitely with a fixed delay
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryForever {
    interval: Duration,
}

impl RetryForever {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl RetryPolicy for RetryForever {
    fn should_retry(&self, _attempt: u32, _elapsed: Duration) -> Option<Duration> {
        Some(self.interval)
    }
}

/// Randomized exponential backoff, capped at `max_interval`
///
/// The delay before retry `n` is `base * k` for a random `k` in
/// `1..2^(n+1)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExponentialBackoffRetry {
    base: Duration,
    max_retries: u32,
    max_interval: Duration,
}

impl ExponentialBackoffRetry {
    /// Upper bound on `max_retries`; larger exponents overflow the multiplier
    pub const MAX_RETRIES_LIMIT: u32 = 29;

    pub fn new(base: Duration, max_retries: u32, max_interval: Duration) -> Self {
        Self {
            base,
            max_retries: max_retries.min(Self::MAX_RETRIES_LIMIT),
            max_interval,
        }
    }
}

impl RetryPolicy for ExponentialBackoffRetry {
    fn should_retry(&self, attempt: u32, _elapsed: Duration) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        let ceiling = 1u32 << (attempt + 1);
        let factor = rand::thread_rng().gen_range(1..ceiling);
        Some((self.base * factor).min(self.max_interval))
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
