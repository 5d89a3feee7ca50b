// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use yare::parameterized;

const MS: Duration = Duration::from_millis(1);

#[parameterized(
    first = { 0, true },
    second = { 1, true },
    last = { 2, true },
    exhausted = { 3, false },
    far_past = { 10, false },
)]
fn n_times_retries_while_below_count(attempt: u32, retries: bool) {
    let policy = RetryNTimes::new(3, 250 * MS);
    let decision = policy.should_retry(attempt, Duration::ZERO);
    assert_eq!(decision.is_some(), retries);
    if retries {
        assert_eq!(decision, Some(250 * MS));
    }
}

#[test]
fn zero_count_never_retries() {
    let policy = RetryNTimes::new(0, MS);
    assert_eq!(policy.should_retry(0, Duration::ZERO), None);
}

#[test]
fn one_time_retries_once() {
    let policy = RetryOneTime::new(10 * MS);
    assert_eq!(policy.should_retry(0, Duration::ZERO), Some(10 * MS));
    assert_eq!(policy.should_retry(1, Duration::ZERO), None);
}

#[test]
fn until_elapsed_ignores_attempt_count() {
    let policy = RetryUntilElapsed::new(Duration::from_secs(5), 100 * MS);
    assert_eq!(policy.should_retry(1000, Duration::from_secs(4)), Some(100 * MS));
    assert_eq!(policy.should_retry(0, Duration::from_secs(5)), None);
}

#[test]
fn forever_never_gives_up() {
    let policy = RetryForever::new(5 * MS);
    assert_eq!(policy.should_retry(u32::MAX, Duration::from_secs(86_400)), Some(5 * MS));
}

#[test]
fn exponential_caps_retry_count() {
    let policy = ExponentialBackoffRetry::new(MS, 1000, Duration::from_secs(1));
    assert!(policy
        .should_retry(ExponentialBackoffRetry::MAX_RETRIES_LIMIT, Duration::ZERO)
        .is_none());
}

#[test]
fn policies_are_shareable_trait_objects() {
    let policy: std::sync::Arc<dyn RetryPolicy> = std::sync::Arc::new(RetryNTimes::new(1, MS));
    let shared = policy.clone();
    let handle = std::thread::spawn(move || shared.should_retry(0, Duration::ZERO));
    assert_eq!(handle.join().unwrap(), Some(MS));
    assert_eq!(policy.should_retry(0, Duration::ZERO), Some(MS));
}

proptest! {
    #[test]
    fn exponential_delay_stays_within_bounds(attempt in 0u32..10) {
        let base = 10 * MS;
        let cap = Duration::from_secs(2);
        let policy = ExponentialBackoffRetry::new(base, 10, cap);
        let delay = policy.should_retry(attempt, Duration::ZERO).unwrap();
        prop_assert!(delay >= base);
        prop_assert!(delay <= cap);
        prop_assert!(delay <= base * (1u32 << (attempt + 1)));
    }
}
