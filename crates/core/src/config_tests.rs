// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;
use std::io::Write;
use yare::parameterized;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |var| map.get(var).cloned()
}

#[test]
fn defaults_point_at_local_ensemble() {
    let config = ClientConfig::default();
    assert_eq!(config.connect_string, "127.0.0.1:2181");
    assert_eq!(config.session_timeout, Duration::from_secs(60));
    assert_eq!(config.connection_timeout, Duration::from_secs(15));
    assert_eq!(
        config.retry,
        RetryConfig::NTimes {
            count: 3,
            interval: Duration::from_secs(1)
        }
    );
    assert!(config.validate().is_ok());
}

#[test]
fn parses_full_toml() {
    let config = ClientConfig::from_toml_str(
        r#"
        connect_string = "zk1:2181,zk2:2182"
        session_timeout = "30s"
        connection_timeout = "5s"

        [retry]
        kind = "n_times"
        count = 5
        interval = "500ms"
        "#,
    )
    .unwrap();

    assert_eq!(config.session_timeout, Duration::from_secs(30));
    assert_eq!(config.connection_timeout, Duration::from_secs(5));
    assert_eq!(
        config.retry,
        RetryConfig::NTimes {
            count: 5,
            interval: Duration::from_millis(500)
        }
    );
    assert_eq!(
        config.hosts().unwrap(),
        vec![HostPort::new("zk1", 2181), HostPort::new("zk2", 2182)]
    );
}

#[test]
fn missing_keys_fall_back_to_defaults() {
    let config = ClientConfig::from_toml_str(r#"connect_string = "zk:2181""#).unwrap();
    assert_eq!(config.session_timeout, Duration::from_secs(60));
    assert_eq!(config.retry, RetryConfig::default());
}

#[test]
fn unknown_keys_are_rejected() {
    let err = ClientConfig::from_toml_str(r#"connect = "zk:2181""#).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn exponential_retry_builds_a_policy() {
    let config = ClientConfig::from_toml_str(
        r#"
        [retry]
        kind = "exponential"
        base = "100ms"
        max_retries = 4
        max_interval = "2s"
        "#,
    )
    .unwrap();

    assert_eq!(config.retry.interval(), Duration::from_millis(100));
    let policy = config.retry.policy();
    assert!(policy.should_retry(0, Duration::ZERO).is_some());
    assert!(policy.should_retry(4, Duration::ZERO).is_none());
}

#[test]
fn load_reads_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"connect_string = "10.0.0.1:2181""#).unwrap();

    let config = ClientConfig::load(file.path()).unwrap();
    assert_eq!(config.connect_string, "10.0.0.1:2181");
}

#[test]
fn load_reports_missing_file() {
    let err = ClientConfig::load(Path::new("/nonexistent/keeper.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read(..)));
}

#[test]
fn env_overrides_replace_file_values() {
    let config = ClientConfig::default()
        .with_overrides_from(env(&[
            ("KEEPER_CONNECT_STRING", "a:1,b:2"),
            ("KEEPER_SESSION_TIMEOUT_MS", "4000"),
            ("KEEPER_CONNECTION_TIMEOUT_MS", "1500"),
            ("KEEPER_RETRY_COUNT", "7"),
        ]))
        .unwrap();

    assert_eq!(config.connect_string, "a:1,b:2");
    assert_eq!(config.session_timeout, Duration::from_millis(4000));
    assert_eq!(config.connection_timeout, Duration::from_millis(1500));
    assert_eq!(
        config.retry,
        RetryConfig::NTimes {
            count: 7,
            interval: Duration::from_secs(1)
        }
    );
}

#[test]
fn env_override_rejects_garbage() {
    let err = ClientConfig::default()
        .with_overrides_from(env(&[("KEEPER_SESSION_TIMEOUT_MS", "soon")]))
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Env { var: "KEEPER_SESSION_TIMEOUT_MS", .. }
    ));
}

#[test]
fn zero_timeouts_fail_validation() {
    let config = ClientConfig::default().with_session_timeout(Duration::ZERO);
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ZeroTimeout("session_timeout"))
    ));
}

#[parameterized(
    plain = { "zk1:2181", "zk1", 2181 },
    default_port = { "zk1", "zk1", 2181 },
    ipv4 = { "10.1.2.3:2888", "10.1.2.3", 2888 },
    ipv6 = { "[::1]:2181", "::1", 2181 },
)]
fn host_port_parses(input: &str, host: &str, port: u16) {
    assert_eq!(input.parse::<HostPort>().unwrap(), HostPort::new(host, port));
}

#[parameterized(
    bad_port = { "zk1:http" },
    empty_host = { ":2181" },
    chroot = { "zk1:2181/app" },
    open_bracket = { "[::1:2181" },
)]
fn host_port_rejects(input: &str) {
    assert!(input.parse::<HostPort>().is_err());
}

#[test]
fn empty_connect_string_is_rejected() {
    assert!(matches!(
        HostPort::parse_list(" , "),
        Err(ConfigError::EmptyConnectString)
    ));
}

#[test]
fn host_port_display_brackets_ipv6() {
    assert_eq!(HostPort::new("::1", 2181).to_string(), "[::1]:2181");
    assert_eq!(HostPort::new("zk1", 2181).to_string(), "zk1:2181");
}
