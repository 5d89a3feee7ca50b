// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node creation specs
//!
//! A created node reads back exactly; absence is a value, not an error.

use crate::prelude::*;
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn create_then_get_returns_the_same_bytes(
        node in "/[a-z]{1,8}(/[a-z0-9_]{1,8}){0,2}",
        data in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let read = runtime().block_on(async {
            let cluster = Cluster::new();
            let client = cluster.client().await;
            client
                .create(&node, &data, CreateOptions::new(CreateMode::Persistent).with_parents())
                .await
                .unwrap();
            client.get_data(&node).await.unwrap()
        });
        prop_assert_eq!(read, data);
    }
}

#[tokio::test]
async fn creating_an_existing_node_fails() {
    let cluster = Cluster::new();
    let client = cluster.client().await;
    client
        .create("/taken", b"first", CreateOptions::default())
        .await
        .unwrap();

    let err = client
        .create("/taken", b"second", CreateOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, KeeperError::NodeExists { .. }));
    assert_eq!(client.get_data("/taken").await.unwrap(), b"first");
}

#[tokio::test]
async fn absent_node_is_reported_as_none() {
    let cluster = Cluster::new();
    let client = cluster.client().await;

    assert!(client.exists("/nowhere").await.unwrap().is_none());
    assert!(client.get_data("/nowhere").await.unwrap_err().is_node_missing());
}

#[tokio::test]
async fn semantic_failures_are_not_retried() {
    let cluster = Cluster::new();
    let client = cluster.client().await;
    client
        .create("/once", b"", CreateOptions::default())
        .await
        .unwrap();

    let err = client
        .set_data("/once", b"", Some(7))
        .await
        .unwrap_err();

    assert!(matches!(err, KeeperError::VersionConflict { .. }));
    assert_eq!(cluster.ensemble.stat("/once").unwrap().version, 0);
}
