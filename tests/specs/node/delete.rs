// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deletion specs
//!
//! A guaranteed delete outlasts the retry policy and lost replies.

use crate::prelude::*;

#[tokio::test]
async fn guaranteed_delete_survives_failed_sends() {
    let cluster = Cluster::new();
    let client = cluster.client().await;
    client
        .create("/g/child", b"", CreateOptions::default().with_parents())
        .await
        .unwrap();

    cluster
        .ensemble
        .fail_next_requests(retry_count(&client) + 2);
    within(client.delete("/g", DeleteOptions::new().guaranteed().with_children()))
        .await
        .unwrap();

    assert!(client.exists("/g").await.unwrap().is_none());
}

#[tokio::test]
async fn guaranteed_delete_survives_lost_replies() {
    let cluster = Cluster::new();
    let client = cluster.client().await;
    client
        .create("/lost", b"", CreateOptions::default())
        .await
        .unwrap();

    cluster
        .ensemble
        .drop_next_responses(retry_count(&client) + 2);
    within(client.delete("/lost", DeleteOptions::new().guaranteed()))
        .await
        .unwrap();

    assert!(client.exists("/lost").await.unwrap().is_none());
}

#[tokio::test]
async fn plain_delete_gives_up_with_the_retry_policy() {
    let cluster = Cluster::new();
    let client = cluster.client().await;
    client
        .create("/bounded", b"", CreateOptions::default())
        .await
        .unwrap();

    cluster
        .ensemble
        .fail_next_requests(retry_count(&client) + 2);
    let err = within(client.delete("/bounded", DeleteOptions::new()))
        .await
        .unwrap_err();

    assert!(matches!(err, KeeperError::ConnectionLoss));
    assert!(cluster.ensemble.exists("/bounded"));
}
