// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ephemeral node specs
//!
//! Ephemeral nodes disappear with the session that created them.

use crate::prelude::*;

async fn owner_and_observer(cluster: &Cluster) -> (Client, Client) {
    let owner = cluster.client().await;
    let observer = cluster.client().await;
    owner
        .create("/presence", b"", CreateOptions::new(CreateMode::Ephemeral))
        .await
        .unwrap();
    owner
        .create("/durable", b"", CreateOptions::default())
        .await
        .unwrap();
    assert!(observer.exists("/presence").await.unwrap().is_some());
    (owner, observer)
}

#[tokio::test]
async fn ephemeral_node_vanishes_when_the_session_expires() {
    let cluster = Cluster::new();
    let (owner, observer) = owner_and_observer(&cluster).await;
    let (_, watch) = observer.exists_watch("/presence").await.unwrap();

    cluster.ensemble.expire_session(owner.session_id());

    within(watch.changed()).await.unwrap();
    assert!(observer.exists("/presence").await.unwrap().is_none());
    assert!(observer.exists("/durable").await.unwrap().is_some());
    eventually(|| owner.state() == ConnectionState::Expired).await;
}

#[tokio::test]
async fn ephemeral_node_vanishes_when_the_session_closes() {
    let cluster = Cluster::new();
    let (owner, observer) = owner_and_observer(&cluster).await;

    owner.close().await;

    assert!(observer.exists("/presence").await.unwrap().is_none());
    assert!(observer.exists("/durable").await.unwrap().is_some());
}

#[tokio::test]
async fn ephemeral_node_survives_a_reconnect() {
    let cluster = Cluster::new();
    let (owner, observer) = owner_and_observer(&cluster).await;
    let mut events = owner.subscribe();

    cluster.ensemble.disconnect(owner.session_id());
    assert_eq!(within(events.recv()).await.unwrap(), SessionEvent::Suspended);
    assert_eq!(within(events.recv()).await.unwrap(), SessionEvent::Reconnected);

    assert!(observer.exists("/presence").await.unwrap().is_some());
}
