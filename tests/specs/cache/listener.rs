// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node cache specs
//!
//! Listeners hear about every write, and the snapshot catches up with the
//! latest one.

use crate::prelude::*;
use tokio::sync::mpsc;

fn listen(cache: &NodeCache) -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    cache.add_listener(move || {
        let _ = tx.send(());
    });
    rx
}

#[tokio::test]
async fn listener_fires_after_every_write() {
    let cluster = Cluster::new();
    let writer = cluster.client().await;
    let reader = cluster.client().await;
    writer
        .create("/watched", b"0", CreateOptions::default())
        .await
        .unwrap();
    let cache = NodeCache::new(reader, "/watched");
    cache.start().await.unwrap();
    let mut fired = listen(&cache);

    for i in 1..=5u8 {
        let value = vec![b'0' + i];
        writer.set_data("/watched", &value, None).await.unwrap();

        within(fired.recv()).await.unwrap();
        within(async {
            while cache.current().unwrap().unwrap().data != value {
                fired.recv().await.unwrap();
            }
        })
        .await;
    }
    cache.stop().await;
}

#[tokio::test]
async fn expired_session_is_surfaced_to_listeners() {
    let cluster = Cluster::new();
    let client = cluster.client().await;
    client
        .create("/watched", b"", CreateOptions::default())
        .await
        .unwrap();
    let cache = NodeCache::new(client.clone(), "/watched");
    cache.start().await.unwrap();
    let mut fired = listen(&cache);

    cluster.ensemble.expire_session(client.session_id());

    within(fired.recv()).await.unwrap();
    assert!(matches!(cache.current(), Err(KeeperError::SessionExpired)));
}
