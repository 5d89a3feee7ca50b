// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sequential node specs
//!
//! Suffixes under one parent strictly increase and never repeat, even
//! across concurrent sessions.

use crate::prelude::*;
use std::collections::HashSet;

const PER_CLIENT: usize = 10;

#[tokio::test]
async fn concurrent_sequential_creates_never_collide() {
    let cluster = Cluster::new();
    let clients = cluster.clients(4).await;
    clients[0]
        .create("/queue", b"", CreateOptions::default())
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for client in clients {
        tasks.push(tokio::spawn(async move {
            let mut sequences = Vec::new();
            for _ in 0..PER_CLIENT {
                let created = client
                    .create(
                        "/queue/item-",
                        b"",
                        CreateOptions::new(CreateMode::PersistentSequential),
                    )
                    .await
                    .unwrap();
                sequences.push(path::sequence(&created).unwrap());
            }
            sequences
        }));
    }

    let mut all = HashSet::new();
    for task in tasks {
        let sequences = within(task).await.unwrap();
        assert!(
            sequences.windows(2).all(|w| w[0] < w[1]),
            "not increasing: {sequences:?}"
        );
        all.extend(sequences);
    }
    assert_eq!(all.len(), 4 * PER_CLIENT);
    assert_eq!(cluster.ensemble.children("/queue").len(), 4 * PER_CLIENT);
}
