// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-write lock specs
//!
//! Readers share; a writer waits for every reader queued ahead of it, and
//! readers queued behind a writer wait for it in turn.

use crate::prelude::*;

const LOCK: &str = "/locks/rw";
const READERS: usize = 4;

#[tokio::test]
async fn readers_share_and_the_writer_waits_for_all_of_them() {
    let cluster = Cluster::new();
    let clients = cluster.clients(READERS + 1).await;

    let mut acquiring = Vec::new();
    for client in &clients[..READERS] {
        let lock = InterProcessReadWriteLock::new(client.clone(), LOCK);
        acquiring.push(tokio::spawn(async move {
            lock.read_lock()
                .acquire(Some(Duration::from_secs(2)))
                .await
        }));
    }
    let mut readers = Vec::new();
    for task in acquiring {
        readers.push(within(task).await.unwrap().unwrap());
    }
    assert!(readers.iter().all(LockHandle::is_held));

    let writer_lock = InterProcessReadWriteLock::new(clients[READERS].clone(), LOCK);
    let writer = tokio::spawn(async move { writer_lock.write_lock().acquire(None).await });
    eventually(|| cluster.ensemble.children(LOCK).len() == READERS + 1).await;

    for reader in &mut readers {
        assert!(!writer.is_finished(), "writer admitted while a reader holds");
        reader.release().await.unwrap();
    }

    let writer = within(writer).await.unwrap().unwrap();
    assert!(writer.is_held());
}

#[tokio::test]
async fn readers_behind_a_writer_wait_for_it() {
    let cluster = Cluster::new();
    let clients = cluster.clients(2).await;
    let writers = InterProcessReadWriteLock::new(clients[0].clone(), LOCK);
    let readers = InterProcessReadWriteLock::new(clients[1].clone(), LOCK);

    let mut writer = writers.write_lock().acquire(None).await.unwrap();
    let reader = tokio::spawn(async move { readers.read_lock().acquire(None).await });
    eventually(|| cluster.ensemble.children(LOCK).len() == 2).await;
    assert!(!reader.is_finished());

    writer.release().await.unwrap();

    let reader = within(reader).await.unwrap().unwrap();
    assert!(reader.is_held());
}
