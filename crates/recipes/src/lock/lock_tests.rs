// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use keeper_client::{Client, FakeEnsemble};
use keeper_core::{path, KeeperError};
use std::future::Future;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);
const SHORT: Option<Duration> = Some(Duration::from_millis(100));

async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(WAIT, fut).await.expect("timed out")
}

/// Poll `check` until it holds
async fn eventually(mut check: impl FnMut() -> bool) {
    within(async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
}

async fn setup() -> (FakeEnsemble, Client) {
    let fake = FakeEnsemble::new();
    let client = fake.client().await.unwrap();
    (fake, client)
}

#[tokio::test]
async fn mutex_is_exclusive_until_released() {
    let (fake, client) = setup().await;
    let mutex = InterProcessMutex::new(client.clone(), "/locks/m");

    let mut first = mutex.acquire(None).await.unwrap();
    assert!(first.is_held());
    assert!(path::node_name(first.path()).starts_with(path::PROTECTED_PREFIX));

    let second = tokio::spawn({
        let mutex = mutex.clone();
        async move { mutex.acquire(None).await }
    });
    eventually(|| fake.children("/locks/m").len() == 2).await;
    assert!(!second.is_finished());

    first.release().await.unwrap();
    let second = within(second).await.unwrap().unwrap();
    assert!(second.is_held());
    assert_eq!(fake.children("/locks/m").len(), 1);
}

#[tokio::test]
async fn timed_out_acquire_leaves_no_node() {
    let (fake, client) = setup().await;
    let mutex = InterProcessMutex::new(client, "/locks/t");
    let _held = mutex.acquire(None).await.unwrap();

    let err = mutex.acquire(SHORT).await.unwrap_err();

    assert!(matches!(err, KeeperError::LockTimeout { path } if path == "/locks/t"));
    assert_eq!(fake.children("/locks/t").len(), 1);
}

#[tokio::test]
async fn release_is_idempotent() {
    let (fake, client) = setup().await;
    let mutex = InterProcessMutex::new(client, "/locks/i");
    let mut handle = mutex.acquire(SHORT).await.unwrap();
    assert_eq!(handle.state(), LockState::Held);

    handle.release().await.unwrap();
    handle.release().await.unwrap();

    assert_eq!(handle.state(), LockState::Released);
    assert!(fake.children("/locks/i").is_empty());
}

#[tokio::test]
async fn dropping_a_held_handle_releases_it() {
    let (fake, client) = setup().await;
    let mutex = InterProcessMutex::new(client, "/locks/d");
    let handle = mutex.acquire(None).await.unwrap();

    drop(handle);

    eventually(|| fake.children("/locks/d").is_empty()).await;
    within(mutex.acquire(None)).await.unwrap();
}

#[tokio::test]
async fn cancelled_acquire_removes_its_node() {
    let (fake, client) = setup().await;
    let session_id = client.session_id();
    let mutex = InterProcessMutex::new(client, "/locks/c");
    let _held = mutex.acquire(None).await.unwrap();

    let waiting = tokio::spawn({
        let mutex = mutex.clone();
        async move { mutex.acquire(None).await }
    });
    // a watch on the holder means the waiter's node is created and owned
    eventually(|| fake.watch_count(session_id) > 0).await;
    waiting.abort();

    eventually(|| fake.children("/locks/c").len() == 1).await;
}

#[tokio::test]
async fn acquire_cancelled_during_create_removes_its_node() {
    let (fake, client) = setup().await;
    client
        .create("/locks/lost", b"", keeper_client::CreateOptions::default().with_parents())
        .await
        .unwrap();

    // the create applies, its reply is lost, and the client cannot reconnect
    fake.refuse_connections(true);
    fake.drop_next_responses(1);
    let mutex = InterProcessMutex::new(client.clone(), "/locks/lost");
    let cancelled = tokio::time::timeout(Duration::from_millis(300), mutex.acquire(None)).await;
    assert!(cancelled.is_err());
    assert_eq!(fake.children("/locks/lost").len(), 1);

    fake.refuse_connections(false);
    eventually(|| fake.children("/locks/lost").is_empty()).await;
    within(mutex.acquire(None)).await.unwrap();
}

#[tokio::test]
async fn expired_holder_admits_the_next_waiter() {
    let fake = FakeEnsemble::new();
    let holder = fake.client().await.unwrap();
    let waiter = fake.client().await.unwrap();

    let held = InterProcessMutex::new(holder.clone(), "/locks/e")
        .acquire(None)
        .await
        .unwrap();
    let next = tokio::spawn(async move {
        InterProcessMutex::new(waiter, "/locks/e")
            .acquire(None)
            .await
    });
    eventually(|| fake.children("/locks/e").len() == 2).await;

    fake.expire_session(holder.session_id());

    let next = within(next).await.unwrap().unwrap();
    assert!(next.is_held());
    eventually(|| held.state() == LockState::Released).await;
}

#[tokio::test]
async fn readers_share_and_block_a_writer() {
    let (fake, client) = setup().await;
    let lock = InterProcessReadWriteLock::new(client, "/locks/rw");

    let mut readers = Vec::new();
    for _ in 0..3 {
        readers.push(lock.read_lock().acquire(SHORT).await.unwrap());
    }
    assert!(readers.iter().all(LockHandle::is_held));

    let writer = tokio::spawn({
        let lock = lock.clone();
        async move { lock.write_lock().acquire(None).await }
    });
    eventually(|| fake.children("/locks/rw").len() == 4).await;

    for reader in &mut readers {
        assert!(!writer.is_finished());
        reader.release().await.unwrap();
    }

    let writer = within(writer).await.unwrap().unwrap();
    assert!(writer.is_held());
    assert!(path::node_name(writer.path()).contains(WRITE_LOCK_NAME));
}

#[tokio::test]
async fn reader_queued_behind_a_writer_waits() {
    let (_fake, client) = setup().await;
    let lock = InterProcessReadWriteLock::new(client, "/locks/fair");
    let mut writer = lock.write_lock().acquire(None).await.unwrap();

    let err = lock.read_lock().acquire(SHORT).await.unwrap_err();
    assert!(matches!(err, KeeperError::LockTimeout { .. }));

    writer.release().await.unwrap();
    let reader = within(lock.read_lock().acquire(None)).await.unwrap();
    assert!(path::node_name(reader.path()).contains(READ_LOCK_NAME));
}

#[tokio::test]
async fn semaphore_admits_up_to_its_leases() {
    let (fake, client) = setup().await;
    let semaphore = InterProcessSemaphore::new(client, "/leases", 2);

    let mut first = semaphore.acquire(SHORT).await.unwrap();
    let _second = semaphore.acquire(SHORT).await.unwrap();

    let third = tokio::spawn({
        let semaphore = semaphore.clone();
        async move { semaphore.acquire(None).await }
    });
    eventually(|| fake.children("/leases").len() == 3).await;
    assert!(!third.is_finished());

    first.release().await.unwrap();
    let third = within(third).await.unwrap().unwrap();
    assert!(third.is_held());
}

#[tokio::test]
async fn semaphore_admits_when_any_holder_releases() {
    let (fake, client) = setup().await;
    let semaphore = InterProcessSemaphore::new(client, "/any", 2);
    let _first = semaphore.acquire(SHORT).await.unwrap();
    let mut second = semaphore.acquire(SHORT).await.unwrap();

    let third = tokio::spawn({
        let semaphore = semaphore.clone();
        async move { semaphore.acquire(None).await }
    });
    eventually(|| fake.children("/any").len() == 3).await;

    second.release().await.unwrap();
    within(third).await.unwrap().unwrap();
}

#[tokio::test]
async fn invalid_lock_path_fails_locally() {
    let (fake, client) = setup().await;
    let err = InterProcessMutex::new(client, "no-slash")
        .acquire(SHORT)
        .await
        .unwrap_err();

    assert!(matches!(err, KeeperError::InvalidPath { .. }));
    assert!(fake.children("/").is_empty());
}
