// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exclusive lock specs
//!
//! Exactly one contender holds the lock; the next is admitted only when the
//! holder lets go, whether by release or by losing its session.

use crate::prelude::*;

const LOCK: &str = "/locks/exclusive";

#[tokio::test]
async fn second_acquirer_waits_for_release() {
    let cluster = Cluster::new();
    let clients = cluster.clients(2).await;
    let first_lock = InterProcessMutex::new(clients[0].clone(), LOCK);
    let second_lock = InterProcessMutex::new(clients[1].clone(), LOCK);

    let mut first = first_lock
        .acquire(Some(Duration::from_secs(1)))
        .await
        .unwrap();
    let second = tokio::spawn(async move { second_lock.acquire(None).await });
    eventually(|| cluster.ensemble.children(LOCK).len() == 2).await;
    assert!(!second.is_finished());

    first.release().await.unwrap();

    let second = within(second).await.unwrap().unwrap();
    assert!(second.is_held());
    assert_eq!(first.state(), LockState::Released);
}

#[tokio::test]
async fn lock_times_out_while_held_elsewhere() {
    let cluster = Cluster::new();
    let clients = cluster.clients(2).await;
    let _held = InterProcessMutex::new(clients[0].clone(), LOCK)
        .acquire(None)
        .await
        .unwrap();

    let err = InterProcessMutex::new(clients[1].clone(), LOCK)
        .acquire(Some(Duration::from_millis(100)))
        .await
        .unwrap_err();

    assert!(matches!(err, KeeperError::LockTimeout { .. }));
    assert_eq!(cluster.ensemble.children(LOCK).len(), 1);
}

#[tokio::test]
async fn holder_session_loss_admits_the_waiter() {
    let cluster = Cluster::new();
    let clients = cluster.clients(2).await;
    let holder = clients[0].clone();
    let held = InterProcessMutex::new(holder.clone(), LOCK)
        .acquire(None)
        .await
        .unwrap();
    let waiter = InterProcessMutex::new(clients[1].clone(), LOCK);
    let waiting = tokio::spawn(async move { waiter.acquire(None).await });
    eventually(|| cluster.ensemble.children(LOCK).len() == 2).await;

    cluster.ensemble.expire_session(holder.session_id());

    let next = within(waiting).await.unwrap().unwrap();
    assert!(next.is_held());
    eventually(|| held.state() == LockState::Released).await;
}
