// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path operations
//!
//! Every operation validates its path locally, waits for the session to be
//! connected, and retries transient failures under the client's retry policy.

use crate::client::Client;
use crate::protocol::{Request, Response};
use crate::watch::{Watch, WatchedEvent};
use keeper_core::path::{self, ROOT};
use keeper_core::{Acl, CreateMode, KeeperError, Result, RetryForever, RetryPolicy, Stat};
use std::collections::VecDeque;
use std::future::Future;
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::Instrument;

/// Options for [`Client::create`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CreateOptions {
    pub mode: CreateMode,
    /// Create missing ancestors as empty persistent nodes
    pub create_parents: bool,
    /// Prefix the node name with a per-call id so a create whose response
    /// was lost can be recognized on retry
    pub protected: bool,
}

impl CreateOptions {
    pub fn new(mode: CreateMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_parents(mut self) -> Self {
        self.create_parents = true;
        self
    }

    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }
}

/// Options for [`Client::delete`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Keep retrying transient failures until the delete is confirmed
    pub guaranteed: bool,
    /// Delete the whole subtree, deepest nodes first
    pub delete_children: bool,
    /// Expected data version, `None` for any
    pub version: Option<i32>,
}

impl DeleteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guaranteed(mut self) -> Self {
        self.guaranteed = true;
        self
    }

    pub fn with_children(mut self) -> Self {
        self.delete_children = true;
        self
    }

    pub fn with_version(mut self, version: i32) -> Self {
        self.version = Some(version);
        self
    }
}

/// Fresh id for [`Client::create_protected`]
pub fn protection_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn unexpected(op: &str, response: Response) -> KeeperError {
    KeeperError::Protocol(format!("unexpected {} response: {:?}", op, response))
}

impl Client {
    /// Run `op` until it succeeds, fails permanently, or `policy` gives up
    ///
    /// `op` receives the attempt number, starting at zero. Each attempt first
    /// waits for the session to be connected.
    pub(crate) async fn retrying<T, F, Fut>(&self, policy: &dyn RetryPolicy, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let mut attempt = 0;
        loop {
            let result = match self.wait_connected(self.config().connection_timeout).await {
                Ok(()) => op(attempt).await,
                Err(KeeperError::ConnectionTimeout(_)) => Err(KeeperError::ConnectionLoss),
                Err(e) => Err(e),
            };
            match result {
                Err(e) if e.is_retryable() => match policy.should_retry(attempt, start.elapsed()) {
                    Some(delay) => {
                        tracing::debug!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "retrying");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        tracing::warn!(attempt, error = %e, "giving up");
                        return Err(e);
                    }
                },
                other => return other,
            }
        }
    }

    async fn with_retry<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let policy = std::sync::Arc::clone(self.retry_policy());
        self.retrying(policy.as_ref(), op).await
    }

    /// Create a node and return its actual path
    ///
    /// Sequential modes return the path with the assigned suffix; protected
    /// creates return the path including the protection prefix.
    pub async fn create(&self, path: &str, data: &[u8], options: CreateOptions) -> Result<String> {
        path::validate(path, options.mode.is_sequential())?;
        if path == ROOT {
            return Err(KeeperError::NodeExists {
                path: path.to_string(),
            });
        }

        let id = options.protected.then(protection_id);
        self.create_as(path, data, options, id).await
    }

    /// Create a protected node under a caller-chosen protection id
    ///
    /// The caller can later find the node with [`Client::delete_protected`]
    /// even if this call never returned.
    pub async fn create_protected(
        &self,
        path: &str,
        data: &[u8],
        options: CreateOptions,
        id: &str,
    ) -> Result<String> {
        path::validate(path, options.mode.is_sequential())?;
        if path == ROOT {
            return Err(KeeperError::NodeExists {
                path: path.to_string(),
            });
        }
        let options = options.protected();
        self.create_as(path, data, options, Some(id.to_string()))
            .await
    }

    async fn create_as(
        &self,
        path: &str,
        data: &[u8],
        options: CreateOptions,
        id: Option<String>,
    ) -> Result<String> {
        let target = match id {
            Some(id) => {
                let parent = path::parent(path).unwrap_or(ROOT);
                let name = path::protect(&id, path::node_name(path));
                (path::join(parent, &name), Some(id))
            }
            None => (path.to_string(), None),
        };

        let span = tracing::debug_span!("keeper.create", path, mode = %options.mode);
        async {
            let (target, id) = &target;
            let created = self
                .with_retry(|attempt| self.create_once(target, data, options, id.as_deref(), attempt))
                .await;
            match &created {
                Ok(actual) => tracing::debug!(actual = %actual, "created"),
                Err(e) => tracing::debug!(error = %e, "create failed"),
            }
            created
        }
        .instrument(span)
        .await
    }

    async fn create_once(
        &self,
        target: &str,
        data: &[u8],
        options: CreateOptions,
        protection: Option<&str>,
        attempt: u32,
    ) -> Result<String> {
        // an earlier attempt may have created the node before its reply was lost
        if let Some(id) = protection.filter(|_| attempt > 0) {
            let parent = path::parent(target).unwrap_or(ROOT);
            if let Some(found) = self.find_protected(parent, id).await? {
                tracing::debug!(found = %found, "adopting node from earlier attempt");
                return Ok(found);
            }
        }

        match self.create_raw(target, data, options.mode).await {
            Err(KeeperError::NodeMissing { .. }) if options.create_parents => {
                self.create_ancestors(target).await?;
                self.create_raw(target, data, options.mode).await
            }
            other => other,
        }
    }

    async fn create_raw(&self, path: &str, data: &[u8], mode: CreateMode) -> Result<String> {
        let request = Request::Create {
            path: path.to_string(),
            data: data.to_vec(),
            acl: Acl::open_unsafe(),
            mode,
        };
        match self.submit(request, None).await? {
            Response::Create { path } => Ok(path),
            other => Err(unexpected("create", other)),
        }
    }

    async fn create_ancestors(&self, path: &str) -> Result<()> {
        for ancestor in path::ancestors(path) {
            match self.create_raw(ancestor, &[], CreateMode::Persistent).await {
                Ok(_) | Err(KeeperError::NodeExists { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn find_protected(&self, parent: &str, id: &str) -> Result<Option<String>> {
        let children = match self.get_children_raw(parent, None).await {
            Ok(children) => children,
            Err(KeeperError::NodeMissing { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(children
            .into_iter()
            .find(|name| path::is_protected_by(name, id))
            .map(|name| path::join(parent, &name)))
    }

    /// Delete every child of `parent` created under protection id `id`
    ///
    /// Retries transient failures until the parent has been listed and any
    /// match deleted. Returns whether a node was found.
    pub async fn delete_protected(&self, parent: &str, id: &str) -> Result<bool> {
        path::validate(parent, false)?;
        let span = tracing::debug_span!("keeper.delete", parent, protection = id);
        async {
            let policy = RetryForever::new(self.config().retry.interval());
            let mut found = false;
            loop {
                let node = self
                    .retrying(&policy, |_| self.find_protected(parent, id))
                    .await?;
                let Some(node) = node else {
                    return Ok(found);
                };
                let deleted = self
                    .retrying(&policy, |_| self.delete_once(&node, -1, 0))
                    .await;
                match deleted {
                    Ok(()) | Err(KeeperError::NodeMissing { .. }) => {
                        tracing::debug!(node = %node, "deleted protected node");
                        found = true;
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Replace a node's data, returning its new metadata
    pub async fn set_data(&self, path: &str, data: &[u8], version: Option<i32>) -> Result<Stat> {
        path::validate(path, false)?;
        let span = tracing::debug_span!("keeper.set_data", path, len = data.len());
        self.with_retry(|_| {
            let request = Request::SetData {
                path: path.to_string(),
                data: data.to_vec(),
                version: version.unwrap_or(-1),
            };
            async move {
                match self.submit(request, None).await? {
                    Response::Stat(stat) => Ok(stat),
                    other => Err(unexpected("set_data", other)),
                }
            }
        })
        .instrument(span)
        .await
    }

    pub async fn get_data(&self, path: &str) -> Result<Vec<u8>> {
        self.get_data_with_stat(path).await.map(|(data, _)| data)
    }

    pub async fn get_data_with_stat(&self, path: &str) -> Result<(Vec<u8>, Stat)> {
        path::validate(path, false)?;
        let span = tracing::debug_span!("keeper.get_data", path);
        self.with_retry(|_| self.get_data_raw(path, None))
            .instrument(span)
            .await
    }

    /// Read a node and arm a watch for its next change or deletion
    pub async fn get_data_watch(&self, path: &str) -> Result<(Vec<u8>, Stat, Watch)> {
        path::validate(path, false)?;
        let span = tracing::debug_span!("keeper.get_data", path, watch = true);
        self.with_retry(|_| async move {
            let (tx, rx) = oneshot::channel();
            let (data, stat) = self.get_data_raw(path, Some(tx)).await?;
            Ok((data, stat, Watch::new(path, rx)))
        })
        .instrument(span)
        .await
    }

    async fn get_data_raw(
        &self,
        path: &str,
        watcher: Option<oneshot::Sender<WatchedEvent>>,
    ) -> Result<(Vec<u8>, Stat)> {
        let request = Request::GetData {
            path: path.to_string(),
            watch: watcher.is_some(),
        };
        match self.submit(request, watcher).await? {
            Response::Data { data, stat } => Ok((data, stat)),
            other => Err(unexpected("get_data", other)),
        }
    }

    /// Names of a node's children, sorted
    pub async fn get_children(&self, path: &str) -> Result<Vec<String>> {
        path::validate(path, false)?;
        let span = tracing::debug_span!("keeper.get_children", path);
        self.with_retry(|_| self.get_children_raw(path, None))
            .instrument(span)
            .await
    }

    /// List children and arm a watch for the next change to the list
    pub async fn get_children_watch(&self, path: &str) -> Result<(Vec<String>, Watch)> {
        path::validate(path, false)?;
        let span = tracing::debug_span!("keeper.get_children", path, watch = true);
        self.with_retry(|_| async move {
            let (tx, rx) = oneshot::channel();
            let children = self.get_children_raw(path, Some(tx)).await?;
            Ok((children, Watch::new(path, rx)))
        })
        .instrument(span)
        .await
    }

    async fn get_children_raw(
        &self,
        path: &str,
        watcher: Option<oneshot::Sender<WatchedEvent>>,
    ) -> Result<Vec<String>> {
        let request = Request::GetChildren {
            path: path.to_string(),
            watch: watcher.is_some(),
        };
        match self.submit(request, watcher).await? {
            Response::Children(mut children) => {
                children.sort();
                Ok(children)
            }
            other => Err(unexpected("get_children", other)),
        }
    }

    /// Metadata of a node, `None` if it does not exist
    pub async fn exists(&self, path: &str) -> Result<Option<Stat>> {
        path::validate(path, false)?;
        let span = tracing::debug_span!("keeper.exists", path);
        self.with_retry(|_| self.exists_raw(path, None))
            .instrument(span)
            .await
    }

    /// Check a node and arm a watch for its creation, change or deletion
    pub async fn exists_watch(&self, path: &str) -> Result<(Option<Stat>, Watch)> {
        path::validate(path, false)?;
        let span = tracing::debug_span!("keeper.exists", path, watch = true);
        self.with_retry(|_| async move {
            let (tx, rx) = oneshot::channel();
            let stat = self.exists_raw(path, Some(tx)).await?;
            Ok((stat, Watch::new(path, rx)))
        })
        .instrument(span)
        .await
    }

    async fn exists_raw(
        &self,
        path: &str,
        watcher: Option<oneshot::Sender<WatchedEvent>>,
    ) -> Result<Option<Stat>> {
        let request = Request::Exists {
            path: path.to_string(),
            watch: watcher.is_some(),
        };
        match self.submit(request, watcher).await {
            Ok(Response::Stat(stat)) => Ok(Some(stat)),
            Ok(other) => Err(unexpected("exists", other)),
            Err(KeeperError::NodeMissing { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete a node
    ///
    /// A guaranteed delete runs in its own task and retries transient
    /// failures until it is confirmed, even if the caller stops waiting.
    pub async fn delete(&self, path: &str, options: DeleteOptions) -> Result<()> {
        path::validate(path, false)?;
        if path == ROOT {
            return Err(KeeperError::InvalidPath {
                path: path.to_string(),
                reason: "cannot delete the root",
            });
        }

        if !options.guaranteed {
            let span = tracing::debug_span!("keeper.delete", path);
            return self
                .delete_tree(path, options, self.retry_policy().as_ref())
                .instrument(span)
                .await;
        }

        let client = self.clone();
        let owned = path.to_string();
        let span = tracing::debug_span!("keeper.delete", path, guaranteed = true);
        let task = tokio::spawn(
            async move {
                let policy = RetryForever::new(client.config().retry.interval());
                let result = client.delete_tree(&owned, options, &policy).await;
                if let Err(e) = &result {
                    tracing::warn!(error = %e, "guaranteed delete abandoned");
                }
                result
            }
            .instrument(span),
        );
        task.await
            .map_err(|e| KeeperError::Protocol(format!("delete task failed: {}", e)))?
    }

    async fn delete_tree(
        &self,
        path: &str,
        options: DeleteOptions,
        policy: &dyn RetryPolicy,
    ) -> Result<()> {
        if options.delete_children {
            for descendant in self.descendants(path, policy).await?.iter().rev() {
                let deleted = self
                    .retrying(policy, |attempt| self.delete_once(descendant, -1, attempt))
                    .await;
                match deleted {
                    Ok(()) | Err(KeeperError::NodeMissing { .. }) => {}
                    Err(e) => return Err(e),
                }
            }
        }

        let version = options.version.unwrap_or(-1);
        let guaranteed = options.guaranteed;
        self.retrying(policy, |attempt| async move {
            match self.delete_once(path, version, attempt).await {
                // the lost attempt may have applied
                Err(KeeperError::NodeMissing { .. }) if guaranteed && attempt > 0 => Ok(()),
                other => other,
            }
        })
        .await
    }

    async fn delete_once(&self, path: &str, version: i32, attempt: u32) -> Result<()> {
        tracing::trace!(path, attempt, "delete");
        let request = Request::Delete {
            path: path.to_string(),
            version,
        };
        match self.submit(request, None).await? {
            Response::Empty => Ok(()),
            other => Err(unexpected("delete", other)),
        }
    }

    /// Every node below `path`, breadth-first
    async fn descendants(&self, path: &str, policy: &dyn RetryPolicy) -> Result<Vec<String>> {
        let mut found = Vec::new();
        let mut queue = VecDeque::from([path.to_string()]);
        while let Some(next) = queue.pop_front() {
            let children = match self
                .retrying(policy, |_| self.get_children_raw(&next, None))
                .await
            {
                Ok(children) => children,
                Err(KeeperError::NodeMissing { .. }) => continue,
                Err(e) => return Err(e),
            };
            for child in children {
                let child = path::join(&next, &child);
                found.push(child.clone());
                queue.push_back(child);
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
#[path = "ops_tests.rs"]
mod tests;
