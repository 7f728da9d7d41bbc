//! In-process coordination namespace.
//!
//! [`InMemoryCoordinator`] implements [`CoordinationClient`] over a `DashMap`
//! of nodes so a [`NodeWatcher`](crate::NodeWatcher) can run without a real
//! ensemble: in tests, in local development, or as a fixture for consumers.
//!
//! Semantics follow the usual ZooKeeper client recipes:
//! - subscriptions stay armed after firing
//! - subscribing fires the handler once right away with the current state
//! - mutations notify synchronously, on the thread that made them, after the
//!   namespace has been updated
//! - notifications are delivered one at a time across all threads, like a
//!   single event thread; a handler that mutates the namespace has the
//!   resulting notifications delivered inline

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use dashmap::DashMap;
use parking_lot::Mutex;
use parking_lot::ReentrantMutex;
use tracing::debug;
use tracing::trace;

use super::ChildrenHandler;
use super::CoordinationClient;
use super::DataHandler;
use super::NodeData;
use crate::utils::child_path;
use crate::utils::split_path;
use crate::ClientError;
use crate::NodeStat;

const ROOT: &str = "/";

#[derive(Debug, Clone)]
struct StoredNode {
    data: Vec<u8>,
    stat: NodeStat,
    children: BTreeSet<String>,
}

impl StoredNode {
    fn new(
        data: Vec<u8>,
        zxid: i64,
    ) -> Self {
        let now = now_ms();
        Self {
            stat: NodeStat {
                czxid: zxid,
                mzxid: zxid,
                pzxid: zxid,
                ctime: now,
                mtime: now,
                data_length: data.len() as i32,
                ..Default::default()
            },
            data,
            children: BTreeSet::new(),
        }
    }
}

/// Injected failures, consumed one per matching call
#[derive(Debug, Default)]
struct Faults {
    exists: VecDeque<ClientError>,
    get_data: HashMap<String, VecDeque<ClientError>>,
}

/// Notifications collected while the namespace is locked, delivered after.
#[derive(Default)]
struct Pending {
    data: Vec<(String, Option<NodeStat>)>,
    children: Vec<String>,
}

pub struct InMemoryCoordinator {
    nodes: DashMap<String, StoredNode>,
    data_handlers: DashMap<String, Vec<DataHandler>>,
    child_handlers: DashMap<String, Vec<ChildrenHandler>>,
    /// Serializes mutations that touch a node and its parent together
    write_lock: Mutex<()>,
    /// Held while handlers run. Reentrant so handlers may mutate.
    delivery: ReentrantMutex<()>,
    next_zxid: AtomicI64,
    faults: Mutex<Faults>,
    get_data_calls: DashMap<String, usize>,
}

impl std::fmt::Debug for InMemoryCoordinator {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("InMemoryCoordinator")
            .field("nodes", &self.nodes.len())
            .field("data_subscriptions", &self.data_handlers.len())
            .field("child_subscriptions", &self.child_handlers.len())
            .finish_non_exhaustive()
    }
}

impl Default for InMemoryCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCoordinator {
    pub fn new() -> Self {
        let nodes = DashMap::new();
        nodes.insert(ROOT.to_string(), StoredNode::new(Vec::new(), 0));
        Self {
            nodes,
            data_handlers: DashMap::new(),
            child_handlers: DashMap::new(),
            write_lock: Mutex::new(()),
            delivery: ReentrantMutex::new(()),
            next_zxid: AtomicI64::new(1),
            faults: Mutex::new(Faults::default()),
            get_data_calls: DashMap::new(),
        }
    }

    /// Creates `path` with `data`, creating missing ancestors with empty
    /// payloads.
    pub fn create(
        &self,
        path: &str,
        data: impl Into<Vec<u8>>,
    ) -> Result<NodeStat, ClientError> {
        let data = data.into();
        let mut pending = Pending::default();

        let stat = {
            let _guard = self.write_lock.lock();
            if self.nodes.contains_key(path) {
                return Err(ClientError::Conflict {
                    path: path.to_string(),
                    reason: "node already exists",
                });
            }
            self.create_locked(path, data, &mut pending)?
        };

        self.deliver(pending);
        Ok(stat)
    }

    /// Creates `parent/name` with `data`.
    pub fn create_child(
        &self,
        parent: &str,
        name: &str,
        data: impl Into<Vec<u8>>,
    ) -> Result<NodeStat, ClientError> {
        self.create(&child_path(parent, name), data)
    }

    /// Replaces the payload of an existing node.
    pub fn set_data(
        &self,
        path: &str,
        data: impl Into<Vec<u8>>,
    ) -> Result<NodeStat, ClientError> {
        let data = data.into();
        let stat = {
            let _guard = self.write_lock.lock();
            let mut node = self
                .nodes
                .get_mut(path)
                .ok_or_else(|| ClientError::NoNode(path.to_string()))?;
            node.stat.mzxid = self.next_zxid();
            node.stat.mtime = now_ms();
            node.stat.version += 1;
            node.stat.data_length = data.len() as i32;
            node.data = data;
            node.stat
        };

        trace!(path, version = stat.version, "set_data");
        self.deliver(Pending {
            data: vec![(path.to_string(), Some(stat))],
            children: Vec::new(),
        });
        Ok(stat)
    }

    /// Removes a node without children.
    pub fn delete(
        &self,
        path: &str,
    ) -> Result<(), ClientError> {
        let mut pending = Pending::default();
        {
            let _guard = self.write_lock.lock();
            let has_children = self
                .nodes
                .get(path)
                .map(|node| !node.children.is_empty())
                .ok_or_else(|| ClientError::NoNode(path.to_string()))?;
            if has_children {
                return Err(ClientError::Conflict {
                    path: path.to_string(),
                    reason: "node has children",
                });
            }
            let (parent, name) = split_path(path).ok_or_else(|| invalid_path(path))?;

            self.nodes.remove(path);
            let zxid = self.next_zxid();
            if let Some(mut parent_node) = self.nodes.get_mut(parent) {
                parent_node.children.remove(name);
                parent_node.stat.pzxid = zxid;
                parent_node.stat.cversion += 1;
                parent_node.stat.num_children = parent_node.children.len() as i32;
            }
            pending.data.push((path.to_string(), None));
            pending.children.push(parent.to_string());
        }

        debug!(path, "deleted node");
        self.deliver(pending);
        Ok(())
    }

    /// Current child names of `path`, sorted.
    pub fn get_children(
        &self,
        path: &str,
    ) -> Result<Vec<String>, ClientError> {
        self.nodes
            .get(path)
            .map(|node| node.children.iter().cloned().collect())
            .ok_or_else(|| ClientError::NoNode(path.to_string()))
    }

    /// Makes the next `exists` call fail with `error`.
    pub fn fail_next_exists(
        &self,
        error: ClientError,
    ) {
        self.faults.lock().exists.push_back(error);
    }

    /// Makes the next `times` get-data calls for `path` fail with `error`.
    pub fn fail_next_get_data(
        &self,
        path: &str,
        error: ClientError,
        times: usize,
    ) {
        let mut faults = self.faults.lock();
        let queue = faults.get_data.entry(path.to_string()).or_default();
        queue.extend(std::iter::repeat(error).take(times));
    }

    /// Number of get-data calls issued for `path` so far, failed ones included.
    pub fn get_data_count(
        &self,
        path: &str,
    ) -> usize {
        self.get_data_calls.get(path).map(|c| *c).unwrap_or(0)
    }

    pub fn reset_get_data_counts(&self) {
        self.get_data_calls.clear();
    }

    fn next_zxid(&self) -> i64 {
        self.next_zxid.fetch_add(1, Ordering::SeqCst)
    }

    /// Caller holds `write_lock`.
    fn create_locked(
        &self,
        path: &str,
        data: Vec<u8>,
        pending: &mut Pending,
    ) -> Result<NodeStat, ClientError> {
        let (parent, name) = split_path(path).ok_or_else(|| invalid_path(path))?;
        if !self.nodes.contains_key(parent) {
            self.create_locked(parent, Vec::new(), pending)?;
        }

        let zxid = self.next_zxid();
        let node = StoredNode::new(data, zxid);
        let stat = node.stat;
        self.nodes.insert(path.to_string(), node);

        if let Some(mut parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.insert(name.to_string());
            parent_node.stat.pzxid = zxid;
            parent_node.stat.cversion += 1;
            parent_node.stat.num_children = parent_node.children.len() as i32;
        }

        debug!(path, zxid, "created node");
        pending.data.push((path.to_string(), Some(stat)));
        pending.children.push(parent.to_string());
        Ok(stat)
    }

    /// Runs handlers with no namespace lock or map guard held, so handlers
    /// are free to read back through this client.
    fn deliver(
        &self,
        pending: Pending,
    ) {
        let _delivering = self.delivery.lock();
        for (path, stat) in pending.data {
            let handlers = self.data_handlers.get(&path).map(|h| h.value().clone()).unwrap_or_default();
            for handler in handlers {
                handler(stat);
            }
        }

        for path in pending.children {
            let handlers = self.child_handlers.get(&path).map(|h| h.value().clone()).unwrap_or_default();
            if handlers.is_empty() {
                continue;
            }
            // re-read so every handler sees the set as of delivery time
            let Ok(children) = self.get_children(&path) else {
                continue;
            };
            for handler in handlers {
                handler(children.clone());
            }
        }
    }
}

impl CoordinationClient for InMemoryCoordinator {
    fn exists(
        &self,
        path: &str,
    ) -> Result<bool, ClientError> {
        if let Some(error) = self.faults.lock().exists.pop_front() {
            return Err(error);
        }
        Ok(self.nodes.contains_key(path))
    }

    fn get_data(
        &self,
        path: &str,
    ) -> Result<Option<NodeData>, ClientError> {
        *self.get_data_calls.entry(path.to_string()).or_insert(0) += 1;

        let fault = self.faults.lock().get_data.get_mut(path).and_then(VecDeque::pop_front);
        if let Some(error) = fault {
            return Err(error);
        }

        Ok(self.nodes.get(path).map(|node| NodeData {
            data: node.data.clone(),
            stat: node.stat,
        }))
    }

    fn subscribe_data(
        &self,
        path: &str,
        handler: DataHandler,
    ) -> Result<(), ClientError> {
        // read under the delivery lock so no newer notification can overtake
        let _delivering = self.delivery.lock();
        self.data_handlers
            .entry(path.to_string())
            .or_default()
            .push(handler.clone());

        let stat = self.nodes.get(path).map(|node| node.stat);
        trace!(path, exists = stat.is_some(), "data subscription armed");
        handler(stat);
        Ok(())
    }

    fn subscribe_children(
        &self,
        path: &str,
        handler: ChildrenHandler,
    ) -> Result<(), ClientError> {
        let _delivering = self.delivery.lock();
        let children = self.get_children(path)?;
        self.child_handlers
            .entry(path.to_string())
            .or_default()
            .push(handler.clone());

        trace!(path, children = children.len(), "child subscription armed");
        handler(children);
        Ok(())
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

fn invalid_path(path: &str) -> ClientError {
    ClientError::Other(format!("invalid path {path}"))
}
