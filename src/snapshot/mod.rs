//! Cached view of one watched node.
//!
//! A [`Snapshot`] is an immutable value: the watcher builds a fresh one for
//! every refresh and swaps it in, so a snapshot handed to a caller or a
//! callback never changes underneath it.
//!
//! ```json
//! {
//!     "path": "/services/foo",
//!     "data": { "env": "prod" },
//!     "stat": { "czxid": 116, "mzxid": 4032, "version": 5, "num_children": 2, ... },
//!     "children": {
//!         "node1:22": { "w": 1 },
//!         "node2:22": { "w": 2 }
//!     }
//! }
//! ```


use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Revision metadata of a node, as reported by the coordination service.
///
/// The watcher never interprets these fields; they are passed through so
/// consumers can detect staleness or ownership.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStat {
    /// Transaction id of the change that created the node
    pub czxid: i64,
    /// Transaction id of the last data change
    pub mzxid: i64,
    /// Transaction id of the last child-set change
    pub pzxid: i64,
    /// Creation time, milliseconds since epoch
    pub ctime: i64,
    /// Last modification time, milliseconds since epoch
    pub mtime: i64,
    /// Number of data changes
    pub version: i32,
    /// Number of child-set changes
    pub cversion: i32,
    /// Number of ACL changes
    pub aversion: i32,
    /// Session id of the owner if the node is ephemeral, otherwise 0
    pub ephemeral_owner: i64,
    pub data_length: i32,
    pub num_children: i32,
}

/// Point-in-time view of a node's data, metadata and children's data.
///
/// `data` and `stat` are always written together: when `stat` is `None` the
/// node did not exist at the last data refresh and `data` is `None` as well.
/// `children` is refreshed independently and may be older or newer than the
/// data half.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub path: String,
    pub data: Option<Value>,
    pub stat: Option<NodeStat>,
    pub children: HashMap<String, Value>,
}

impl Snapshot {
    /// Snapshot of a node nothing is known about yet.
    pub fn empty(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            data: None,
            stat: None,
            children: HashMap::new(),
        }
    }

    /// Whether the node existed at the last data refresh.
    #[inline]
    pub fn exists(&self) -> bool {
        self.stat.is_some()
    }

    #[inline]
    pub fn child(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.children.get(name)
    }

    /// Child names in lexical order.
    pub fn child_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.children.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Copy of this snapshot with the data half replaced.
    pub(crate) fn with_data(
        &self,
        data: Option<Value>,
        stat: Option<NodeStat>,
    ) -> Self {
        // stat absent means the node is gone; never keep a payload for it
        let data = if stat.is_some() { data } else { None };
        Self {
            path: self.path.clone(),
            data,
            stat,
            children: self.children.clone(),
        }
    }

    /// Copy of this snapshot with the children mapping replaced wholesale.
    pub(crate) fn with_children(
        &self,
        children: HashMap<String, Value>,
    ) -> Self {
        Self {
            path: self.path.clone(),
            data: self.data.clone(),
            stat: self.stat,
            children,
        }
    }
}
