//! The coordination-service boundary.
//!
//! [`CoordinationClient`] is the only thing the watcher needs from a
//! ZooKeeper-like service. Session handling, reconnection and watch replay
//! after a reconnect stay on the client's side of this trait.

mod memory;
pub use memory::*;


use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

use crate::ClientError;
use crate::NodeStat;

/// Invoked with the node's current stat, or `None` once it no longer exists.
pub type DataHandler = Arc<dyn Fn(Option<NodeStat>) + Send + Sync>;

/// Invoked with the complete current set of child names.
pub type ChildrenHandler = Arc<dyn Fn(Vec<String>) + Send + Sync>;

/// Raw payload and revision metadata returned by a get-data call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeData {
    pub data: Vec<u8>,
    pub stat: NodeStat,
}

#[cfg_attr(test, automock)]
pub trait CoordinationClient: Send + Sync + 'static {
    /// Whether a node currently exists at `path`.
    fn exists(
        &self,
        path: &str,
    ) -> Result<bool, ClientError>;

    /// Reads a node's payload and stat.
    ///
    /// Returns `Ok(None)` when the node does not exist, including when it
    /// vanished after a notification reported it.
    fn get_data(
        &self,
        path: &str,
    ) -> Result<Option<NodeData>, ClientError>;

    /// Registers `handler` for every future data or existence change of `path`.
    ///
    /// Whether the subscription re-arms itself after firing is up to the
    /// client; callers must treat each call as a hint to re-read.
    fn subscribe_data(
        &self,
        path: &str,
        handler: DataHandler,
    ) -> Result<(), ClientError>;

    /// Registers `handler` for every future change of `path`'s child set.
    fn subscribe_children(
        &self,
        path: &str,
        handler: ChildrenHandler,
    ) -> Result<(), ClientError>;
}
