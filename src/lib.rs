//! # node-watch
//!
//! Keeps a local, notification-driven view of one node in a ZooKeeper-like
//! coordination namespace: the node's payload, its stat, and the payload of
//! each direct child. Consumers read the view with [`NodeWatcher::get`] or
//! register callbacks that fire whenever it changes.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use node_watch::{callback, InMemoryCoordinator, NodeWatcher};
//!
//! let client = Arc::new(InMemoryCoordinator::new());
//! client.create("/services/foo", r#"{"env":"prod"}"#)?;
//!
//! let watcher = NodeWatcher::new(
//!     client.clone(),
//!     "/services/foo",
//!     Some(callback(|snapshot| println!("now: {:?}", snapshot.data))),
//!     true,
//! )?;
//!
//! watcher.stop(); // silence callbacks, keep the cache fresh
//! client.set_data("/services/foo", r#"{"env":"staging"}"#)?;
//! assert_eq!(watcher.get().data.unwrap()["env"], "staging");
//! ```
//!
//! Any client implementing [`CoordinationClient`] can be plugged in; the
//! bundled [`InMemoryCoordinator`] is an in-process namespace for tests and
//! local runs.

mod callback;
mod client;
mod codec;
mod config;
mod constants;
mod errors;
mod metrics;
mod snapshot;
mod watcher;
pub mod utils;

pub use callback::*;
pub use client::*;
pub use codec::*;
pub use config::*;
pub use constants::STRING_VALUE_KEY;
pub use errors::*;
pub use metrics::*;
pub use snapshot::*;
pub use watcher::*;
