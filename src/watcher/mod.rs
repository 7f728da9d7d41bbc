//! Watch-and-cache core.
//!
//! A [`NodeWatcher`] keeps a [`Snapshot`](crate::Snapshot) of one node current
//! by reacting to two independent subscriptions on the coordination client:
//!
//! ```text
//!  data subscription ──► on_data_change ──► get_data(path) ──────────┐
//!                                                                    ▼
//!                                                     commit (data, stat)
//!                                                                    │
//!  child subscription ─► on_children_change ─► get_data(path/child)  │
//!                                              for every child       │
//!                                                    │               │
//!                                                    ▼               ▼
//!                                          commit children ──► ArcSwap<Snapshot>
//!                                                                    │
//!                                                                    ▼
//!                                                  callbacks (unless paused)
//! ```
//!
//! # Threading
//!
//! The watcher owns no threads. Both handlers run on whatever thread the
//! client notifies on, possibly concurrently:
//!
//! - firings of the same handler are serialized, fetch and commit included
//! - the two handlers write disjoint halves of the snapshot under one commit
//!   lock, so neither overwrites the other's result
//! - readers never take a lock and never observe a half-applied refresh
//! - network reads happen outside the commit lock; callbacks run with no
//!   watcher lock held, so they may call back into the watcher
//!
//! # Failure policy
//!
//! Fetches are retried per [`BackoffPolicy`](crate::BackoffPolicy). When a
//! refresh still fails, it is abandoned and the previous cached value stays
//! in place; a failed child fetch abandons the whole child refresh. A
//! panicking callback is logged and skipped.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use node_watch::{callback, InMemoryCoordinator, NodeWatcher};
//!
//! let zk = Arc::new(InMemoryCoordinator::new());
//! zk.create("/services/foo", r#"{"env":"prod"}"#)?;
//!
//! let watcher = NodeWatcher::new(zk.clone(), "/services/foo", None, true)?;
//! watcher.add_callback(callback(|snapshot| println!("{:?}", snapshot.children)));
//!
//! zk.create("/services/foo/node1:22", r#"{"w":1}"#)?;
//! assert_eq!(watcher.get().children.len(), 1);
//! ```

mod node_watcher;
pub use node_watcher::*;
