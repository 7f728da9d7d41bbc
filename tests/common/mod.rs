use std::sync::Arc;

use node_watch::callback;
use node_watch::Callback;
use node_watch::InMemoryCoordinator;
use node_watch::Snapshot;
use parking_lot::Mutex;

pub const SERVICE: &str = "/services/foo";

/// Namespace holding `/services/foo` = `{"env":"prod"}` with two children.
pub fn seeded_namespace() -> Arc<InMemoryCoordinator> {
    let zk = Arc::new(InMemoryCoordinator::new());
    zk.create(SERVICE, r#"{"env":"prod"}"#).unwrap();
    zk.create_child(SERVICE, "node1:22", r#"{"w":1}"#).unwrap();
    zk.create_child(SERVICE, "node2:22", r#"{"w":2}"#).unwrap();
    zk
}

/// Callback that keeps every snapshot it is handed.
pub fn recorder() -> (Callback, Arc<Mutex<Vec<Snapshot>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (callback(move |snapshot| sink.lock().push(snapshot.clone())), seen)
}
