use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use node_watch::callback;
use node_watch::gather_metrics;
use node_watch::BackoffPolicy;
use node_watch::ClientError;
use node_watch::CoordinationClient;
use node_watch::InMemoryCoordinator;
use node_watch::NodeWatcher;
use node_watch::WatcherConfig;
use serde_json::json;

use crate::common::recorder;
use crate::common::seeded_namespace;
use crate::common::SERVICE;

fn quick_retry() -> WatcherConfig {
    WatcherConfig {
        watch_children: true,
        fetch_retry: BackoffPolicy {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 4,
        },
    }
}

#[test]
fn watcher_mirrors_seeded_node_and_children() {
    let zk = seeded_namespace();

    let watcher = NodeWatcher::new(zk.clone(), SERVICE, None, true).unwrap();

    let snapshot = watcher.get();
    assert!(watcher.is_watching_children());
    assert_eq!(snapshot.data, Some(json!({"env": "prod"})));
    assert_eq!(snapshot.stat.map(|s| s.num_children), Some(2));
    assert_eq!(snapshot.child_names(), vec!["node1:22", "node2:22"]);
    assert_eq!(snapshot.child("node1:22"), Some(&json!({"w": 1})));
    assert_eq!(snapshot.child("node2:22"), Some(&json!({"w": 2})));
}

#[test]
fn initial_callback_receives_the_subscription_notifications() {
    let zk = seeded_namespace();
    let (cb, seen) = recorder();

    let _watcher = NodeWatcher::new(zk.clone(), SERVICE, Some(cb), true).unwrap();

    // one call per subscription firing on arm: data first, then children
    let seen = seen.lock();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].data, Some(json!({"env": "prod"})));
    assert!(seen[0].children.is_empty());
    assert_eq!(seen[1].children.len(), 2);
}

#[test]
fn data_update_is_refetched_and_decoded() {
    let zk = seeded_namespace();
    let watcher = NodeWatcher::new(zk.clone(), SERVICE, None, true).unwrap();

    let stat = zk.set_data(SERVICE, r#"{"env":"staging"}"#).unwrap();

    let snapshot = watcher.get();
    assert_eq!(snapshot.data, Some(json!({"env": "staging"})));
    assert_eq!(snapshot.stat, Some(stat));
    assert_eq!(snapshot.children.len(), 2);
}

#[test]
fn non_json_and_empty_payloads_decode_to_maps() {
    let zk = seeded_namespace();
    let watcher = NodeWatcher::new(zk.clone(), SERVICE, None, true).unwrap();

    zk.set_data(SERVICE, "10.0.0.1:8080").unwrap();
    assert_eq!(watcher.get().data, Some(json!({"string_value": "10.0.0.1:8080"})));

    zk.set_data(SERVICE, "").unwrap();
    assert_eq!(watcher.get().data, Some(json!({})));
}

#[test]
fn child_set_change_fetches_only_current_children() {
    let zk = seeded_namespace();
    let watcher = NodeWatcher::new(zk.clone(), SERVICE, None, true).unwrap();

    zk.create_child(SERVICE, "node3:80", r#"{"w":3}"#).unwrap();
    zk.reset_get_data_counts();
    zk.delete("/services/foo/node2:22").unwrap();

    let snapshot = watcher.get();
    assert_eq!(snapshot.child_names(), vec!["node1:22", "node3:80"]);
    assert_eq!(snapshot.child("node3:80"), Some(&json!({"w": 3})));
    assert_eq!(zk.get_data_count("/services/foo/node1:22"), 1);
    assert_eq!(zk.get_data_count("/services/foo/node3:80"), 1);
    assert_eq!(zk.get_data_count("/services/foo/node2:22"), 0);
    assert_eq!(zk.get_data_count(SERVICE), 0);
}

#[test]
fn child_payload_change_alone_is_not_tracked() {
    let zk = seeded_namespace();
    let watcher = NodeWatcher::new(zk.clone(), SERVICE, None, true).unwrap();

    zk.set_data("/services/foo/node1:22", r#"{"w":100}"#).unwrap();

    // only a change of the child set refreshes child payloads
    assert_eq!(watcher.get().child("node1:22"), Some(&json!({"w": 1})));

    zk.create_child(SERVICE, "node9:1", "{}").unwrap();
    assert_eq!(watcher.get().child("node1:22"), Some(&json!({"w": 100})));
}

#[test]
fn removing_a_child_leaves_node_data_untouched() {
    let zk = seeded_namespace();
    let watcher = NodeWatcher::new(zk.clone(), SERVICE, None, true).unwrap();
    let before = watcher.get();

    zk.delete("/services/foo/node1:22").unwrap();

    let after = watcher.get();
    assert_eq!(after.data, before.data);
    assert_eq!(after.stat, before.stat);
    assert_eq!(after.child_names(), vec!["node2:22"]);
}

#[test]
fn deleted_node_clears_data_and_stat() {
    let zk = Arc::new(InMemoryCoordinator::new());
    zk.create("/services/bar", r#"{"env":"prod"}"#).unwrap();
    let watcher = NodeWatcher::new(zk.clone(), "/services/bar", None, false).unwrap();
    assert!(watcher.get().exists());

    zk.delete("/services/bar").unwrap();

    let snapshot = watcher.get();
    assert!(!snapshot.exists());
    assert!(snapshot.data.is_none());
    assert!(snapshot.children.is_empty());
}

#[test]
fn node_created_after_construction_is_watched_for_data_only() {
    let zk = Arc::new(InMemoryCoordinator::new());
    let watcher = NodeWatcher::new(zk.clone(), "/late", None, true).unwrap();
    assert!(!watcher.is_watching_children());
    assert!(!watcher.get().exists());

    zk.create("/late", r#"{"up":true}"#).unwrap();
    zk.create_child("/late", "member", "{}").unwrap();

    let snapshot = watcher.get();
    assert_eq!(snapshot.data, Some(json!({"up": true})));
    assert!(snapshot.children.is_empty());
}

#[test]
fn construction_surfaces_existence_check_failure() {
    let zk = seeded_namespace();
    zk.fail_next_exists(ClientError::SessionExpired);

    let err = NodeWatcher::new(zk.clone(), SERVICE, None, true).unwrap_err();

    assert!(err.to_string().contains(SERVICE), "unexpected error: {err}");
}

#[test]
fn transient_failures_are_retried_before_commit() {
    let zk = seeded_namespace();
    let watcher = NodeWatcher::with_config(zk.clone(), SERVICE, None, quick_retry()).unwrap();
    zk.reset_get_data_counts();
    zk.fail_next_get_data(SERVICE, ClientError::ConnectionLoss, 2);

    zk.set_data(SERVICE, r#"{"env":"dr"}"#).unwrap();

    assert_eq!(watcher.get().data, Some(json!({"env": "dr"})));
    assert_eq!(zk.get_data_count(SERVICE), 3);
}

#[test]
fn exhausted_retries_keep_the_previous_cache() {
    let zk = seeded_namespace();
    let (cb, seen) = recorder();
    let watcher = NodeWatcher::with_config(zk.clone(), SERVICE, Some(cb), quick_retry()).unwrap();
    let calls_before = seen.lock().len();
    zk.fail_next_get_data(SERVICE, ClientError::OperationTimeout, 3);

    zk.set_data(SERVICE, r#"{"env":"lost"}"#).unwrap();

    assert_eq!(watcher.get().data, Some(json!({"env": "prod"})));
    assert_eq!(seen.lock().len(), calls_before);
    assert!(gather_metrics().contains("nodewatch_fetch_failures"));

    // next change recovers
    zk.set_data(SERVICE, r#"{"env":"back"}"#).unwrap();
    assert_eq!(watcher.get().data, Some(json!({"env": "back"})));
}

#[test]
fn paused_watcher_keeps_cache_fresh_without_callbacks() {
    let zk = seeded_namespace();
    let (cb, seen) = recorder();
    let watcher = NodeWatcher::new(zk.clone(), SERVICE, Some(cb), true).unwrap();
    let calls_before = seen.lock().len();

    watcher.stop();
    zk.set_data(SERVICE, r#"{"env":"quiet"}"#).unwrap();
    zk.create_child(SERVICE, "node4:9", "{}").unwrap();
    watcher.start();

    assert_eq!(seen.lock().len(), calls_before);
    assert_eq!(watcher.get().data, Some(json!({"env": "quiet"})));
    assert_eq!(watcher.get().children.len(), 3);

    zk.set_data(SERVICE, r#"{"env":"loud"}"#).unwrap();
    assert_eq!(seen.lock().len(), calls_before + 1);
}

#[test]
fn callback_may_mutate_the_namespace_it_watches() {
    let zk = seeded_namespace();
    let watcher = NodeWatcher::new(zk.clone(), SERVICE, None, true).unwrap();
    let writer = zk.clone();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();

    watcher.add_callback(callback(move |snapshot| {
        // first time the mirrored env turns "staging", register a marker child
        if snapshot.data == Some(json!({"env": "staging"})) && counter.fetch_add(1, Ordering::SeqCst) == 0 {
            writer.create_child(SERVICE, "marker", "{}").unwrap();
        }
    }));
    zk.set_data(SERVICE, r#"{"env":"staging"}"#).unwrap();

    assert_eq!(fired.load(Ordering::SeqCst), 2);
    assert!(watcher.get().child("marker").is_some());
    assert!(zk.exists("/services/foo/marker").unwrap());
}

#[test]
fn dropped_watcher_stops_reading() {
    let zk = seeded_namespace();
    let watcher = NodeWatcher::new(zk.clone(), SERVICE, None, true).unwrap();
    drop(watcher);
    zk.reset_get_data_counts();

    zk.set_data(SERVICE, r#"{"env":"gone"}"#).unwrap();
    zk.create_child(SERVICE, "node5:1", "{}").unwrap();

    assert_eq!(zk.get_data_count(SERVICE), 0);
    assert_eq!(zk.get_data_count("/services/foo/node5:1"), 0);
}
