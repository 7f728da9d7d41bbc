use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::callback::invoke_isolated;
use crate::metrics::CALLBACK_DISPATCHES;
use crate::metrics::CALLBACK_FAILURES;
use crate::metrics::CHILD_REFRESHES;
use crate::metrics::DATA_REFRESHES;
use crate::metrics::FETCH_FAILURES;
use crate::utils::child_path;
use crate::utils::retry::retry_with_exponential_backoff;
use crate::Callback;
use crate::CallbackRegistry;
use crate::ChildrenHandler;
use crate::ClientError;
use crate::CoordinationClient;
use crate::DataHandler;
use crate::Error;
use crate::JsonPayloadDecoder;
use crate::NodeData;
use crate::NodeStat;
use crate::PayloadDecoder;
use crate::Result;
use crate::Snapshot;
use crate::WatcherConfig;

/// Watches one node for data and child changes and caches the result.
///
/// Cloning is cheap and every clone shares the same cache, registry and
/// activity flag. Once the last clone is dropped, notifications still in
/// flight from the client become no-ops.
pub struct NodeWatcher<C>
where
    C: CoordinationClient,
{
    inner: Arc<WatcherInner<C>>,
}

pub(crate) struct WatcherInner<C>
where
    C: CoordinationClient,
{
    client: Arc<C>,
    path: String,
    config: WatcherConfig,
    decoder: Arc<dyn PayloadDecoder>,

    /// Live cache. Readers load it lock-free; writers swap in a new value
    /// while holding `commit_lock`.
    snapshot: ArcSwap<Snapshot>,
    commit_lock: Mutex<()>,

    /// Serialize firings of the same handler across fetch and commit
    data_refresh: Mutex<()>,
    child_refresh: Mutex<()>,

    callbacks: CallbackRegistry,
    active: AtomicBool,
    watching_children: AtomicBool,
}

impl<C> Clone for NodeWatcher<C>
where
    C: CoordinationClient,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C> std::fmt::Debug for NodeWatcher<C>
where
    C: CoordinationClient,
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("NodeWatcher")
            .field("path", &self.inner.path)
            .field("active", &self.is_active())
            .field("watching_children", &self.is_watching_children())
            .field("callbacks", &self.inner.callbacks.len())
            .finish_non_exhaustive()
    }
}

impl<C> NodeWatcher<C>
where
    C: CoordinationClient,
{
    /// Starts watching `path`.
    ///
    /// `callback`, if given, is registered but not called here; it receives
    /// the first notification like any other callback.
    ///
    /// Children are watched only if `watch_children` is set and the node
    /// exists right now. A node created later is watched for data only.
    ///
    /// Everything else uses [`WatcherConfig::default`]. To honour the
    /// `CONFIG_PATH` file and `WATCHER__*` overrides, load them and pass
    /// the result to [`with_config`](Self::with_config):
    ///
    /// ```ignore
    /// let config = WatcherConfig::new()?.validate()?;
    /// let watcher = NodeWatcher::with_config(client, "/services/foo", None, config)?;
    /// ```
    pub fn new(
        client: Arc<C>,
        path: impl Into<String>,
        callback: Option<Callback>,
        watch_children: bool,
    ) -> Result<Self> {
        let config = WatcherConfig {
            watch_children,
            ..Default::default()
        };
        Self::with_config(client, path, callback, config)
    }

    pub fn with_config(
        client: Arc<C>,
        path: impl Into<String>,
        callback: Option<Callback>,
        config: WatcherConfig,
    ) -> Result<Self> {
        Self::with_decoder(client, path, callback, config, Arc::new(JsonPayloadDecoder))
    }

    pub fn with_decoder(
        client: Arc<C>,
        path: impl Into<String>,
        callback: Option<Callback>,
        config: WatcherConfig,
        decoder: Arc<dyn PayloadDecoder>,
    ) -> Result<Self> {
        let path = path.into();
        let inner = Arc::new(WatcherInner {
            client,
            snapshot: ArcSwap::from_pointee(Snapshot::empty(path.clone())),
            path,
            config,
            decoder,
            commit_lock: Mutex::new(()),
            data_refresh: Mutex::new(()),
            child_refresh: Mutex::new(()),
            callbacks: CallbackRegistry::new(),
            active: AtomicBool::new(true),
            watching_children: AtomicBool::new(false),
        });
        if let Some(cb) = callback {
            inner.callbacks.insert(cb);
        }

        WatcherInner::arm(&inner)?;
        Ok(Self { inner })
    }

    /// Current cached view, by value.
    pub fn get(&self) -> Snapshot {
        (**self.inner.snapshot.load()).clone()
    }

    /// Current cached view without copying it.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.snapshot.load_full()
    }

    /// Registers `cb` and calls it once with the current snapshot.
    ///
    /// The catch-up call happens even while paused. Registering a callback
    /// that is already present logs a warning and does nothing; returns
    /// whether `cb` was added.
    pub fn add_callback(
        &self,
        cb: Callback,
    ) -> bool {
        if !self.inner.callbacks.insert(cb.clone()) {
            warn!(path = %self.inner.path, "Callback already exists. Not triggering again.");
            return false;
        }

        let snapshot = self.inner.snapshot.load_full();
        self.inner.invoke(&cb, &snapshot);
        true
    }

    pub fn callback_count(&self) -> usize {
        self.inner.callbacks.len()
    }

    /// Resumes callback delivery. Does not replay missed changes.
    pub fn start(&self) {
        self.inner.active.store(true, Ordering::SeqCst);
        debug!(path = %self.inner.path, "callbacks resumed");
    }

    /// Pauses callback delivery. The cache keeps refreshing.
    pub fn stop(&self) {
        self.inner.active.store(false, Ordering::SeqCst);
        debug!(path = %self.inner.path, "callbacks paused");
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Whether the child subscription was armed at construction.
    pub fn is_watching_children(&self) -> bool {
        self.inner.watching_children.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.inner.config
    }
}

impl<C> WatcherInner<C>
where
    C: CoordinationClient,
{
    fn arm(this: &Arc<Self>) -> Result<()> {
        let path = this.path.as_str();

        debug!(path = %path, "Registering watch on data changes");
        let weak: Weak<Self> = Arc::downgrade(this);
        let on_data: DataHandler = Arc::new(move |stat| {
            if let Some(inner) = weak.upgrade() {
                inner.on_data_change(stat);
            }
        });
        this.client
            .subscribe_data(path, on_data)
            .map_err(|source| construction_error(path, source))?;

        // One-time check: a node created after this point gets data
        // notifications only.
        let exists = this.client.exists(path).map_err(|source| construction_error(path, source))?;
        if !(exists && this.config.watch_children) {
            debug!(path = %path, exists, watch_children = this.config.watch_children, "not watching children");
            return Ok(());
        }

        debug!(path = %path, "Registering watch on child changes");
        this.watching_children.store(true, Ordering::SeqCst);
        let weak: Weak<Self> = Arc::downgrade(this);
        let on_children: ChildrenHandler = Arc::new(move |children| {
            if let Some(inner) = weak.upgrade() {
                inner.on_children_change(children);
            }
        });
        this.client.subscribe_children(path, on_children).map_err(|source| {
            this.watching_children.store(false, Ordering::SeqCst);
            construction_error(path, source)
        })
    }

    /// Data or existence of the node changed.
    ///
    /// Always re-reads the node: a stat attached to the notification only
    /// says the node exists, the payload must come from a fresh get-data.
    pub(crate) fn on_data_change(
        &self,
        stat: Option<NodeStat>,
    ) {
        trace!(path = %self.path, "Data change detected");
        {
            let _serial = self.data_refresh.lock();

            let fetched = match stat {
                Some(_) => match self.fetch(&self.path) {
                    Ok(fetched) => fetched,
                    Err(e) => {
                        warn!(path = %self.path, error = %e, "data refresh failed, keeping cached value");
                        FETCH_FAILURES.with_label_values(&[&self.path]).inc();
                        return;
                    }
                },
                None => {
                    debug!(path = %self.path, "Node is not registered.");
                    None
                }
            };

            // Ok(None) here means the node vanished between notification and fetch
            let (data, stat) = match fetched {
                Some(NodeData { data, stat }) => (Some(self.decoder.decode(&data)), Some(stat)),
                None => (None, None),
            };
            debug!(path = %self.path, data = ?data, stat = ?stat, "committing data refresh");
            self.commit(|current| current.with_data(data, stat));
            DATA_REFRESHES.with_label_values(&[&self.path]).inc();
        }

        self.execute_callbacks();
    }

    /// Child set changed; rebuild the whole mapping from `children`.
    pub(crate) fn on_children_change(
        &self,
        children: Vec<String>,
    ) {
        {
            let _serial = self.child_refresh.lock();

            let mut sorted = children.clone();
            sorted.sort_unstable();
            debug!(path = %self.path, children = ?sorted, "New children");

            let mut mapping = HashMap::with_capacity(children.len());
            for child in children {
                let full_path = child_path(&self.path, &child);
                match self.fetch(&full_path) {
                    Ok(Some(node)) => {
                        mapping.insert(child, self.decoder.decode(&node.data));
                    }
                    Ok(None) => {
                        debug!(path = %self.path, child = %child, "child vanished before it could be read");
                    }
                    Err(e) => {
                        // A partial mapping would mix two generations of the child set
                        warn!(path = %self.path, child = %child, error = %e, "child refresh failed, keeping cached children");
                        FETCH_FAILURES.with_label_values(&[&self.path]).inc();
                        return;
                    }
                }
            }

            self.commit(|current| current.with_children(mapping));
            CHILD_REFRESHES.with_label_values(&[&self.path]).inc();
        }

        self.execute_callbacks();
    }

    fn fetch(
        &self,
        path: &str,
    ) -> Result<Option<NodeData>> {
        retry_with_exponential_backoff(
            || -> std::result::Result<Option<NodeData>, ClientError> { self.client.get_data(path) },
            self.config.fetch_retry,
        )
        .map_err(|e| Error::Fetch {
            path: path.to_string(),
            source: Box::new(e),
        })
    }

    fn commit(
        &self,
        update: impl FnOnce(&Snapshot) -> Snapshot,
    ) {
        let _guard = self.commit_lock.lock();
        let next = update(&self.snapshot.load());
        self.snapshot.store(Arc::new(next));
    }

    fn execute_callbacks(&self) {
        trace!(path = %self.path, "execute_callbacks triggered");

        if !self.active.load(Ordering::SeqCst) {
            debug!(path = %self.path, "watcher is paused - not executing callbacks.");
            return;
        }

        let snapshot = self.snapshot.load_full();
        for cb in self.callbacks.entries() {
            self.invoke(&cb, &snapshot);
        }
    }

    fn invoke(
        &self,
        cb: &Callback,
        snapshot: &Snapshot,
    ) {
        CALLBACK_DISPATCHES.inc();
        if !invoke_isolated(&self.path, cb, snapshot) {
            CALLBACK_FAILURES.with_label_values(&[&self.path]).inc();
        }
    }
}

fn construction_error(
    path: &str,
    source: ClientError,
) -> Error {
    Error::Construction {
        path: path.to_string(),
        source,
    }
}
