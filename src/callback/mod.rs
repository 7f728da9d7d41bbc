//! Ordered, identity-deduplicated callback list.


use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::error;

use crate::Snapshot;

/// Observer of snapshot changes.
///
/// Identity is the allocation: registering a clone of the same `Arc` is a
/// duplicate, registering an identical but separately allocated closure is not.
pub type Callback = Arc<dyn Fn(&Snapshot) + Send + Sync>;

/// Wraps a closure into a [`Callback`].
pub fn callback<F>(f: F) -> Callback
where
    F: Fn(&Snapshot) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Default)]
pub struct CallbackRegistry {
    callbacks: RwLock<Vec<Callback>>,
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("len", &self.len())
            .finish()
    }
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `cb` unless the same callback is already registered.
    ///
    /// Returns `false` for a duplicate. The check and the append happen under
    /// one write lock, so two racing registrations of the same callback
    /// produce exactly one entry.
    pub fn insert(
        &self,
        cb: Callback,
    ) -> bool {
        let mut callbacks = self.callbacks.write();
        if callbacks.iter().any(|existing| Arc::ptr_eq(existing, &cb)) {
            return false;
        }
        callbacks.push(cb);
        true
    }

    pub fn contains(
        &self,
        cb: &Callback,
    ) -> bool {
        self.callbacks.read().iter().any(|existing| Arc::ptr_eq(existing, cb))
    }

    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }

    /// Copy of the registered callbacks in registration order.
    ///
    /// Dispatch iterates this copy with no lock held, so callbacks may
    /// register further callbacks; those join from the next dispatch on.
    pub fn entries(&self) -> Vec<Callback> {
        self.callbacks.read().clone()
    }
}

/// Invokes one callback, containing any panic it raises.
///
/// Returns `false` if the callback panicked.
pub(crate) fn invoke_isolated(
    path: &str,
    cb: &Callback,
    snapshot: &Snapshot,
) -> bool {
    match catch_unwind(AssertUnwindSafe(|| cb(snapshot))) {
        Ok(()) => true,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(path = %path, %reason, "callback panicked; continuing with remaining callbacks");
            false
        }
    }
}
