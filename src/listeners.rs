//! Removal listener registry (§4.4, §5, §9).
//!
//! "Listener copy-on-write list → an atomically swapped immutable vector of
//! callbacks" (spec.md §9) — that's exactly what `ArcSwap<Vec<...>>` gives
//! us: readers (the hot path, invoking listeners during a mutation) never
//! take a lock, and registration/unregistration builds a whole new `Vec` and
//! swaps it in.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::entry::Entry;

/// A removal notification: the cause that removed a batch of entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalCause {
    /// Evicted by the bounded variant's size-based policy.
    Size,
    /// Removed by an explicit `remove`/`clear`/`evict` call.
    Explicit,
    /// Replaced by a new value for the same key (not a net removal of the
    /// key, but the old value is gone — used for activation notification).
    Replaced,
}

/// A removal listener: invoked with every entry removed in one removal
/// event, plus the cause.
pub trait RemovalListener<K, V>: Send + Sync {
    /// Called once per removal event with the batch of removed entries.
    fn on_removal(&self, removed: &[(K, Entry<K, V>)], cause: RemovalCause);
}

impl<K, V, F> RemovalListener<K, V> for F
where
    F: Fn(&[(K, Entry<K, V>)], RemovalCause) + Send + Sync,
{
    fn on_removal(&self, removed: &[(K, Entry<K, V>)], cause: RemovalCause) {
        self(removed, cause)
    }
}

/// A registration handle returned by [`ListenerRegistry::register`], usable
/// to unregister that listener later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

/// Copy-on-write registry of removal listeners. Invocation order is
/// registration order (§4.4); exceptions (panics, in Rust) in a listener are
/// caught and logged, never allowed to abort the mutation that triggered
/// them.
pub struct ListenerRegistry<K, V> {
    listeners: ArcSwap<Vec<(u64, Arc<dyn RemovalListener<K, V>>)>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl<K, V> std::fmt::Debug for ListenerRegistry<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("len", &self.len())
            .finish()
    }
}

impl<K, V> Default for ListenerRegistry<K, V> {
    fn default() -> Self {
        ListenerRegistry {
            listeners: ArcSwap::from_pointee(Vec::new()),
            next_id: std::sync::atomic::AtomicU64::new(0),
        }
    }
}

impl<K, V> ListenerRegistry<K, V> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener, returning an id that can later be passed to
    /// [`ListenerRegistry::unregister`]. Registration order determines
    /// delivery order.
    pub fn register(&self, listener: Arc<dyn RemovalListener<K, V>>) -> ListenerId {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        loop {
            let current = self.listeners.load();
            let mut next = (**current).clone();
            next.push((id, Arc::clone(&listener)));
            let prev = self.listeners.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&prev, &current) {
                break;
            }
        }
        ListenerId(id)
    }

    /// Removes a previously-registered listener. No-op if already removed.
    pub fn unregister(&self, id: ListenerId) {
        loop {
            let current = self.listeners.load();
            let mut next = (**current).clone();
            let before = next.len();
            next.retain(|(existing_id, _)| *existing_id != id.0);
            if next.len() == before {
                return;
            }
            let prev = self.listeners.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&prev, &current) {
                return;
            }
        }
    }

    /// Invokes every registered listener, in registration order, with the
    /// given batch and cause. A panicking listener is caught and logged; the
    /// remaining listeners still run and the caller is never affected.
    pub fn notify(&self, removed: &[(K, Entry<K, V>)], cause: RemovalCause)
    where
        K: std::panic::RefUnwindSafe,
        V: std::panic::RefUnwindSafe,
    {
        if removed.is_empty() {
            return;
        }
        let snapshot = self.listeners.load();
        for (_, listener) in snapshot.iter() {
            let result = catch_unwind(AssertUnwindSafe(|| listener.on_removal(removed, cause)));
            if let Err(payload) = result {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                tracing::error!(cause = ?cause, %message, "removal listener panicked; continuing");
            }
        }
    }

    /// Number of currently registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.load().len()
    }

    /// True if no listeners are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
