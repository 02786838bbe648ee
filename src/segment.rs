//! Segment storage (C2).
//!
//! A segment owns one shard of the key space behind one `parking_lot::Mutex`
//! (§5: "never takes more than one segment lock at a time; never calls a
//! collaborator while holding it beyond the minimum needed"). Two storage
//! strategies share the same `Segment` surface: `unbounded` is a plain hash
//! map; `bounded` additionally threads every entry through the intrusive LRU
//! list from [`crate::list`] so a size-triggered eviction can pick a victim
//! in O(1).

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::num::NonZeroUsize;

#[cfg(feature = "hashbrown")]
use hashbrown::HashMap;
#[cfg(not(feature = "hashbrown"))]
use std::collections::HashMap;

use parking_lot::Mutex;

use crate::entry::Entry;
use crate::list::{List, ListNode};

struct Bucket<K, V> {
    entry: Entry<K, V>,
    /// Position in the LRU list; always `None` for an unbounded segment.
    node: Option<*mut ListNode<K>>,
}

/// One shard of the container's key space.
///
/// `K` must be `Clone` because the LRU list stores a second copy of the key
/// (as the list node's payload) so eviction can report which key it dropped
/// without needing to borrow out of the map it is about to mutate. The
/// `node` pointers are always valid as long as they were obtained from this
/// segment's own `order` list and have not been detached since.
pub struct Segment<K, V, S> {
    inner: Mutex<SegmentInner<K, V, S>>,
    bound: Bound,
}

impl<K, V, S> fmt::Debug for Segment<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.inner.lock();
        f.debug_struct("Segment")
            .field("len", &guard.map.len())
            .field("bounded", &matches!(self.bound, Bound::Bounded { .. }))
            .finish()
    }
}

// SAFETY: Segment owns all data; the raw pointers in `Bucket::node` point
// only to nodes owned by the same segment's `order` list, and every access
// to either goes through `inner`'s mutex.
unsafe impl<K: Send, V: Send, S: Send> Send for Segment<K, V, S> {}

// SAFETY: all mutation happens behind `inner`'s mutex; a shared `&Segment`
// cannot observe or cause a data race on the raw pointers.
unsafe impl<K: Send, V: Send, S: Sync> Sync for Segment<K, V, S> {}

enum Bound {
    Unbounded,
    Bounded { max_entries: usize },
}

struct SegmentInner<K, V, S> {
    map: HashMap<K, Bucket<K, V>, S>,
    order: Option<List<K>>,
}

impl<K, V, S> SegmentInner<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn unbounded(hash_builder: S) -> Self {
        SegmentInner {
            map: HashMap::with_hasher(hash_builder),
            order: None,
        }
    }

    fn bounded(hash_builder: S, max_entries: usize) -> Self {
        let cap = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::new(1).unwrap());
        SegmentInner {
            map: HashMap::with_hasher(hash_builder),
            order: Some(List::new(cap)),
        }
    }
}

/// Outcome of a `compute` call, mirroring §4.4's read-modify-write contract:
/// the closure inspects the current entry (if any) and decides to leave it,
/// replace it, or remove it.
#[derive(Debug)]
pub enum ComputeResult<E> {
    /// Leave the entry as-is (or leave the key absent).
    Unchanged,
    /// Install this as the new entry.
    Put(E),
    /// Remove the key.
    Remove,
}

impl<K, V, S> Segment<K, V, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher,
{
    /// Creates an unbounded segment: no size limit, no eviction.
    pub fn unbounded(hash_builder: S) -> Self {
        Segment {
            inner: Mutex::new(SegmentInner::unbounded(hash_builder)),
            bound: Bound::Unbounded,
        }
    }

    /// Creates a bounded segment that evicts least-recently-used entries
    /// once it holds more than `max_entries`.
    pub fn bounded(hash_builder: S, max_entries: usize) -> Self {
        Segment {
            inner: Mutex::new(SegmentInner::bounded(hash_builder, max_entries)),
            bound: Bound::Bounded { max_entries },
        }
    }

    /// Detaches `node` from the order list and returns its owned key,
    /// without deallocating through a leaked `MaybeUninit`.
    fn detach(order: &mut List<K>, node: *mut ListNode<K>) -> Option<K> {
        // SAFETY: `node` was returned by a prior `add_unchecked` on this same
        // list and has not been detached since.
        unsafe { order.remove(node) }.map(|boxed| {
            // SAFETY: `boxed` is a non-sigil node produced by `add_unchecked`.
            unsafe { boxed.into_value() }
        })
    }

    /// Returns a clone of the stored entry. Does not promote recency and
    /// does not consult expiry — callers apply `ExpirationManager`
    /// themselves, outside the lock, per §5.
    pub fn peek(&self, key: &K) -> Option<Entry<K, V>>
    where
        V: Clone,
    {
        let guard = self.inner.lock();
        guard.map.get(key).map(|bucket| bucket.entry.clone())
    }

    /// Like [`Segment::peek`] but promotes the entry to most-recently-used in
    /// a bounded segment.
    pub fn get_and_touch(&self, key: &K) -> Option<Entry<K, V>>
    where
        V: Clone,
    {
        let mut guard = self.inner.lock();
        let node = guard.map.get(key).and_then(|b| b.node);
        if let (Some(node), Some(order)) = (node, guard.order.as_mut()) {
            // SAFETY: `node` is a live entry in `order`.
            unsafe { order.move_to_front(node) };
        }
        guard.map.get(key).map(|bucket| bucket.entry.clone())
    }

    /// Number of entries currently stored (including any that are logically
    /// expired but not yet reaped).
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    /// True if the segment holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry, returning them for the caller to notify
    /// listeners with (always cause `Explicit`).
    pub fn clear(&self) -> Vec<(K, Entry<K, V>)> {
        let mut guard = self.inner.lock();
        let drained: Vec<(K, Entry<K, V>)> = guard
            .map
            .drain()
            .map(|(_, bucket)| (bucket.entry.key().clone(), bucket.entry))
            .collect();
        if let Some(order) = guard.order.as_mut() {
            order.clear();
        }
        drained
    }

    /// Removes a single key if present, returning the removed entry.
    pub fn remove(&self, key: &K) -> Option<Entry<K, V>> {
        let mut guard = self.inner.lock();
        let bucket = guard.map.remove(key)?;
        if let (Some(node), Some(order)) = (bucket.node, guard.order.as_mut()) {
            Self::detach(order, node);
        }
        Some(bucket.entry)
    }

    /// Inserts or replaces `entry`, evicting LRU victims if the segment is
    /// bounded and now over capacity. Returns the previous entry (if any,
    /// cause `Replaced`) and any entries evicted for size (cause `Size`).
    pub fn put(&self, entry: Entry<K, V>) -> (Option<Entry<K, V>>, Vec<(K, Entry<K, V>)>) {
        let mut guard = self.inner.lock();

        let previous = if let Some(old) = guard.map.remove(entry.key()) {
            if let (Some(node), Some(order)) = (old.node, guard.order.as_mut()) {
                Self::detach(order, node);
            }
            Some(old.entry)
        } else {
            None
        };

        let node = guard
            .order
            .as_mut()
            .map(|order| order.add_unchecked(entry.key().clone()));
        let key = entry.key().clone();
        guard.map.insert(key, Bucket { entry, node });

        let evicted = self.evict_overflow(&mut guard);
        (previous, evicted)
    }

    fn evict_overflow(&self, guard: &mut SegmentInner<K, V, S>) -> Vec<(K, Entry<K, V>)> {
        let max_entries = match self.bound {
            Bound::Unbounded => return Vec::new(),
            Bound::Bounded { max_entries } => max_entries,
        };
        let mut evicted = Vec::new();
        let Some(order) = guard.order.as_mut() else {
            return evicted;
        };
        while guard.map.len() > max_entries {
            let Some(victim_key) = order.remove_last().map(|boxed| {
                // SAFETY: non-sigil node produced by `add_unchecked`.
                unsafe { boxed.into_value() }
            }) else {
                break;
            };
            if let Some(bucket) = guard.map.remove(&victim_key) {
                evicted.push((victim_key, bucket.entry));
            }
        }
        evicted
    }

    /// Atomic read-modify-write on the entry for `key` (§4.4 `compute`). `f`
    /// observes the current entry (after promoting recency in a bounded
    /// segment) and decides the outcome. Returns `(old, new, evicted_for_size)`.
    pub fn compute<F>(
        &self,
        key: &K,
        f: F,
    ) -> (Option<Entry<K, V>>, Option<Entry<K, V>>, Vec<(K, Entry<K, V>)>)
    where
        F: FnOnce(Option<&Entry<K, V>>) -> ComputeResult<Entry<K, V>>,
        V: Clone,
    {
        let mut guard = self.inner.lock();

        if let (Some(node), Some(order)) =
            (guard.map.get(key).and_then(|b| b.node), guard.order.as_mut())
        {
            // SAFETY: `node` is a live entry in `order`.
            unsafe { order.move_to_front(node) };
        }

        let current = guard.map.get(key).map(|b| &b.entry);
        let outcome = f(current);

        match outcome {
            ComputeResult::Unchanged => (None, None, Vec::new()),
            ComputeResult::Remove => {
                let removed = guard.map.remove(key).map(|bucket| {
                    if let (Some(node), Some(order)) = (bucket.node, guard.order.as_mut()) {
                        Self::detach(order, node);
                    }
                    bucket.entry
                });
                (removed, None, Vec::new())
            }
            ComputeResult::Put(new_entry) => {
                let old = guard.map.remove(key).map(|bucket| {
                    if let (Some(node), Some(order)) = (bucket.node, guard.order.as_mut()) {
                        Self::detach(order, node);
                    }
                    bucket.entry
                });
                let node = guard
                    .order
                    .as_mut()
                    .map(|order| order.add_unchecked(new_entry.key().clone()));
                let insert_key = new_entry.key().clone();
                guard.map.insert(
                    insert_key,
                    Bucket {
                        entry: new_entry.clone(),
                        node,
                    },
                );
                let evicted = self.evict_overflow(&mut guard);
                (old, Some(new_entry), evicted)
            }
        }
    }

    /// Snapshot of all (key, entry) pairs currently stored, in no particular
    /// order. Used by [`crate::iter`] to build a per-segment page without
    /// holding the lock across yields (§4.7, §5).
    pub fn snapshot(&self) -> Vec<(K, Entry<K, V>)>
    where
        V: Clone,
    {
        let guard = self.inner.lock();
        guard
            .map
            .values()
            .map(|bucket| (bucket.entry.key().clone(), bucket.entry.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Metadata;
    use hashbrown::DefaultHashBuilder;

    fn entry(key: &'static str, value: i32) -> Entry<&'static str, i32> {
        Entry::create(key, value, Metadata::IMMORTAL, 0)
    }

    #[test]
    fn unbounded_put_get_remove() {
        let seg: Segment<&str, i32, _> = Segment::unbounded(DefaultHashBuilder::default());
        assert!(seg.peek(&"a").is_none());

        let (prev, evicted) = seg.put(entry("a", 1));
        assert!(prev.is_none());
        assert!(evicted.is_empty());
        assert_eq!(*seg.peek(&"a").unwrap().value(), 1);

        let (prev, _) = seg.put(entry("a", 2));
        assert_eq!(*prev.unwrap().value(), 1);
        assert_eq!(*seg.peek(&"a").unwrap().value(), 2);

        let removed = seg.remove(&"a").unwrap();
        assert_eq!(*removed.value(), 2);
        assert!(seg.peek(&"a").is_none());
    }

    #[test]
    fn bounded_evicts_least_recently_used() {
        let seg: Segment<&str, i32, _> = Segment::bounded(DefaultHashBuilder::default(), 2);
        seg.put(entry("a", 1));
        seg.put(entry("b", 2));
        // touch "a" so "b" becomes the LRU victim
        seg.get_and_touch(&"a");
        let (_, evicted) = seg.put(entry("c", 3));

        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].0, "b");
        assert_eq!(seg.len(), 2);
        assert!(seg.peek(&"a").is_some());
        assert!(seg.peek(&"c").is_some());
        assert!(seg.peek(&"b").is_none());
    }

    #[test]
    fn compute_put_remove_and_unchanged() {
        let seg: Segment<&str, i32, _> = Segment::unbounded(DefaultHashBuilder::default());

        let (old, new, _) = seg.compute(&"a", |current| {
            assert!(current.is_none());
            ComputeResult::Put(entry("a", 1))
        });
        assert!(old.is_none());
        assert_eq!(*new.unwrap().value(), 1);

        let (old, new, _) = seg.compute(&"a", |current| {
            assert_eq!(*current.unwrap().value(), 1);
            ComputeResult::Unchanged
        });
        assert!(old.is_none());
        assert!(new.is_none());
        assert_eq!(*seg.peek(&"a").unwrap().value(), 1);

        let (old, new, _) = seg.compute(&"a", |_| ComputeResult::Remove);
        assert_eq!(*old.unwrap().value(), 1);
        assert!(new.is_none());
        assert!(seg.peek(&"a").is_none());
    }

    #[test]
    fn clear_drains_everything() {
        let seg: Segment<&str, i32, _> = Segment::bounded(DefaultHashBuilder::default(), 10);
        seg.put(entry("a", 1));
        seg.put(entry("b", 2));
        let drained = seg.clear();
        assert_eq!(drained.len(), 2);
        assert_eq!(seg.len(), 0);
    }

    #[test]
    fn snapshot_sees_all_entries() {
        let seg: Segment<&str, i32, _> = Segment::unbounded(DefaultHashBuilder::default());
        seg.put(entry("a", 1));
        seg.put(entry("b", 2));
        let mut keys: Vec<_> = seg.snapshot().into_iter().map(|(k, _)| k).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
