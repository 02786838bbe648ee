//! Container façade (C4).
//!
//! Routes every operation to the segment its key belongs to (via the
//! `KeyPartitioner`, unless the caller supplies an explicit segment),
//! performs the mutation atomically inside that segment's `compute`, and
//! fans the resulting side effects out to the injected collaborators in the
//! order §4.4/§4.6 describe. This is the file most other modules exist to
//! serve — it is deliberately thin on its own logic and thick on wiring.

use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

#[cfg(feature = "hashbrown")]
use hashbrown::DefaultHashBuilder;
#[cfg(not(feature = "hashbrown"))]
use std::collections::hash_map::RandomState as DefaultHashBuilder;

use arc_swap::ArcSwapOption;

use crate::collaborators::{
    ActivationManager, EntryFactory, EvictionManager, ExpirationManager, PassivationManager,
};
use crate::config::ContainerConfig;
use crate::entry::{Entry, Metadata};
use crate::error::ContainerError;
use crate::eviction::EvictionDispatcher;
use crate::iter::ContainerIter;
use crate::listeners::{ListenerId, ListenerRegistry, RemovalListener};
use crate::partitioner::KeyPartitioner;
use crate::segment::{ComputeResult, Segment};
use crate::time::TimeService;

/// The full set of injected collaborators a [`Container`] needs (§6).
pub struct Collaborators<K, V> {
    pub partitioner: Arc<dyn KeyPartitioner<K>>,
    pub time: Arc<dyn TimeService>,
    pub entry_factory: Arc<dyn EntryFactory<K, V>>,
    pub expiration: Arc<dyn ExpirationManager<K, V>>,
    pub activation: Arc<dyn ActivationManager<K>>,
    pub passivation: Arc<dyn PassivationManager<K, V>>,
    pub eviction: Arc<dyn EvictionManager<K, V>>,
}

impl<K, V> std::fmt::Debug for Collaborators<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// An ordered sequence of segment maps plus the collaborators that drive
/// them (§3 "Container"). `N = config.segment_count` is fixed for the life
/// of the container; individual slots can still be vacated/assigned via
/// [`Container::add_segments`]/[`Container::remove_segments`] to mirror a
/// segment's ownership being revoked or reassigned (§5 lifecycle note).
pub struct Container<K, V, S = DefaultHashBuilder> {
    segments: Vec<ArcSwapOption<Segment<K, V, S>>>,
    hash_builder: S,
    max_entries_per_segment: usize,
    partitioner: Arc<dyn KeyPartitioner<K>>,
    time: Arc<dyn TimeService>,
    entry_factory: Arc<dyn EntryFactory<K, V>>,
    expiration: Arc<dyn ExpirationManager<K, V>>,
    listeners: Arc<ListenerRegistry<K, V>>,
    dispatcher: EvictionDispatcher<K, V>,
}

impl<K, V, S> std::fmt::Debug for Container<K, V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("segment_count", &self.segments.len())
            .finish_non_exhaustive()
    }
}

// SAFETY: all segment state lives behind `Segment`'s own `Send`/`Sync` impl
// or behind `ArcSwapOption`; the container itself holds no unsynchronized
// interior mutability.
unsafe impl<K: Send, V: Send, S: Send> Send for Container<K, V, S> {}
unsafe impl<K: Send + Sync, V: Send + Sync, S: Send + Sync> Sync for Container<K, V, S> {}

impl<K, V> Container<K, V, DefaultHashBuilder>
where
    K: Hash + Eq + Clone + Send + Sync + 'static + std::panic::RefUnwindSafe,
    V: Send + Sync + 'static + std::panic::RefUnwindSafe,
{
    /// Starts a container with all segments assigned and the default hasher
    /// (§5 lifecycle: "on container start ... collaborators are injected").
    pub fn start(config: ContainerConfig, collaborators: Collaborators<K, V>) -> Self {
        Self::start_with_hasher(config, collaborators, DefaultHashBuilder::default())
    }
}

impl<K, V, S> Container<K, V, S>
where
    K: Hash + Eq + Clone + Send + Sync + 'static + std::panic::RefUnwindSafe,
    V: Send + Sync + 'static + std::panic::RefUnwindSafe,
    S: BuildHasher + Clone,
{
    /// Starts a container with a custom hash builder, e.g. for deterministic
    /// tests or a DoS-resistant hasher.
    pub fn start_with_hasher(
        config: ContainerConfig,
        collaborators: Collaborators<K, V>,
        hash_builder: S,
    ) -> Self {
        let max_entries_per_segment = if config.is_bounded() {
            (config.max_entries / config.segment_count.max(1)).max(1)
        } else {
            0
        };

        let listeners = Arc::new(ListenerRegistry::new());
        let dispatcher = EvictionDispatcher::new(
            Arc::clone(&collaborators.passivation),
            Arc::clone(&collaborators.activation),
            Arc::clone(&collaborators.eviction),
            Arc::clone(&listeners),
            config.passivation_enabled,
        );

        let segments: Vec<ArcSwapOption<Segment<K, V, S>>> = (0..config.segment_count)
            .map(|_| {
                ArcSwapOption::from_pointee(Self::new_segment(
                    max_entries_per_segment,
                    hash_builder.clone(),
                ))
            })
            .collect();

        Container {
            segments,
            hash_builder,
            max_entries_per_segment,
            partitioner: collaborators.partitioner,
            time: collaborators.time,
            entry_factory: collaborators.entry_factory,
            expiration: collaborators.expiration,
            listeners,
            dispatcher,
        }
    }

    fn new_segment(max_entries_per_segment: usize, hash_builder: S) -> Segment<K, V, S> {
        if max_entries_per_segment == 0 {
            Segment::unbounded(hash_builder)
        } else {
            Segment::bounded(hash_builder, max_entries_per_segment)
        }
    }

    /// Number of segment slots (`N`, fixed at construction).
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    fn check_index(&self, index: usize) -> Result<(), ContainerError> {
        if index >= self.segments.len() {
            tracing::error!(index, segment_count = self.segments.len(), "FATAL: segment index out of range");
            return Err(ContainerError::SegmentOutOfRange {
                index,
                segment_count: self.segments.len(),
            });
        }
        Ok(())
    }

    fn segment_for(&self, key: &K, explicit: Option<usize>) -> Result<usize, ContainerError> {
        let index = explicit.unwrap_or_else(|| self.partitioner.segment_for(key));
        self.check_index(index)?;
        Ok(index)
    }

    fn assigned_segment(&self, index: usize) -> Result<Arc<Segment<K, V, S>>, ContainerError> {
        self.check_index(index)?;
        self.segments[index].load_full().ok_or_else(|| {
            tracing::error!(index, "FATAL: operation on unassigned segment");
            ContainerError::UnassignedSegment { index }
        })
    }

    /// Assigns fresh (empty) segment maps to the given indices, mirroring a
    /// segment being assigned to this node (§5, §4.8). Indices already
    /// assigned are replaced with a new, empty segment.
    pub fn add_segments(&self, indices: &[usize]) -> Result<(), ContainerError> {
        for &index in indices {
            self.check_index(index)?;
            self.segments[index].store(Some(Arc::new(Self::new_segment(
                self.max_entries_per_segment,
                self.hash_builder.clone(),
            ))));
        }
        Ok(())
    }

    /// Revokes ownership of the given segment indices, dropping their
    /// contents without firing removal notifications — ownership revocation
    /// is not a removal event, it is the segment ceasing to exist on this
    /// node (§5).
    pub fn remove_segments(&self, indices: &[usize]) -> Result<(), ContainerError> {
        for &index in indices {
            self.check_index(index)?;
            self.segments[index].store(None);
        }
        Ok(())
    }

    /// Registers a removal listener, returning an id usable with
    /// [`Container::unregister_listener`].
    pub fn register_listener(&self, listener: Arc<dyn RemovalListener<K, V>>) -> ListenerId {
        self.listeners.register(listener)
    }

    /// Unregisters a previously-registered removal listener.
    pub fn unregister_listener(&self, id: ListenerId) {
        self.listeners.unregister(id);
    }

    /// `get(s?, K)` — §4.4. Resolves expiration through the delegation
    /// protocol, touching the entry on a confirmed-live read.
    pub fn get(&self, segment: Option<usize>, key: &K) -> Result<Option<Entry<K, V>>, ContainerError>
    where
        V: Clone,
    {
        let index = self.segment_for(key, segment)?;
        let segment = self.assigned_segment(index)?;
        let now = self.time.now_millis();

        let (_, next, evicted) = segment.compute(key, |current| match current {
            None => ComputeResult::Unchanged,
            Some(entry) => {
                if entry.can_expire() && self.expiration.entry_expired_in_memory(entry, now) {
                    ComputeResult::Remove
                } else {
                    let mut touched = entry.clone();
                    touched.touch(now);
                    ComputeResult::Put(touched)
                }
            }
        });

        self.dispatcher.after_size_eviction(evicted);
        Ok(next)
    }

    /// `peek(s?, K)` — raw read, no expiration check, no touch.
    pub fn peek(&self, segment: Option<usize>, key: &K) -> Result<Option<Entry<K, V>>, ContainerError>
    where
        V: Clone,
    {
        let index = self.segment_for(key, segment)?;
        let segment = self.assigned_segment(index)?;
        Ok(segment.peek(key))
    }

    /// `containsKey(s?, K)` — same expiration semantics as `get`, no touch.
    pub fn contains_key(&self, segment: Option<usize>, key: &K) -> Result<bool, ContainerError>
    where
        V: Clone,
    {
        let index = self.segment_for(key, segment)?;
        let segment = self.assigned_segment(index)?;
        let now = self.time.now_millis();

        let Some(entry) = segment.peek(key) else {
            return Ok(false);
        };
        if entry.can_expire() && self.expiration.entry_expired_in_memory(&entry, now) {
            let (_, _, evicted) = segment.compute(key, |current| match current {
                Some(e) if e.is_expired_at(now) => ComputeResult::Remove,
                _ => ComputeResult::Unchanged,
            });
            self.dispatcher.after_size_eviction(evicted);
            Ok(false)
        } else {
            Ok(true)
        }
    }

    /// `put(s?, K, V, meta)` — §4.4. Unwraps L1 metadata if present and
    /// installs the new entry, reporting activation and listener side
    /// effects for the superseded value (if any).
    pub fn put(
        &self,
        segment: Option<usize>,
        key: K,
        value: V,
        metadata: Metadata,
        is_l1: bool,
    ) -> Result<(), ContainerError>
    where
        V: Clone,
    {
        let index = self.segment_for(&key, segment)?;
        let segment = self.assigned_segment(index)?;
        let now = self.time.now_millis();
        let factory = Arc::clone(&self.entry_factory);
        let key_for_notify = key.clone();

        let mut was_create = false;
        let (old, _new, evicted) = segment.compute(&key, |current| {
            let built = match current {
                Some(prev) => factory.update(prev, key.clone(), value, metadata, now),
                None => {
                    was_create = true;
                    if is_l1 {
                        factory.create_l1(key.clone(), value, metadata, now)
                    } else {
                        factory.create(key.clone(), value, metadata, now)
                    }
                }
            };
            ComputeResult::Put(built)
        });

        self.dispatcher.after_size_eviction(evicted);
        self.dispatcher
            .after_replace(&key_for_notify, was_create, old.map(|e| (key_for_notify.clone(), e)));

        Ok(())
    }

    /// `remove(s?, K)` — §4.4. Returns the previous entry unless it was
    /// already expired-at-now (§9 Open Question 2: discard in that case).
    pub fn remove(&self, segment: Option<usize>, key: &K) -> Result<Option<Entry<K, V>>, ContainerError>
    where
        V: Clone,
    {
        let index = self.segment_for(key, segment)?;
        let segment = self.assigned_segment(index)?;
        let now = self.time.now_millis();

        let (old, _, _) = segment.compute(key, |_| ComputeResult::Remove);

        let was_absent = old.is_none();
        let result = match &old {
            Some(entry) if entry.can_expire() && entry.is_expired_at(now) => {
                self.expiration.entry_expired_in_memory(entry, now);
                None
            }
            other => other.clone(),
        };

        self.dispatcher
            .after_explicit_removal(key, old.map(|entry| (key.clone(), entry)));
        let _ = was_absent;

        Ok(result)
    }

    /// `evict(s?, K)` — policy-initiated removal that always passivates
    /// (unlike `remove`, which never does).
    pub fn evict(&self, segment: Option<usize>, key: &K) -> Result<(), ContainerError>
    where
        V: Clone,
    {
        let index = self.segment_for(key, segment)?;
        let segment = self.assigned_segment(index)?;

        let (old, _, _) = segment.compute(key, |_| ComputeResult::Remove);
        self.dispatcher
            .evict_explicit(key, old.map(|entry| (key.clone(), entry)))
    }

    /// `compute(s?, K, action)` — §4.4. `action` observes the current entry
    /// (already expiration-checked the way `get` would) and returns the next
    /// state via [`ComputeResult`]. A `ComputeResult::Unchanged` over a live
    /// key is a true no-op — no replace/removal notification fires — but the
    /// surviving entry is still returned, per §4.4's "resulting Entry or
    /// absent".
    pub fn compute<F>(
        &self,
        segment: Option<usize>,
        key: &K,
        action: F,
    ) -> Result<Option<Entry<K, V>>, ContainerError>
    where
        V: Clone,
        F: FnOnce(Option<&Entry<K, V>>) -> ComputeResult<(V, Metadata)>,
    {
        let index = self.segment_for(key, segment)?;
        let segment = self.assigned_segment(index)?;
        let now = self.time.now_millis();
        let factory = Arc::clone(&self.entry_factory);
        let key_owned = key.clone();

        let mut was_create = false;
        let mut was_replace = false;
        let mut unchanged_survivor: Option<Entry<K, V>> = None;
        let (old, new, evicted) = segment.compute(key, |current| {
            let live_current = match current {
                Some(entry) if entry.can_expire() && self.expiration.entry_expired_in_memory(entry, now) => None,
                other => other,
            };
            match action(live_current) {
                ComputeResult::Unchanged => {
                    unchanged_survivor = live_current.cloned();
                    ComputeResult::Unchanged
                }
                ComputeResult::Remove => ComputeResult::Remove,
                ComputeResult::Put((value, metadata)) => {
                    let built = match live_current {
                        Some(prev) => {
                            was_replace = true;
                            factory.update(prev, key_owned.clone(), value, metadata, now)
                        }
                        None => {
                            was_create = true;
                            factory.create(key_owned.clone(), value, metadata, now)
                        }
                    };
                    ComputeResult::Put(built)
                }
            }
        });

        self.dispatcher.after_size_eviction(evicted);

        if new.is_some() {
            self.dispatcher.after_replace(
                &key_owned,
                was_create,
                old.map(|e| (key_owned.clone(), e)),
            );
        } else if was_replace || old.is_some() {
            self.dispatcher
                .after_explicit_removal(&key_owned, old.map(|e| (key_owned.clone(), e)));
        }

        Ok(new.or(unchanged_survivor))
    }

    /// `putIfAbsent(s?, K, V, meta)` — §4.8, expressed as a thin `compute`
    /// wrapper: installs the new entry only if absent and returns `None`: if
    /// an entry is already present it is left untouched and returned.
    pub fn put_if_absent(
        &self,
        segment: Option<usize>,
        key: &K,
        value: V,
        metadata: Metadata,
    ) -> Result<Option<Entry<K, V>>, ContainerError>
    where
        K: Clone,
        V: Clone,
    {
        let mut value = Some(value);
        let mut existing = None;
        self.compute(segment, key, |current| match current {
            Some(entry) => {
                existing = Some(entry.clone());
                ComputeResult::Unchanged
            }
            None => ComputeResult::Put((value.take().expect("called at most once"), metadata)),
        })?;
        Ok(existing)
    }

    /// `touch(s?, K)` — §4.8. Refreshes `lastUsedAt` without a full value
    /// read. Returns whether the key was present and live.
    pub fn touch(&self, segment: Option<usize>, key: &K) -> Result<bool, ContainerError>
    where
        V: Clone,
    {
        Ok(self.get(segment, key)?.is_some())
    }

    /// `sizeIncludingExpired(segments)` — §4.4. An absent segment
    /// contributes 0 (§9 Open Question 1), and the sum saturates rather
    /// than overflowing.
    pub fn size_including_expired(&self, segments: &[usize]) -> usize {
        segments
            .iter()
            .filter_map(|&index| self.segments.get(index))
            .filter_map(|slot| slot.load_full())
            .fold(0usize, |acc, segment| acc.saturating_add(segment.len()))
    }

    /// `clear(segments)` — §4.4. Clears each listed segment, firing
    /// `Explicit` removal notifications.
    pub fn clear(&self, segments: &[usize]) -> Result<(), ContainerError> {
        for &index in segments {
            let segment = self.assigned_segment(index)?;
            let drained = segment.clear();
            for (key, entry) in drained {
                self.dispatcher.after_explicit_removal(&key, Some((key.clone(), entry)));
            }
        }
        Ok(())
    }

    /// `iterator(segments?)` — §4.7. Lazily filters expired entries through
    /// the iteration-specific expiration hook.
    pub fn iter(&self, segments: Option<&[usize]>) -> ContainerIter<K, V>
    where
        V: Clone,
    {
        ContainerIter::new(
            self.segment_snapshots(segments),
            Arc::clone(&self.expiration),
            Arc::clone(&self.time),
            false,
        )
    }

    /// `iteratorIncludingExpired(segments?)` — §4.7. Same scope, no
    /// expiration filtering.
    pub fn iter_including_expired(&self, segments: Option<&[usize]>) -> ContainerIter<K, V>
    where
        V: Clone,
    {
        ContainerIter::new(
            self.segment_snapshots(segments),
            Arc::clone(&self.expiration),
            Arc::clone(&self.time),
            true,
        )
    }

    /// `keySet(segments)` — §4.8: a thin projection over [`Container::iter`]
    /// yielding just the keys of non-expired entries.
    pub fn key_set(&self, segments: Option<&[usize]>) -> impl Iterator<Item = K>
    where
        V: Clone,
    {
        self.iter(segments).map(|entry| entry.into_kv().0)
    }

    /// `entrySet(segments)` — §4.8: a thin projection over
    /// [`Container::iter`] yielding `(key, value)` pairs of non-expired
    /// entries.
    pub fn entry_set(&self, segments: Option<&[usize]>) -> impl Iterator<Item = (K, V)>
    where
        V: Clone,
    {
        self.iter(segments).map(|entry| entry.into_kv())
    }

    fn segment_snapshots(&self, segments: Option<&[usize]>) -> Vec<Vec<(K, Entry<K, V>)>>
    where
        V: Clone,
    {
        match segments {
            Some(indices) => indices
                .iter()
                .filter_map(|&index| self.segments.get(index))
                .filter_map(|slot| slot.load_full())
                .map(|segment| segment.snapshot())
                .collect(),
            None => self
                .segments
                .iter()
                .filter_map(|slot| slot.load_full())
                .map(|segment| segment.snapshot())
                .collect(),
        }
    }
}
