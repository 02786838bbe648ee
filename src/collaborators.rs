//! Injected collaborator contracts (§6): `EntryFactory`, `ExpirationManager`,
//! `ActivationManager`, `PassivationManager`, `EvictionManager`.
//!
//! None of these are implemented by this crate beyond a `Default`/no-op
//! stand-in useful for tests and trivial deployments — the real
//! implementations (a reaper, a persistence layer, an activation bookkeeping
//! table) are explicitly out of scope per §1. The container only invokes
//! these contracts at the well-defined points §4 describes.

use crate::entry::{Entry, Metadata};

/// Builds and updates entries (C1's operations, exposed as a collaborator so
/// deployments can swap representations — e.g. off-heap allocation — without
/// touching the container).
pub trait EntryFactory<K, V>: Send + Sync {
    /// See [`Entry::create`].
    fn create(&self, key: K, value: V, metadata: Metadata, now: u64) -> Entry<K, V>;
    /// See [`Entry::update`].
    fn update(&self, prev: &Entry<K, V>, key: K, value: V, metadata: Metadata, now: u64)
        -> Entry<K, V>
    where
        K: Clone;
    /// See [`Entry::create_l1`].
    fn create_l1(&self, key: K, value: V, metadata: Metadata, now: u64) -> Entry<K, V>;
}

/// The factory used when no custom representation is needed: delegates
/// straight to [`Entry`]'s constructors.
#[derive(Debug, Default)]
pub struct DefaultEntryFactory;

impl<K, V> EntryFactory<K, V> for DefaultEntryFactory {
    fn create(&self, key: K, value: V, metadata: Metadata, now: u64) -> Entry<K, V> {
        Entry::create(key, value, metadata, now)
    }

    fn update(
        &self,
        prev: &Entry<K, V>,
        key: K,
        value: V,
        metadata: Metadata,
        now: u64,
    ) -> Entry<K, V>
    where
        K: Clone,
    {
        Entry::update(prev, key, value, metadata, now)
    }

    fn create_l1(&self, key: K, value: V, metadata: Metadata, now: u64) -> Entry<K, V> {
        Entry::create_l1(key, value, metadata, now)
    }
}

/// The two expiry predicates of §4.5. `entry_expired_in_memory` backs
/// point reads/writes and may do expensive work (e.g. notify a remote
/// reaper); `entry_expired_in_memory_from_iteration` backs the iteration
/// engine and is expected to be cheap — it runs once per candidate entry.
///
/// Neither predicate may call back into the segment that invoked it: doing so
/// would re-enter the same segment's lock and deadlock (§5).
pub trait ExpirationManager<K, V>: Send + Sync {
    /// Confirms or vetoes expiry of an entry observed as locally-expired
    /// during a point read/write.
    fn entry_expired_in_memory(&self, entry: &Entry<K, V>, now: u64) -> bool;
    /// Confirms or vetoes expiry of an entry observed as locally-expired
    /// during iteration. Must be cheap.
    fn entry_expired_in_memory_from_iteration(&self, entry: &Entry<K, V>, now: u64) -> bool;
}

/// An expiration manager with no external reaper to consult: the local
/// predicate (`Entry::is_expired_at`) is authoritative. Suitable for
/// single-node deployments and tests; a clustered deployment replaces this
/// with one that coordinates with the reaper before confirming.
#[derive(Debug, Default)]
pub struct LocalExpirationManager;

impl<K, V> ExpirationManager<K, V> for LocalExpirationManager {
    fn entry_expired_in_memory(&self, entry: &Entry<K, V>, now: u64) -> bool {
        entry.is_expired_at(now)
    }

    fn entry_expired_in_memory_from_iteration(&self, entry: &Entry<K, V>, now: u64) -> bool {
        entry.is_expired_at(now)
    }
}

/// Activation bookkeeping (§4.6): told about writes so a staged,
/// previously-passivated copy can be purged.
pub trait ActivationManager<K>: Send + Sync {
    /// A write installed a new entry for `key`. `was_create` is true if the
    /// slot was previously absent.
    fn on_update(&self, key: &K, was_create: bool);
    /// A remove took `key` out of the container. `was_absent` is true if
    /// there was nothing to remove.
    fn on_remove(&self, key: &K, was_absent: bool);
}

/// An activation manager with nothing to do — used when passivation is
/// disabled (`ContainerConfig::passivation_enabled == false`) or for tests.
#[derive(Debug, Default)]
pub struct NoopActivationManager;

impl<K> ActivationManager<K> for NoopActivationManager {
    fn on_update(&self, _key: &K, _was_create: bool) {}
    fn on_remove(&self, _key: &K, _was_absent: bool) {}
}

/// Flushes an entry to the persistence/store layer before it leaves memory
/// (§4.6, SIZE cause; and the explicit `evict` operation of §4.4).
pub trait PassivationManager<K, V>: Send + Sync {
    /// Write `entry` to the persistent store. Errors propagate to the caller
    /// as `ContainerError::CollaboratorFailure`.
    fn passivate(&self, entry: &Entry<K, V>) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// A passivation manager that drops entries silently — used when
/// `passivation_enabled == false`.
#[derive(Debug, Default)]
pub struct NoopPassivationManager;

impl<K, V> PassivationManager<K, V> for NoopPassivationManager {
    fn passivate(&self, _entry: &Entry<K, V>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}

/// Told about size-driven evictions after they have happened, as a batch
/// (§4.6's `onEntryEviction({K -> Entry})`).
pub trait EvictionManager<K, V>: Send + Sync {
    /// Called with the entries a bounded segment just evicted for size.
    fn on_entry_eviction(&self, removed: &[(K, Entry<K, V>)]);
}

/// An eviction manager with nothing to do.
#[derive(Debug, Default)]
pub struct NoopEvictionManager;

impl<K, V> EvictionManager<K, V> for NoopEvictionManager {
    fn on_entry_eviction(&self, _removed: &[(K, Entry<K, V>)]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_entry_factory_roundtrips() {
        let factory = DefaultEntryFactory;
        let entry: Entry<&str, i32> = factory.create("a", 1, Metadata::IMMORTAL, 10);
        assert_eq!(*entry.value(), 1);
        let updated = factory.update(&entry, "a", 2, Metadata::IMMORTAL, 20);
        assert_eq!(updated.created_at(), 10);
        assert_eq!(*updated.value(), 2);
    }

    #[test]
    fn local_expiration_manager_matches_local_predicate() {
        let mgr = LocalExpirationManager;
        let entry: Entry<&str, i32> = Entry::create("a", 1, Metadata::new(10, -1), 0);
        assert!(!mgr.entry_expired_in_memory(&entry, 5));
        assert!(mgr.entry_expired_in_memory(&entry, 10));
        assert!(mgr.entry_expired_in_memory_from_iteration(&entry, 10));
    }
}
