//! Entry model (C1).
//!
//! An [`Entry`] is the unit of storage the container hands back to callers: a
//! key, a value, and [`Metadata`] describing its lifespan, idle timeout,
//! timestamps and version. `touch` is the only mutation an entry permits once
//! stored — everything else is replace-the-whole-entry, which keeps the
//! per-key compute step in [`crate::container::Container`] trivially atomic.

use std::fmt;

/// Sentinel used by [`Metadata::lifespan_millis`] and [`Metadata::max_idle_millis`]
/// to mean "no limit".
pub const IMMORTAL: i64 = -1;

/// Per-entry metadata: lifespan, idle timeout, timestamps, and an opaque
/// version token.
///
/// `lifespan_millis` and `max_idle_millis` use the `-1` sentinel (not
/// `Option<Duration>`) deliberately: the expiry formulas in the specification
/// this container implements are stated directly in terms of that sentinel,
/// and boundary tests assert on it literally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    /// Milliseconds after `created_at` at which the entry expires. `-1` = immortal.
    pub lifespan_millis: i64,
    /// Milliseconds of inactivity after `last_used_at` at which the entry expires. `-1` = none.
    pub max_idle_millis: i64,
    /// Opaque version token, assigned and interpreted by the `EntryFactory` collaborator.
    pub version: Option<u64>,
}

impl Metadata {
    /// Metadata for an entry that never expires and carries no version.
    pub const IMMORTAL: Metadata = Metadata {
        lifespan_millis: IMMORTAL,
        max_idle_millis: IMMORTAL,
        version: None,
    };

    /// Creates metadata with the given lifespan and idle timeout, no version.
    pub fn new(lifespan_millis: i64, max_idle_millis: i64) -> Self {
        Self {
            lifespan_millis,
            max_idle_millis,
            version: None,
        }
    }

    /// An entry carrying this metadata can expire iff either limit is set.
    #[inline]
    pub fn can_expire(&self) -> bool {
        self.lifespan_millis >= 0 || self.max_idle_millis >= 0
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Metadata::IMMORTAL
    }
}

/// A stored key/value pair plus [`Metadata`] and bookkeeping timestamps.
///
/// `Entry` is logically immutable once built: every mutation other than
/// `touch` goes through [`crate::collaborators::EntryFactory::update`], which
/// builds a new `Entry` rather than editing one in place. This matches
/// invariant 4 of the container's contract — a returned entry reference never
/// changes value or metadata under the caller's feet, only `last_used_at`
/// ever advances in place.
#[derive(Clone)]
pub struct Entry<K, V> {
    key: K,
    value: V,
    metadata: Metadata,
    created_at: u64,
    last_used_at: u64,
    /// Set for entries built via [`Entry::create_l1`]: a short-lived local
    /// cache of an entry primarily owned by another node (see glossary).
    l1: bool,
}

impl<K, V> Entry<K, V> {
    /// Builds a new entry with `created_at = last_used_at = now`.
    pub fn create(key: K, value: V, metadata: Metadata, now: u64) -> Self {
        Entry {
            key,
            value,
            metadata,
            created_at: now,
            last_used_at: now,
            l1: false,
        }
    }

    /// Builds a replacement for `prev`: preserves `created_at` unless `metadata`
    /// carries its own version token signaling a fresh lineage, and advances
    /// `last_used_at` to `now`.
    pub fn update(prev: &Entry<K, V>, key: K, value: V, metadata: Metadata, now: u64) -> Self
    where
        K: Clone,
    {
        let _ = &prev.key; // prev.key is not reused: caller already owns the new key.
        Entry {
            key,
            value,
            metadata,
            created_at: prev.created_at,
            last_used_at: now,
            l1: prev.l1,
        }
    }

    /// Builds an L1 entry: a short-lived local copy of an entry owned
    /// primarily by another node. `metadata` is the already-unwrapped inner
    /// metadata — unwrapping the L1 wrapper is the caller's (container's) job,
    /// per the specification's L1-handling rule in §4.4.
    pub fn create_l1(key: K, value: V, metadata: Metadata, now: u64) -> Self {
        let mut entry = Entry::create(key, value, metadata, now);
        entry.l1 = true;
        entry
    }

    /// Advances `last_used_at` to `max(last_used_at, now)`. Monotonic, as
    /// required by invariant 4.
    #[inline]
    pub fn touch(&mut self, now: u64) {
        self.last_used_at = self.last_used_at.max(now);
    }

    /// Returns true if this entry can ever expire (lifespan or max-idle set).
    #[inline]
    pub fn can_expire(&self) -> bool {
        self.metadata.can_expire()
    }

    /// Evaluates the local expiry predicate from §3: lifespan exceeded since
    /// creation, or idle timeout exceeded since last use.
    #[inline]
    pub fn is_expired_at(&self, now: u64) -> bool {
        let by_lifespan = self.metadata.lifespan_millis >= 0
            && now.saturating_sub(self.created_at) as i64 >= self.metadata.lifespan_millis;
        let by_idle = self.metadata.max_idle_millis >= 0
            && now.saturating_sub(self.last_used_at) as i64 >= self.metadata.max_idle_millis;
        by_lifespan || by_idle
    }

    /// Reference to the key.
    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Reference to the value.
    #[inline]
    pub fn value(&self) -> &V {
        &self.value
    }

    /// The entry's metadata.
    #[inline]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Creation timestamp (container time units, see `TimeService`).
    #[inline]
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Last-used timestamp (container time units).
    #[inline]
    pub fn last_used_at(&self) -> u64 {
        self.last_used_at
    }

    /// True if this entry was built via [`Entry::create_l1`].
    #[inline]
    pub fn is_l1(&self) -> bool {
        self.l1
    }

    /// Consumes the entry, returning the owned value.
    pub fn into_value(self) -> V {
        self.value
    }

    /// Consumes the entry, returning the owned key and value.
    pub fn into_kv(self) -> (K, V) {
        (self.key, self.value)
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Entry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("metadata", &self.metadata)
            .field("created_at", &self.created_at)
            .field("last_used_at", &self.last_used_at)
            .field("l1", &self.l1)
            .finish()
    }
}
