//! Key partitioner (C3).
//!
//! A pure function from key to segment index. The container treats it as
//! opaque — §4.3 is explicit that it "MUST NOT assume any particular hash
//! family" — so this module only supplies a reasonable default
//! (hash-and-modulo) plus the trait a real deployment would implement against
//! its consistent-hashing topology.

use std::hash::{BuildHasher, Hash};

#[cfg(feature = "hashbrown")]
use hashbrown::DefaultHashBuilder;
#[cfg(not(feature = "hashbrown"))]
use std::collections::hash_map::RandomState as DefaultHashBuilder;

/// Maps a key to a segment index in `[0, segment_count)`. Implementations
/// must be deterministic across nodes (the same key always maps to the same
/// segment everywhere) and are expected to be cheap — it runs on every
/// container operation that does not supply an explicit segment.
pub trait KeyPartitioner<K: ?Sized>: Send + Sync {
    /// Returns the segment index for `key`. Implementations should return a
    /// value in `[0, segment_count)`; the container is the one that knows
    /// `segment_count` and is responsible for treating an out-of-range result
    /// as a programmer error.
    fn segment_for(&self, key: &K) -> usize;
}

/// Default partitioner: `hash(key) % segment_count`, using the same hasher
/// the segment maps themselves use by default.
#[derive(Debug)]
pub struct HashPartitioner<S = DefaultHashBuilder> {
    segment_count: usize,
    hasher: S,
}

impl HashPartitioner<DefaultHashBuilder> {
    /// Creates a partitioner for `segment_count` segments using the default hasher.
    pub fn new(segment_count: usize) -> Self {
        HashPartitioner {
            segment_count,
            hasher: DefaultHashBuilder::default(),
        }
    }
}

impl<S: BuildHasher> HashPartitioner<S> {
    /// Creates a partitioner for `segment_count` segments using a custom hasher.
    pub fn with_hasher(segment_count: usize, hasher: S) -> Self {
        HashPartitioner {
            segment_count,
            hasher,
        }
    }
}

impl<K: Hash + ?Sized, S: BuildHasher + Send + Sync> KeyPartitioner<K> for HashPartitioner<S> {
    fn segment_for(&self, key: &K) -> usize {
        (self.hasher.hash_one(key) as usize) % self.segment_count
    }
}
