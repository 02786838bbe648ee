//! Configuration surface (§6).
//!
//! The container does not parse XML/YAML/TOML itself (§1 scopes that out to a
//! collaborator) but it does consume a typed record, and that record is
//! `serde`-deserializable so whatever owns the real config file can build one
//! directly — the same split `topgun-server` uses between "the thing that
//! reads the file" and "the thing that takes a typed struct" for its own
//! `ServerConfig`.

use serde::{Deserialize, Serialize};

/// How entry values are represented in storage. The container does not
/// interpret this beyond carrying it — representation is a collaborator
/// concern — but it is part of the configuration surface named in §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageKind {
    /// Plain in-memory objects.
    Object,
    /// Serialized byte representation.
    Binary,
    /// Off-heap allocation, outside the ordinary allocator's view.
    OffHeap,
}

impl Default for StorageKind {
    fn default() -> Self {
        StorageKind::Object
    }
}

/// Typed configuration record the container is constructed from.
///
/// Mirrors the table in §6 exactly: `segment_count` is fixed at
/// construction (N), `storage` selects entry representation, `max_entries`
/// switches on the bounded variant when positive, and `passivation_enabled`
/// decides whether size-evictions call the passivator or silently drop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ContainerConfig {
    /// Fixed number of segments, N. Must be > 0.
    pub segment_count: usize,
    /// Entry representation. Carried, not interpreted.
    #[serde(default)]
    pub storage: StorageKind,
    /// Per-node capacity applied to each assigned segment. `0` means
    /// unbounded (the container uses the unbounded `SegmentMap` variant).
    #[serde(default)]
    pub max_entries: usize,
    /// If true, size-driven evictions call the passivator before dropping the
    /// entry. If false, size-driven evictions are silent drops.
    #[serde(default)]
    pub passivation_enabled: bool,
}

impl ContainerConfig {
    /// An unbounded container with the given segment count and no
    /// passivation, matching the defaults a caller gets from an all-else-equal
    /// XML/YAML config that only sets `segmentCount`.
    pub fn unbounded(segment_count: usize) -> Self {
        ContainerConfig {
            segment_count,
            storage: StorageKind::Object,
            max_entries: 0,
            passivation_enabled: false,
        }
    }

    /// A bounded container: `max_entries` applied per assigned segment.
    pub fn bounded(segment_count: usize, max_entries: usize, passivation_enabled: bool) -> Self {
        ContainerConfig {
            segment_count,
            storage: StorageKind::Object,
            max_entries,
            passivation_enabled,
        }
    }

    /// True if `max_entries` selects the bounded `SegmentMap` variant.
    pub fn is_bounded(&self) -> bool {
        self.max_entries > 0
    }
}
