#![doc = include_str!("../README.md")]
//!
//! ---
//!
//! # Module Map
//!
//! | Module | Component | Responsibility |
//! |--------|-----------|----------------|
//! | [`entry`] | C1 | Entry/metadata model: lifespan, max-idle, versioning, L1 marker |
//! | [`segment`] | C2 | Per-segment concurrent map, unbounded and LRU-bounded variants |
//! | [`partitioner`] | C3 | Pure key → segment index function |
//! | [`container`] | C4 | The façade: routes ops by segment, drives collaborators |
//! | [`collaborators`] | C5/C6 | Injected contracts: expiration, activation, passivation, eviction |
//! | [`iter`] | C7 | Lazy, expiration-filtering, splittable iteration |
//! | [`listeners`] | §4.4 | Copy-on-write removal listener registry |
//! | [`eviction`] | C6 | Bridges segment removal causes to collaborator calls |
//! | [`config`] | §6 | Typed configuration record |
//! | [`error`] | §7 | `ContainerError` taxonomy |
//! | [`time`] | §6 | `TimeService` collaborator (injected clock) |
//!
//! # Quick Start
//!
//! ```rust
//! use datacontainer_rs::collaborators::{
//!     DefaultEntryFactory, LocalExpirationManager, NoopActivationManager, NoopEvictionManager,
//!     NoopPassivationManager,
//! };
//! use datacontainer_rs::config::ContainerConfig;
//! use datacontainer_rs::container::{Collaborators, Container};
//! use datacontainer_rs::entry::Metadata;
//! use datacontainer_rs::partitioner::HashPartitioner;
//! use datacontainer_rs::time::SystemTimeService;
//! use std::sync::Arc;
//!
//! let collaborators = Collaborators {
//!     partitioner: Arc::new(HashPartitioner::new(16)),
//!     time: Arc::new(SystemTimeService),
//!     entry_factory: Arc::new(DefaultEntryFactory),
//!     expiration: Arc::new(LocalExpirationManager),
//!     activation: Arc::new(NoopActivationManager),
//!     passivation: Arc::new(NoopPassivationManager),
//!     eviction: Arc::new(NoopEvictionManager),
//! };
//! let container = Container::start(ContainerConfig::unbounded(16), collaborators);
//!
//! container.put(None, "user:42", "alice", Metadata::IMMORTAL, false).unwrap();
//! assert_eq!(*container.get(None, &"user:42").unwrap().unwrap().value(), "alice");
//! ```
//!
//! # Bounded (size-evicting) containers
//!
//! ```rust
//! use datacontainer_rs::collaborators::{
//!     DefaultEntryFactory, LocalExpirationManager, NoopActivationManager, NoopEvictionManager,
//!     NoopPassivationManager,
//! };
//! use datacontainer_rs::config::ContainerConfig;
//! use datacontainer_rs::container::{Collaborators, Container};
//! use datacontainer_rs::entry::Metadata;
//! use datacontainer_rs::partitioner::HashPartitioner;
//! use datacontainer_rs::time::SystemTimeService;
//! use std::sync::Arc;
//!
//! let collaborators = Collaborators {
//!     partitioner: Arc::new(HashPartitioner::new(1)),
//!     time: Arc::new(SystemTimeService),
//!     entry_factory: Arc::new(DefaultEntryFactory),
//!     expiration: Arc::new(LocalExpirationManager),
//!     activation: Arc::new(NoopActivationManager),
//!     passivation: Arc::new(NoopPassivationManager),
//!     eviction: Arc::new(NoopEvictionManager),
//! };
//! // One segment, capacity 2: the third distinct key evicts the LRU victim.
//! let container = Container::start(ContainerConfig::bounded(1, 2, false), collaborators);
//! container.put(None, "a", 1, Metadata::IMMORTAL, false).unwrap();
//! container.put(None, "b", 2, Metadata::IMMORTAL, false).unwrap();
//! container.put(None, "c", 3, Metadata::IMMORTAL, false).unwrap();
//! assert_eq!(container.size_including_expired(&[0]), 2);
//! ```

/// Entry model (C1): the per-key value wrapper carrying lifespan, max-idle,
/// timestamps, versioning, and the L1 marker.
pub mod entry;

/// Injected collaborator contracts (§6): `EntryFactory`, `ExpirationManager`,
/// `ActivationManager`, `PassivationManager`, `EvictionManager`, plus the
/// no-op/local stand-ins usable in tests and single-node deployments.
pub mod collaborators;

/// Error taxonomy (§7): `ContainerError` and its `Result` alias.
pub mod error;

/// Configuration surface (§6): `ContainerConfig`, `StorageKind`.
pub mod config;

/// `TimeService` collaborator (§6): the injected clock the container samples
/// `now` from, plus `SystemTimeService`/`FakeTimeService`.
pub mod time;

/// Key partitioner (C3): pure `key -> segment index` function, opaque to the
/// container.
pub mod partitioner;

/// Doubly linked list with in-place editing, used internally by the bounded
/// `Segment` variant to track recency in O(1).
///
/// **Note**: internal infrastructure, not part of the public surface a
/// deployment is expected to depend on directly.
pub(crate) mod list;

/// Removal listener registry (§4.4, §5): copy-on-write, registration-order
/// delivery, panics in a listener caught and logged rather than propagated.
pub mod listeners;

/// Per-segment concurrent map (C2): unbounded and LRU-bounded variants behind
/// one `Segment` surface.
pub mod segment;

/// Eviction/removal dispatch bridge (C6): the SIZE/EXPLICIT/REPLACED cause
/// table, wired to passivation, activation, the eviction manager, and removal
/// listeners.
pub mod eviction;

/// Iteration engine (C7): lazy, expiration-filtering, splittable sequences
/// over a chosen subset of segments.
pub mod iter;

/// Container façade (C4): the public operation surface — `get`, `put`,
/// `remove`, `evict`, `compute`, `putIfAbsent`, `touch`, `keySet`/`entrySet`,
/// `sizeIncludingExpired`, `clear`, and the two iterator constructors.
pub mod container;

pub use collaborators::{
    ActivationManager, EntryFactory, EvictionManager, ExpirationManager, PassivationManager,
};
pub use config::{ContainerConfig, StorageKind};
pub use container::{Collaborators, Container};
pub use entry::{Entry, Metadata};
pub use error::{ContainerError, Result};
pub use iter::ContainerIter;
pub use listeners::{ListenerId, RemovalCause, RemovalListener};
pub use partitioner::{HashPartitioner, KeyPartitioner};
pub use time::{FakeTimeService, SystemTimeService, TimeService};
