//! Eviction/removal dispatch bridge (C6).
//!
//! §4.6 specifies a fixed order of collaborator calls per removal cause:
//!
//! | cause      | before removal        | after removal                      |
//! |------------|------------------------|-------------------------------------|
//! | `Size`     | `passivate` (if on)    | `on_entry_eviction`, removal listeners |
//! | `Explicit` | `passivate` (if `evict`) | `on_remove`, removal listeners    |
//! | `Replaced` | —                      | `on_update`, removal listeners     |
//!
//! [`Container`](crate::container::Container) owns the segments and the
//! collaborators; this module is the single place that knows how to weave
//! the two together so the container's operation methods stay about *what*
//! happened rather than *who needs to hear about it*.

use std::sync::Arc;

use crate::collaborators::{ActivationManager, EvictionManager, PassivationManager};
use crate::entry::Entry;
use crate::error::ContainerError;
use crate::listeners::{ListenerRegistry, RemovalCause};

/// Bundles the collaborators a removal needs to consult, plus the listener
/// registry every removal is ultimately reported to.
pub struct EvictionDispatcher<K, V> {
    passivation: Arc<dyn PassivationManager<K, V>>,
    activation: Arc<dyn ActivationManager<K>>,
    eviction: Arc<dyn EvictionManager<K, V>>,
    listeners: Arc<ListenerRegistry<K, V>>,
    /// §6 `passivationEnabled`: gates whether a SIZE eviction passivates
    /// before dropping. Does not affect the explicit `evict` operation,
    /// which always passivates (§4.4).
    passivation_enabled: bool,
}

impl<K, V> std::fmt::Debug for EvictionDispatcher<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvictionDispatcher").finish_non_exhaustive()
    }
}

impl<K, V> EvictionDispatcher<K, V> {
    /// Wires a dispatcher from its four collaborators and the
    /// `passivationEnabled` config flag (§6).
    pub fn new(
        passivation: Arc<dyn PassivationManager<K, V>>,
        activation: Arc<dyn ActivationManager<K>>,
        eviction: Arc<dyn EvictionManager<K, V>>,
        listeners: Arc<ListenerRegistry<K, V>>,
        passivation_enabled: bool,
    ) -> Self {
        EvictionDispatcher {
            passivation,
            activation,
            eviction,
            listeners,
            passivation_enabled,
        }
    }

    /// Passivates `entry` ahead of a size-triggered eviction, per §4.6's
    /// `onChosenForEviction` step. Errors here propagate to the caller as
    /// `ContainerError::CollaboratorFailure` and abort the eviction (the
    /// entry is left in place rather than dropped un-passivated).
    pub fn on_chosen_for_eviction(&self, entry: &Entry<K, V>) -> Result<(), ContainerError> {
        self.passivation
            .passivate(entry)
            .map_err(ContainerError::CollaboratorFailure)
    }

    /// Reports a batch of entries evicted for size. The segment has already
    /// physically removed them (eviction victim selection happens inside its
    /// own lock, per §5, and must not call back out to collaborators); this
    /// still passivates each one (when `passivationEnabled`, per §6 — else
    /// the drop is silent) before the rest of the SIZE-cause sequence
    /// (`on_entry_eviction`, then removal listeners) so the net observable
    /// order matches §4.6's table. A passivation failure is logged and does
    /// not block the remaining entries in the batch — the victims are
    /// already gone from the map, so there is nothing left to roll back.
    pub fn after_size_eviction(&self, removed: Vec<(K, Entry<K, V>)>)
    where
        K: std::panic::RefUnwindSafe,
        V: std::panic::RefUnwindSafe,
    {
        if removed.is_empty() {
            return;
        }
        if self.passivation_enabled {
            for (_, entry) in &removed {
                if let Err(err) = self.on_chosen_for_eviction(entry) {
                    tracing::warn!(%err, "passivation failed for size-evicted entry");
                }
            }
        }
        self.eviction.on_entry_eviction(&removed);
        self.listeners.notify(&removed, RemovalCause::Size);
    }

    /// Reports one entry explicitly removed (`remove`/`clear`): `on_remove`
    /// then removal listeners.
    pub fn after_explicit_removal(&self, key: &K, removed: Option<(K, Entry<K, V>)>)
    where
        K: std::panic::RefUnwindSafe,
        V: std::panic::RefUnwindSafe,
    {
        self.activation.on_remove(key, removed.is_none());
        if let Some(pair) = removed {
            self.listeners.notify(&[pair], RemovalCause::Explicit);
        }
    }

    /// Reports one entry explicitly evicted via the dedicated `evict`
    /// operation: passivate (unconditionally, not just when bounded), then
    /// `on_remove`, then removal listeners.
    pub fn evict_explicit(
        &self,
        key: &K,
        removed: Option<(K, Entry<K, V>)>,
    ) -> Result<(), ContainerError>
    where
        K: std::panic::RefUnwindSafe,
        V: std::panic::RefUnwindSafe,
    {
        if let Some((_, entry)) = &removed {
            self.on_chosen_for_eviction(entry)?;
        }
        self.activation.on_remove(key, removed.is_none());
        if let Some(pair) = removed {
            self.listeners.notify(&[pair], RemovalCause::Explicit);
        }
        Ok(())
    }

    /// Reports a key whose old value was just replaced by a `put`/`compute`:
    /// `on_update` then removal listeners for the superseded value.
    pub fn after_replace(&self, key: &K, was_create: bool, previous: Option<(K, Entry<K, V>)>)
    where
        K: std::panic::RefUnwindSafe,
        V: std::panic::RefUnwindSafe,
    {
        self.activation.on_update(key, was_create);
        if let Some(pair) = previous {
            self.listeners.notify(&[pair], RemovalCause::Replaced);
        }
    }
}
