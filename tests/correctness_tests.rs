//! Correctness tests for the container's single-threaded operation surface.
//!
//! ## Test Strategy
//! - Small segment counts and capacities for predictable behavior.
//! - Each test validates one invariant or boundary behavior from the
//!   container's testable-properties list, not an exhaustive grid.
//! - Collaborators are recording stand-ins (`Arc<Mutex<Vec<...>>>`) so side
//!   effects (passivation, eviction notification, listener delivery) can be
//!   asserted directly rather than inferred from state alone.

use datacontainer_rs::collaborators::{
    ActivationManager, DefaultEntryFactory, EvictionManager, LocalExpirationManager,
    NoopActivationManager, NoopEvictionManager, NoopPassivationManager, PassivationManager,
};
use datacontainer_rs::config::ContainerConfig;
use datacontainer_rs::container::{Collaborators, Container};
use datacontainer_rs::entry::{Entry, Metadata};
use datacontainer_rs::error::ContainerError;
use datacontainer_rs::listeners::RemovalCause;
use datacontainer_rs::partitioner::{HashPartitioner, KeyPartitioner};
use datacontainer_rs::time::{FakeTimeService, TimeService};
use std::sync::{Arc, Mutex};

fn unbounded(segment_count: usize) -> (Container<&'static str, i32>, Arc<FakeTimeService>) {
    let clock = Arc::new(FakeTimeService::new(0));
    let collaborators = Collaborators {
        partitioner: Arc::new(HashPartitioner::new(segment_count)),
        time: Arc::clone(&clock) as Arc<dyn TimeService>,
        entry_factory: Arc::new(DefaultEntryFactory),
        expiration: Arc::new(LocalExpirationManager),
        activation: Arc::new(NoopActivationManager),
        passivation: Arc::new(NoopPassivationManager),
        eviction: Arc::new(NoopEvictionManager),
    };
    let config = ContainerConfig::unbounded(segment_count);
    (Container::start(config, collaborators), clock)
}

/// A passivator that records every key it was asked to passivate, in order.
struct RecordingPassivator(Arc<Mutex<Vec<&'static str>>>);
impl PassivationManager<&'static str, i32> for RecordingPassivator {
    fn passivate(
        &self,
        entry: &Entry<&'static str, i32>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.0.lock().unwrap().push(*entry.key());
        Ok(())
    }
}

/// An eviction manager that records each batch's keys as one `Vec` per call.
struct RecordingEviction(Arc<Mutex<Vec<Vec<&'static str>>>>);
impl EvictionManager<&'static str, i32> for RecordingEviction {
    fn on_entry_eviction(&self, removed: &[(&'static str, Entry<&'static str, i32>)]) {
        self.0
            .lock()
            .unwrap()
            .push(removed.iter().map(|(k, _)| *k).collect());
    }
}

/// An activation manager that records `on_update`/`on_remove` calls as tagged
/// strings, in order.
struct RecordingActivation(Arc<Mutex<Vec<String>>>);
impl ActivationManager<&'static str> for RecordingActivation {
    fn on_update(&self, key: &&'static str, was_create: bool) {
        self.0
            .lock()
            .unwrap()
            .push(format!("update:{key}:{was_create}"));
    }
    fn on_remove(&self, key: &&'static str, was_absent: bool) {
        self.0
            .lock()
            .unwrap()
            .push(format!("remove:{key}:{was_absent}"));
    }
}

// ----------------------------------------------------------------------------
// Seed scenario 1: immortal entries never expire, hook never consulted.
// ----------------------------------------------------------------------------

#[test]
fn seed_1_immortal_entry_survives_a_clock_advance() {
    let (container, clock) = unbounded(1);
    container.put(None, "a", 1, Metadata::IMMORTAL, false).unwrap();
    assert_eq!(*container.get(None, &"a").unwrap().unwrap().value(), 1);

    clock.advance(3_600_000);
    assert_eq!(*container.get(None, &"a").unwrap().unwrap().value(), 1);
}

// ----------------------------------------------------------------------------
// Seed scenario 2: lifespan expiry, exactly-once hook consultation.
// ----------------------------------------------------------------------------

#[test]
fn seed_2_lifespan_expiry_then_absence_then_stays_absent() {
    let (container, clock) = unbounded(1);
    container
        .put(None, "a", 1, Metadata::new(100, -1), false)
        .unwrap();

    clock.advance(50);
    assert_eq!(*container.get(None, &"a").unwrap().unwrap().value(), 1);

    clock.advance(100);
    assert!(container.get(None, &"a").unwrap().is_none());
    assert!(container.get(None, &"a").unwrap().is_none());
}

// ----------------------------------------------------------------------------
// Seed scenario 4: bounded variant, size eviction passivates + notifies once.
// ----------------------------------------------------------------------------

#[test]
fn seed_4_bounded_eviction_passivates_and_notifies_exactly_once() {
    let clock = Arc::new(FakeTimeService::new(0));
    let passivated = Arc::new(Mutex::new(Vec::new()));
    let evicted_batches = Arc::new(Mutex::new(Vec::new()));
    let heard = Arc::new(Mutex::new(Vec::new()));

    let collaborators = Collaborators {
        partitioner: Arc::new(HashPartitioner::new(1)),
        time: Arc::clone(&clock) as Arc<dyn TimeService>,
        entry_factory: Arc::new(DefaultEntryFactory),
        expiration: Arc::new(LocalExpirationManager),
        activation: Arc::new(NoopActivationManager),
        passivation: Arc::new(RecordingPassivator(Arc::clone(&passivated))),
        eviction: Arc::new(RecordingEviction(Arc::clone(&evicted_batches))),
    };
    let config = ContainerConfig::bounded(1, 2, true);
    let container: Container<&str, i32> = Container::start(config, collaborators);

    let h = Arc::clone(&heard);
    container.register_listener(Arc::new(
        move |removed: &[(&str, Entry<&str, i32>)], cause: RemovalCause| {
            for (key, _) in removed {
                h.lock().unwrap().push((*key, cause));
            }
        },
    ));

    container.put(None, "a", 1, Metadata::IMMORTAL, false).unwrap();
    container.put(None, "b", 2, Metadata::IMMORTAL, false).unwrap();
    // "c" forces an eviction; with a single segment and a 2-per-segment cap,
    // whichever of "a"/"b" is least recently used is the victim.
    container.put(None, "c", 3, Metadata::IMMORTAL, false).unwrap();

    assert_eq!(container.size_including_expired(&[0]), 2);

    let evicted_keys = passivated.lock().unwrap().clone();
    assert_eq!(evicted_keys.len(), 1, "exactly one key should have been evicted for size");
    let victim = evicted_keys[0];
    assert!(victim == "a" || victim == "b");

    assert_eq!(evicted_batches.lock().unwrap().len(), 1);
    assert_eq!(evicted_batches.lock().unwrap()[0], vec![victim]);

    let heard_calls = heard.lock().unwrap();
    assert_eq!(heard_calls.len(), 1);
    assert_eq!(heard_calls[0], (victim, RemovalCause::Size));
}

// ----------------------------------------------------------------------------
// Seed scenario 6: remove of an already-expired entry returns absent but
// still consults the expiration hook.
// ----------------------------------------------------------------------------

#[test]
fn seed_6_remove_of_expired_entry_returns_absent() {
    let (container, clock) = unbounded(1);
    container
        .put(None, "a", 1, Metadata::new(10, -1), false)
        .unwrap();
    clock.advance(100);

    assert!(container.remove(None, &"a").unwrap().is_none());
}

// ----------------------------------------------------------------------------
// Universal invariant 1: put then get round-trips the value.
// ----------------------------------------------------------------------------

#[test]
fn invariant_1_put_then_get_roundtrips() {
    let (container, _clock) = unbounded(4);
    container.put(None, "a", 1, Metadata::IMMORTAL, false).unwrap();
    let entry = container.get(None, &"a").unwrap().unwrap();
    assert_eq!(*entry.value(), 1);
    assert_eq!(entry.metadata().lifespan_millis, -1);
}

// ----------------------------------------------------------------------------
// Universal invariant 2: a key always resolves to the same segment as the
// partitioner assigns, regardless of the operations performed on it.
// ----------------------------------------------------------------------------

#[test]
fn invariant_2_key_stays_in_its_partitioned_segment() {
    let (container, _clock) = unbounded(8);
    let partitioner = HashPartitioner::new(8);
    let keys = ["alpha", "beta", "gamma", "delta", "epsilon"];

    for &key in &keys {
        container.put(None, key, 1, Metadata::IMMORTAL, false).unwrap();
    }
    container.put(None, "alpha", 2, Metadata::IMMORTAL, false).unwrap();
    container.remove(None, &"beta").ok();

    for &key in &keys {
        let expected_segment = partitioner.segment_for(&key);
        let in_any_other_segment = (0..8)
            .filter(|&s| s != expected_segment)
            .any(|s| container.peek(Some(s), &key).unwrap().is_some());
        assert!(
            !in_any_other_segment,
            "{key} must never appear outside its partitioned segment"
        );
    }
}

// ----------------------------------------------------------------------------
// Universal invariant 4: remove then get is absent.
// ----------------------------------------------------------------------------

#[test]
fn invariant_4_remove_then_get_is_absent() {
    let (container, _clock) = unbounded(2);
    container.put(None, "a", 1, Metadata::IMMORTAL, false).unwrap();
    let removed = container.remove(None, &"a").unwrap().unwrap();
    assert_eq!(*removed.value(), 1);
    assert!(container.get(None, &"a").unwrap().is_none());
}

// ----------------------------------------------------------------------------
// Universal invariant 6: bounded and unbounded agree on reads as long as the
// workload never exceeds max_entries.
// ----------------------------------------------------------------------------

#[test]
fn invariant_6_bounded_matches_unbounded_below_capacity() {
    let (unbounded_container, _c1) = unbounded(1);
    let clock = Arc::new(FakeTimeService::new(0));
    let collaborators = Collaborators {
        partitioner: Arc::new(HashPartitioner::new(1)),
        time: Arc::clone(&clock) as Arc<dyn TimeService>,
        entry_factory: Arc::new(DefaultEntryFactory),
        expiration: Arc::new(LocalExpirationManager),
        activation: Arc::new(NoopActivationManager),
        passivation: Arc::new(NoopPassivationManager),
        eviction: Arc::new(NoopEvictionManager),
    };
    let bounded_container: Container<&str, i32> =
        Container::start(ContainerConfig::bounded(1, 10, false), collaborators);

    for (key, value) in [("a", 1), ("b", 2), ("c", 3)] {
        unbounded_container.put(None, key, value, Metadata::IMMORTAL, false).unwrap();
        bounded_container.put(None, key, value, Metadata::IMMORTAL, false).unwrap();
    }

    for key in ["a", "b", "c"] {
        assert_eq!(
            unbounded_container.get(None, &key).unwrap().map(|e| *e.value()),
            bounded_container.get(None, &key).unwrap().map(|e| *e.value()),
        );
    }
}

// ----------------------------------------------------------------------------
// Boundary behaviors.
// ----------------------------------------------------------------------------

#[test]
fn boundary_size_including_expired_ignores_absent_segments() {
    let (container, _clock) = unbounded(3);
    container.put(None, "a", 1, Metadata::IMMORTAL, false).unwrap();
    container.remove_segments(&[0, 1, 2]).ok();
    // Every segment is now unassigned; an absent segment contributes 0.
    assert_eq!(container.size_including_expired(&[0, 1, 2]), 0);
}

#[test]
fn boundary_immortal_get_never_consults_expiration_hook() {
    struct PanicsIfCalled;
    impl datacontainer_rs::ExpirationManager<&'static str, i32> for PanicsIfCalled {
        fn entry_expired_in_memory(&self, _entry: &Entry<&'static str, i32>, _now: u64) -> bool {
            panic!("expiration hook must not be consulted for an immortal entry");
        }
        fn entry_expired_in_memory_from_iteration(
            &self,
            _entry: &Entry<&'static str, i32>,
            _now: u64,
        ) -> bool {
            panic!("expiration hook must not be consulted for an immortal entry");
        }
    }

    let clock = Arc::new(FakeTimeService::new(0));
    let collaborators = Collaborators {
        partitioner: Arc::new(HashPartitioner::new(1)),
        time: Arc::clone(&clock) as Arc<dyn TimeService>,
        entry_factory: Arc::new(DefaultEntryFactory),
        expiration: Arc::new(PanicsIfCalled),
        activation: Arc::new(NoopActivationManager),
        passivation: Arc::new(NoopPassivationManager),
        eviction: Arc::new(NoopEvictionManager),
    };
    let container: Container<&str, i32> =
        Container::start(ContainerConfig::unbounded(1), collaborators);

    container.put(None, "a", 1, Metadata::IMMORTAL, false).unwrap();
    clock.advance(1_000_000);
    assert_eq!(*container.get(None, &"a").unwrap().unwrap().value(), 1);
}

#[test]
fn boundary_l1_entry_reports_flag_and_unwrapped_metadata() {
    let (container, _clock) = unbounded(1);
    container
        .put(None, "a", 1, Metadata::new(500, -1), true)
        .unwrap();

    let entry = container.peek(None, &"a").unwrap().unwrap();
    assert!(entry.is_l1());
    assert_eq!(entry.metadata().lifespan_millis, 500);
}

#[test]
fn out_of_range_segment_is_a_programmer_error() {
    let (container, _clock) = unbounded(2);
    let err = container.get(Some(5), &"a").unwrap_err();
    assert!(err.is_programmer_error());
    assert!(matches!(err, ContainerError::SegmentOutOfRange { .. }));
}

#[test]
fn operating_on_a_removed_segment_is_a_programmer_error() {
    let (container, _clock) = unbounded(2);
    container.remove_segments(&[0, 1]).unwrap();
    let err = container.get(Some(0), &"a").unwrap_err();
    assert!(err.is_programmer_error());
    assert!(matches!(err, ContainerError::UnassignedSegment { .. }));
}

// ----------------------------------------------------------------------------
// Supplemental operations (§4.8).
// ----------------------------------------------------------------------------

#[test]
fn put_if_absent_installs_once_then_returns_existing() {
    let (container, _clock) = unbounded(1);
    let prior = container
        .put_if_absent(None, &"a", 1, Metadata::IMMORTAL)
        .unwrap();
    assert!(prior.is_none());

    let prior = container
        .put_if_absent(None, &"a", 99, Metadata::IMMORTAL)
        .unwrap();
    assert_eq!(*prior.unwrap().value(), 1);
    assert_eq!(*container.get(None, &"a").unwrap().unwrap().value(), 1);
}

#[test]
fn touch_refreshes_last_used_at_and_reports_liveness() {
    let (container, clock) = unbounded(1);
    container
        .put(None, "a", 1, Metadata::new(-1, 100), false)
        .unwrap();

    clock.advance(80);
    assert!(container.touch(None, &"a").unwrap());
    clock.advance(80);
    // Idle timeout resets on touch, so the entry should still be alive.
    assert!(container.get(None, &"a").unwrap().is_some());

    clock.advance(200);
    assert!(!container.touch(None, &"a").unwrap());
}

#[test]
fn key_set_and_entry_set_project_over_iter() {
    let (container, _clock) = unbounded(4);
    for (key, value) in [("a", 1), ("b", 2), ("c", 3)] {
        container.put(None, key, value, Metadata::IMMORTAL, false).unwrap();
    }

    let mut keys: Vec<_> = container.key_set(None).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["a", "b", "c"]);

    let mut entries: Vec<_> = container.entry_set(None).collect();
    entries.sort_unstable();
    assert_eq!(entries, vec![("a", 1), ("b", 2), ("c", 3)]);
}

#[test]
fn add_segments_replaces_with_a_fresh_empty_slot() {
    let (container, _clock) = unbounded(1);
    container.put(None, "a", 1, Metadata::IMMORTAL, false).unwrap();
    assert_eq!(container.size_including_expired(&[0]), 1);

    container.add_segments(&[0]).unwrap();
    assert_eq!(container.size_including_expired(&[0]), 0);
    assert!(container.get(None, &"a").unwrap().is_none());
}

#[test]
fn clear_fires_explicit_removal_for_every_entry() {
    let (container, _clock) = unbounded(1);
    container.put(None, "a", 1, Metadata::IMMORTAL, false).unwrap();
    container.put(None, "b", 2, Metadata::IMMORTAL, false).unwrap();

    let heard = Arc::new(Mutex::new(Vec::new()));
    let h = Arc::clone(&heard);
    container.register_listener(Arc::new(
        move |removed: &[(&str, Entry<&str, i32>)], cause: RemovalCause| {
            for (key, _) in removed {
                h.lock().unwrap().push((*key, cause));
            }
        },
    ));

    container.clear(&[0]).unwrap();

    let mut seen = heard.lock().unwrap().clone();
    seen.sort_unstable();
    assert_eq!(
        seen,
        vec![("a", RemovalCause::Explicit), ("b", RemovalCause::Explicit)]
    );
    assert_eq!(container.size_including_expired(&[0]), 0);
}

#[test]
fn evict_passivates_unconditionally_and_reports_explicit_cause() {
    let clock = Arc::new(FakeTimeService::new(0));
    let passivated = Arc::new(Mutex::new(Vec::new()));
    let activations = Arc::new(Mutex::new(Vec::new()));

    let collaborators = Collaborators {
        partitioner: Arc::new(HashPartitioner::new(1)),
        time: Arc::clone(&clock) as Arc<dyn TimeService>,
        entry_factory: Arc::new(DefaultEntryFactory),
        expiration: Arc::new(LocalExpirationManager),
        activation: Arc::new(RecordingActivation(Arc::clone(&activations))),
        passivation: Arc::new(RecordingPassivator(Arc::clone(&passivated))),
        eviction: Arc::new(NoopEvictionManager),
    };
    // Unbounded: a normal `put` never passivates, so `evict` is the only path
    // that should ever call the passivator here.
    let container: Container<&str, i32> =
        Container::start(ContainerConfig::unbounded(1), collaborators);

    container.put(None, "a", 1, Metadata::IMMORTAL, false).unwrap();
    assert!(passivated.lock().unwrap().is_empty());

    container.evict(None, &"a").unwrap();
    assert_eq!(*passivated.lock().unwrap(), vec!["a"]);
    assert!(container.get(None, &"a").unwrap().is_none());
    assert!(activations
        .lock()
        .unwrap()
        .iter()
        .any(|event| event == "remove:a:false"));
}

#[test]
fn unregistered_listener_stops_hearing_removals() {
    let (container, _clock) = unbounded(1);
    container.put(None, "a", 1, Metadata::IMMORTAL, false).unwrap();

    let heard = Arc::new(Mutex::new(0usize));
    let h = Arc::clone(&heard);
    let id = container.register_listener(Arc::new(
        move |removed: &[(&str, Entry<&str, i32>)], _cause: RemovalCause| {
            *h.lock().unwrap() += removed.len();
        },
    ));

    container.remove(None, &"a").unwrap();
    assert_eq!(*heard.lock().unwrap(), 1);

    container.unregister_listener(id);
    container.put(None, "b", 2, Metadata::IMMORTAL, false).unwrap();
    container.remove(None, &"b").unwrap();
    assert_eq!(*heard.lock().unwrap(), 1, "no further notifications after unregister");
}
