//! Iteration engine (C7).
//!
//! §4.7 asks for a lazy sequence over a chosen subset of segments that never
//! holds a segment's lock across a yield, filters expired entries through the
//! iteration-specific expiration hook (sampling `now` once per advance, or
//! once per batch for [`ContainerIter::for_each_remaining`]), and supports
//! being split into sub-sequences whose union is the original.
//!
//! The underlying per-segment view is a snapshot taken with the lock held
//! only for the copy (see [`crate::segment::Segment::snapshot`]) — the
//! "weakly consistent" guarantee the specification asks for: an iterator
//! started before a concurrent `put` is not required to observe it, but it
//! never double-locks and never observes a torn bucket.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::collaborators::ExpirationManager;
use crate::entry::Entry;
use crate::time::TimeService;

/// Lazy, segment-scoped sequence of entries (§4.7).
///
/// Produced by [`crate::container::Container::iter`] and
/// [`crate::container::Container::iter_including_expired`]. Iterates entries
/// in no particular order, distinct by key (keys are unique within a segment
/// and segments are disjoint), never yielding `None` for a live slot.
pub struct ContainerIter<K, V> {
    remaining_segments: VecDeque<Vec<(K, Entry<K, V>)>>,
    current: std::vec::IntoIter<(K, Entry<K, V>)>,
    expiration: Arc<dyn ExpirationManager<K, V>>,
    time: Arc<dyn TimeService>,
    include_expired: bool,
}

impl<K, V> std::fmt::Debug for ContainerIter<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerIter")
            .field("remaining_segments", &self.remaining_segments.len())
            .field("include_expired", &self.include_expired)
            .finish_non_exhaustive()
    }
}

impl<K, V> ContainerIter<K, V> {
    pub(crate) fn new(
        segments: Vec<Vec<(K, Entry<K, V>)>>,
        expiration: Arc<dyn ExpirationManager<K, V>>,
        time: Arc<dyn TimeService>,
        include_expired: bool,
    ) -> Self {
        let mut remaining_segments: VecDeque<_> = segments.into_iter().collect();
        let current = remaining_segments
            .pop_front()
            .unwrap_or_default()
            .into_iter();
        ContainerIter {
            remaining_segments,
            current,
            expiration,
            time,
            include_expired,
        }
    }

    /// True if this candidate should be skipped under the iteration's
    /// expiration-filtering rule (a no-op when `include_expired` is set).
    fn should_skip(&self, entry: &Entry<K, V>, now: u64) -> bool {
        !self.include_expired
            && entry.can_expire()
            && entry.is_expired_at(now)
            && self
                .expiration
                .entry_expired_in_memory_from_iteration(entry, now)
    }

    /// Advances until the next non-expired candidate is found or every
    /// segment is exhausted, without sampling the clock again in this call.
    fn advance_with(&mut self, now: u64) -> Option<(K, Entry<K, V>)> {
        loop {
            if let Some((key, entry)) = self.current.next() {
                if self.should_skip(&entry, now) {
                    continue;
                }
                return Some((key, entry));
            }
            match self.remaining_segments.pop_front() {
                Some(segment) => self.current = segment.into_iter(),
                None => return None,
            }
        }
    }

    /// Splits this iterator into two, dividing the not-yet-started segments
    /// (plus whatever remains of the in-progress one) roughly in half. The
    /// union of the two halves' remaining output equals this iterator's
    /// remaining output (§4.7 "splittable").
    pub fn split(mut self) -> (Self, Self) {
        let mut rest: Vec<Vec<(K, Entry<K, V>)>> = self.remaining_segments.drain(..).collect();
        let in_progress: Vec<(K, Entry<K, V>)> = self.current.by_ref().collect();
        if !in_progress.is_empty() {
            rest.insert(0, in_progress);
        }

        let split_at = rest.len() / 2;
        let second_half = rest.split_off(split_at);

        let left = ContainerIter::new(
            rest,
            Arc::clone(&self.expiration),
            Arc::clone(&self.time),
            self.include_expired,
        );
        let right = ContainerIter::new(second_half, self.expiration, self.time, self.include_expired);
        (left, right)
    }

    /// Consumes the remainder, invoking `f` on every surviving entry. Samples
    /// the clock once for the whole batch rather than once per entry (§4.7:
    /// "once per batch in `forEachRemaining`").
    pub fn for_each_remaining<F>(mut self, mut f: F)
    where
        F: FnMut(K, Entry<K, V>),
    {
        let now = self.time.now_millis();
        while let Some((key, entry)) = self.advance_with(now) {
            f(key, entry);
        }
    }
}

impl<K, V> Iterator for ContainerIter<K, V> {
    type Item = Entry<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        let now = self.time.now_millis();
        self.advance_with(now).map(|(_, entry)| entry)
    }
}
