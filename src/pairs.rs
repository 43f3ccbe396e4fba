//! Registry of overlapping body pairs reported by the broadphase.

use std::collections::HashSet;

use tracing::trace;

use crate::body::BodyId;

/// Unordered pair of body ids, normalized so each pair has a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyPair {
    first: BodyId,
    second: BodyId,
}

impl BodyPair {
    /// Build the canonical key for an unordered pair of distinct bodies.
    #[inline]
    pub fn new(a: BodyId, b: BodyId) -> Self {
        assert!(a != b, "a body cannot pair with itself");
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    #[inline]
    pub fn first(&self) -> BodyId {
        self.first
    }

    #[inline]
    pub fn second(&self) -> BodyId {
        self.second
    }

    /// Whether the pair involves the given body.
    #[inline]
    pub fn contains(&self, body: BodyId) -> bool {
        self.first == body || self.second == body
    }
}

/// An overlap begin or end transition, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairEvent {
    Started(BodyPair),
    Stopped(BodyPair),
}

/// Deduplicated set of currently overlapping pairs.
///
/// The sweep walk issues conservative notifications: a pair already known can
/// be reported as starting again, and a pair that never fully overlapped can
/// be reported as ending. The set absorbs those and records a [`PairEvent`]
/// only when the overlap state actually changes, so consumers observe exactly
/// one event per topology change.
#[derive(Debug, Default)]
pub struct PairSet {
    pairs: HashSet<BodyPair>,
    events: Vec<PairEvent>,
}

impl PairSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report that two bodies started overlapping on all three axes.
    /// Returns true if the pair was not already registered.
    pub(crate) fn begin_overlap(&mut self, a: BodyId, b: BodyId) -> bool {
        let pair = BodyPair::new(a, b);
        if self.pairs.insert(pair) {
            trace!(?pair, "overlap started");
            self.events.push(PairEvent::Started(pair));
            true
        } else {
            false
        }
    }

    /// Report that two bodies separated on at least one axis.
    /// Returns true if the pair was registered.
    pub(crate) fn end_overlap(&mut self, a: BodyId, b: BodyId) -> bool {
        let pair = BodyPair::new(a, b);
        if self.pairs.remove(&pair) {
            trace!(?pair, "overlap stopped");
            self.events.push(PairEvent::Stopped(pair));
            true
        } else {
            false
        }
    }

    /// Whether the pair is currently registered as overlapping.
    #[inline]
    pub fn contains(&self, a: BodyId, b: BodyId) -> bool {
        self.pairs.contains(&BodyPair::new(a, b))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterate the active pairs (unspecified order).
    pub fn iter(&self) -> impl Iterator<Item = BodyPair> + '_ {
        self.pairs.iter().copied()
    }

    /// Take the begin/end transitions accumulated since the last drain,
    /// in emission order.
    pub fn drain_events(&mut self) -> Vec<PairEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_is_unordered() {
        let a = BodyId(3);
        let b = BodyId(7);
        assert_eq!(BodyPair::new(a, b), BodyPair::new(b, a));
    }

    #[test]
    #[should_panic]
    fn test_pair_with_self_panics() {
        BodyPair::new(BodyId(1), BodyId(1));
    }

    #[test]
    fn test_duplicate_begin_is_absorbed() {
        let mut set = PairSet::new();
        assert!(set.begin_overlap(BodyId(1), BodyId(2)));
        assert!(!set.begin_overlap(BodyId(2), BodyId(1)));
        assert_eq!(set.len(), 1);
        assert_eq!(set.drain_events().len(), 1);
    }

    #[test]
    fn test_end_of_unknown_pair_is_absorbed() {
        let mut set = PairSet::new();
        assert!(!set.end_overlap(BodyId(1), BodyId(2)));
        assert!(set.drain_events().is_empty());
    }

    #[test]
    fn test_events_record_transitions_in_order() {
        let mut set = PairSet::new();
        set.begin_overlap(BodyId(1), BodyId(2));
        set.begin_overlap(BodyId(1), BodyId(3));
        set.end_overlap(BodyId(1), BodyId(2));
        let events = set.drain_events();
        assert_eq!(
            events,
            vec![
                PairEvent::Started(BodyPair::new(BodyId(1), BodyId(2))),
                PairEvent::Started(BodyPair::new(BodyId(1), BodyId(3))),
                PairEvent::Stopped(BodyPair::new(BodyId(1), BodyId(2))),
            ]
        );
        assert!(set.drain_events().is_empty());
        assert_eq!(set.len(), 1);
    }
}
