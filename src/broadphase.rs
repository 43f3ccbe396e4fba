//! Incremental sweep-and-prune broadphase.
//!
//! Every body's AABB contributes two endpoints per axis to a globally sorted
//! sequence, ordered by a sign-preserving integer re-encoding of the float
//! coordinate. Moving a body swaps its endpoints past their neighbors one
//! slot at a time; each swap past another box's opposing endpoint is a
//! potential overlap begin/end on that axis, confirmed against the other two
//! axes and reported to the [`PairSet`]. Expected cost per update is
//! O(n + k) where k is the number of endpoint crossings, with no full
//! rescan of the population.

use std::collections::HashMap;

use glam::Vec3;
use tracing::debug;

use crate::aabb::Aabb;
use crate::body::BodyId;
use crate::pairs::{PairEvent, PairSet};

/// Box owner id stored on the two sentinel endpoints of each axis.
const INVALID_BOX: u32 = u32::MAX;
/// Encoded value of the permanent left sentinel on each axis.
const SENTINEL_MIN: u32 = 0;
/// Encoded value of the permanent right sentinel on each axis.
const SENTINEL_MAX: u32 = u32::MAX;
/// Encoded bounds of the transient "at infinity" AABB a box is moved to
/// while being removed. Larger than any encoded float, smaller than the
/// right sentinel.
const REMOVED_MIN: u32 = u32::MAX - 2;
const REMOVED_MAX: u32 = u32::MAX - 1;
/// Sentinel endpoints per axis.
const NB_SENTINELS: usize = 2;
/// Box slots allocated up front; storage never shrinks below this.
const SEED_CAPACITY: usize = 16;

/// Map a float to an unsigned integer that preserves ordering, including
/// across the sign boundary, so endpoint sorting can use plain integer
/// comparison.
#[inline]
pub(crate) fn encode_float(value: f32) -> u32 {
    let bits = value.to_bits();
    if bits & 0x8000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000
    }
}

/// Inverse of [`encode_float`].
#[inline]
pub(crate) fn decode_float(value: u32) -> f32 {
    if value & 0x8000_0000 != 0 {
        f32::from_bits(value & 0x7FFF_FFFF)
    } else {
        f32::from_bits(!value)
    }
}

/// One AABB boundary on one axis.
#[derive(Debug, Clone, Copy)]
struct EndPoint {
    box_id: u32,
    is_min: bool,
    value: u32,
}

/// Per-body record: for each axis, the slots of its two endpoints in that
/// axis's sorted sequence.
#[derive(Debug, Clone, Copy)]
struct BoxRecord {
    body: BodyId,
    min: [u32; 3],
    max: [u32; 3],
}

/// Integer-encoded AABB driving an endpoint walk.
#[derive(Debug, Clone, Copy)]
struct AabbInt {
    min: [u32; 3],
    max: [u32; 3],
}

impl AabbInt {
    fn from_aabb(aabb: &Aabb) -> Self {
        let mut min = [0u32; 3];
        let mut max = [0u32; 3];
        for axis in 0..3 {
            let lo = aabb.bound(axis, true);
            let hi = aabb.bound(axis, false);
            assert!(
                lo.is_finite() && hi.is_finite(),
                "broadphase AABB coordinates must be finite"
            );
            min[axis] = encode_float(lo);
            max[axis] = encode_float(hi);
            assert!(
                min[axis] > SENTINEL_MIN && max[axis] < REMOVED_MIN,
                "broadphase AABB coordinate out of encodable range"
            );
        }
        Self { min, max }
    }

    /// The far-away AABB used while removing a box: updating to it walks the
    /// endpoints past every other box, emitting all pair removals.
    fn removed() -> Self {
        Self {
            min: [REMOVED_MIN; 3],
            max: [REMOVED_MAX; 3],
        }
    }
}

/// Incremental sweep-and-prune over the registered bodies' AABBs.
///
/// The broadphase exclusively owns the endpoint and box storage; bodies are
/// referred to only by their [`BodyId`]. Overlap begin/end transitions are
/// recorded in the owned [`PairSet`].
pub struct SweepAndPrune {
    boxes: Vec<BoxRecord>,
    endpoints: [Vec<EndPoint>; 3],
    free_boxes: Vec<u32>,
    body_to_box: HashMap<BodyId, u32>,
    nb_boxes: usize,
    pairs: PairSet,
}

impl Default for SweepAndPrune {
    fn default() -> Self {
        Self::new()
    }
}

impl SweepAndPrune {
    pub fn new() -> Self {
        Self::with_capacity(SEED_CAPACITY)
    }

    /// Create a broadphase with room for `capacity` bodies before the first
    /// storage growth.
    pub fn with_capacity(capacity: usize) -> Self {
        let make_axis = || {
            let mut axis = Vec::with_capacity(2 * capacity + NB_SENTINELS);
            axis.push(EndPoint {
                box_id: INVALID_BOX,
                is_min: true,
                value: SENTINEL_MIN,
            });
            axis.push(EndPoint {
                box_id: INVALID_BOX,
                is_min: false,
                value: SENTINEL_MAX,
            });
            axis
        };
        Self {
            boxes: Vec::with_capacity(capacity),
            endpoints: [make_axis(), make_axis(), make_axis()],
            free_boxes: Vec::new(),
            body_to_box: HashMap::new(),
            nb_boxes: 0,
            pairs: PairSet::new(),
        }
    }

    /// Number of bodies currently registered.
    #[inline]
    pub fn body_count(&self) -> usize {
        self.nb_boxes
    }

    /// Whether the body is currently registered.
    #[inline]
    pub fn contains(&self, body: BodyId) -> bool {
        self.body_to_box.contains_key(&body)
    }

    /// The currently overlapping pairs.
    #[inline]
    pub fn pairs(&self) -> &PairSet {
        &self.pairs
    }

    /// Drain the overlap begin/end transitions accumulated since the last
    /// drain.
    pub fn drain_pair_events(&mut self) -> Vec<PairEvent> {
        self.pairs.drain_events()
    }

    /// Current AABB of a registered body, reconstructed from its endpoints.
    ///
    /// Panics if the body was never added or has been removed.
    pub fn aabb(&self, body: BodyId) -> Aabb {
        let record = &self.boxes[self.box_index(body) as usize];
        let mut min = [0.0f32; 3];
        let mut max = [0.0f32; 3];
        for axis in 0..3 {
            min[axis] = decode_float(self.endpoints[axis][record.min[axis] as usize].value);
            max[axis] = decode_float(self.endpoints[axis][record.max[axis] as usize].value);
        }
        Aabb::new(Vec3::from_array(min), Vec3::from_array(max))
    }

    /// Register a body with its initial AABB. Overlaps with existing bodies
    /// are detected immediately.
    ///
    /// Panics if the id is already registered or the AABB is not encodable.
    pub fn add_body(&mut self, body: BodyId, aabb: &Aabb) {
        assert!(
            !self.body_to_box.contains_key(&body),
            "body {body:?} is already in the broadphase"
        );
        let aabb_int = AabbInt::from_aabb(aabb);

        // Reuse a free slot before growing storage.
        let box_index = match self.free_boxes.pop() {
            Some(index) => index,
            None => {
                let index = self.boxes.len() as u32;
                let before = self.boxes.capacity();
                self.boxes.push(BoxRecord {
                    body,
                    min: [0; 3],
                    max: [0; 3],
                });
                if self.boxes.capacity() > before {
                    debug!(capacity = self.boxes.capacity(), "broadphase storage grown");
                }
                index
            }
        };

        // Materialize the new endpoints just before the right sentinel, at
        // the far-away coordinates; the update walk below moves them into
        // place and creates any overlap pairs on the way.
        let mut record = self.boxes[box_index as usize];
        record.body = body;
        for axis in 0..3 {
            let eps = &mut self.endpoints[axis];
            debug_assert_eq!(eps.len(), 2 * self.nb_boxes + NB_SENTINELS);
            let slot = eps.len() - 1;
            debug_assert_eq!(eps[slot].value, SENTINEL_MAX);
            let sentinel = eps[slot];
            eps[slot] = EndPoint {
                box_id: box_index,
                is_min: true,
                value: REMOVED_MIN,
            };
            eps.push(EndPoint {
                box_id: box_index,
                is_min: false,
                value: REMOVED_MAX,
            });
            eps.push(sentinel);
            record.min[axis] = slot as u32;
            record.max[axis] = slot as u32 + 1;
        }
        self.boxes[box_index as usize] = record;
        self.body_to_box.insert(body, box_index);
        self.nb_boxes += 1;

        self.update_encoded(box_index, aabb_int);
    }

    /// Move a registered body to a new AABB, emitting pair begin/end
    /// transitions for every overlap topology change.
    ///
    /// Panics if the body was never added or has been removed.
    pub fn update_body(&mut self, body: BodyId, aabb: &Aabb) {
        let box_index = self.box_index(body);
        self.update_encoded(box_index, AabbInt::from_aabb(aabb));
    }

    /// Unregister a body. All pairs involving it are reported as stopped.
    ///
    /// Panics if the body was never added or has already been removed.
    pub fn remove_body(&mut self, body: BodyId) {
        let box_index = self.box_index(body);

        // First move the box to the far-away AABB so the ordinary walk
        // emits every pair-removal, then delete the now-unreferenced
        // endpoints sitting next to the right sentinel.
        self.update_encoded(box_index, AabbInt::removed());
        for axis in 0..3 {
            let eps = &mut self.endpoints[axis];
            let slot = eps.len() - 1;
            debug_assert_eq!(eps[slot].value, SENTINEL_MAX);
            debug_assert_eq!(eps[slot - 1].box_id, box_index);
            debug_assert!(!eps[slot - 1].is_min);
            debug_assert_eq!(eps[slot - 2].box_id, box_index);
            debug_assert!(eps[slot - 2].is_min);
            let sentinel = eps[slot];
            eps.truncate(slot - 2);
            eps.push(sentinel);
        }

        self.free_boxes.push(box_index);
        self.body_to_box.remove(&body);
        self.nb_boxes -= 1;

        if self.boxes.len() > SEED_CAPACITY && self.nb_boxes * 4 <= self.boxes.len() {
            self.shrink();
        }
    }

    fn box_index(&self, body: BodyId) -> u32 {
        match self.body_to_box.get(&body) {
            Some(&index) => index,
            None => panic!("body {body:?} is not in the broadphase"),
        }
    }

    /// Walk the six endpoints of a box to their new sorted slots, reporting
    /// overlap transitions discovered along the way.
    ///
    /// Axes are processed in order; the 2-D tests on the other two axes read
    /// whatever extents those axes currently hold (pre-update for axes not
    /// yet walked). A pair missed because of that stale snapshot is picked
    /// up by a later axis's walk within this same call.
    fn update_encoded(&mut self, box_index: u32, aabb_int: AabbInt) {
        for axis in 0..3 {
            let other1 = (1 << axis) & 3;
            let other2 = (1 << other1) & 3;

            let slot = self.boxes[box_index as usize].min[axis] as usize;
            debug_assert!(self.endpoints[axis][slot].is_min);
            let limit = aabb_int.min[axis];
            let current = self.endpoints[axis][slot].value;
            if limit < current {
                self.walk_left(axis, other1, other2, slot, limit, &aabb_int, box_index);
            } else if limit > current {
                self.walk_right(axis, other1, other2, slot, limit, &aabb_int, box_index);
            }

            let slot = self.boxes[box_index as usize].max[axis] as usize;
            debug_assert!(!self.endpoints[axis][slot].is_min);
            let limit = aabb_int.max[axis];
            let current = self.endpoints[axis][slot].value;
            if limit > current {
                self.walk_right(axis, other1, other2, slot, limit, &aabb_int, box_index);
            } else if limit < current {
                self.walk_left(axis, other1, other2, slot, limit, &aabb_int, box_index);
            }
        }
    }

    /// Move one endpoint toward smaller slots until its new value fits,
    /// swapping it past every endpoint it now precedes.
    fn walk_left(
        &mut self,
        axis: usize,
        other1: usize,
        other2: usize,
        start: usize,
        limit: u32,
        aabb_int: &AabbInt,
        box_index: u32,
    ) {
        let mut moving = self.endpoints[axis][start];
        moving.value = limit;
        let mut slot = start;

        // The left sentinel's value is below every encodable key, so the
        // walk cannot run off the array.
        while self.endpoints[axis][slot - 1].value > limit {
            let passed = self.endpoints[axis][slot - 1];
            if passed.is_min != moving.is_min && passed.box_id != box_index {
                if moving.is_min {
                    // A min moving left past another box's max: the boxes
                    // start overlapping on this axis.
                    if self.test_overlap_2d(box_index, passed.box_id, other1, other2)
                        && self.test_overlap_1d(passed.box_id, aabb_int, axis)
                    {
                        let body = self.boxes[box_index as usize].body;
                        let other = self.boxes[passed.box_id as usize].body;
                        self.pairs.begin_overlap(body, other);
                    }
                } else {
                    // A max moving left past another box's min: separation
                    // on this axis, which is enough for 3-D separation.
                    if self.test_overlap_2d(box_index, passed.box_id, other1, other2) {
                        let body = self.boxes[box_index as usize].body;
                        let other = self.boxes[passed.box_id as usize].body;
                        self.pairs.end_overlap(body, other);
                    }
                }
            }

            // Displace the passed endpoint one slot right, keeping its
            // owner's record pointing at the right slot.
            let record = &mut self.boxes[passed.box_id as usize];
            if passed.is_min {
                record.min[axis] = slot as u32;
            } else {
                record.max[axis] = slot as u32;
            }
            self.endpoints[axis][slot] = passed;
            slot -= 1;
        }

        self.endpoints[axis][slot] = moving;
        let record = &mut self.boxes[box_index as usize];
        if moving.is_min {
            record.min[axis] = slot as u32;
        } else {
            record.max[axis] = slot as u32;
        }
    }

    /// Mirror of [`walk_left`] toward larger slots.
    fn walk_right(
        &mut self,
        axis: usize,
        other1: usize,
        other2: usize,
        start: usize,
        limit: u32,
        aabb_int: &AabbInt,
        box_index: u32,
    ) {
        let mut moving = self.endpoints[axis][start];
        moving.value = limit;
        let mut slot = start;

        while self.endpoints[axis][slot + 1].value < limit {
            let passed = self.endpoints[axis][slot + 1];
            if passed.is_min != moving.is_min && passed.box_id != box_index {
                if moving.is_min {
                    // A min moving right past another box's max: separation
                    // on this axis.
                    if self.test_overlap_2d(box_index, passed.box_id, other1, other2) {
                        let body = self.boxes[box_index as usize].body;
                        let other = self.boxes[passed.box_id as usize].body;
                        self.pairs.end_overlap(body, other);
                    }
                } else {
                    // A max moving right past another box's min: the boxes
                    // start overlapping on this axis.
                    if self.test_overlap_2d(box_index, passed.box_id, other1, other2)
                        && self.test_overlap_1d(passed.box_id, aabb_int, axis)
                    {
                        let body = self.boxes[box_index as usize].body;
                        let other = self.boxes[passed.box_id as usize].body;
                        self.pairs.begin_overlap(body, other);
                    }
                }
            }

            let record = &mut self.boxes[passed.box_id as usize];
            if passed.is_min {
                record.min[axis] = slot as u32;
            } else {
                record.max[axis] = slot as u32;
            }
            self.endpoints[axis][slot] = passed;
            slot += 1;
        }

        self.endpoints[axis][slot] = moving;
        let record = &mut self.boxes[box_index as usize];
        if moving.is_min {
            record.min[axis] = slot as u32;
        } else {
            record.max[axis] = slot as u32;
        }
    }

    /// Interval overlap of two boxes on two axes, compared through endpoint
    /// slots: the sequences are sorted, so slot order equals key order.
    #[inline]
    fn test_overlap_2d(&self, a: u32, b: u32, axis1: usize, axis2: usize) -> bool {
        let box_a = &self.boxes[a as usize];
        let box_b = &self.boxes[b as usize];
        !(box_b.max[axis1] < box_a.min[axis1]
            || box_a.max[axis1] < box_b.min[axis1]
            || box_b.max[axis2] < box_a.min[axis2]
            || box_a.max[axis2] < box_b.min[axis2])
    }

    /// Interval overlap on one axis between a box's current endpoints and
    /// the moving box's final encoded AABB.
    #[inline]
    fn test_overlap_1d(&self, other: u32, aabb_int: &AabbInt, axis: usize) -> bool {
        let record = &self.boxes[other as usize];
        let eps = &self.endpoints[axis];
        !(eps[record.max[axis] as usize].value < aabb_int.min[axis]
            || aabb_int.max[axis] < eps[record.min[axis] as usize].value)
    }

    /// Re-pack live boxes into the lowest slots and release excess storage.
    /// Runs only when occupancy drops below a quarter of allocated slots.
    fn shrink(&mut self) {
        let live = self.nb_boxes as u32;
        let allocated = self.boxes.len() as u32;
        self.free_boxes.sort_unstable();

        // Free slots below the live count, ascending; exactly as many as
        // there are live boxes stranded above it.
        let low_slots: Vec<u32> = self
            .free_boxes
            .iter()
            .copied()
            .filter(|&slot| slot < live)
            .collect();
        let mut next_low = low_slots.into_iter();

        for old_slot in live..allocated {
            if self.free_boxes.binary_search(&old_slot).is_ok() {
                continue;
            }
            let new_slot = next_low
                .next()
                .expect("repack must have a free low slot for every stranded box");
            let record = self.boxes[old_slot as usize];
            self.boxes[new_slot as usize] = record;
            for axis in 0..3 {
                debug_assert_eq!(
                    self.endpoints[axis][record.min[axis] as usize].box_id,
                    old_slot
                );
                debug_assert_eq!(
                    self.endpoints[axis][record.max[axis] as usize].box_id,
                    old_slot
                );
                self.endpoints[axis][record.min[axis] as usize].box_id = new_slot;
                self.endpoints[axis][record.max[axis] as usize].box_id = new_slot;
            }
            self.body_to_box.insert(record.body, new_slot);
        }

        let target = (live as usize).max(SEED_CAPACITY);
        self.boxes.truncate(target);
        self.boxes.shrink_to_fit();
        for axis in 0..3 {
            self.endpoints[axis].shrink_to_fit();
        }
        self.free_boxes.clear();
        self.free_boxes.extend(live..target as u32);

        debug!(
            live = self.nb_boxes,
            allocated = target,
            "broadphase storage shrunk"
        );
    }

    /// Test support: verify the sorted-endpoint and box-index invariants.
    #[cfg(test)]
    fn check_invariants(&self) {
        assert_eq!(
            self.nb_boxes + self.free_boxes.len(),
            self.boxes.len(),
            "free slots plus live boxes must cover storage"
        );
        for axis in 0..3 {
            let eps = &self.endpoints[axis];
            assert_eq!(eps.len(), 2 * self.nb_boxes + NB_SENTINELS);
            assert_eq!(eps[0].box_id, INVALID_BOX);
            assert!(eps[0].is_min);
            assert_eq!(eps[0].value, SENTINEL_MIN);
            let last = eps.len() - 1;
            assert_eq!(eps[last].box_id, INVALID_BOX);
            assert!(!eps[last].is_min);
            assert_eq!(eps[last].value, SENTINEL_MAX);
            for slot in 1..eps.len() {
                assert!(
                    eps[slot - 1].value <= eps[slot].value,
                    "endpoint sequence must be non-decreasing"
                );
            }
        }
        for (&body, &slot) in &self.body_to_box {
            let record = &self.boxes[slot as usize];
            assert_eq!(record.body, body);
            for axis in 0..3 {
                let min = record.min[axis] as usize;
                let max = record.max[axis] as usize;
                assert!(min < max, "box min endpoint must precede its max");
                let eps = &self.endpoints[axis];
                assert_eq!(eps[min].box_id, slot);
                assert!(eps[min].is_min);
                assert_eq!(eps[max].box_id, slot);
                assert!(!eps[max].is_min);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairs::BodyPair;

    fn unit_box(center: Vec3) -> Aabb {
        Aabb::from_center_half_extents(center, Vec3::splat(0.5))
    }

    #[test]
    fn test_encode_float_preserves_order() {
        let values = [
            -f32::MAX,
            -1000.5,
            -1.0,
            -f32::MIN_POSITIVE,
            0.0,
            f32::MIN_POSITIVE,
            0.25,
            3.0,
            1e30,
            f32::MAX,
        ];
        for window in values.windows(2) {
            assert!(
                encode_float(window[0]) < encode_float(window[1]),
                "{} should encode below {}",
                window[0],
                window[1]
            );
        }
        for value in values {
            assert_eq!(decode_float(encode_float(value)), value);
        }
    }

    #[test]
    fn test_add_separated_boxes_no_pair() {
        let mut sap = SweepAndPrune::new();
        sap.add_body(BodyId(0), &Aabb::new(Vec3::ZERO, Vec3::ONE));
        sap.add_body(BodyId(1), &Aabb::new(Vec3::splat(2.0), Vec3::splat(3.0)));
        sap.check_invariants();
        assert!(sap.pairs().is_empty());
        assert!(sap.drain_pair_events().is_empty());
    }

    #[test]
    fn test_update_creates_then_removes_pair() {
        let mut sap = SweepAndPrune::new();
        sap.add_body(BodyId(0), &Aabb::new(Vec3::ZERO, Vec3::ONE));
        sap.add_body(BodyId(1), &Aabb::new(Vec3::splat(2.0), Vec3::splat(3.0)));

        // Move the second box into overlap: exactly one pair appears.
        sap.update_body(BodyId(1), &Aabb::new(Vec3::splat(0.5), Vec3::splat(1.5)));
        sap.check_invariants();
        assert_eq!(sap.pairs().len(), 1);
        assert!(sap.pairs().contains(BodyId(0), BodyId(1)));
        let events = sap.drain_pair_events();
        assert_eq!(
            events,
            vec![PairEvent::Started(BodyPair::new(BodyId(0), BodyId(1)))]
        );

        // Move it back out: exactly one removal.
        sap.update_body(BodyId(1), &Aabb::new(Vec3::splat(2.0), Vec3::splat(3.0)));
        sap.check_invariants();
        assert!(sap.pairs().is_empty());
        let events = sap.drain_pair_events();
        assert_eq!(
            events,
            vec![PairEvent::Stopped(BodyPair::new(BodyId(0), BodyId(1)))]
        );
    }

    #[test]
    fn test_add_overlapping_box_creates_pair_immediately() {
        let mut sap = SweepAndPrune::new();
        sap.add_body(BodyId(5), &unit_box(Vec3::ZERO));
        sap.add_body(BodyId(9), &unit_box(Vec3::splat(0.25)));
        sap.check_invariants();
        assert_eq!(sap.pairs().len(), 1);
        assert!(sap.pairs().contains(BodyId(5), BodyId(9)));
    }

    #[test]
    fn test_remove_body_stops_pairs() {
        let mut sap = SweepAndPrune::new();
        sap.add_body(BodyId(0), &unit_box(Vec3::ZERO));
        sap.add_body(BodyId(1), &unit_box(Vec3::splat(0.25)));
        sap.add_body(BodyId(2), &unit_box(Vec3::new(0.5, 0.0, 0.0)));
        assert_eq!(sap.pairs().len(), 3);

        sap.remove_body(BodyId(0));
        sap.check_invariants();
        assert_eq!(sap.body_count(), 2);
        assert_eq!(sap.pairs().len(), 1);
        assert!(sap.pairs().contains(BodyId(1), BodyId(2)));
    }

    #[test]
    fn test_remove_then_readd_restores_pair_set() {
        let mut sap = SweepAndPrune::new();
        let aabb = unit_box(Vec3::splat(0.25));
        sap.add_body(BodyId(0), &unit_box(Vec3::ZERO));
        sap.add_body(BodyId(1), &aabb);
        sap.add_body(BodyId(2), &unit_box(Vec3::new(5.0, 0.0, 0.0)));
        assert_eq!(sap.pairs().len(), 1);

        sap.remove_body(BodyId(1));
        assert!(sap.pairs().is_empty());
        sap.add_body(BodyId(1), &aabb);
        sap.check_invariants();
        assert_eq!(sap.pairs().len(), 1);
        assert!(sap.pairs().contains(BodyId(0), BodyId(1)));
    }

    #[test]
    fn test_aabb_roundtrip() {
        let mut sap = SweepAndPrune::new();
        let aabb = Aabb::new(Vec3::new(-1.5, 0.25, 3.0), Vec3::new(2.5, 1.0, 4.0));
        sap.add_body(BodyId(7), &aabb);
        assert_eq!(sap.aabb(BodyId(7)), aabb);
    }

    #[test]
    #[should_panic(expected = "already in the broadphase")]
    fn test_double_add_panics() {
        let mut sap = SweepAndPrune::new();
        sap.add_body(BodyId(0), &unit_box(Vec3::ZERO));
        sap.add_body(BodyId(0), &unit_box(Vec3::ONE));
    }

    #[test]
    #[should_panic(expected = "not in the broadphase")]
    fn test_remove_unknown_body_panics() {
        let mut sap = SweepAndPrune::new();
        sap.remove_body(BodyId(42));
    }

    #[test]
    fn test_shrink_after_mass_removal_keeps_state_consistent() {
        let mut sap = SweepAndPrune::new();
        for i in 0..64u32 {
            sap.add_body(BodyId(i), &unit_box(Vec3::new(i as f32 * 3.0, 0.0, 0.0)));
        }
        // Leave a handful of bodies, two of them overlapping.
        for i in 4..64u32 {
            sap.remove_body(BodyId(i));
        }
        sap.update_body(BodyId(1), &unit_box(Vec3::new(0.25, 0.0, 0.0)));
        sap.check_invariants();
        assert_eq!(sap.body_count(), 4);
        assert_eq!(sap.pairs().len(), 1);
        assert!(sap.pairs().contains(BodyId(0), BodyId(1)));
        for i in 0..4u32 {
            assert!(sap.contains(BodyId(i)));
            let _ = sap.aabb(BodyId(i));
        }
    }

    /// Deterministic LCG driving the randomized cross-check below.
    struct Lcg(u64);

    impl Lcg {
        fn next_u32(&mut self) -> u32 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (self.0 >> 33) as u32
        }

        fn next_f32(&mut self, lo: f32, hi: f32) -> f32 {
            lo + (hi - lo) * (self.next_u32() as f32 / u32::MAX as f32)
        }
    }

    #[test]
    fn test_pairs_match_brute_force_under_random_walk() {
        let mut rng = Lcg(0x5eed);
        let mut sap = SweepAndPrune::new();
        let mut shadow: Vec<Option<Aabb>> = vec![None; 24];

        let mut random_aabb = |rng: &mut Lcg| {
            let center = Vec3::new(
                rng.next_f32(-4.0, 4.0),
                rng.next_f32(-4.0, 4.0),
                rng.next_f32(-4.0, 4.0),
            );
            let half = Vec3::new(
                rng.next_f32(0.1, 1.5),
                rng.next_f32(0.1, 1.5),
                rng.next_f32(0.1, 1.5),
            );
            Aabb::from_center_half_extents(center, half)
        };

        for step in 0..400 {
            let id = (rng.next_u32() % shadow.len() as u32) as usize;
            match shadow[id] {
                None => {
                    let aabb = random_aabb(&mut rng);
                    sap.add_body(BodyId(id as u32), &aabb);
                    shadow[id] = Some(aabb);
                }
                Some(_) if step % 7 == 0 => {
                    sap.remove_body(BodyId(id as u32));
                    shadow[id] = None;
                }
                Some(_) => {
                    let aabb = random_aabb(&mut rng);
                    sap.update_body(BodyId(id as u32), &aabb);
                    shadow[id] = Some(aabb);
                }
            }

            sap.check_invariants();

            // Brute-force O(n^2) reference over the shadow AABBs.
            let mut expected = 0usize;
            for i in 0..shadow.len() {
                for j in (i + 1)..shadow.len() {
                    if let (Some(a), Some(b)) = (&shadow[i], &shadow[j]) {
                        if a.overlaps(b) {
                            expected += 1;
                            assert!(
                                sap.pairs().contains(BodyId(i as u32), BodyId(j as u32)),
                                "missing pair ({i}, {j}) at step {step}"
                            );
                        } else {
                            assert!(
                                !sap.pairs().contains(BodyId(i as u32), BodyId(j as u32)),
                                "stale pair ({i}, {j}) at step {step}"
                            );
                        }
                    }
                }
            }
            assert_eq!(sap.pairs().len(), expected, "pair count at step {step}");
        }
    }
}
