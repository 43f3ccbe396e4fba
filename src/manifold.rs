//! Persistent contact manifolds.
//!
//! A manifold is a contact patch between two shapes that survives across
//! simulation steps. Its points carry accumulated impulse data so a
//! constraint solver can warm-start from the previous step; refreshing a
//! point replaces its geometry but keeps that history.

use glam::Vec3;

use crate::contact::{ContactManifoldInfo, ContactPointInfo, MAX_POINTS_IN_MANIFOLD};
use crate::reduce;

/// A single persistent contact point.
#[derive(Debug, Clone, Copy)]
pub struct ContactPoint {
    /// Contact normal in the first shape's local frame, from shape 1 to
    /// shape 2.
    pub normal: Vec3,
    /// Penetration depth.
    pub penetration: f32,
    /// Contact point on shape 1, in shape 1 local space.
    pub local_point1: Vec3,
    /// Contact point on shape 2, in shape 2 local space.
    pub local_point2: Vec3,
    /// Accumulated normal impulse, preserved across refreshes for warm
    /// starting.
    pub normal_impulse: f32,
    /// Accumulated tangent impulses (two friction directions).
    pub tangent_impulse: [f32; 2],
    is_obsolete: bool,
}

impl ContactPoint {
    fn from_info(info: &ContactPointInfo) -> Self {
        Self {
            normal: info.normal,
            penetration: info.penetration,
            local_point1: info.local_point1,
            local_point2: info.local_point2,
            normal_impulse: 0.0,
            tangent_impulse: [0.0; 2],
            is_obsolete: false,
        }
    }

    /// Whether the point was refreshed by the current step's narrow phase.
    #[inline]
    pub fn is_fresh(&self) -> bool {
        !self.is_obsolete
    }

    /// Replace the geometry with a newly detected point, keeping the
    /// accumulated impulses.
    fn refresh(&mut self, info: &ContactPointInfo) {
        self.normal = info.normal;
        self.penetration = info.penetration;
        self.local_point1 = info.local_point1;
        self.local_point2 = info.local_point2;
        self.is_obsolete = false;
    }
}

/// A persistent contact patch: at most four points sharing a normal bucket.
#[derive(Debug, Clone)]
pub struct ContactManifold {
    points: Vec<ContactPoint>,
    normal: Vec3,
    normal_id: i16,
    is_obsolete: bool,
}

impl ContactManifold {
    pub(crate) fn from_info(info: &ContactManifoldInfo) -> Self {
        debug_assert!(info.points().len() <= MAX_POINTS_IN_MANIFOLD);
        let points: Vec<ContactPoint> = info.points().iter().map(ContactPoint::from_info).collect();
        let normal = average_normal(&points).unwrap_or(Vec3::Z);
        Self {
            points,
            normal,
            normal_id: info.normal_id(),
            is_obsolete: false,
        }
    }

    /// The manifold's points; at most [`MAX_POINTS_IN_MANIFOLD`].
    #[inline]
    pub fn points(&self) -> &[ContactPoint] {
        &self.points
    }

    /// Mutable access for solvers accumulating impulses.
    #[inline]
    pub fn points_mut(&mut self) -> &mut [ContactPoint] {
        &mut self.points
    }

    /// Representative normal: the average of the fresh points' normals.
    #[inline]
    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    /// Normal-direction bucket id used to match incoming manifold infos.
    #[inline]
    pub fn normal_id(&self) -> i16 {
        self.normal_id
    }

    /// Whether the manifold was refreshed by the current step.
    #[inline]
    pub fn is_fresh(&self) -> bool {
        !self.is_obsolete
    }

    /// Largest penetration depth among the points; ties go to the first.
    pub fn largest_penetration_depth(&self) -> f32 {
        let mut largest = 0.0f32;
        for point in &self.points {
            if point.penetration > largest {
                largest = point.penetration;
            }
        }
        largest
    }

    /// Mark the manifold and every point stale; anything not refreshed by
    /// this step's narrow phase is purged at step end.
    pub(crate) fn make_obsolete(&mut self) {
        self.is_obsolete = true;
        for point in &mut self.points {
            point.is_obsolete = true;
        }
    }

    /// Fold a matching manifold info into this manifold.
    ///
    /// Each incoming point either refreshes the closest stale point within
    /// `distance_threshold` (preserving its impulse history) or appends as
    /// a new point. Stale points that no incoming point matched stay,
    /// marked non-fresh, until the end-of-step purge; if the merge
    /// overflows the point cap they are evicted first, so leftovers never
    /// displace the step's own contacts.
    pub(crate) fn merge(&mut self, info: &ContactManifoldInfo, distance_threshold: f32) {
        let threshold_sq = distance_threshold * distance_threshold;
        for new_point in info.points() {
            let mut best: Option<usize> = None;
            let mut best_distance = threshold_sq;
            for (i, point) in self.points.iter().enumerate() {
                if point.is_fresh() {
                    continue;
                }
                let distance =
                    (point.local_point1 - new_point.local_point1).length_squared();
                if distance < best_distance {
                    best_distance = distance;
                    best = Some(i);
                }
            }
            match best {
                Some(i) => self.points[i].refresh(new_point),
                None => self.points.push(ContactPoint::from_info(new_point)),
            }
        }

        self.is_obsolete = false;
        self.normal_id = info.normal_id();
        if let Some(normal) = average_normal(&self.points) {
            self.normal = normal;
        }
        if self.points.len() > MAX_POINTS_IN_MANIFOLD {
            self.reduce();
        }
    }

    /// Drop points the current step did not refresh.
    pub(crate) fn clear_obsolete_points(&mut self) {
        self.points.retain(|point| point.is_fresh());
    }

    fn reduce(&mut self) {
        // Unmatched stale points give way before any fresh point is
        // considered for eviction; they are purged at step end anyway.
        let fresh = self.points.iter().filter(|p| p.is_fresh()).count();
        if fresh >= MAX_POINTS_IN_MANIFOLD {
            self.points.retain(|point| point.is_fresh());
        } else {
            while self.points.len() > MAX_POINTS_IN_MANIFOLD {
                let mut shallowest = None;
                let mut smallest_depth = f32::INFINITY;
                for (i, point) in self.points.iter().enumerate() {
                    if !point.is_fresh() && point.penetration < smallest_depth {
                        smallest_depth = point.penetration;
                        shallowest = Some(i);
                    }
                }
                let Some(i) = shallowest else { break };
                self.points.remove(i);
            }
        }
        if self.points.len() <= MAX_POINTS_IN_MANIFOLD {
            return;
        }

        let candidates: Vec<(Vec3, f32)> = self
            .points
            .iter()
            .map(|p| (p.local_point1, p.penetration))
            .collect();
        let mut keep = reduce::select_representative_indices(&candidates, self.normal);
        keep.sort_unstable();
        let mut index = 0;
        self.points.retain(|_| {
            let retained = keep.contains(&index);
            index += 1;
            retained
        });
    }
}

/// Normalized average of the fresh points' normals, if any.
fn average_normal(points: &[ContactPoint]) -> Option<Vec3> {
    let mut sum = Vec3::ZERO;
    let mut count = 0;
    for point in points {
        if point.is_fresh() {
            sum += point.normal;
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    let normal = sum.normalize_or_zero();
    (normal != Vec3::ZERO).then_some(normal)
}
