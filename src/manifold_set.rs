//! Per-pair aggregation of contact manifolds.

use tracing::trace;

use crate::body::ShapeClass;
use crate::contact::ContactManifoldInfo;
use crate::manifold::ContactManifold;

/// Upper bound on manifolds in any set.
pub const MAX_MANIFOLDS_IN_SET: usize = 3;

/// A convex-convex pair presents a single contact patch.
const MAX_MANIFOLDS_CONVEX: usize = 1;
/// A pair with a concave shape can present several disjoint patches.
const MAX_MANIFOLDS_CONCAVE: usize = MAX_MANIFOLDS_IN_SET;

/// The persistent contact manifolds of one shape pair.
///
/// Incoming manifold infos are matched against existing manifolds by
/// normal bucket id: a match merges, a miss creates a new manifold while
/// capacity lasts, and at capacity the shallowest manifold is evicted only
/// in favor of a deeper incoming one.
#[derive(Debug)]
pub struct ContactManifoldSet {
    manifolds: Vec<ContactManifold>,
    max_manifolds: usize,
    persistent_contact_distance: f32,
}

impl ContactManifoldSet {
    /// Create the set for a pair of shapes, sized by their convexity.
    pub fn new(shape1: ShapeClass, shape2: ShapeClass, persistent_contact_distance: f32) -> Self {
        let max_manifolds =
            if shape1 == ShapeClass::Convex && shape2 == ShapeClass::Convex {
                MAX_MANIFOLDS_CONVEX
            } else {
                MAX_MANIFOLDS_CONCAVE
            };
        Self {
            manifolds: Vec::with_capacity(max_manifolds),
            max_manifolds,
            persistent_contact_distance,
        }
    }

    #[inline]
    pub fn manifolds(&self) -> &[ContactManifold] {
        &self.manifolds
    }

    /// Mutable access for solvers accumulating impulses.
    #[inline]
    pub fn manifolds_mut(&mut self) -> &mut [ContactManifold] {
        &mut self.manifolds
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.manifolds.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.manifolds.is_empty()
    }

    /// Total number of contact points across all manifolds.
    pub fn total_contact_points(&self) -> usize {
        self.manifolds.iter().map(|m| m.points().len()).sum()
    }

    /// Consume one narrow-phase manifold info.
    pub fn add_contact_manifold(&mut self, mut info: ContactManifoldInfo) {
        if info.points().is_empty() {
            return;
        }
        // Cap the candidate set before it reaches persistent storage.
        info.reduce();

        if let Some(manifold) = self
            .manifolds
            .iter_mut()
            .find(|m| m.normal_id() == info.normal_id())
        {
            manifold.merge(&info, self.persistent_contact_distance);
            return;
        }

        if self.manifolds.len() < self.max_manifolds {
            self.manifolds.push(ContactManifold::from_info(&info));
            return;
        }

        // At capacity: replace the least significant manifold, but never
        // trade a deeper contact for a shallower one.
        let mut shallowest = 0;
        let mut smallest_depth = self.manifolds[0].largest_penetration_depth();
        for (i, manifold) in self.manifolds.iter().enumerate().skip(1) {
            let depth = manifold.largest_penetration_depth();
            if depth < smallest_depth {
                smallest_depth = depth;
                shallowest = i;
            }
        }
        if info.largest_penetration_depth() > smallest_depth {
            trace!(
                evicted_depth = smallest_depth,
                incoming_depth = info.largest_penetration_depth(),
                "evicting shallowest contact manifold"
            );
            self.manifolds[shallowest] = ContactManifold::from_info(&info);
        }
    }

    /// Mark every manifold and contact point stale. Call once per step
    /// before the narrow-phase passes.
    pub fn make_contacts_obsolete(&mut self) {
        for manifold in &mut self.manifolds {
            manifold.make_obsolete();
        }
    }

    /// Purge everything the step's narrow phase did not refresh. Call once
    /// per step after the narrow-phase passes.
    pub fn clear_obsolete(&mut self) {
        for manifold in &mut self.manifolds {
            manifold.clear_obsolete_points();
        }
        self.manifolds
            .retain(|m| m.is_fresh() && !m.points().is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::{cubemap_normal_id, ContactPointInfo, DEFAULT_CUBEMAP_SUBDIVISIONS};
    use glam::Vec3;

    fn info(normal: Vec3, depth: f32) -> ContactManifoldInfo {
        let mut info =
            ContactManifoldInfo::new(cubemap_normal_id(normal, DEFAULT_CUBEMAP_SUBDIVISIONS));
        info.push(ContactPointInfo {
            normal,
            penetration: depth,
            local_point1: Vec3::ZERO,
            local_point2: Vec3::ZERO,
        });
        info
    }

    #[test]
    fn test_matching_bucket_merges_into_existing_manifold() {
        let mut set = ContactManifoldSet::new(ShapeClass::Convex, ShapeClass::Convex, 0.03);
        set.add_contact_manifold(info(Vec3::Y, 0.1));
        assert_eq!(set.len(), 1);

        set.make_contacts_obsolete();
        set.add_contact_manifold(info(Vec3::Y, 0.2));
        set.clear_obsolete();

        assert_eq!(set.len(), 1);
        assert_eq!(set.manifolds()[0].points().len(), 1);
        assert_eq!(set.manifolds()[0].points()[0].penetration, 0.2);
    }

    #[test]
    fn test_capacity_one_keeps_deeper_of_two_buckets() {
        // Convex-convex set receiving two infos with different normal
        // buckets in one step: the deeper one wins.
        let mut set = ContactManifoldSet::new(ShapeClass::Convex, ShapeClass::Convex, 0.03);
        set.add_contact_manifold(info(Vec3::Y, 0.1));
        set.add_contact_manifold(info(Vec3::X, 0.3));

        assert_eq!(set.len(), 1);
        assert_eq!(
            set.manifolds()[0].normal_id(),
            cubemap_normal_id(Vec3::X, DEFAULT_CUBEMAP_SUBDIVISIONS)
        );
        assert_eq!(set.manifolds()[0].largest_penetration_depth(), 0.3);
    }

    #[test]
    fn test_shallower_incoming_manifold_is_discarded_at_capacity() {
        let mut set = ContactManifoldSet::new(ShapeClass::Convex, ShapeClass::Convex, 0.03);
        set.add_contact_manifold(info(Vec3::Y, 0.3));
        set.add_contact_manifold(info(Vec3::X, 0.1));

        assert_eq!(set.len(), 1);
        assert_eq!(
            set.manifolds()[0].normal_id(),
            cubemap_normal_id(Vec3::Y, DEFAULT_CUBEMAP_SUBDIVISIONS)
        );
    }

    #[test]
    fn test_concave_pair_holds_multiple_patches() {
        let mut set = ContactManifoldSet::new(ShapeClass::Convex, ShapeClass::Concave, 0.03);
        set.add_contact_manifold(info(Vec3::Y, 0.1));
        set.add_contact_manifold(info(Vec3::X, 0.2));
        set.add_contact_manifold(info(Vec3::Z, 0.3));
        assert_eq!(set.len(), MAX_MANIFOLDS_IN_SET);

        // A fourth bucket must displace the shallowest patch.
        set.add_contact_manifold(info(-Vec3::Y, 0.4));
        assert_eq!(set.len(), MAX_MANIFOLDS_IN_SET);
        let ids: Vec<i16> = set.manifolds().iter().map(|m| m.normal_id()).collect();
        assert!(!ids.contains(&cubemap_normal_id(Vec3::Y, DEFAULT_CUBEMAP_SUBDIVISIONS)));
        assert!(ids.contains(&cubemap_normal_id(-Vec3::Y, DEFAULT_CUBEMAP_SUBDIVISIONS)));
    }

    #[test]
    fn test_unrefreshed_manifold_ages_out() {
        let mut set = ContactManifoldSet::new(ShapeClass::Convex, ShapeClass::Concave, 0.03);
        set.add_contact_manifold(info(Vec3::Y, 0.1));
        set.add_contact_manifold(info(Vec3::X, 0.2));

        set.make_contacts_obsolete();
        set.add_contact_manifold(info(Vec3::X, 0.2));
        set.clear_obsolete();

        assert_eq!(set.len(), 1);
        assert_eq!(
            set.manifolds()[0].normal_id(),
            cubemap_normal_id(Vec3::X, DEFAULT_CUBEMAP_SUBDIVISIONS)
        );
    }

    #[test]
    fn test_empty_info_is_ignored() {
        let mut set = ContactManifoldSet::new(ShapeClass::Convex, ShapeClass::Convex, 0.03);
        set.add_contact_manifold(ContactManifoldInfo::new(0));
        assert!(set.is_empty());
    }

    #[test]
    fn test_full_manifold_sliding_past_threshold_keeps_contacts() {
        let patch = |offset: Vec3, depth: f32| {
            let mut info =
                ContactManifoldInfo::new(cubemap_normal_id(Vec3::Y, DEFAULT_CUBEMAP_SUBDIVISIONS));
            for corner in [
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(-1.0, 0.0, 1.0),
                Vec3::new(-1.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, -1.0),
            ] {
                info.push(ContactPointInfo {
                    normal: Vec3::Y,
                    penetration: depth,
                    local_point1: offset + corner,
                    local_point2: offset + corner,
                });
            }
            info
        };

        let mut set = ContactManifoldSet::new(ShapeClass::Convex, ShapeClass::Convex, 0.03);
        set.add_contact_manifold(patch(Vec3::ZERO, 0.5));
        assert_eq!(set.total_contact_points(), 4);

        // The body slides far past the persistence threshold and ends up
        // shallower; the step must still report its four contacts.
        set.make_contacts_obsolete();
        set.add_contact_manifold(patch(Vec3::new(10.0, 0.0, 0.0), 0.1));
        set.clear_obsolete();

        assert_eq!(set.len(), 1);
        assert_eq!(set.total_contact_points(), 4);
    }
}
