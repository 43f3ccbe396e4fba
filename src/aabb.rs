//! Axis-aligned bounding boxes for broadphase collision detection.

use glam::Vec3;

/// Axis-aligned bounding box, a closed interval per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create an AABB from its corner points.
    #[inline]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        debug_assert!(
            min.x <= max.x && min.y <= max.y && min.z <= max.z,
            "AABB min must not exceed max"
        );
        Self { min, max }
    }

    /// Create an AABB from a center point and half-extents.
    #[inline]
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    /// Test whether two AABBs overlap.
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Component of `min` or `max` on the given axis (0 = x, 1 = y, 2 = z).
    #[inline]
    pub(crate) fn bound(&self, axis: usize, is_min: bool) -> f32 {
        let corner = if is_min { self.min } else { self.max };
        corner[axis]
    }
}
