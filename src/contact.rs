//! Transient contact records produced by narrow-phase evaluations.
//!
//! A narrow-phase algorithm reports raw contact points into a
//! [`NarrowPhaseOutput`]; the points are then grouped by normal direction
//! into [`ContactManifoldInfo`] records, which live only until the manifold
//! set has consumed them at the end of the step.

use glam::Vec3;

use crate::reduce;

/// Maximum number of contact points kept in one manifold.
pub const MAX_POINTS_IN_MANIFOLD: usize = 4;

/// Default N for the N x N subdivision of each cubemap face used to bucket
/// contact normals.
pub const DEFAULT_CUBEMAP_SUBDIVISIONS: u16 = 3;

/// One candidate contact point reported by the narrow phase.
#[derive(Debug, Clone, Copy)]
pub struct ContactPointInfo {
    /// Unit contact normal in the first shape's local frame, pointing from
    /// shape 1 toward shape 2.
    pub normal: Vec3,
    /// Penetration depth along the normal (>= 0).
    pub penetration: f32,
    /// Contact point on shape 1, in shape 1 local space.
    pub local_point1: Vec3,
    /// Contact point on shape 2, in shape 2 local space.
    pub local_point2: Vec3,
}

/// Insertion-ordered group of contact points sharing one normal bucket,
/// produced by a single narrow-phase evaluation.
#[derive(Debug, Clone)]
pub struct ContactManifoldInfo {
    points: Vec<ContactPointInfo>,
    normal_id: i16,
}

impl ContactManifoldInfo {
    pub(crate) fn new(normal_id: i16) -> Self {
        Self {
            points: Vec::new(),
            normal_id,
        }
    }

    /// Normal-direction bucket id shared by every point in this group.
    #[inline]
    pub fn normal_id(&self) -> i16 {
        self.normal_id
    }

    /// The grouped points, in discovery order.
    #[inline]
    pub fn points(&self) -> &[ContactPointInfo] {
        &self.points
    }

    /// Largest penetration depth among the points; ties go to the first
    /// encountered. Zero for an empty group.
    pub fn largest_penetration_depth(&self) -> f32 {
        let mut largest = 0.0f32;
        for point in &self.points {
            if point.penetration > largest {
                largest = point.penetration;
            }
        }
        largest
    }

    pub(crate) fn push(&mut self, point: ContactPointInfo) {
        self.points.push(point);
    }

    /// Cap the candidate set at [`MAX_POINTS_IN_MANIFOLD`] representative
    /// points. The deepest point is always retained.
    pub(crate) fn reduce(&mut self) {
        if self.points.len() <= MAX_POINTS_IN_MANIFOLD {
            return;
        }
        let candidates: Vec<(Vec3, f32)> = self
            .points
            .iter()
            .map(|p| (p.local_point1, p.penetration))
            .collect();
        // Points in one bucket share a near-identical normal; the first
        // one serves as the projection direction.
        let mut keep = reduce::select_representative_indices(&candidates, self.points[0].normal);
        keep.sort_unstable();
        let mut index = 0;
        self.points.retain(|_| {
            let retained = keep.contains(&index);
            index += 1;
            retained
        });
    }
}

/// Collects the raw contact points discovered by one narrow-phase
/// evaluation of a candidate pair.
pub struct NarrowPhaseOutput {
    points: Vec<ContactPointInfo>,
    subdivisions: u16,
}

impl NarrowPhaseOutput {
    pub fn new(subdivisions: u16) -> Self {
        debug_assert!(subdivisions >= 1);
        Self {
            points: Vec::new(),
            subdivisions,
        }
    }

    /// Report one contact point.
    ///
    /// `normal` must be unit length in the first shape's local frame,
    /// pointing from shape 1 to shape 2; `penetration` must be
    /// non-negative. Violations are collaborator contract errors and panic.
    pub fn add_contact_point(
        &mut self,
        normal: Vec3,
        penetration: f32,
        local_point1: Vec3,
        local_point2: Vec3,
    ) {
        assert!(
            penetration >= 0.0,
            "penetration depth must be non-negative"
        );
        debug_assert!(
            (normal.length_squared() - 1.0).abs() < 1e-3,
            "contact normal must be unit length"
        );
        self.points.push(ContactPointInfo {
            normal,
            penetration,
            local_point1,
            local_point2,
        });
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Group the collected points into manifold infos by normal bucket.
    ///
    /// Groups appear in first-seen order; within a group, points keep their
    /// discovery order. One evaluation usually yields a single group, but
    /// normals straddling a cubemap face seam split into several.
    pub fn into_manifold_infos(self) -> Vec<ContactManifoldInfo> {
        let mut infos: Vec<ContactManifoldInfo> = Vec::new();
        for point in self.points {
            let id = cubemap_normal_id(point.normal, self.subdivisions);
            match infos.iter_mut().find(|info| info.normal_id == id) {
                Some(info) => info.push(point),
                None => {
                    let mut info = ContactManifoldInfo::new(id);
                    info.push(point);
                    infos.push(info);
                }
            }
        }
        infos
    }
}

/// Map a near-unit normal to a small integer bucket id.
///
/// The dominant component picks one of the six cube faces; the remaining
/// two components, projected onto that face, select a cell in its N x N
/// grid. Two normals bucket equal iff they are roughly parallel, which
/// stands in for an angular similarity test at integer-compare cost.
pub fn cubemap_normal_id(normal: Vec3, subdivisions: u16) -> i16 {
    let abs = normal.abs();
    assert!(
        abs.max_element() > 1e-6,
        "cannot bucket a zero-length normal"
    );

    let (face, u, v) = if abs.x >= abs.y && abs.x >= abs.z {
        let face = if normal.x >= 0.0 { 0 } else { 1 };
        (face, normal.y / abs.x, normal.z / abs.x)
    } else if abs.y >= abs.z {
        let face = if normal.y >= 0.0 { 2 } else { 3 };
        (face, normal.x / abs.y, normal.z / abs.y)
    } else {
        let face = if normal.z >= 0.0 { 4 } else { 5 };
        (face, normal.x / abs.z, normal.y / abs.z)
    };

    let n = subdivisions as i16;
    // Remap from [-1, 1] to a cell index in [0, N).
    let cell = |t: f32| -> i16 {
        let scaled = (t * 0.5 + 0.5) * subdivisions as f32;
        (scaled as i16).clamp(0, n - 1)
    };
    face * n * n + cell(u) * n + cell(v)
}
