//! Contact point reduction: pick at most four representative points.
//!
//! When merging leaves a manifold with more candidates than the solver
//! budget allows, a greedy O(k) pass selects the subset spanning the
//! largest contact area. The deepest point is always kept, since it drives
//! the dominant correction impulse.

use glam::Vec3;

use crate::contact::MAX_POINTS_IN_MANIFOLD;

/// Select the indices of up to four representative points from
/// `candidates` (projected position in the reference shape's local frame,
/// penetration depth), projecting onto the plane orthogonal to `normal`.
///
/// Selection order: the deepest point; the point farthest from it; the
/// point maximizing the triangle area; the point maximizing the
/// quadrilateral area on the opposite winding side of the first-third
/// edge. Every tie goes to the first-encountered candidate, so the result
/// is deterministic for a given input order.
pub(crate) fn select_representative_indices(
    candidates: &[(Vec3, f32)],
    normal: Vec3,
) -> Vec<usize> {
    if candidates.len() <= MAX_POINTS_IN_MANIFOLD {
        return (0..candidates.len()).collect();
    }

    let n = normal.normalize_or_zero();
    debug_assert!(n != Vec3::ZERO, "reduction needs a usable normal");
    let projected: Vec<Vec3> = candidates
        .iter()
        .map(|(point, _)| *point - n * point.dot(n))
        .collect();

    // Twice the signed area of the triangle (a, b, c) in the projection
    // plane; the sign distinguishes winding.
    let signed_area =
        |a: Vec3, b: Vec3, c: Vec3| -> f32 { (b - a).cross(c - a).dot(n) };

    let mut selected: Vec<usize> = Vec::with_capacity(MAX_POINTS_IN_MANIFOLD);

    // 1: the deepest point, unconditionally.
    let mut deepest = 0;
    for (i, (_, depth)) in candidates.iter().enumerate() {
        if *depth > candidates[deepest].1 {
            deepest = i;
        }
    }
    selected.push(deepest);

    // 2: farthest from the deepest point.
    let mut second = None;
    let mut best_distance = -1.0f32;
    for i in 0..candidates.len() {
        if selected.contains(&i) {
            continue;
        }
        let distance = (projected[i] - projected[deepest]).length_squared();
        if distance > best_distance {
            best_distance = distance;
            second = Some(i);
        }
    }
    let second = second.expect("more than one candidate");
    selected.push(second);

    // 3: largest triangle with the first two, either winding.
    let mut third = None;
    let mut best_area = -1.0f32;
    let mut third_winding = 0.0f32;
    for i in 0..candidates.len() {
        if selected.contains(&i) {
            continue;
        }
        let area = signed_area(projected[deepest], projected[second], projected[i]);
        if area.abs() > best_area {
            best_area = area.abs();
            third_winding = area;
            third = Some(i);
        }
    }
    let third = third.expect("more than two candidates");
    selected.push(third);

    // 4: largest quadrilateral, constrained to the opposite side of the
    // first-third edge so the quad stays convex-ish instead of folding
    // back over the triangle.
    let mut fourth = None;
    let mut best_area = -1.0f32;
    for i in 0..candidates.len() {
        if selected.contains(&i) {
            continue;
        }
        let area = signed_area(projected[deepest], projected[third], projected[i]);
        if area * third_winding < 0.0 && area.abs() > best_area {
            best_area = area.abs();
            fourth = Some(i);
        }
    }
    if fourth.is_none() {
        // Degenerate (collinear or one-sided) candidate sets: take the
        // largest unconstrained area instead.
        let mut best_area = -1.0f32;
        for i in 0..candidates.len() {
            if selected.contains(&i) {
                continue;
            }
            let area = signed_area(projected[deepest], projected[third], projected[i]).abs();
            if area > best_area {
                best_area = area;
                fourth = Some(i);
            }
        }
    }
    selected.push(fourth.expect("more than three candidates"));

    selected
}
