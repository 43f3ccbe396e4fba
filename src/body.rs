//! Stable body identity used as the key into broadphase and pair storage.

/// Opaque, stable handle identifying one collision body.
///
/// The caller assigns ids and keeps them stable for as long as the body is
/// registered; the core uses them as map keys and never interprets the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyId(pub u32);

/// Convexity class of a body's collision shape.
///
/// A concave shape can present several disjoint contact patches at once, so
/// pairs involving one keep more persistent manifolds than convex-convex
/// pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeClass {
    Convex,
    Concave,
}
