//! collide3d
//!
//! Collision-detection core for rigid-body physics: an incremental
//! sweep-and-prune broadphase plus persistent contact manifolds.
//!
//! # Architecture
//!
//! One collision step runs strictly in sequence:
//!
//! 1. **broadphase** - incremental sweep-and-prune over per-axis sorted
//!    AABB endpoints, reporting overlap begin/end transitions
//! 2. **pairs** - deduplicated registry of the currently overlapping pairs
//! 3. Narrow phase (caller-provided) - exact per-pair tests reporting raw
//!    contact points through a [`NarrowPhaseOutput`]
//! 4. **contact** / **manifold_set** - grouping raw points by contact
//!    normal direction and folding them into persistent manifolds
//! 5. **manifold** - per-patch storage of at most four contact points,
//!    carrying accumulated impulses across steps for warm starting
//!
//! [`CollisionWorld`] drives the whole sequence once per simulation step;
//! the individual components can also be used on their own.
//!
//! Concrete narrow-phase algorithms, collision shapes, the constraint
//! solver and body bookkeeping live outside this crate: bodies appear here
//! only as [`BodyId`] handles with an AABB and a convexity class.

pub mod aabb;
pub mod body;
pub mod broadphase;
pub mod contact;
pub mod manifold;
pub mod manifold_set;
pub mod pairs;
mod reduce;
pub mod world;

// Re-export commonly used types
pub use aabb::Aabb;
pub use body::{BodyId, ShapeClass};
pub use broadphase::SweepAndPrune;
pub use contact::{
    cubemap_normal_id, ContactManifoldInfo, ContactPointInfo, NarrowPhaseOutput,
    DEFAULT_CUBEMAP_SUBDIVISIONS, MAX_POINTS_IN_MANIFOLD,
};
pub use manifold::{ContactManifold, ContactPoint};
pub use manifold_set::{ContactManifoldSet, MAX_MANIFOLDS_IN_SET};
pub use pairs::{BodyPair, PairEvent, PairSet};
pub use world::{CollisionConfig, CollisionWorld, ConfigError};
