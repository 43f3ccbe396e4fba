//! Step driver tying the broadphase, pair registry and manifold sets
//! together.

use std::collections::HashMap;

use thiserror::Error;

use crate::aabb::Aabb;
use crate::body::{BodyId, ShapeClass};
use crate::broadphase::SweepAndPrune;
use crate::contact::{NarrowPhaseOutput, DEFAULT_CUBEMAP_SUBDIVISIONS};
use crate::manifold_set::ContactManifoldSet;
use crate::pairs::{BodyPair, PairEvent};

/// Configuration for the collision pipeline.
#[derive(Debug, Clone)]
pub struct CollisionConfig {
    /// N for the N x N cubemap face subdivision used to bucket contact
    /// normals. Default: 3.
    pub cubemap_subdivisions: u16,
    /// Distance below which a new contact point refreshes an existing one
    /// instead of appending. Default: 0.03.
    pub persistent_contact_distance: f32,
    /// Body slots reserved by the broadphase up front. Default: 16.
    pub initial_capacity: usize,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            cubemap_subdivisions: DEFAULT_CUBEMAP_SUBDIVISIONS,
            persistent_contact_distance: 0.03,
            initial_capacity: 16,
        }
    }
}

/// Error returned for an invalid [`CollisionConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cubemap_subdivisions must be at least 1")]
    InvalidSubdivisions,
    #[error("persistent_contact_distance must be positive and finite")]
    InvalidContactDistance,
}

impl CollisionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cubemap_subdivisions < 1 {
            return Err(ConfigError::InvalidSubdivisions);
        }
        if !(self.persistent_contact_distance > 0.0
            && self.persistent_contact_distance.is_finite())
        {
            return Err(ConfigError::InvalidContactDistance);
        }
        Ok(())
    }
}

/// The collision world: broadphase state plus one manifold set per
/// overlapping pair.
///
/// One step runs strictly in sequence: mark all contacts stale, apply
/// broadphase topology changes, run the caller's narrow phase over every
/// active pair, then purge whatever was not refreshed.
pub struct CollisionWorld {
    config: CollisionConfig,
    broadphase: SweepAndPrune,
    shapes: HashMap<BodyId, ShapeClass>,
    manifold_sets: HashMap<BodyPair, ContactManifoldSet>,
}

impl CollisionWorld {
    pub fn new(config: CollisionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let broadphase = SweepAndPrune::with_capacity(config.initial_capacity);
        Ok(Self {
            config,
            broadphase,
            shapes: HashMap::new(),
            manifold_sets: HashMap::new(),
        })
    }

    /// Register a body. Panics if the id is already registered.
    pub fn add_body(&mut self, body: BodyId, aabb: &Aabb, shape: ShapeClass) {
        self.broadphase.add_body(body, aabb);
        self.shapes.insert(body, shape);
    }

    /// Move a registered body. Panics if the id is unknown.
    pub fn update_body(&mut self, body: BodyId, aabb: &Aabb) {
        self.broadphase.update_body(body, aabb);
    }

    /// Unregister a body, dropping every manifold set that involves it.
    /// Panics if the id is unknown.
    pub fn remove_body(&mut self, body: BodyId) {
        self.broadphase.remove_body(body);
        self.shapes.remove(&body);
        self.manifold_sets.retain(|pair, _| !pair.contains(body));
    }

    #[inline]
    pub fn body_count(&self) -> usize {
        self.broadphase.body_count()
    }

    /// Number of currently overlapping pairs.
    #[inline]
    pub fn pair_count(&self) -> usize {
        self.broadphase.pairs().len()
    }

    /// Total persistent contact points across all pairs.
    pub fn contact_count(&self) -> usize {
        self.manifold_sets
            .values()
            .map(|set| set.total_contact_points())
            .sum()
    }

    /// The manifold set of a pair, if the pair currently has contacts.
    pub fn manifold_set(&self, a: BodyId, b: BodyId) -> Option<&ContactManifoldSet> {
        self.manifold_sets.get(&BodyPair::new(a, b))
    }

    /// The broadphase, for pair queries.
    #[inline]
    pub fn broadphase(&self) -> &SweepAndPrune {
        &self.broadphase
    }

    /// Run one collision step.
    ///
    /// `narrow_phase` is called once per overlapping pair and reports
    /// contact points into the provided [`NarrowPhaseOutput`]; normals and
    /// local points use the first body of the pair as the reference shape.
    pub fn step<F>(&mut self, mut narrow_phase: F)
    where
        F: FnMut(BodyId, BodyId, &mut NarrowPhaseOutput),
    {
        // Age out everything; only contacts refreshed below survive.
        for set in self.manifold_sets.values_mut() {
            set.make_contacts_obsolete();
        }

        // Apply overlap topology changes since the last step.
        for event in self.broadphase.drain_pair_events() {
            match event {
                PairEvent::Started(pair) => {
                    let (Some(&shape1), Some(&shape2)) = (
                        self.shapes.get(&pair.first()),
                        self.shapes.get(&pair.second()),
                    ) else {
                        continue;
                    };
                    let distance = self.config.persistent_contact_distance;
                    self.manifold_sets
                        .entry(pair)
                        .or_insert_with(|| ContactManifoldSet::new(shape1, shape2, distance));
                }
                PairEvent::Stopped(pair) => {
                    self.manifold_sets.remove(&pair);
                }
            }
        }

        // Narrow phase over every active pair.
        for pair in self.broadphase.pairs().iter() {
            let mut output = NarrowPhaseOutput::new(self.config.cubemap_subdivisions);
            narrow_phase(pair.first(), pair.second(), &mut output);
            if output.is_empty() {
                continue;
            }
            if let Some(set) = self.manifold_sets.get_mut(&pair) {
                for info in output.into_manifold_infos() {
                    set.add_contact_manifold(info);
                }
            }
        }

        // Purge stale contacts and now-empty sets.
        for set in self.manifold_sets.values_mut() {
            set.clear_obsolete();
        }
        self.manifold_sets.retain(|_, set| !set.is_empty());
    }
}
