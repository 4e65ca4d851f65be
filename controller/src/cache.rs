//! Read-mostly caches shared by concurrent character jobs.
//!
//! # Semantics
//! - Lookups take a shared read lock and clone the stored value out.
//! - A miss builds the value *outside* any lock, then inserts it under the write lock
//!   with "insert if absent, return existing". When two jobs race on the same key the
//!   first insertion wins and the loser's value is dropped. The mapping is idempotent,
//!   so the lost work is harmless.
//! - Entries are never mutated in place. `invalidate` exists for collider removal.

use std::hash::Hash;

use parking_lot::RwLock;
use rapier3d::parry::utils::hashmap::HashMap;
use rapier3d::prelude::{Collider, ColliderHandle, SharedShape};

use crate::collision::settings::SUPPORT_HALF_HEIGHT;
use crate::collision::types::Point3;
use crate::config::PlayerConfiguration;

/// Append-only map safe to share between worker threads.
pub struct ConcurrentCache<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K: Eq + Hash, V: Clone> ConcurrentCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::default()),
        }
    }

    /// Return the cached value for `key`, building and inserting it on first use.
    pub fn get_or_insert_with(&self, key: K, make: impl FnOnce() -> V) -> V {
        if let Some(value) = self.entries.read().get(&key) {
            return value.clone();
        }

        let value = make();
        self.entries.write().entry(key).or_insert(value).clone()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.read().get(key).cloned()
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.write().remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<K: Eq + Hash, V: Clone> Default for ConcurrentCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Surface response properties of a collider, as seen by the contact resolver.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceMaterial {
    pub restitution: f32,
}

impl SurfaceMaterial {
    pub fn from_collider(collider: &Collider) -> Self {
        Self {
            restitution: collider.restitution().max(0.0),
        }
    }
}

/// Surface classification per collider.
pub type SurfaceCache = ConcurrentCache<ColliderHandle, SurfaceMaterial>;

/// The two volumes swept by a character.
///
/// Both are expressed in the character's local frame, origin at the feet, +Y up.
#[derive(Clone)]
pub struct CastShapes {
    /// Wide capsule from `stair_step` above the feet to the top of the head.
    pub body: SharedShape,
    /// Thin cylinder centered `support_half_height` above its cast origin.
    pub support: SharedShape,
    pub support_half_height: f32,
    /// Full-height capsule attached to the character's rigid body.
    pub collider: SharedShape,
}

impl CastShapes {
    /// Build the casting volumes for a validated configuration.
    pub fn build(config: &PlayerConfiguration) -> Self {
        let r = config.outer_radius;
        let body_bottom = config.stair_step + r;
        let body_top = (config.height() - r).max(body_bottom);
        let body = SharedShape::capsule(
            Point3::new(0.0, body_bottom, 0.0),
            Point3::new(0.0, body_top, 0.0),
            r,
        );

        let collider_top = (config.height() - r).max(r);
        let collider = SharedShape::capsule(
            Point3::new(0.0, r, 0.0),
            Point3::new(0.0, collider_top, 0.0),
            r,
        );

        let support = SharedShape::cylinder(SUPPORT_HALF_HEIGHT, config.inner_radius);

        Self {
            body,
            support,
            support_half_height: SUPPORT_HALF_HEIGHT,
            collider,
        }
    }
}

/// Bit-exact key of the dimensions that shape the casting volumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShapeKey([u32; 4]);

impl ShapeKey {
    pub fn of(config: &PlayerConfiguration) -> Self {
        Self([
            config.outer_radius.to_bits(),
            config.inner_radius.to_bits(),
            config.half_height.to_bits(),
            config.stair_step.to_bits(),
        ])
    }
}

/// Cast shapes shared by every character with the same dimensions.
pub type ShapeCache = ConcurrentCache<ShapeKey, CastShapes>;

impl ShapeCache {
    pub fn shapes_for(&self, config: &PlayerConfiguration) -> CastShapes {
        self.get_or_insert_with(ShapeKey::of(config), || CastShapes::build(config))
    }
}
