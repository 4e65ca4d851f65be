/*!
Core collision types and math aliases shared by the collision submodules.

This module intentionally contains no algorithms. It defines the data types
exchanged between:
- the physics world view (convex casts and support casts)
- the contact resolver (sweep-and-solve)
- the ground detector
- the controller orchestrator
*/

use nalgebra as na;
use rapier3d::prelude::RigidBodyHandle;

use super::settings::{DUPLICATE_NORMAL_COS, MAX_CONTACTS};

/// Common math aliases for clarity and consistency.
pub type Vec3 = na::Vector3<f32>;
pub type Point3 = na::Point3<f32>;
pub type Quat = na::UnitQuaternion<f32>;
pub type Iso = na::Isometry3<f32>;

/// A single contact between the character's cast shape and the world.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactPoint {
    /// World-space unit normal pointing away from the obstacle, toward the character.
    pub normal: Vec3,
    /// World-space contact point on the obstacle.
    pub point: Point3,
    /// Body owning the obstacle, `None` for parentless or synthetic constraints.
    pub body: Option<RigidBodyHandle>,
    /// Surface restitution applied to the bounce speed (0 for a dead stop).
    pub restitution: f32,
    /// Separation along `normal` when the contact was gathered, negative when penetrating.
    pub distance: f32,
}

impl ContactPoint {
    /// A touching contact against a static surface with no restitution.
    #[inline]
    pub fn fixed(normal: Vec3, point: Point3) -> Self {
        Self {
            normal,
            point,
            body: None,
            restitution: 0.0,
            distance: 0.0,
        }
    }
}

/// Ordered, bounded list of contacts produced by a single convex cast.
///
/// Pushing past [`MAX_CONTACTS`] drops the extra contacts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContactSet {
    contacts: Vec<ContactPoint>,
}

impl ContactSet {
    pub fn new() -> Self {
        Self {
            contacts: Vec::with_capacity(MAX_CONTACTS),
        }
    }

    /// Append a contact; returns `false` once the set is full.
    pub fn push(&mut self, contact: ContactPoint) -> bool {
        if self.contacts.len() >= MAX_CONTACTS {
            return false;
        }
        self.contacts.push(contact);
        true
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, ContactPoint> {
        self.contacts.iter()
    }

    #[inline]
    pub fn as_slice(&self) -> &[ContactPoint] {
        &self.contacts
    }

    /// Collapse contacts whose normals are nearly parallel, keeping the first one seen.
    ///
    /// Order of the surviving contacts is preserved.
    pub fn dedup_normals(&mut self) {
        let mut kept: Vec<ContactPoint> = Vec::with_capacity(self.contacts.len());
        for contact in self.contacts.drain(..) {
            let duplicate = kept
                .iter()
                .any(|k| k.normal.dot(&contact.normal) > DUPLICATE_NORMAL_COS);
            if !duplicate {
                kept.push(contact);
            }
        }
        self.contacts = kept;
    }
}

impl<'a> IntoIterator for &'a ContactSet {
    type Item = &'a ContactPoint;
    type IntoIter = std::slice::Iter<'a, ContactPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.contacts.iter()
    }
}

/// Result of one swept convex cast that hit something.
#[derive(Clone, Debug)]
pub struct CastResult {
    /// Fraction (0..1) of the tested translation where the first impact occurs.
    pub time_of_impact: f32,
    /// Contacts gathered at the impact pose.
    pub contacts: ContactSet,
}

/// Nearest hit of a support (ground) cast.
#[derive(Clone, Copy, Debug)]
pub struct SupportHit {
    /// Fraction (0..1) of the cast translation where the support shape touches.
    pub fraction: f32,
    /// World-space ground normal (away from the ground).
    pub normal: Vec3,
    /// World-space contact point on the ground.
    pub point: Point3,
    /// Body the ground belongs to.
    pub body: Option<RigidBodyHandle>,
}

/// Supporting plane under the character, or the airborne state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundState {
    /// Ground normal; zero while airborne.
    pub normal: Vec3,
    /// Velocity of the ground at the support point; zero while airborne.
    pub velocity: Vec3,
}

impl GroundState {
    pub const AIRBORNE: Self = Self {
        normal: Vec3::new(0.0, 0.0, 0.0),
        velocity: Vec3::new(0.0, 0.0, 0.0),
    };

    #[inline]
    pub fn is_grounded(&self) -> bool {
        self.normal.norm_squared() > 0.0
    }
}

impl Default for GroundState {
    fn default() -> Self {
        Self::AIRBORNE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(normal: Vec3) -> ContactPoint {
        ContactPoint::fixed(normal, Point3::origin())
    }

    #[test]
    fn dedup_collapses_nearly_parallel_normals() {
        let mut set = ContactSet::new();
        set.push(contact(Vec3::y()));
        set.push(contact(Vec3::new(0.0, 1.0, 1.0e-4).normalize()));
        set.push(contact(Vec3::x()));
        set.push(contact(Vec3::y()));

        set.dedup_normals();

        assert_eq!(set.len(), 2);
        assert_eq!(set.as_slice()[0].normal, Vec3::y());
        assert_eq!(set.as_slice()[1].normal, Vec3::x());
    }

    #[test]
    fn dedup_keeps_distinct_corner_normals() {
        let mut set = ContactSet::new();
        set.push(contact(Vec3::x()));
        set.push(contact(Vec3::z()));
        set.push(contact(Vec3::new(1.0, 0.0, 1.0).normalize()));

        set.dedup_normals();

        assert_eq!(set.len(), 3);
    }

    #[test]
    fn push_stops_at_capacity() {
        let mut set = ContactSet::new();
        for _ in 0..MAX_CONTACTS {
            assert!(set.push(contact(Vec3::y())));
        }
        assert!(!set.push(contact(Vec3::x())));
        assert_eq!(set.len(), MAX_CONTACTS);
    }

    #[test]
    fn airborne_ground_is_not_grounded() {
        assert!(!GroundState::AIRBORNE.is_grounded());
        let floor = GroundState {
            normal: Vec3::y(),
            velocity: Vec3::zeros(),
        };
        assert!(floor.is_grounded());
    }
}
