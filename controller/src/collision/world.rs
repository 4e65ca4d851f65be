use rapier3d::parry::shape::Shape;
use rapier3d::prelude::RigidBodyHandle;

use super::types::{CastResult, ContactSet, Iso, Point3, SupportHit, Vec3};

/// Read-only view of the physics world used by character jobs.
///
/// Every method takes `&self` and implementors must be `Sync`: the scheduler issues
/// these queries from several worker threads at once against the collision structure
/// built for the current physics step. Mutation goes through [`BodyWriteback`] records
/// applied by whoever owns the world mutably, between phases.
pub trait PhysicsWorldView: Sync {
    /// Authoritative pose of `body`, or `None` if it no longer exists.
    fn body_pose(&self, body: RigidBodyHandle) -> Option<Iso>;

    /// Gravity acceleration at a world position.
    fn gravity(&self, position: &Point3) -> Vec3;

    /// Velocity of the material point of `body` located at `point`.
    fn point_velocity(&self, body: RigidBodyHandle, point: &Point3) -> Vec3;

    /// Sweep `shape` from `start` until its origin reaches `end`, ignoring `exclude`.
    ///
    /// The impact is where the shape first comes within `margin` of an obstacle it is
    /// approaching. Returns `None` when the path is free. On impact, returns the time of
    /// impact as a fraction of the sweep and every contact within `margin` at the impact
    /// pose. A shape that starts within `margin` and moves away is not stopped.
    fn convex_cast(
        &self,
        shape: &dyn Shape,
        start: &Iso,
        end: &Point3,
        margin: f32,
        exclude: RigidBodyHandle,
    ) -> Option<CastResult>;

    /// Every contact within `margin` of `shape` resting at `pose`, ignoring `exclude`.
    fn contacts(
        &self,
        shape: &dyn Shape,
        pose: &Iso,
        margin: f32,
        exclude: RigidBodyHandle,
    ) -> ContactSet;

    /// Nearest-hit sweep of `shape` used for ground detection. Sensors are ignored.
    fn convex_ray_cast(
        &self,
        shape: &dyn Shape,
        start: &Iso,
        end: &Point3,
        margin: f32,
        exclude: RigidBodyHandle,
    ) -> Option<SupportHit>;
}

/// Deferred write to a character's rigid body, produced by a job and applied by the
/// single owner of the mutable world.
#[derive(Clone, Copy, Debug)]
pub struct BodyWriteback {
    pub body: RigidBodyHandle,
    /// New pose, if the job moved the body.
    pub pose: Option<Iso>,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}
