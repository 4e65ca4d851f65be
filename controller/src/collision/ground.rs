/*!
Ground detection under the character's feet.

A thin cylinder is cast along the down axis from a stair step above the feet. Its
hit decides whether the character stands on something, which way that surface faces
and how fast it moves under the feet.
*/

use nalgebra as na;
use rapier3d::prelude::RigidBodyHandle;

use super::{
    settings::SKIN_THICKNESS,
    types::{GroundState, Iso, Point3, SupportHit, Vec3},
    world::PhysicsWorldView,
};
use crate::cache::CastShapes;

/// A supporting surface found by [`cast_support`].
#[derive(Clone, Copy, Debug)]
pub struct SupportContact {
    /// Ground normal and the ground's velocity at the support point.
    pub ground: GroundState,
    /// World-space contact point on the ground.
    pub point: Point3,
    /// Center of the support shape when it touched the ground.
    pub center: Point3,
    /// Fraction of the cast travelled before the touch; zero when it started overlapping.
    pub fraction: f32,
}

/// Outcome of the end-of-frame ground probe.
#[derive(Clone, Copy, Debug)]
pub struct GroundProbe {
    /// Character pose after placing the feet on the support (unchanged on a miss).
    pub pose: Iso,
    /// Zero normal and velocity on a miss.
    pub ground: GroundState,
    /// Whether the support shape touched anything.
    pub supported: bool,
}

/// Cast the support shape from `origin` until its center reaches `destination`.
///
/// On a hit, the reported ground velocity is the hit body's velocity at the contact
/// point (zero for parentless colliders). This is read-only with respect to the world.
pub fn cast_support<W: PhysicsWorldView + ?Sized>(
    world: &W,
    exclude: RigidBodyHandle,
    shapes: &CastShapes,
    origin: &Iso,
    destination: &Point3,
    margin: f32,
) -> Option<SupportContact> {
    let hit: SupportHit =
        world.convex_ray_cast(&*shapes.support, origin, destination, margin, exclude)?;

    let start = Point3::from(origin.translation.vector);
    let fraction = hit.fraction.clamp(0.0, 1.0);
    let center = start + (destination - start) * fraction;

    let velocity = hit
        .body
        .map(|body| world.point_velocity(body, &hit.point))
        .unwrap_or_else(Vec3::zeros);

    // Keep the normal facing against the cast direction.
    let mut normal = hit.normal;
    if normal.dot(&(destination - start)) > 0.0 {
        normal = -normal;
    }

    Some(SupportContact {
        ground: GroundState { normal, velocity },
        point: hit.point,
        center,
        fraction,
    })
}

/// Probe for ground under the character at `pose` (origin at the feet).
///
/// - With `toward_feet` (jumping or falling), the cast stops one skin below the feet
///   so ground is re-acquired as soon as the character is back on it.
/// - Otherwise it reaches `cast_distance` below the feet so walking down stairs and
///   slopes keeps contact.
///
/// The cast starts `stair_step` above the feet. On a hit the feet are placed on the
/// support point, hovering `SKIN_THICKNESS` above it along the ground normal. A cast
/// that already overlaps at its start (a slope too steep for the stair step) reports
/// the ground but leaves the feet where they are.
#[allow(clippy::too_many_arguments)]
pub fn probe_ground<W: PhysicsWorldView + ?Sized>(
    world: &W,
    exclude: RigidBodyHandle,
    shapes: &CastShapes,
    pose: &Iso,
    stair_step: f32,
    cast_distance: f32,
    toward_feet: bool,
    margin: f32,
) -> GroundProbe {
    let up = pose.rotation * Vec3::y();
    let feet = Point3::from(pose.translation.vector);
    let hh = shapes.support_half_height;

    let origin = Iso::from_parts(
        na::Translation3::from(feet.coords + up * (stair_step + hh)),
        pose.rotation,
    );
    let destination = if toward_feet {
        feet + up * (hh - SKIN_THICKNESS)
    } else {
        feet + up * (hh - cast_distance.max(0.0))
    };

    match cast_support(world, exclude, shapes, &origin, &destination, margin) {
        Some(support) if support.fraction > 0.0 => {
            let new_feet = support.center - up * hh + support.ground.normal * SKIN_THICKNESS;
            GroundProbe {
                pose: Iso::from_parts(na::Translation3::from(new_feet.coords), pose.rotation),
                ground: support.ground,
                supported: true,
            }
        }
        Some(support) => GroundProbe {
            pose: *pose,
            ground: support.ground,
            supported: true,
        },
        None => GroundProbe {
            pose: *pose,
            ground: GroundState::AIRBORNE,
            supported: false,
        },
    }
}
