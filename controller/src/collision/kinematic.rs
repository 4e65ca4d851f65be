/*!
Contact resolver for the kinematic character.

A frame of motion is a bounded sequence of sub-steps. Each sub-step sweeps the body
shape toward where the remaining frame time would take it, stops one skin plus the
restraining distance short of whatever it reaches, and turns the contacts found there
into velocity constraints for a projected Gauss-Seidel solve.

Skin
- Casts report an impact once the gap shrinks to `SKIN_THICKNESS + margin`, so the
  free part of a sub-step never ends inside the skin.
- Contacts already closer than one skin are pushed back out along their normals
  ([`separate`] does the same for a resting pose).
*/

use nalgebra as na;
use rapier3d::parry::shape::Shape;
use rapier3d::prelude::RigidBodyHandle;

use super::{
    settings::{
        DISCRETE_MOTION_STEPS, DIST_EPS, MAX_INTEGRATION_STEPS, MAX_SOLVER_ITERATIONS,
        MIN_VELOCITY_SQ, SKIN_THICKNESS, SOLVER_TOLERANCE, TIME_LEFT_EPS,
    },
    types::{ContactPoint, ContactSet, Iso, Point3, Vec3},
    world::PhysicsWorldView,
};

/// Work counters for one `on_post_update` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SolverStats {
    /// Swept-integration sub-steps started.
    pub sub_steps: u32,
    /// Gauss-Seidel sweeps summed over every sub-step.
    pub solver_sweeps: u32,
}

impl SolverStats {
    /// Largest number of sweeps a single call may perform.
    pub const MAX_SWEEPS: u32 = MAX_INTEGRATION_STEPS * MAX_SOLVER_ITERATIONS;
}

/// One velocity constraint fed to the solver.
#[derive(Clone, Copy, Debug)]
pub struct Constraint {
    /// Unit normal the corrected velocity must not point against.
    pub normal: Vec3,
    /// Minimum speed the correction must add along `normal`.
    pub bounce_speed: f32,
}

/// Speed needed along `normal` to stop approaching a surface moving at `surface_velocity`,
/// scaled by `1 + restitution`. Never negative.
#[inline]
pub fn bounce_speed(velocity: &Vec3, surface_velocity: &Vec3, normal: &Vec3, restitution: f32) -> f32 {
    let approach = (velocity - surface_velocity).dot(normal);
    (-approach * (1.0 + restitution)).max(0.0)
}

/// Projected Gauss-Seidel over the constraint set.
///
/// Each constraint accumulates a non-negative push along its normal. A sweep visits
/// the constraints in order, recomputes each push from the residual left by the
/// current correction, clamps it to zero and applies the change to the correction.
/// Stops after `MAX_SOLVER_ITERATIONS` sweeps or once the largest change is within
/// `SOLVER_TOLERANCE`. Returns the correction and the number of sweeps done.
pub fn solve_constraints(constraints: &[Constraint]) -> (Vec3, u32) {
    let mut correction = Vec3::zeros();
    if constraints.is_empty() {
        return (correction, 0);
    }

    let mut pushes = vec![0.0f32; constraints.len()];
    let mut sweeps = 0;
    while sweeps < MAX_SOLVER_ITERATIONS {
        sweeps += 1;
        let mut max_change = 0.0f32;
        for (c, push) in constraints.iter().zip(pushes.iter_mut()) {
            let residual = c.bounce_speed - c.normal.dot(&correction);
            let updated = (*push + residual).max(0.0);
            let change = updated - *push;
            correction += c.normal * change;
            *push = updated;
            max_change = max_change.max(change.abs());
        }
        if max_change <= SOLVER_TOLERANCE {
            break;
        }
    }

    (correction, sweeps)
}

/// Offset that moves the character out to one skin from every contact closer than that.
///
/// Contacts are visited in order and each top-up counts toward the later ones, so two
/// contacts sharing a normal are not pushed twice.
fn skin_recovery(contacts: &ContactSet) -> Vec3 {
    let mut offset = Vec3::zeros();
    for contact in contacts {
        let gap = contact.distance + offset.dot(&contact.normal);
        if gap < SKIN_THICKNESS - DIST_EPS {
            offset += contact.normal * (SKIN_THICKNESS - gap);
        }
    }
    offset
}

/// Push `pose` out of the skin of every surface near `shape`.
///
/// Gathers contacts within `SKIN_THICKNESS + margin` and returns `pose` unchanged when
/// none of them is closer than one skin.
pub fn separate<W: PhysicsWorldView + ?Sized>(
    world: &W,
    shape: &dyn Shape,
    pose: &Iso,
    margin: f32,
    exclude: RigidBodyHandle,
) -> Iso {
    let contacts = world.contacts(shape, pose, SKIN_THICKNESS + margin, exclude);
    let offset = skin_recovery(&contacts);
    if offset == Vec3::zeros() {
        return *pose;
    }
    log::trace!("separated by {:.4} from {} contacts", offset.norm(), contacts.len());
    Iso::from_parts(
        na::Translation3::from(pose.translation.vector + offset),
        pose.rotation,
    )
}

/// Inputs of one swept integration.
pub struct SweepRequest<'a> {
    /// Starting pose (origin at the feet).
    pub start: Iso,
    /// Desired velocity for the frame.
    pub velocity: Vec3,
    pub dt: f32,
    /// World-space character up axis.
    pub up: Vec3,
    /// Drops the synthetic up constraint so a jump can leave the ground.
    pub jumping: bool,
    /// Wide body shape, in the character's local frame.
    pub shape: &'a dyn Shape,
    /// Restraining distance kept beyond the skin; casts stop this much further out.
    pub margin: f32,
    /// The character's own body.
    pub exclude: RigidBodyHandle,
}

/// Where the sweep left the character.
#[derive(Clone, Debug)]
pub struct SweepResult {
    pub pose: Iso,
    pub velocity: Vec3,
    /// Contacts of the last sub-step that hit something.
    pub contacts: ContactSet,
    pub stats: SolverStats,
}

/// Move the body shape along `velocity` for one frame, resolving contacts on the way.
///
/// Algorithm (per sub-step, at most `MAX_INTEGRATION_STEPS`):
/// - Cast toward where the remaining frame time would take the character.
/// - Free path: move there and finish.
/// - Hit: advance to the impact (one skin plus `margin` short of the surface), push out
///   of any contact already inside the skin, consume the elapsed fraction of the frame,
///   then solve the velocity constraints of the new contacts, the previous sub-step's
///   contacts and (unless jumping) the up plane.
/// - When the solver barely changed the velocity, step forward a discrete slice so the
///   loop always makes progress.
pub fn sweep<W: PhysicsWorldView + ?Sized>(world: &W, req: &SweepRequest<'_>) -> SweepResult {
    let mut position = req.start.translation.vector;
    let rotation = req.start.rotation;
    let mut velocity = req.velocity;
    let mut time_left = 1.0f32;
    let mut previous = ContactSet::new();
    let mut last_contacts = ContactSet::new();
    let mut stats = SolverStats::default();

    let up_constraint = ContactPoint::fixed(req.up, Point3::from(position));
    let cast_margin = SKIN_THICKNESS + req.margin;

    for _ in 0..MAX_INTEGRATION_STEPS {
        if velocity.norm_squared() < MIN_VELOCITY_SQ || time_left <= TIME_LEFT_EPS {
            break;
        }
        stats.sub_steps += 1;

        let span = time_left * req.dt;
        let pose = Iso::from_parts(na::Translation3::from(position), rotation);
        let destination = Point3::from(position + velocity * span);

        let Some(hit) = world.convex_cast(req.shape, &pose, &destination, cast_margin, req.exclude)
        else {
            position = destination.coords;
            log::trace!("sub-step {}: free path", stats.sub_steps);
            break;
        };

        let mut contacts = hit.contacts;
        let t = hit.time_of_impact.clamp(0.0, 1.0);
        position += velocity * (t * span) + skin_recovery(&contacts);
        time_left -= t * time_left;
        contacts.dedup_normals();

        let mut constraints: Vec<Constraint> =
            Vec::with_capacity(1 + contacts.len() + previous.len());
        if !req.jumping {
            constraints.push(Constraint {
                normal: up_constraint.normal,
                bounce_speed: bounce_speed(&velocity, &Vec3::zeros(), &up_constraint.normal, 0.0),
            });
        }
        for contact in contacts.iter().chain(previous.iter()) {
            let surface = contact
                .body
                .map(|body| world.point_velocity(body, &contact.point))
                .unwrap_or_else(Vec3::zeros);
            constraints.push(Constraint {
                normal: contact.normal,
                bounce_speed: bounce_speed(&velocity, &surface, &contact.normal, contact.restitution),
            });
        }

        let (correction, sweeps) = solve_constraints(&constraints);
        stats.solver_sweeps += sweeps;
        velocity += correction;

        log::trace!(
            "sub-step {}: toi {t:.4}, {} contacts, {sweeps} sweeps, time left {time_left:.4}",
            stats.sub_steps,
            contacts.len()
        );

        if correction.norm_squared() < SOLVER_TOLERANCE * SOLVER_TOLERANCE {
            let slice = (req.dt / DISCRETE_MOTION_STEPS as f32).min(time_left * req.dt);
            position += velocity * slice;
            if req.dt > 0.0 {
                time_left -= slice / req.dt;
            }
        }

        last_contacts = contacts.clone();
        previous = contacts;
    }

    SweepResult {
        pose: Iso::from_parts(na::Translation3::from(position), rotation),
        velocity,
        contacts: last_contacts,
        stats,
    }
}
