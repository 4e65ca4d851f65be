/*!
Motion integrator: per-frame desired velocities from input speeds and ground state.

Everything here is pure math over the character frame (`front = -Z`, `up = +Y`,
`right = front x up`, rotated by the body orientation). No world access.
*/

use crate::collision::settings::{SPEED_SLACK_SQ, YAW_EPS};
use crate::collision::types::{GroundState, Quat, Vec3};
use crate::constants::{LOCAL_FRONT, LOCAL_UP};

/// Speeds the behavioral state machine accumulated for this frame (m/s).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InputSpeeds {
    pub forward: f32,
    pub lateral: f32,
    pub vertical: f32,
}

impl InputSpeeds {
    #[inline]
    pub fn budget_sq(&self) -> f32 {
        self.forward * self.forward + self.lateral * self.lateral + self.vertical * self.vertical
    }
}

/// Everything the integrator needs about the character for one frame.
#[derive(Clone, Copy, Debug)]
pub struct MotionInput {
    pub speeds: InputSpeeds,
    pub orientation: Quat,
    /// Velocity carried over from the previous frame.
    pub velocity: Vec3,
    pub ground: GroundState,
    pub gravity: Vec3,
    pub dt: f32,
    pub max_slope_cos: f32,
}

/// Desired linear velocity plus whether this frame starts (or continues) a jump.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DesiredMotion {
    pub velocity: Vec3,
    pub jumping: bool,
}

/// Character basis vectors in world space for an orientation.
#[derive(Clone, Copy, Debug)]
pub struct Basis {
    pub front: Vec3,
    pub up: Vec3,
    pub right: Vec3,
}

impl Basis {
    #[inline]
    pub fn of(orientation: &Quat) -> Self {
        let front = orientation * Vec3::from(LOCAL_FRONT);
        let up = orientation * Vec3::from(LOCAL_UP);
        Self {
            front,
            up,
            right: front.cross(&up),
        }
    }
}

/// Orientation facing `heading` radians of yaw about world up.
#[inline]
pub fn heading_orientation(heading: f32) -> Quat {
    Quat::from_axis_angle(&Vec3::y_axis(), heading)
}

/// Average angular velocity that covers half of the rotation from `current` to the
/// heading orientation in one frame.
///
/// Zero when the remaining angle is below `YAW_EPS` or `dt` is not positive.
pub fn desired_omega(current: &Quat, heading: f32, dt: f32) -> Vec3 {
    if dt <= 0.0 {
        return Vec3::zeros();
    }

    let mut delta = heading_orientation(heading) * current.inverse();
    // Shortest arc.
    if delta.w < 0.0 {
        delta = Quat::new_unchecked(-delta.into_inner());
    }

    if delta.angle() < YAW_EPS {
        return Vec3::zeros();
    }

    delta.scaled_axis() * (0.5 / dt)
}

/// Integrate `omega` over `dt` onto `orientation`.
#[inline]
pub fn integrate_rotation(orientation: &Quat, omega: &Vec3, dt: f32) -> Quat {
    if dt <= 0.0 || omega.norm_squared() == 0.0 {
        return *orientation;
    }
    let mut q = Quat::from_scaled_axis(omega * dt) * orientation;
    q.renormalize();
    q
}

/// Remove the component of `relative` that points into `normal`.
#[inline]
fn strip_inward(velocity: Vec3, relative: Vec3, normal: &Vec3) -> Vec3 {
    let inward = relative.dot(normal);
    if inward < 0.0 {
        velocity - normal * inward
    } else {
        velocity
    }
}

/// Desired linear velocity for the coming frame.
///
/// - Grounded on a climbable slope: input drives the character along the ground, riding
///   the ground's velocity, clamped to the input and ground speed budget.
/// - Grounded on a slope that is too steep: input is ignored and the character slides.
/// - Airborne: only the vertical contribution and gravity act.
pub fn desired_velocity(input: &MotionInput) -> DesiredMotion {
    let MotionInput {
        speeds,
        orientation,
        velocity,
        ground,
        gravity,
        dt,
        max_slope_cos,
    } = *input;

    let basis = Basis::of(&orientation);
    let jumping = speeds.vertical > 0.0;
    let grounded = speeds.vertical <= 0.0 && ground.is_grounded();
    let gravity_dv = gravity * dt.max(0.0);

    if !grounded {
        let v = velocity + basis.up * speeds.vertical + gravity_dv;
        return DesiredMotion {
            velocity: v,
            jumping,
        };
    }

    let n = ground.normal;
    let vg = ground.velocity;

    if n.dot(&basis.up) < max_slope_cos {
        let v = velocity + basis.up * speeds.vertical + gravity_dv;
        return DesiredMotion {
            velocity: strip_inward(v, v - vg, &n),
            jumping,
        };
    }

    let mut v = n * velocity.dot(&n)
        + gravity_dv
        + basis.front * speeds.forward
        + basis.right * speeds.lateral
        + basis.up * speeds.vertical
        + (vg - n * vg.dot(&n));

    let limit_sq = speeds.budget_sq() + vg.norm_squared() + SPEED_SLACK_SQ;
    let speed_sq = v.norm_squared();
    if speed_sq > limit_sq {
        v *= (limit_sq / speed_sq).sqrt();
    }

    DesiredMotion {
        velocity: strip_inward(v, v - vg, &n),
        jumping,
    }
}
