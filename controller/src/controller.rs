/*!
Per-character controller: the two per-frame entry points and the state they own.

A frame runs in two phases, each fanned out over every character by the scheduler:
- `on_pre_update`: tick the state machine, then compute the desired linear and
  angular velocity. Writes back velocities only.
- `on_post_update`: sweep the body along the desired velocity, re-acquire the ground,
  step out of any surface left inside the skin and integrate the orientation. Writes back the new pose and velocities.

Both phases only read the world through [`PhysicsWorldView`] and return a
[`BodyWriteback`] for the world's owner to apply.
*/

use nalgebra as na;
use rapier3d::prelude::RigidBodyHandle;

use crate::cache::{CastShapes, ShapeCache};
use crate::collision::{
    ground::probe_ground,
    kinematic::{SolverStats, SweepRequest, separate, sweep},
    types::{ContactSet, GroundState, Iso, Point3, Vec3},
    world::{BodyWriteback, PhysicsWorldView},
};
use crate::config::{ConfigError, MovementTuning, PlayerConfiguration};
use crate::motion::{self, InputSpeeds, MotionInput};
use crate::state::{Action, BehaviorState, StateContext, StateMachine};

/// Mutable per-character state, owned by exactly one controller.
#[derive(Clone, Copy, Debug)]
pub struct PlayerRuntimeState {
    /// Target yaw about world up (radians).
    pub heading: f32,
    /// Speed accumulators, reset at the start of every pre-update.
    pub speeds: InputSpeeds,
    pub ground: GroundState,
    /// Linear velocity the controller last wrote to its body.
    pub velocity: Vec3,
    /// Angular velocity the controller last wrote to its body.
    pub angular_velocity: Vec3,
    pub jumping: bool,
    /// Last pose read from or written to the body.
    pub pose: Iso,
}

impl PlayerRuntimeState {
    fn new(pose: Iso) -> Self {
        Self {
            heading: 0.0,
            speeds: InputSpeeds::default(),
            ground: GroundState::AIRBORNE,
            velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
            jumping: false,
            pose,
        }
    }

    #[inline]
    fn up(&self) -> Vec3 {
        self.pose.rotation * Vec3::y()
    }

    /// Moving against up with nothing underneath.
    #[inline]
    pub fn is_falling(&self) -> bool {
        self.velocity.dot(&self.up()) < 0.0 && !self.ground.is_grounded()
    }
}

/// Runtime state plus tuning, as the state machine sees it.
struct StateView<'a> {
    runtime: &'a mut PlayerRuntimeState,
    tuning: &'a MovementTuning,
}

impl StateContext for StateView<'_> {
    fn is_jumping(&self) -> bool {
        self.runtime.jumping
    }

    fn is_falling(&self) -> bool {
        self.runtime.is_falling()
    }

    fn set_jumping(&mut self, jumping: bool) {
        self.runtime.jumping = jumping;
    }

    fn add_speed(&mut self, forward: f32, lateral: f32, vertical: f32) {
        self.runtime.speeds.forward += forward;
        self.runtime.speeds.lateral += lateral;
        self.runtime.speeds.vertical += vertical;
    }

    fn tuning(&self) -> &MovementTuning {
        self.tuning
    }
}

pub struct PlayerController {
    body: RigidBodyHandle,
    config: PlayerConfiguration,
    shapes: CastShapes,
    runtime: PlayerRuntimeState,
    machine: StateMachine,
    last_contacts: ContactSet,
    stats: SolverStats,
}

impl PlayerController {
    /// Validate `config` and attach a controller to `body`, currently at `pose`.
    pub fn new(
        body: RigidBodyHandle,
        config: PlayerConfiguration,
        pose: Iso,
        shapes: &ShapeCache,
    ) -> Result<Self, ConfigError> {
        let config = config.validate()?;
        let shapes = shapes.shapes_for(&config);
        Ok(Self {
            body,
            config,
            shapes,
            runtime: PlayerRuntimeState::new(pose),
            machine: StateMachine::default(),
            last_contacts: ContactSet::new(),
            stats: SolverStats::default(),
        })
    }

    #[inline]
    pub fn body(&self) -> RigidBodyHandle {
        self.body
    }

    #[inline]
    pub fn config(&self) -> &PlayerConfiguration {
        &self.config
    }

    #[inline]
    pub fn shapes(&self) -> &CastShapes {
        &self.shapes
    }

    #[inline]
    pub fn runtime(&self) -> &PlayerRuntimeState {
        &self.runtime
    }

    #[inline]
    pub fn state(&self) -> &BehaviorState {
        self.machine.current()
    }

    /// Work done by the last `on_post_update`.
    #[inline]
    pub fn stats(&self) -> SolverStats {
        self.stats
    }

    /// Contacts of the last sub-step that hit something during the last post-update.
    #[inline]
    pub fn last_contacts(&self) -> &ContactSet {
        &self.last_contacts
    }

    #[inline]
    pub fn ground_normal(&self) -> Vec3 {
        self.runtime.ground.normal
    }

    #[inline]
    pub fn velocity(&self) -> Vec3 {
        self.runtime.velocity
    }

    #[inline]
    pub fn pose(&self) -> Iso {
        self.runtime.pose
    }

    #[inline]
    pub fn is_jumping(&self) -> bool {
        self.runtime.jumping
    }

    #[inline]
    pub fn is_falling(&self) -> bool {
        self.runtime.is_falling()
    }

    /// Feed a named input action. Unknown names are ignored.
    pub fn on_action(&mut self, name: &str, pressed: bool) {
        match name.parse::<Action>() {
            Ok(action) => self.apply_action(action, pressed),
            Err(unknown) => log::debug!("ignoring unknown action {:?}", unknown.0),
        }
    }

    pub fn apply_action(&mut self, action: Action, pressed: bool) {
        let mut view = StateView {
            runtime: &mut self.runtime,
            tuning: &self.config.tuning,
        };
        self.machine.on_action(&mut view, action, pressed);
    }

    /// Accumulate `delta` radians of yaw into the heading.
    pub fn on_turn(&mut self, delta: f32) {
        if delta.is_finite() {
            self.runtime.heading = (self.runtime.heading + delta) % std::f32::consts::TAU;
        }
    }

    fn refresh_pose<W: PhysicsWorldView + ?Sized>(&mut self, world: &W) -> Iso {
        if let Some(pose) = world.body_pose(self.body) {
            self.runtime.pose = pose;
        }
        self.runtime.pose
    }

    /// First phase: run the state machine and compute desired velocities.
    pub fn on_pre_update<W: PhysicsWorldView + ?Sized>(&mut self, world: &W, dt: f32) -> BodyWriteback {
        let pose = self.refresh_pose(world);

        self.runtime.speeds = InputSpeeds::default();
        {
            let mut view = StateView {
                runtime: &mut self.runtime,
                tuning: &self.config.tuning,
            };
            self.machine.on_update(&mut view);
        }

        self.runtime.angular_velocity = motion::desired_omega(&pose.rotation, self.runtime.heading, dt);

        let gravity = world.gravity(&Point3::from(pose.translation.vector));
        let desired = motion::desired_velocity(&MotionInput {
            speeds: self.runtime.speeds,
            orientation: pose.rotation,
            velocity: self.runtime.velocity,
            ground: self.runtime.ground,
            gravity,
            dt,
            max_slope_cos: self.config.max_slope_cos,
        });
        self.runtime.velocity = desired.velocity;
        if desired.jumping {
            self.runtime.jumping = true;
        }

        BodyWriteback {
            body: self.body,
            pose: None,
            linear_velocity: self.runtime.velocity,
            angular_velocity: self.runtime.angular_velocity,
        }
    }

    /// Second phase: move through the world, find the ground and commit the pose.
    pub fn on_post_update<W: PhysicsWorldView + ?Sized>(&mut self, world: &W, dt: f32) -> BodyWriteback {
        let start = self.refresh_pose(world);
        let up = start.rotation * Vec3::y();

        let swept = sweep(
            world,
            &SweepRequest {
                start,
                velocity: self.runtime.velocity,
                dt,
                up,
                jumping: self.runtime.jumping,
                shape: &*self.shapes.body,
                margin: self.config.restraining_distance,
                exclude: self.body,
            },
        );
        self.runtime.velocity = swept.velocity;
        self.stats = swept.stats;
        self.last_contacts = swept.contacts;

        let vertical_displacement = up.dot(&(swept.pose.translation.vector - start.translation.vector));
        let cast_distance = self.config.stair_step.max(vertical_displacement.abs());
        let toward_feet = self.runtime.jumping || self.runtime.is_falling();

        let was_grounded = self.runtime.ground.is_grounded();
        let probe = probe_ground(
            world,
            self.body,
            &self.shapes,
            &swept.pose,
            self.config.stair_step,
            cast_distance,
            toward_feet,
            self.config.restraining_distance,
        );
        self.runtime.ground = probe.ground;
        if probe.supported {
            self.runtime.jumping = false;
        }
        if probe.supported != was_grounded {
            log::debug!(
                "{:?} {} ground",
                self.body,
                if probe.supported { "acquired" } else { "lost" }
            );
        }

        let settled = separate(
            world,
            &*self.shapes.body,
            &probe.pose,
            self.config.restraining_distance,
            self.body,
        );

        let rotation = motion::integrate_rotation(&start.rotation, &self.runtime.angular_velocity, dt);
        let pose = Iso::from_parts(na::Translation3::from(settled.translation.vector), rotation);
        self.runtime.pose = pose;

        BodyWriteback {
            body: self.body,
            pose: Some(pose),
            linear_velocity: self.runtime.velocity,
            angular_velocity: self.runtime.angular_velocity,
        }
    }
}

#[cfg(test)]
mod tests {
    use rapier3d::parry::shape::Shape;

    use super::*;
    use crate::collision::types::{CastResult, SupportHit};

    /// Infinite floor at y = 0 seen only by the support cast.
    struct FlatFloor;

    impl PhysicsWorldView for FlatFloor {
        fn body_pose(&self, _: RigidBodyHandle) -> Option<Iso> {
            None
        }

        fn gravity(&self, _: &Point3) -> Vec3 {
            Vec3::new(0.0, -9.8, 0.0)
        }

        fn point_velocity(&self, _: RigidBodyHandle, _: &Point3) -> Vec3 {
            Vec3::zeros()
        }

        fn convex_cast(
            &self,
            _: &dyn Shape,
            _: &Iso,
            _: &Point3,
            _: f32,
            _: RigidBodyHandle,
        ) -> Option<CastResult> {
            None
        }

        fn contacts(&self, _: &dyn Shape, _: &Iso, _: f32, _: RigidBodyHandle) -> ContactSet {
            ContactSet::new()
        }

        fn convex_ray_cast(
            &self,
            shape: &dyn Shape,
            start: &Iso,
            end: &Point3,
            _: f32,
            _: RigidBodyHandle,
        ) -> Option<SupportHit> {
            let half_height = shape.as_cylinder().map(|c| c.half_height).unwrap_or(0.0);
            let from = start.translation.y - half_height;
            let to = end.y - half_height;
            if from < 0.0 || to > 0.0 {
                return None;
            }
            let fraction = if from > to { from / (from - to) } else { 0.0 };
            Some(SupportHit {
                fraction,
                normal: Vec3::y(),
                point: Point3::new(start.translation.x, 0.0, start.translation.z),
                body: None,
            })
        }
    }

    fn controller() -> PlayerController {
        PlayerController::new(
            RigidBodyHandle::invalid(),
            PlayerConfiguration::default(),
            Iso::translation(0.0, 0.0, 0.0),
            &ShapeCache::new(),
        )
        .unwrap()
    }

    fn frame(c: &mut PlayerController, world: &FlatFloor, dt: f32) {
        c.on_pre_update(world, dt);
        c.on_post_update(world, dt);
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let config = PlayerConfiguration {
            half_height: 0.0,
            ..PlayerConfiguration::default()
        };
        let result = PlayerController::new(
            RigidBodyHandle::invalid(),
            config,
            Iso::identity(),
            &ShapeCache::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn unknown_actions_are_ignored() {
        let mut c = controller();
        c.on_action("moonwalk", true);
        assert_eq!(*c.state(), BehaviorState::Idle);
    }

    #[test]
    fn walking_forward_on_a_floor() {
        let world = FlatFloor;
        let dt = 1.0 / 60.0;
        let mut c = controller();

        // Land, then let the floor absorb the landing speed.
        frame(&mut c, &world, dt);
        assert_eq!(c.ground_normal(), Vec3::y());
        frame(&mut c, &world, dt);
        assert!(c.velocity().norm() < 1.0e-6);

        c.on_action("move_forward", true);
        frame(&mut c, &world, dt);

        let v = c.velocity();
        assert!((v - Vec3::new(0.0, 0.0, -5.0)).norm() < 1.0e-3);
        assert_eq!(c.ground_normal(), Vec3::y());
        assert!(c.pose().translation.y >= 0.0);
    }

    #[test]
    fn turning_rotates_toward_the_heading() {
        let world = FlatFloor;
        let dt = 1.0 / 60.0;
        let mut c = controller();

        c.on_turn(0.5);
        for _ in 0..60 {
            frame(&mut c, &world, dt);
        }
        assert!((c.pose().rotation.angle() - 0.5).abs() < 1.0e-3);
    }

    #[test]
    fn jump_leaves_and_reacquires_the_floor() {
        let world = FlatFloor;
        let dt = 1.0 / 60.0;
        let mut c = controller();
        frame(&mut c, &world, dt);

        c.on_action("jump", true);
        frame(&mut c, &world, dt);
        assert!(c.is_jumping());
        assert!(c.pose().translation.y > 0.1);
        assert!(!c.runtime().ground.is_grounded());

        for _ in 0..240 {
            frame(&mut c, &world, dt);
        }
        assert!(!c.is_jumping());
        assert_eq!(*c.state(), BehaviorState::Idle);
        assert!(c.pose().translation.y.abs() < 0.05);
    }
}
