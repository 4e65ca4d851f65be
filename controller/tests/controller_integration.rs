use std::f32::consts::FRAC_PI_2;

use controller::collision::settings::SKIN_THICKNESS;
use controller::rapier_world::rapier3d::na::UnitQuaternion;
use controller::rapier_world::rapier3d::prelude::Vector;
use controller::{
    BehaviorState, ColliderShapeDef, Iso, PlatformDef, PlayerConfiguration, PlayerController,
    RapierPhysicsWorld, SolverStats, Vec3, WorldStaticDef,
};

const DT: f32 = 1.0 / 60.0;

fn floor() -> WorldStaticDef {
    WorldStaticDef {
        id: 0,
        translation: Vector::zeros(),
        rotation: UnitQuaternion::identity(),
        shape: ColliderShapeDef::Plane {
            offset_along_normal: 0.0,
        },
        restitution: 0.0,
    }
}

/// Box whose +Z face sits at `z = face_z`.
fn wall_facing_z(id: u32, face_z: f32) -> WorldStaticDef {
    WorldStaticDef {
        id,
        translation: Vector::new(0.0, 2.0, face_z - 0.5),
        rotation: UnitQuaternion::identity(),
        shape: ColliderShapeDef::Cuboid {
            half_extents: Vector::new(10.0, 2.0, 0.5),
        },
        restitution: 0.0,
    }
}

/// Half-space tilted about +X by `angle`: its surface rises toward -Z for positive angles.
fn slope(id: u32, angle: f32) -> WorldStaticDef {
    WorldStaticDef {
        id,
        translation: Vector::zeros(),
        rotation: UnitQuaternion::from_axis_angle(&Vector::x_axis(), angle),
        shape: ColliderShapeDef::Plane {
            offset_along_normal: 0.0,
        },
        restitution: 0.0,
    }
}

/// Vertical half-space filling `z < face_z`.
fn half_space_facing_z(id: u32, face_z: f32) -> WorldStaticDef {
    WorldStaticDef {
        id,
        translation: Vector::new(0.0, 0.0, face_z),
        rotation: UnitQuaternion::from_axis_angle(&Vector::x_axis(), FRAC_PI_2),
        shape: ColliderShapeDef::Plane {
            offset_along_normal: 0.0,
        },
        restitution: 0.0,
    }
}

/// Box whose +X face sits at `x = face_x`.
fn wall_facing_x(id: u32, face_x: f32) -> WorldStaticDef {
    WorldStaticDef {
        id,
        translation: Vector::new(face_x - 0.5, 2.0, 0.0),
        rotation: UnitQuaternion::identity(),
        shape: ColliderShapeDef::Cuboid {
            half_extents: Vector::new(0.5, 2.0, 10.0),
        },
        restitution: 0.0,
    }
}

fn spawn(world: &mut RapierPhysicsWorld, pose: Iso) -> PlayerController {
    let config = PlayerConfiguration::default().validate().unwrap();
    let body = world.add_character(&config, pose);
    PlayerController::new(body, config, pose, world.shape_cache()).unwrap()
}

fn frame(world: &mut RapierPhysicsWorld, c: &mut PlayerController) {
    world.step(DT);
    let pre = c.on_pre_update(&world.view(), DT);
    assert!(world.apply_writeback(&pre));
    let post = c.on_post_update(&world.view(), DT);
    assert!(world.apply_writeback(&post));
}

fn gravity() -> Vector<f32> {
    Vector::new(0.0, -9.8, 0.0)
}

#[test]
fn walking_forward_on_a_flat_floor() {
    let mut world = RapierPhysicsWorld::build(vec![floor()], gravity());
    let mut c = spawn(&mut world, Iso::identity());

    frame(&mut world, &mut c);
    frame(&mut world, &mut c);
    assert!((c.ground_normal() - Vec3::y()).norm() < 1.0e-3);

    c.on_action("move_forward", true);
    frame(&mut world, &mut c);

    let v = c.velocity();
    assert!((v.z + 5.0).abs() < 1.0e-3, "velocity {v:?}");
    assert!(v.y.abs() < 1.0e-3);
    assert!(v.x.abs() < 1.0e-3);
    assert!((c.ground_normal() - Vec3::y()).norm() < 1.0e-3);
    assert!(matches!(c.state(), BehaviorState::Walking(_)));
}

#[test]
fn standing_character_keeps_a_skin_above_the_floor() {
    let mut world = RapierPhysicsWorld::build(vec![floor()], gravity());
    let mut c = spawn(&mut world, Iso::translation(0.0, 0.5, 0.0));

    for _ in 0..120 {
        frame(&mut world, &mut c);
        assert!(c.pose().translation.y >= SKIN_THICKNESS - 1.0e-3);
    }
    assert!((c.pose().translation.y - SKIN_THICKNESS).abs() < 1.0e-2);
}

#[test]
fn walking_into_a_wall_never_penetrates_it() {
    let face = -3.0;
    for k in 0..10 {
        let mut world = RapierPhysicsWorld::build(vec![floor(), wall_facing_z(1, face)], gravity());
        let mut c = spawn(&mut world, Iso::translation(0.0, 0.0, k as f32 * 0.0073));
        let radius = c.config().outer_radius;

        c.on_action("move_forward", true);
        for _ in 0..120 {
            frame(&mut world, &mut c);
            let gap = c.pose().translation.z - radius - face;
            assert!(gap >= SKIN_THICKNESS - 1.0e-3, "start {k}: gap {gap}");
            assert!(c.stats().solver_sweeps <= SolverStats::MAX_SWEEPS);
        }

        // Pressed against the wall rather than stopped short of it.
        assert!(c.pose().translation.z - radius - face < 0.1);
        assert!(!c.last_contacts().is_empty());
    }
}

#[test]
fn pressing_into_a_half_space_wall_keeps_a_skin_from_any_start() {
    let face = -1.0;
    for k in 0..20 {
        let mut world =
            RapierPhysicsWorld::build(vec![floor(), half_space_facing_z(1, face)], gravity());
        let mut c = spawn(&mut world, Iso::translation(0.0, 0.0, k as f32 * 0.0041));
        let radius = c.config().outer_radius;

        c.on_action("move_forward", true);
        let mut worst = f32::MAX;
        for _ in 0..40 {
            frame(&mut world, &mut c);
            worst = worst.min(c.pose().translation.z - radius - face);
        }
        assert!(worst >= SKIN_THICKNESS - 1.0e-3, "start {k}: worst gap {worst}");
    }
}

#[test]
fn walking_on_ramps_keeps_the_ground() {
    for degrees in [20.0f32, -20.0, 35.0, -35.0] {
        let angle = degrees.to_radians();
        let normal = Vec3::new(0.0, angle.cos(), angle.sin());
        let mut world = RapierPhysicsWorld::build(vec![slope(0, angle)], gravity());
        let mut c = spawn(&mut world, Iso::identity());
        frame(&mut world, &mut c);

        c.on_action("move_forward", true);
        for i in 0..90 {
            frame(&mut world, &mut c);
            assert!(
                c.ground_normal().dot(&normal) > 0.99,
                "{degrees} degrees, frame {i}: lost the ground"
            );
            let t = c.pose().translation;
            let above = t.y + t.z * angle.tan();
            assert!((-0.01..0.25).contains(&above), "{degrees} degrees, frame {i}: {above} above");
        }

        let t = c.pose().translation;
        assert!(t.z < -3.0, "{degrees} degrees: stalled at {}", t.z);
        assert_eq!(t.y > 0.0, degrees > 0.0);
    }
}

#[test]
fn steps_up_onto_and_down_off_a_low_ledge() {
    // 0.2 m high, spanning z in [-4, -2].
    let ledge = WorldStaticDef {
        id: 1,
        translation: Vector::new(0.0, 0.1, -3.0),
        rotation: UnitQuaternion::identity(),
        shape: ColliderShapeDef::Cuboid {
            half_extents: Vector::new(5.0, 0.1, 1.0),
        },
        restitution: 0.0,
    };
    let mut world = RapierPhysicsWorld::build(vec![floor(), ledge], gravity());
    let mut c = spawn(&mut world, Iso::identity());
    frame(&mut world, &mut c);
    frame(&mut world, &mut c);

    c.on_action("move_forward", true);
    let mut on_top = 0;
    for i in 0..72 {
        frame(&mut world, &mut c);
        assert!(c.ground_normal().norm() > 0.5, "frame {i}: lost the ground");
        let t = c.pose().translation;
        if (-3.6..-2.4).contains(&t.z) {
            assert!(t.y > 0.19, "frame {i}: not on the ledge at {t:?}");
            on_top += 1;
        }
    }

    assert!(on_top > 0);
    let t = c.pose().translation;
    assert!(t.z < -4.5, "stalled at {}", t.z);
    assert!(t.y < 0.05, "still up at {}", t.y);
}

#[test]
fn steep_slope_ignores_lateral_input() {
    // 60 degrees is past the default 45 degree limit.
    let angle = 60.0f32.to_radians();
    let mut world = RapierPhysicsWorld::build(vec![slope(0, angle)], gravity());
    let mut c = spawn(&mut world, Iso::identity());

    c.on_action("strafe_left", true);
    let mut settled_y = None;
    for i in 0..60 {
        frame(&mut world, &mut c);
        let t = c.pose().translation;
        assert!(t.x.abs() < 1.0e-4, "frame {i}: drifted sideways to {}", t.x);
        assert!(t.z > -1.0e-4, "frame {i}: climbed to z = {}", t.z);
        if i == 5 {
            settled_y = Some(t.y);
        }
    }

    let n = c.ground_normal();
    assert!(n.norm() > 0.5);
    assert!(n.dot(&Vec3::y()) < c.config().max_slope_cos);
    assert!(c.pose().translation.y < settled_y.unwrap() - 1.0, "did not slide");
}

#[test]
fn corner_walk_stays_outside_both_walls() {
    let mut world = RapierPhysicsWorld::build(
        vec![floor(), wall_facing_z(1, -2.0), wall_facing_x(2, -2.0)],
        gravity(),
    );
    let mut c = spawn(&mut world, Iso::identity());
    let radius = c.config().outer_radius;

    c.on_action("move_forward", true);
    c.on_action("strafe_left", true);
    for _ in 0..180 {
        frame(&mut world, &mut c);
        let t = c.pose().translation;
        assert!(t.z - radius + 2.0 >= SKIN_THICKNESS - 1.0e-3);
        assert!(t.x - radius + 2.0 >= SKIN_THICKNESS - 1.0e-3);
        assert!(c.stats().sub_steps <= 8);
        assert!(c.stats().solver_sweeps <= SolverStats::MAX_SWEEPS);
    }
}

#[test]
fn jump_then_land_back_in_idle() {
    let mut world = RapierPhysicsWorld::build(vec![floor()], gravity());
    let mut c = spawn(&mut world, Iso::identity());
    frame(&mut world, &mut c);
    frame(&mut world, &mut c);

    c.on_action("jump", true);
    frame(&mut world, &mut c);
    assert!(c.is_jumping());
    assert!(c.pose().translation.y > 0.1);

    let mut peak = 0.0f32;
    let mut saw_falling = false;
    for _ in 0..240 {
        frame(&mut world, &mut c);
        peak = peak.max(c.pose().translation.y);
        saw_falling |= *c.state() == BehaviorState::Falling;
    }

    assert!(peak > 4.0, "peak {peak}");
    assert!(saw_falling);
    assert!(!c.is_jumping());
    assert_eq!(*c.state(), BehaviorState::Idle);
    assert!(c.pose().translation.y < 0.1);
}

#[test]
fn moving_platform_carries_a_standing_character() {
    let mut world = RapierPhysicsWorld::build(vec![floor()], gravity());
    let platform = world.add_platform(&PlatformDef {
        translation: Vector::new(0.0, 0.5, 0.0),
        half_extents: Vector::new(3.0, 0.1, 3.0),
        linear_velocity: Vector::new(1.0, 0.0, 0.0),
    });
    let mut c = spawn(&mut world, Iso::translation(0.0, 0.6, 0.0));

    for _ in 0..60 {
        frame(&mut world, &mut c);
    }

    let platform_x = world.bodies[platform].translation().x;
    let character = c.pose().translation;
    assert!((platform_x - 1.0).abs() < 0.05);
    assert!((character.x - platform_x).abs() < 0.1, "lagging at {}", character.x);
    assert!(character.y > 0.55);
}

#[test]
fn turning_faces_the_new_heading() {
    let mut world = RapierPhysicsWorld::build(vec![floor()], gravity());
    let mut c = spawn(&mut world, Iso::identity());

    c.on_turn(std::f32::consts::FRAC_PI_2);
    for _ in 0..60 {
        frame(&mut world, &mut c);
    }

    c.on_action("move_forward", true);
    for _ in 0..30 {
        frame(&mut world, &mut c);
    }

    // Yaw +90 degrees about +Y turns -Z into -X.
    let t = c.pose().translation;
    assert!(t.x < -1.0, "x = {}", t.x);
    assert!(t.z.abs() < 0.1);
}
