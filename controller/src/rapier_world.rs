//! Rapier-backed physics world for kinematic characters.
//!
//! The world owns every Rapier set plus the surface and shape caches. Character jobs
//! never see it mutably: they query a borrowed [`RapierWorldView`], which implements
//! [`PhysicsWorldView`], and hand back [`BodyWriteback`] records that the owner applies
//! with [`RapierPhysicsWorld::apply_writeback`] between phases.
//!
//! Bodies
//! - Statics: fixed bodies built from [`WorldStaticDef`], sorted by `id` for a
//!   deterministic insertion order.
//! - Characters: position-based kinematic bodies carrying the full-height capsule.
//! - Platforms: velocity-based kinematic bodies moved by [`RapierPhysicsWorld::step`].

// Re-export Rapier so downstream crates can name handles and shapes without
// depending on `rapier3d` directly.
pub use rapier3d;

use rapier3d::na::{Translation3, UnitQuaternion};
use rapier3d::parry::query::{self as parry_query, ShapeCastOptions};
use rapier3d::parry::shape::Shape;
use rapier3d::prelude::*;

use crate::cache::{CastShapes, ShapeCache, SurfaceCache, SurfaceMaterial};
use crate::collision::settings::CONTACT_SLACK;
use crate::collision::types::{
    CastResult, ContactPoint, ContactSet, Iso, Point3, SupportHit, Vec3,
};
use crate::collision::world::{BodyWriteback, PhysicsWorldView};
use crate::config::PlayerConfiguration;

/// Definition of an immutable world collider.
///
/// Conventions
/// - Units are meters.
/// - Rotation is a unit quaternion.
/// - Planes are half-spaces whose outward normal is `rotation * +Y`.
#[derive(Clone, Debug)]
pub struct WorldStaticDef {
    /// Stable unique identifier used to ensure deterministic insertion order.
    pub id: u32,
    pub translation: Vector<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub shape: ColliderShapeDef,
    /// Surface restitution (0 for a dead stop).
    pub restitution: f32,
}

/// Supported static collider shapes.
#[derive(Clone, Debug)]
pub enum ColliderShapeDef {
    /// Infinite half-space, shifted along its normal by `offset_along_normal`.
    Plane { offset_along_normal: f32 },

    /// Oriented cuboid with given half-extents (meters).
    Cuboid { half_extents: Vector<f32> },

    Sphere { radius: f32 },

    /// Y-aligned capsule (meters).
    CapsuleY { radius: f32, half_height: f32 },

    /// Y-aligned cylinder (meters).
    CylinderY { radius: f32, half_height: f32 },

    /// `border_radius` rounds all edges/corners.
    RoundCuboid {
        half_extents: Vector<f32>,
        border_radius: f32,
    },
}

/// Build a Rapier collider for a [`ColliderShapeDef`].
///
/// The collider is attached to a body carrying the pose, so it is built with an
/// identity local transform (except for the plane offset).
pub fn collider_from_def(shape: &ColliderShapeDef) -> ColliderBuilder {
    match shape {
        ColliderShapeDef::Plane {
            offset_along_normal,
        } => ColliderBuilder::halfspace(Vector::y_axis())
            .translation(Vector::y() * *offset_along_normal),

        ColliderShapeDef::Cuboid { half_extents } => {
            ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
        }

        ColliderShapeDef::Sphere { radius } => ColliderBuilder::ball(*radius),

        ColliderShapeDef::CapsuleY {
            radius,
            half_height,
        } => ColliderBuilder::capsule_y(*half_height, *radius),

        ColliderShapeDef::CylinderY {
            radius,
            half_height,
        } => ColliderBuilder::cylinder(*half_height, *radius),

        ColliderShapeDef::RoundCuboid {
            half_extents,
            border_radius,
        } => ColliderBuilder::round_cuboid(
            half_extents.x,
            half_extents.y,
            half_extents.z,
            *border_radius,
        ),
    }
}

/// A kinematic platform that moves at a constant velocity.
#[derive(Clone, Debug)]
pub struct PlatformDef {
    pub translation: Vector<f32>,
    pub half_extents: Vector<f32>,
    pub linear_velocity: Vector<f32>,
}

/// Rapier sets and pipelines for a scene with kinematic characters.
pub struct RapierPhysicsWorld {
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    pub broad_phase: BroadPhaseBvh,
    pub narrow_phase: NarrowPhase,
    islands: IslandManager,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    physics_pipeline: PhysicsPipeline,
    collision_pipeline: CollisionPipeline,
    params: IntegrationParameters,
    gravity: Vector<f32>,
    surfaces: SurfaceCache,
    shapes: ShapeCache,
}

impl RapierPhysicsWorld {
    /// Build a world from static collider definitions.
    ///
    /// The input is sorted by `id` before insertion. NaN/invalid values should be
    /// filtered by the caller.
    pub fn build(mut defs: Vec<WorldStaticDef>, gravity: Vector<f32>) -> Self {
        defs.sort_by_key(|d| d.id);

        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();

        for def in defs {
            let iso = Isometry::from_parts(Translation3::from(def.translation), def.rotation);
            let rb = RigidBodyBuilder::fixed().pose(iso).build();
            let rb_handle = bodies.insert(rb);

            let collider = collider_from_def(&def.shape)
                .restitution(def.restitution)
                .build();
            colliders.insert_with_parent(collider, rb_handle, &mut bodies);
        }

        let mut world = Self {
            bodies,
            colliders,
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            islands: IslandManager::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            physics_pipeline: PhysicsPipeline::new(),
            collision_pipeline: CollisionPipeline::new(),
            params: IntegrationParameters::default(),
            gravity,
            surfaces: SurfaceCache::new(),
            shapes: ShapeCache::new(),
        };
        world.sync_queries();
        world
    }

    /// Shape cache shared by every character spawned in this world.
    #[inline]
    pub fn shape_cache(&self) -> &ShapeCache {
        &self.shapes
    }

    #[inline]
    pub fn surface_cache(&self) -> &SurfaceCache {
        &self.surfaces
    }

    #[inline]
    pub fn gravity(&self) -> Vector<f32> {
        self.gravity
    }

    /// Refresh the broad and narrow phases without advancing time, so bodies added
    /// or moved since the last step are visible to queries.
    pub fn sync_queries(&mut self) {
        self.collision_pipeline.step(
            0.0,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &(),
            &(),
        );
    }

    /// Insert a position-based kinematic body with the character's full capsule.
    ///
    /// `config` should already be validated; its shapes come from the shared cache.
    pub fn add_character(&mut self, config: &PlayerConfiguration, pose: Iso) -> RigidBodyHandle {
        let shapes: CastShapes = self.shapes.shapes_for(config);
        let rb = RigidBodyBuilder::kinematic_position_based().pose(pose).build();
        let handle = self.bodies.insert(rb);
        let collider = ColliderBuilder::new(shapes.collider.clone()).build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        self.sync_queries();
        handle
    }

    /// Insert a velocity-based kinematic box that keeps moving at `linear_velocity`.
    pub fn add_platform(&mut self, def: &PlatformDef) -> RigidBodyHandle {
        let rb = RigidBodyBuilder::kinematic_velocity_based()
            .translation(def.translation)
            .linvel(def.linear_velocity)
            .build();
        let handle = self.bodies.insert(rb);
        let collider = ColliderBuilder::cuboid(
            def.half_extents.x,
            def.half_extents.y,
            def.half_extents.z,
        )
        .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        self.sync_queries();
        handle
    }

    /// Remove a body and its colliders. Returns `false` if it was already gone.
    pub fn remove_body(&mut self, handle: RigidBodyHandle) -> bool {
        let attached: Vec<ColliderHandle> = match self.bodies.get(handle) {
            Some(rb) => rb.colliders().to_vec(),
            None => return false,
        };
        for collider in &attached {
            self.surfaces.invalidate(collider);
        }

        let removed = self
            .bodies
            .remove(
                handle,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some();
        self.sync_queries();
        removed
    }

    /// Advance the simulation by `dt` seconds. Moves platforms and refreshes the
    /// collision structures queried by the next phases.
    pub fn step(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        self.params.dt = dt;
        self.physics_pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &(),
            &(),
        );
    }

    /// Apply a job's write-back. Returns `false` if the body no longer exists.
    pub fn apply_writeback(&mut self, writeback: &BodyWriteback) -> bool {
        let Some(rb) = self.bodies.get_mut(writeback.body) else {
            return false;
        };
        if let Some(pose) = writeback.pose {
            rb.set_position(pose, true);
        }
        rb.set_linvel(writeback.linear_velocity, true);
        rb.set_angvel(writeback.angular_velocity, true);
        true
    }

    /// Borrowed, thread-safe query view for character jobs.
    pub fn view(&self) -> RapierWorldView<'_> {
        RapierWorldView {
            bodies: &self.bodies,
            colliders: &self.colliders,
            broad_phase: &self.broad_phase,
            narrow_phase: &self.narrow_phase,
            gravity: self.gravity,
            surfaces: &self.surfaces,
        }
    }
}

/// Shared borrow of the query structures of a [`RapierPhysicsWorld`].
#[derive(Clone, Copy)]
pub struct RapierWorldView<'a> {
    bodies: &'a RigidBodySet,
    colliders: &'a ColliderSet,
    broad_phase: &'a BroadPhaseBvh,
    narrow_phase: &'a NarrowPhase,
    gravity: Vector<f32>,
    surfaces: &'a SurfaceCache,
}

impl<'a> RapierWorldView<'a> {
    /// Create a borrowed `QueryPipeline` for one query.
    pub fn query_pipeline(&self, filter: QueryFilter<'a>) -> QueryPipeline<'a> {
        self.broad_phase.as_query_pipeline(
            self.narrow_phase.query_dispatcher(),
            self.bodies,
            self.colliders,
            filter,
        )
    }

    fn restitution(&self, handle: ColliderHandle, collider: &Collider) -> f32 {
        self.surfaces
            .get_or_insert_with(handle, || SurfaceMaterial::from_collider(collider))
            .restitution
    }

    /// Every contact within `margin` of `shape` placed at `pose`.
    fn gather_contacts(
        &self,
        query: &QueryPipeline<'a>,
        shape: &dyn Shape,
        pose: &Iso,
        margin: f32,
        exclude: RigidBodyHandle,
        contacts: &mut ContactSet,
    ) {
        let aabb = shape.compute_aabb(pose).loosened(margin);
        for (handle, collider) in query.intersect_aabb_conservative(aabb) {
            if collider.is_sensor() || collider.parent() == Some(exclude) {
                continue;
            }
            let Ok(Some(contact)) =
                parry_query::contact(collider.position(), collider.shape(), pose, shape, margin)
            else {
                continue;
            };
            let pushed = contacts.push(ContactPoint {
                normal: contact.normal1.into_inner(),
                point: contact.point1,
                body: collider.parent(),
                restitution: self.restitution(handle, collider),
                distance: contact.dist,
            });
            if !pushed {
                break;
            }
        }
    }
}

fn exclude_filter<'a>(exclude: RigidBodyHandle) -> QueryFilter<'a> {
    QueryFilter::new().exclude_rigid_body(exclude).exclude_sensors()
}

/// Body sweeps stop `margin` short of what they approach and slide out of overlaps.
fn sweep_options(margin: f32) -> ShapeCastOptions {
    ShapeCastOptions {
        max_time_of_impact: 1.0,
        target_distance: margin,
        stop_at_penetration: false,
        compute_impact_geometry_on_penetration: true,
    }
}

/// Support casts touch the ground exactly and report overlaps at their start.
fn support_options() -> ShapeCastOptions {
    ShapeCastOptions {
        max_time_of_impact: 1.0,
        target_distance: 0.0,
        stop_at_penetration: true,
        compute_impact_geometry_on_penetration: true,
    }
}

impl PhysicsWorldView for RapierWorldView<'_> {
    fn body_pose(&self, body: RigidBodyHandle) -> Option<Iso> {
        self.bodies.get(body).map(|rb| *rb.position())
    }

    fn gravity(&self, _position: &Point3) -> Vec3 {
        self.gravity
    }

    fn point_velocity(&self, body: RigidBodyHandle, point: &Point3) -> Vec3 {
        self.bodies
            .get(body)
            .map(|rb| rb.velocity_at_point(point))
            .unwrap_or_else(Vec3::zeros)
    }

    fn convex_cast(
        &self,
        shape: &dyn Shape,
        start: &Iso,
        end: &Point3,
        margin: f32,
        exclude: RigidBodyHandle,
    ) -> Option<CastResult> {
        let query = self.query_pipeline(exclude_filter(exclude));
        let motion = end.coords - start.translation.vector;
        let (handle, hit) = query.cast_shape(start, &motion, shape, sweep_options(margin))?;

        let impact = Iso::from_parts(
            Translation3::from(start.translation.vector + motion * hit.time_of_impact),
            start.rotation,
        );
        let mut contacts = ContactSet::new();
        self.gather_contacts(
            &query,
            shape,
            &impact,
            margin + CONTACT_SLACK,
            exclude,
            &mut contacts,
        );

        if contacts.is_empty() {
            // Only the cast saw the obstacle; use its impact geometry.
            let collider = self.colliders.get(handle)?;
            contacts.push(ContactPoint {
                normal: hit.normal1.into_inner(),
                point: hit.witness1,
                body: collider.parent(),
                restitution: self.restitution(handle, collider),
                distance: margin,
            });
        }

        Some(CastResult {
            time_of_impact: hit.time_of_impact,
            contacts,
        })
    }

    fn contacts(
        &self,
        shape: &dyn Shape,
        pose: &Iso,
        margin: f32,
        exclude: RigidBodyHandle,
    ) -> ContactSet {
        let query = self.query_pipeline(exclude_filter(exclude));
        let mut contacts = ContactSet::new();
        self.gather_contacts(&query, shape, pose, margin, exclude, &mut contacts);
        contacts
    }

    fn convex_ray_cast(
        &self,
        shape: &dyn Shape,
        start: &Iso,
        end: &Point3,
        _margin: f32,
        exclude: RigidBodyHandle,
    ) -> Option<SupportHit> {
        let query = self.query_pipeline(exclude_filter(exclude));
        let motion = end.coords - start.translation.vector;
        let (handle, hit) = query.cast_shape(start, &motion, shape, support_options())?;
        let collider = self.colliders.get(handle)?;

        Some(SupportHit {
            fraction: hit.time_of_impact,
            normal: hit.normal1.into_inner(),
            point: hit.witness1,
            body: collider.parent(),
        })
    }
}
