pub mod cache;
pub mod collision;
pub mod config;
pub mod constants;
pub mod controller;
pub mod motion;
pub mod rapier_world;
pub mod state;

pub use cache::{CastShapes, ConcurrentCache, ShapeCache, SurfaceCache, SurfaceMaterial};
pub use collision::{BodyWriteback, GroundState, Iso, PhysicsWorldView, Point3, Quat, SolverStats, Vec3};
pub use config::{ConfigError, MovementTuning, PlayerConfiguration};
pub use controller::{PlayerController, PlayerRuntimeState};
pub use rapier_world::{
    ColliderShapeDef, PlatformDef, RapierPhysicsWorld, RapierWorldView, WorldStaticDef,
    collider_from_def,
};
pub use state::{Action, BehaviorState, WalkFlags};
