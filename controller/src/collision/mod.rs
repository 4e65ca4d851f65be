/*!
Collision root module.

This module holds the kinematic character controller's collision layer. The code is
split for clarity:

- types:     shared data types (contacts, cast results, ground state)
- settings:  controller and tolerance constants
- world:     the read-only physics view character jobs query
- kinematic: swept integration and the Gauss-Seidel contact solver
- ground:    support cast and ground placement
*/

pub mod ground;
pub mod kinematic;
pub mod settings;
pub mod types;
pub mod world;

// Re-export commonly used types and functions.
pub use ground::{GroundProbe, SupportContact, cast_support, probe_ground};
pub use kinematic::{SolverStats, SweepRequest, SweepResult, solve_constraints, sweep};
pub use types::{
    CastResult, ContactPoint, ContactSet, GroundState, Iso, Point3, Quat, SupportHit, Vec3,
};
pub use world::{BodyWriteback, PhysicsWorldView};
