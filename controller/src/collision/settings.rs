/*!
Kinematic character controller (KCC) settings and tolerances.

These constants centralize the parameters used by the contact resolver, the swept
integration loop and the ground detector. Keeping them together makes tuning easier
and keeps the per-frame work bounded and deterministic across platforms.

Notes
- Distances are in meters, time in seconds.
- Favor practical world-space tolerances over machine epsilon for robust behavior.
- Squared thresholds are compared against squared magnitudes to avoid a square root.
*/

/// Separation kept from surfaces after a swept cast reports an impact (meters).
/// Too large creates visible gaps; too small risks jitter on contact. Never zero.
pub const SKIN_THICKNESS: f32 = 0.025;

/// Extra distance (meters) contact gathering accepts beyond the requested margin, so a
/// cast stopped exactly at the margin still reports the surface it stopped at.
pub const CONTACT_SLACK: f32 = 2.0e-3;

/// Upper bound on swept-integration sub-steps per `on_post_update`.
pub const MAX_INTEGRATION_STEPS: u32 = 8;

/// Upper bound on Gauss-Seidel sweeps per sub-step.
///
/// This does not guarantee full convergence for more than a handful of simultaneous
/// contacts (tight corners).
pub const MAX_SOLVER_ITERATIONS: u32 = 16;

/// Number of discrete slices a frame is split into when the solver produced no
/// meaningful deflection and the loop has to force forward progress.
pub const DISCRETE_MOTION_STEPS: u32 = 8;

/// Maximum number of contacts kept from a single convex cast.
pub const MAX_CONTACTS: usize = 32;

/// Two contact normals whose dot product exceeds this are the same constraint.
pub const DUPLICATE_NORMAL_COS: f32 = 0.9999;

/// Largest residual speed (m/s) tolerated before the solver stops early.
pub const SOLVER_TOLERANCE: f32 = 1.0e-3;

/// Velocities below this squared magnitude (m^2/s^2) are treated as rest.
pub const MIN_VELOCITY_SQ: f32 = 1.0e-6;

/// Remaining normalized frame time considered consumed.
pub const TIME_LEFT_EPS: f32 = 1.0e-5;

/// Smallest restraining distance a configuration may resolve to (meters).
pub const MIN_RESTRAINING_DISTANCE: f32 = 1.0e-2;

/// Slack added to the squared speed budget of a grounded character (m^2/s^2).
pub const SPEED_SLACK_SQ: f32 = 0.1;

/// Angular differences (radians) below which no turn is requested.
pub const YAW_EPS: f32 = 1.0e-5;

/// Half height of the thin support cylinder cast under the feet (meters).
pub const SUPPORT_HALF_HEIGHT: f32 = 0.05;

/// Practical small distance for comparisons (meters).
/// Use for dot-product guards, equality checks in world space, etc.
pub const DIST_EPS: f32 = 1.0e-6;
