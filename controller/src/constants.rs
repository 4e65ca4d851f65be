/// Default forward/backward walking speed in meters per second.
pub const DEFAULT_WALK_SPEED_MPS: f32 = 5.0;

/// Default sideways (strafe) speed in meters per second.
pub const DEFAULT_STRAFE_SPEED_MPS: f32 = 5.0;

/// Default one-shot upward speed applied when a jump starts (m/s).
pub const DEFAULT_JUMP_IMPULSE_MPS: f32 = 10.0;

/// Standard gravity, pointing down the world Y axis (m/s^2).
pub const GRAVITY_MPS2: f32 = -9.81;

/// The character's local "up" axis.
pub const LOCAL_UP: [f32; 3] = [0.0, 1.0, 0.0];

/// The character's local "front" axis. Yaw 0 faces down -Z.
pub const LOCAL_FRONT: [f32; 3] = [0.0, 0.0, -1.0];
