//! Per-character configuration.
//!
//! A [`PlayerConfiguration`] is created once when a character spawns and is never
//! mutated afterwards. Malformed values are a programming error and are rejected once,
//! up front, by [`PlayerConfiguration::validate`]; the per-frame loop never re-checks.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collision::settings::MIN_RESTRAINING_DISTANCE;
use crate::constants::{DEFAULT_JUMP_IMPULSE_MPS, DEFAULT_STRAFE_SPEED_MPS, DEFAULT_WALK_SPEED_MPS};

/// Reasons a configuration is rejected at character construction.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("`{field}` must be finite and positive, got {value}")]
    NotPositive { field: &'static str, value: f32 },

    #[error("`{field}` must be finite and not negative, got {value}")]
    Negative { field: &'static str, value: f32 },

    #[error("inner radius {inner} exceeds outer radius {outer}")]
    InnerExceedsOuter { inner: f32, outer: f32 },

    #[error(
        "stair step {stair_step} plus the outer diameter {diameter} does not fit in height {height}"
    )]
    BodyTooShort {
        stair_step: f32,
        diameter: f32,
        height: f32,
    },

    #[error("max slope cosine must be in (0, 1], got {0}")]
    SlopeOutOfRange(f32),
}

/// Input-driven speeds contributed by the behavioral states (m/s).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementTuning {
    pub walk_speed: f32,
    pub strafe_speed: f32,
    /// One-shot vertical speed added when a jump starts.
    pub jump_impulse: f32,
}

impl Default for MovementTuning {
    fn default() -> Self {
        Self {
            walk_speed: DEFAULT_WALK_SPEED_MPS,
            strafe_speed: DEFAULT_STRAFE_SPEED_MPS,
            jump_impulse: DEFAULT_JUMP_IMPULSE_MPS,
        }
    }
}

/// Character dimensions and limits.
///
/// The character's origin is at its feet. Total height is `2 * half_height`.
/// The swept "body" capsule starts `stair_step` above the feet so that small
/// ledges are stepped onto by the ground detector instead of blocking motion.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfiguration {
    /// Radius of the wide body capsule (meters).
    pub outer_radius: f32,
    /// Radius of the thin support cylinder (meters).
    pub inner_radius: f32,
    /// Half of the total character height (meters).
    pub half_height: f32,
    /// Tallest ledge the character walks onto without jumping (meters).
    pub stair_step: f32,
    /// Cosine of the steepest climbable slope; `normal.dot(up)` below this is too steep.
    pub max_slope_cos: f32,
    /// Numerical margin used for contact gathering (meters).
    pub restraining_distance: f32,
    pub tuning: MovementTuning,
}

impl Default for PlayerConfiguration {
    fn default() -> Self {
        Self {
            outer_radius: 0.4,
            inner_radius: 0.25,
            half_height: 0.9,
            stair_step: 0.3,
            max_slope_cos: std::f32::consts::FRAC_1_SQRT_2,
            restraining_distance: MIN_RESTRAINING_DISTANCE,
            tuning: MovementTuning::default(),
        }
    }
}

impl PlayerConfiguration {
    /// Convenience: express the slope limit as an angle from "up" (radians).
    pub fn with_max_slope_angle(mut self, radians: f32) -> Self {
        self.max_slope_cos = radians.cos();
        self
    }

    #[inline]
    pub fn height(&self) -> f32 {
        2.0 * self.half_height
    }

    /// Check every field and normalize the restraining distance to
    /// `max(|restraining_distance|, MIN_RESTRAINING_DISTANCE)`.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        positive("outer_radius", self.outer_radius)?;
        positive("inner_radius", self.inner_radius)?;
        positive("half_height", self.half_height)?;
        not_negative("stair_step", self.stair_step)?;
        not_negative("tuning.walk_speed", self.tuning.walk_speed)?;
        not_negative("tuning.strafe_speed", self.tuning.strafe_speed)?;
        not_negative("tuning.jump_impulse", self.tuning.jump_impulse)?;

        if self.inner_radius > self.outer_radius {
            return Err(ConfigError::InnerExceedsOuter {
                inner: self.inner_radius,
                outer: self.outer_radius,
            });
        }

        let diameter = 2.0 * self.outer_radius;
        if self.stair_step + diameter > self.height() {
            return Err(ConfigError::BodyTooShort {
                stair_step: self.stair_step,
                diameter,
                height: self.height(),
            });
        }

        if !(self.max_slope_cos > 0.0 && self.max_slope_cos <= 1.0) {
            return Err(ConfigError::SlopeOutOfRange(self.max_slope_cos));
        }

        self.restraining_distance = if self.restraining_distance.is_finite() {
            self.restraining_distance.abs().max(MIN_RESTRAINING_DISTANCE)
        } else {
            MIN_RESTRAINING_DISTANCE
        };

        Ok(self)
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn not_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}
