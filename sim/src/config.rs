//! Simulation configuration.
//!
//! Sources, lowest to highest priority:
//! 1. Built-in defaults (a small demo scene).
//! 2. An optional TOML file.
//! 3. Environment variables (`SIM_SECTION__KEY`, e.g. `SIM_FRAMES=600`).

use std::path::Path;

use controller::constants::GRAVITY_MPS2;
use controller::{ColliderShapeDef, PlatformDef, PlayerConfiguration, WorldStaticDef};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use rapier3d::na::UnitQuaternion;
use rapier3d::prelude::Vector;
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Top-level simulation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed frame time in seconds.
    pub frame_time: f32,
    /// Frames to run before exiting.
    pub frames: u64,
    /// Worker threads for character jobs; 0 lets rayon decide.
    pub workers: usize,
    pub gravity: [f32; 3],
    pub statics: Vec<StaticConfig>,
    pub platforms: Vec<PlatformConfig>,
    pub characters: Vec<CharacterSpawn>,
    pub script: Vec<ScriptedInput>,
}

/// One immutable world collider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticConfig {
    pub id: u32,
    #[serde(default)]
    pub translation: [f32; 3],
    /// Roll, pitch, yaw in degrees.
    #[serde(default)]
    pub rotation_deg: [f32; 3],
    pub shape: ShapeConfig,
    #[serde(default)]
    pub restitution: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapeConfig {
    Plane {
        #[serde(default)]
        offset: f32,
    },
    Cuboid {
        half_extents: [f32; 3],
    },
    Sphere {
        radius: f32,
    },
    Capsule {
        radius: f32,
        half_height: f32,
    },
    Cylinder {
        radius: f32,
        half_height: f32,
    },
    RoundCuboid {
        half_extents: [f32; 3],
        border_radius: f32,
    },
}

/// A box that slides at a constant velocity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub translation: [f32; 3],
    pub half_extents: [f32; 3],
    pub velocity: [f32; 3],
}

/// A character present from the first frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterSpawn {
    pub name: String,
    /// Feet position.
    pub position: [f32; 3],
    #[serde(default)]
    pub player: PlayerConfiguration,
}

/// Input applied to a character at the start of a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedInput {
    pub frame: u64,
    pub character: String,
    pub event: ScriptedEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptedEvent {
    Press { action: String },
    Release { action: String },
    Turn { radians: f32 },
    Despawn,
}

#[inline]
fn vector(v: [f32; 3]) -> Vector<f32> {
    Vector::new(v[0], v[1], v[2])
}

impl ShapeConfig {
    pub fn to_def(&self) -> ColliderShapeDef {
        match *self {
            ShapeConfig::Plane { offset } => ColliderShapeDef::Plane {
                offset_along_normal: offset,
            },
            ShapeConfig::Cuboid { half_extents } => ColliderShapeDef::Cuboid {
                half_extents: vector(half_extents),
            },
            ShapeConfig::Sphere { radius } => ColliderShapeDef::Sphere { radius },
            ShapeConfig::Capsule {
                radius,
                half_height,
            } => ColliderShapeDef::CapsuleY {
                radius,
                half_height,
            },
            ShapeConfig::Cylinder {
                radius,
                half_height,
            } => ColliderShapeDef::CylinderY {
                radius,
                half_height,
            },
            ShapeConfig::RoundCuboid {
                half_extents,
                border_radius,
            } => ColliderShapeDef::RoundCuboid {
                half_extents: vector(half_extents),
                border_radius,
            },
        }
    }
}

impl StaticConfig {
    pub fn to_def(&self) -> WorldStaticDef {
        let [roll, pitch, yaw] = self.rotation_deg.map(f32::to_radians);
        WorldStaticDef {
            id: self.id,
            translation: vector(self.translation),
            rotation: UnitQuaternion::from_euler_angles(roll, pitch, yaw),
            shape: self.shape.to_def(),
            restitution: self.restitution,
        }
    }
}

impl PlatformConfig {
    pub fn to_def(&self) -> PlatformDef {
        PlatformDef {
            translation: vector(self.translation),
            half_extents: vector(self.half_extents),
            linear_velocity: vector(self.velocity),
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        let press = |frame, character: &str, action: &str| ScriptedInput {
            frame,
            character: character.to_owned(),
            event: ScriptedEvent::Press {
                action: action.to_owned(),
            },
        };
        let release = |frame, character: &str, action: &str| ScriptedInput {
            frame,
            character: character.to_owned(),
            event: ScriptedEvent::Release {
                action: action.to_owned(),
            },
        };

        Self {
            frame_time: 1.0 / 60.0,
            frames: 600,
            workers: 0,
            gravity: [0.0, GRAVITY_MPS2, 0.0],
            statics: vec![
                StaticConfig {
                    id: 0,
                    translation: [0.0; 3],
                    rotation_deg: [0.0; 3],
                    shape: ShapeConfig::Plane { offset: 0.0 },
                    restitution: 0.0,
                },
                StaticConfig {
                    id: 1,
                    translation: [0.0, 2.0, -12.5],
                    rotation_deg: [0.0; 3],
                    shape: ShapeConfig::Cuboid {
                        half_extents: [10.0, 2.0, 0.5],
                    },
                    restitution: 0.0,
                },
                StaticConfig {
                    id: 2,
                    translation: [4.0, 0.1, -4.0],
                    rotation_deg: [0.0; 3],
                    shape: ShapeConfig::Cuboid {
                        half_extents: [1.0, 0.1, 1.0],
                    },
                    restitution: 0.0,
                },
            ],
            platforms: vec![PlatformConfig {
                translation: [-6.0, 0.5, 0.0],
                half_extents: [1.5, 0.1, 1.5],
                velocity: [0.0, 0.0, -0.5],
            }],
            characters: vec![
                CharacterSpawn {
                    name: "runner".to_owned(),
                    position: [0.0, 0.0, 0.0],
                    player: PlayerConfiguration::default(),
                },
                CharacterSpawn {
                    name: "jumper".to_owned(),
                    position: [3.0, 0.0, 0.0],
                    player: PlayerConfiguration::default(),
                },
                CharacterSpawn {
                    name: "rider".to_owned(),
                    position: [-6.0, 0.6, 0.0],
                    player: PlayerConfiguration::default(),
                },
            ],
            script: vec![
                press(10, "runner", "move_forward"),
                press(30, "jumper", "jump"),
                release(31, "jumper", "jump"),
                press(60, "jumper", "strafe_left"),
                release(240, "jumper", "strafe_left"),
                ScriptedInput {
                    frame: 300,
                    character: "runner".to_owned(),
                    event: ScriptedEvent::Turn {
                        radians: std::f32::consts::FRAC_PI_2,
                    },
                },
                press(320, "runner", "crouch"),
                release(400, "runner", "move_forward"),
                release(420, "runner", "crouch"),
            ],
        }
    }
}

impl SimConfig {
    /// Load from defaults, an optional TOML file and `SIM_` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, SimError> {
        let mut figment = Figment::from(Serialized::defaults(SimConfig::default()));
        if let Some(path) = path {
            if !path.exists() {
                return Err(SimError::Invalid(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
        }
        Self::extract(figment.merge(Env::prefixed("SIM_").split("__")))
    }

    /// Load from defaults overlaid with a TOML document.
    pub fn from_toml_str(toml: &str) -> Result<Self, SimError> {
        Self::extract(Figment::from(Serialized::defaults(SimConfig::default())).merge(Toml::string(toml)))
    }

    fn extract(figment: Figment) -> Result<Self, SimError> {
        let config: SimConfig = figment.extract()?;
        config.validate()
    }

    pub fn validate(self) -> Result<Self, SimError> {
        if !(self.frame_time.is_finite() && self.frame_time > 0.0) {
            return Err(SimError::Invalid(format!(
                "frame_time must be positive, got {}",
                self.frame_time
            )));
        }
        if self.gravity.iter().any(|g| !g.is_finite()) {
            return Err(SimError::Invalid("gravity must be finite".to_owned()));
        }
        Ok(self)
    }

    #[inline]
    pub fn gravity_vector(&self) -> Vector<f32> {
        vector(self.gravity)
    }
}
