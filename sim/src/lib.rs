/*!
 * Host for many kinematic characters sharing one rapier world.
 *
 * [`Simulation`] owns the world and a rayon pool and steps every character in two
 * phases per frame. [`SimConfig`] describes the scene, and [`Script`] replays
 * timed inputs against it.
 */

pub mod config;
pub mod error;
pub mod scheduler;
pub mod script;

pub use config::{ScriptedEvent, ScriptedInput, SimConfig};
pub use error::SimError;
pub use scheduler::{CharacterId, FrameReport, Simulation};
pub use script::Script;
