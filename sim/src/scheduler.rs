//! Two-phase character scheduler.
//!
//! A frame is:
//! 1. `world.step(dt)`: platforms move, collision structures refresh.
//! 2. Pre phase: every active controller runs `on_pre_update` on the worker pool.
//! 3. Barrier: pre-phase write-backs (velocities) are applied to the world.
//! 4. Post phase: every controller runs `on_post_update` on the worker pool.
//! 5. Post-phase write-backs (poses and velocities) are applied.
//!
//! Jobs only see a shared, read-only view of the world. Each job owns exactly one
//! controller, so no two jobs touch the same runtime state.

use std::fmt;

use controller::{
    BodyWriteback, Iso, PlayerConfiguration, PlayerController, RapierPhysicsWorld, RapierWorldView,
};
use rayon::prelude::*;

use crate::config::SimConfig;
use crate::error::SimError;

/// Stable identifier of a spawned character.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CharacterId(u32);

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct ActiveCharacter {
    id: CharacterId,
    name: String,
    controller: PlayerController,
}

/// Work summary of one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub frame: u64,
    pub characters: usize,
    pub sub_steps: u32,
    pub solver_sweeps: u32,
    /// Largest per-character sweep count this frame.
    pub max_solver_sweeps: u32,
    /// Write-backs that found their body missing.
    pub dropped_writebacks: usize,
}

pub struct Simulation {
    world: RapierPhysicsWorld,
    active: Vec<ActiveCharacter>,
    pool: rayon::ThreadPool,
    next_id: u32,
    frame: u64,
}

impl Simulation {
    /// Wrap `world` with a pool of `workers` threads (0 lets rayon decide).
    pub fn new(world: RapierPhysicsWorld, workers: usize) -> Result<Self, SimError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("character-job-{i}"))
            .build()?;
        log::info!("simulation ready with {} workers", pool.current_num_threads());
        Ok(Self {
            world,
            active: Vec::new(),
            pool,
            next_id: 0,
            frame: 0,
        })
    }

    /// Build the world, the platforms and the initial characters of `config`.
    pub fn from_config(config: &SimConfig) -> Result<Self, SimError> {
        let statics = config.statics.iter().map(|s| s.to_def()).collect();
        let mut world = RapierPhysicsWorld::build(statics, config.gravity_vector());
        for platform in &config.platforms {
            world.add_platform(&platform.to_def());
        }

        let mut sim = Self::new(world, config.workers)?;
        for spawn in &config.characters {
            let [x, y, z] = spawn.position;
            sim.spawn_character(&spawn.name, spawn.player, Iso::translation(x, y, z))?;
        }
        Ok(sim)
    }

    #[inline]
    pub fn world(&self) -> &RapierPhysicsWorld {
        &self.world
    }

    /// Frames stepped so far.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Validate `config`, insert a body for it and start scheduling its controller.
    pub fn spawn_character(
        &mut self,
        name: &str,
        config: PlayerConfiguration,
        pose: Iso,
    ) -> Result<CharacterId, SimError> {
        if self.find(name).is_some() {
            return Err(SimError::DuplicateCharacter(name.to_owned()));
        }
        let config = config.validate().map_err(|source| SimError::Player {
            name: name.to_owned(),
            source,
        })?;

        let body = self.world.add_character(&config, pose);
        let controller = PlayerController::new(body, config, pose, self.world.shape_cache())
            .map_err(|source| SimError::Player {
                name: name.to_owned(),
                source,
            })?;

        let id = CharacterId(self.next_id);
        self.next_id += 1;
        self.active.push(ActiveCharacter {
            id,
            name: name.to_owned(),
            controller,
        });
        log::info!("spawned `{name}` as {id} at {:?}", pose.translation.vector);
        Ok(id)
    }

    /// Stop scheduling a character and remove its body.
    pub fn despawn_character(&mut self, id: CharacterId) -> Result<(), SimError> {
        let index = self.index_of(id)?;
        let gone = self.active.remove(index);
        if !self.world.remove_body(gone.controller.body()) {
            log::error!("body of `{}` was already removed", gone.name);
        }
        log::info!("despawned `{}` ({id})", gone.name);
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<CharacterId> {
        self.active.iter().find(|c| c.name == name).map(|c| c.id)
    }

    pub fn controller(&self, id: CharacterId) -> Option<&PlayerController> {
        self.active
            .iter()
            .find(|c| c.id == id)
            .map(|c| &c.controller)
    }

    /// Every active character in spawn order.
    pub fn characters(&self) -> impl Iterator<Item = (CharacterId, &str, &PlayerController)> {
        self.active
            .iter()
            .map(|c| (c.id, c.name.as_str(), &c.controller))
    }

    /// Forward a named input action to a character.
    pub fn send_action(&mut self, id: CharacterId, action: &str, pressed: bool) -> Result<(), SimError> {
        let index = self.index_of(id)?;
        self.active[index].controller.on_action(action, pressed);
        Ok(())
    }

    pub fn turn(&mut self, id: CharacterId, delta: f32) -> Result<(), SimError> {
        let index = self.index_of(id)?;
        self.active[index].controller.on_turn(delta);
        Ok(())
    }

    fn index_of(&self, id: CharacterId) -> Result<usize, SimError> {
        self.active
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| SimError::UnknownCharacter(id.to_string()))
    }

    /// Run one job per active character on the pool and collect their write-backs.
    fn run_phase<F>(&mut self, dt: f32, job: F) -> Vec<BodyWriteback>
    where
        F: Fn(&mut PlayerController, &RapierWorldView<'_>, f32) -> BodyWriteback + Sync,
    {
        let view = self.world.view();
        let active = &mut self.active;
        self.pool.install(|| {
            active
                .par_iter_mut()
                .map(|c| job(&mut c.controller, &view, dt))
                .collect()
        })
    }

    /// Apply write-backs in character order. Returns how many found no body.
    fn apply(&mut self, writebacks: &[BodyWriteback]) -> usize {
        let mut dropped = 0;
        for writeback in writebacks {
            if !self.world.apply_writeback(writeback) {
                log::error!("body {:?} vanished before its write-back", writeback.body);
                dropped += 1;
            }
        }
        dropped
    }

    /// Advance every character by one frame.
    pub fn step(&mut self, dt: f32) -> FrameReport {
        self.world.step(dt);

        let pre = self.run_phase(dt, |c, world, dt| c.on_pre_update(world, dt));
        let mut dropped = self.apply(&pre);

        let post = self.run_phase(dt, |c, world, dt| c.on_post_update(world, dt));
        dropped += self.apply(&post);

        self.frame += 1;

        let mut report = FrameReport {
            frame: self.frame,
            characters: self.active.len(),
            dropped_writebacks: dropped,
            ..FrameReport::default()
        };
        for c in &self.active {
            let stats = c.controller.stats();
            report.sub_steps += stats.sub_steps;
            report.solver_sweeps += stats.solver_sweeps;
            report.max_solver_sweeps = report.max_solver_sweeps.max(stats.solver_sweeps);
        }
        log::debug!(
            "frame {}: {} characters, {} sub-steps, {} sweeps",
            report.frame,
            report.characters,
            report.sub_steps,
            report.solver_sweeps
        );
        report
    }
}
