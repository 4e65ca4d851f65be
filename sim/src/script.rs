use crate::config::{ScriptedEvent, ScriptedInput};
use crate::error::SimError;
use crate::scheduler::Simulation;

/// Replays scripted inputs in frame order.
#[derive(Debug, Clone)]
pub struct Script {
    events: Vec<ScriptedInput>,
    cursor: usize,
}

impl Script {
    pub fn new(mut events: Vec<ScriptedInput>) -> Self {
        // Stable, so same-frame events keep their authored order.
        events.sort_by_key(|e| e.frame);
        Self { events, cursor: 0 }
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.events.len()
    }

    /// Apply every event scheduled at or before `frame`. Returns how many were applied.
    pub fn apply_due(&mut self, sim: &mut Simulation, frame: u64) -> Result<usize, SimError> {
        let mut applied = 0;
        while let Some(input) = self.events.get(self.cursor) {
            if input.frame > frame {
                break;
            }
            self.cursor += 1;

            let id = sim
                .find(&input.character)
                .ok_or_else(|| SimError::UnknownCharacter(input.character.clone()))?;
            match &input.event {
                ScriptedEvent::Press { action } => sim.send_action(id, action, true)?,
                ScriptedEvent::Release { action } => sim.send_action(id, action, false)?,
                ScriptedEvent::Turn { radians } => sim.turn(id, *radians)?,
                ScriptedEvent::Despawn => sim.despawn_character(id)?,
            }
            log::debug!("frame {frame}: {} <- {:?}", input.character, input.event);
            applied += 1;
        }
        Ok(applied)
    }
}
