/*!
Behavioral state machine.

Five mutually exclusive states map input events to per-frame speed contributions.
Transitions are a pure function of (state, event) or (state, controller queries):
- `on_action` reacts to a pressed/released action.
- `on_update` runs once per frame before the motion integrator.

States only talk to the controller through [`StateContext`]; they never touch the world.
*/

use std::fmt;
use std::str::FromStr;

use crate::config::MovementTuning;

/// Input actions understood by the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    MoveForward,
    MoveBackward,
    StrafeLeft,
    StrafeRight,
    Crouch,
    Jump,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::MoveForward,
        Action::MoveBackward,
        Action::StrafeLeft,
        Action::StrafeRight,
        Action::Crouch,
        Action::Jump,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::MoveForward => "move_forward",
            Action::MoveBackward => "move_backward",
            Action::StrafeLeft => "strafe_left",
            Action::StrafeRight => "strafe_right",
            Action::Crouch => "crouch",
            Action::Jump => "jump",
        }
    }

    #[inline]
    fn is_movement(&self) -> bool {
        matches!(
            self,
            Action::MoveForward | Action::MoveBackward | Action::StrafeLeft | Action::StrafeRight
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when an action name is not recognized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_owned()))
    }
}

/// Which movement keys are held while walking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WalkFlags {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

impl WalkFlags {
    #[inline]
    pub fn any(&self) -> bool {
        self.forward || self.backward || self.left || self.right
    }

    /// Record a movement key; non-movement actions are ignored.
    pub fn set(&mut self, action: Action, pressed: bool) {
        match action {
            Action::MoveForward => self.forward = pressed,
            Action::MoveBackward => self.backward = pressed,
            Action::StrafeLeft => self.left = pressed,
            Action::StrafeRight => self.right = pressed,
            Action::Crouch | Action::Jump => {}
        }
    }

    #[inline]
    fn axis(positive: bool, negative: bool) -> f32 {
        (positive as i8 - negative as i8) as f32
    }

    /// Forward and lateral speeds for the held keys.
    pub fn speeds(&self, tuning: &MovementTuning) -> (f32, f32) {
        (
            Self::axis(self.forward, self.backward) * tuning.walk_speed,
            Self::axis(self.right, self.left) * tuning.strafe_speed,
        )
    }
}

/// What a state may read from and write to its controller.
pub trait StateContext {
    fn is_jumping(&self) -> bool;
    fn is_falling(&self) -> bool;
    fn set_jumping(&mut self, jumping: bool);
    /// Add to this frame's forward, lateral and vertical speed accumulators.
    fn add_speed(&mut self, forward: f32, lateral: f32, vertical: f32);
    fn tuning(&self) -> &MovementTuning;
}

/// The active behavioral state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum BehaviorState {
    #[default]
    Idle,
    Crouching,
    Walking(WalkFlags),
    Jumping {
        /// Vertical speed still to be contributed; spent on the first update.
        remaining_impulse: f32,
    },
    Falling,
}

impl BehaviorState {
    pub fn name(&self) -> &'static str {
        match self {
            BehaviorState::Idle => "idle",
            BehaviorState::Crouching => "crouching",
            BehaviorState::Walking(_) => "walking",
            BehaviorState::Jumping { .. } => "jumping",
            BehaviorState::Falling => "falling",
        }
    }

    fn jumping() -> Self {
        BehaviorState::Jumping {
            remaining_impulse: 0.0,
        }
    }

    /// React to an input event. Returns the next state, or `None` to stay.
    ///
    /// Walking updates its held-key flags in place when no transition happens.
    pub fn on_action(&mut self, action: Action, pressed: bool) -> Option<BehaviorState> {
        match self {
            BehaviorState::Idle if pressed => match action {
                Action::Crouch => Some(BehaviorState::Crouching),
                Action::Jump => Some(BehaviorState::jumping()),
                movement if movement.is_movement() => {
                    let mut flags = WalkFlags::default();
                    flags.set(movement, true);
                    Some(BehaviorState::Walking(flags))
                }
                _ => None,
            },
            BehaviorState::Crouching if action == Action::Crouch && !pressed => {
                Some(BehaviorState::Idle)
            }
            BehaviorState::Walking(_) if action == Action::Jump && pressed => {
                Some(BehaviorState::jumping())
            }
            BehaviorState::Walking(flags) if action.is_movement() => {
                flags.set(action, pressed);
                (!flags.any()).then_some(BehaviorState::Idle)
            }
            _ => None,
        }
    }

    /// Contribute this frame's speeds and decide whether to leave the state.
    pub fn on_update<C: StateContext + ?Sized>(&mut self, ctx: &mut C) -> Option<BehaviorState> {
        match self {
            BehaviorState::Idle | BehaviorState::Crouching => None,
            BehaviorState::Walking(flags) => {
                let (forward, lateral) = flags.speeds(ctx.tuning());
                ctx.add_speed(forward, lateral, 0.0);
                None
            }
            BehaviorState::Jumping { remaining_impulse } => {
                ctx.add_speed(0.0, 0.0, *remaining_impulse);
                *remaining_impulse = 0.0;
                if !ctx.is_jumping() {
                    Some(BehaviorState::Idle)
                } else if ctx.is_falling() {
                    Some(BehaviorState::Falling)
                } else {
                    None
                }
            }
            BehaviorState::Falling => (!ctx.is_falling()).then_some(BehaviorState::Idle),
        }
    }

    pub fn on_enter<C: StateContext + ?Sized>(&mut self, ctx: &mut C) {
        if let BehaviorState::Jumping { remaining_impulse } = self {
            *remaining_impulse = ctx.tuning().jump_impulse;
            ctx.set_jumping(true);
        }
    }

    pub fn on_exit<C: StateContext + ?Sized>(&mut self, _ctx: &mut C) {}
}

/// Owns the active state and runs exit/enter hooks on transitions.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StateMachine {
    state: BehaviorState,
}

impl StateMachine {
    #[inline]
    pub fn current(&self) -> &BehaviorState {
        &self.state
    }

    /// Feed an input event. Returns `true` if the state changed.
    pub fn on_action<C: StateContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        action: Action,
        pressed: bool,
    ) -> bool {
        match self.state.on_action(action, pressed) {
            Some(next) => {
                self.transition(ctx, next);
                true
            }
            None => false,
        }
    }

    /// Per-frame tick. Returns `true` if the state changed.
    pub fn on_update<C: StateContext + ?Sized>(&mut self, ctx: &mut C) -> bool {
        match self.state.on_update(ctx) {
            Some(next) => {
                self.transition(ctx, next);
                true
            }
            None => false,
        }
    }

    fn transition<C: StateContext + ?Sized>(&mut self, ctx: &mut C, mut next: BehaviorState) {
        log::debug!("state {} -> {}", self.state.name(), next.name());
        self.state.on_exit(ctx);
        next.on_enter(ctx);
        self.state = next;
    }
}
