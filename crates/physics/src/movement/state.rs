//! Movement state and input structures.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::collision::FloorResult;

use super::friction::SurfaceFrictionTracker;
use super::ground::SurfaceLimits;
use super::jump::{BoostState, JumpState};

/// Which solver drives the character.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementMode {
    /// Supported by a walkable floor.
    Walking,
    /// Airborne under gravity.
    #[default]
    Falling,
    /// Free flight without gravity.
    Flying,
    /// Inside a liquid volume.
    Swimming,
    /// Game-defined mode with its submode. Not simulated here.
    Custom(u8),
}

impl MovementMode {
    #[inline]
    pub fn is_moving_on_ground(self) -> bool {
        self == Self::Walking
    }

    #[inline]
    pub fn is_falling(self) -> bool {
        self == Self::Falling
    }
}

/// A transition between movement modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeChange {
    pub previous: MovementMode,
    pub new: MovementMode,
}

/// Notable things that happened during a tick, in order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MovementEvent {
    ModeChanged(ModeChange),
    /// A fresh takeoff was committed.
    Jumped { boosted: bool },
    /// Vertical velocity crossed from rising to falling.
    Apex,
    /// Touched down on a walkable floor with this velocity.
    Landed { impact_velocity: Vec3 },
    EnteredWater,
}

/// Flags describing the character's modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementFlags(pub u16);

impl MovementFlags {
    /// Sprint modifier held.
    pub const SPRINTING: u16 = 1 << 0;

    /// Walk modifier held.
    pub const WALKING: u16 = 1 << 1;

    /// Character is crouched.
    pub const CROUCHED: u16 = 1 << 2;

    /// Unconstrained flight (noclip-style fly mode).
    pub const CHEAT_FLYING: u16 = 1 << 3;

    /// Character can't move.
    pub const FROZEN: u16 = 1 << 4;

    /// Previous tick ended on the ground, so braking may apply.
    pub const BRAKING_FRAME_TOLERATED: u16 = 1 << 5;

    /// Report the next apex.
    pub const NOTIFY_APEX: u16 = 1 << 6;

    /// Check if a flag is set.
    #[inline]
    pub fn has(self, flag: u16) -> bool {
        (self.0 & flag) != 0
    }

    /// Set or clear a flag.
    #[inline]
    pub fn set(&mut self, flag: u16, value: bool) {
        if value {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
    }

    #[inline]
    pub fn sprinting(self) -> bool {
        self.has(Self::SPRINTING)
    }

    #[inline]
    pub fn walking(self) -> bool {
        self.has(Self::WALKING)
    }

    #[inline]
    pub fn crouched(self) -> bool {
        self.has(Self::CROUCHED)
    }

    #[inline]
    pub fn cheat_flying(self) -> bool {
        self.has(Self::CHEAT_FLYING)
    }

    #[inline]
    pub fn can_move(self) -> bool {
        !self.has(Self::FROZEN)
    }
}

/// Position, velocity and input acceleration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KinematicState {
    /// Capsule centre in world space.
    pub position: Vec3,

    /// Velocity in cm/s.
    pub velocity: Vec3,

    /// Input acceleration (horizontal by convention).
    pub acceleration: Vec3,
}

/// Complete locomotion state for one character.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementState {
    pub kinematic: KinematicState,

    /// View angles in radians: (pitch, yaw, roll). Yaw turns about +Z.
    pub view_angles: Vec3,

    pub mode: MovementMode,

    pub flags: MovementFlags,

    pub jump: JumpState,

    pub boost: BoostState,

    pub friction: SurfaceFrictionTracker,

    /// Floor under the character (only meaningful while walking).
    pub current_floor: FloorResult,

    /// Step height and walkable threshold after speed scaling.
    pub limits: SurfaceLimits,

    /// Magnitude of the last movement input, in [0, 1].
    pub analog_input_modifier: f32,

    /// Simulation clock in seconds.
    pub elapsed: f64,

    /// Mode requested from outside a tick, applied at the start of the next.
    pub pending_mode: Option<MovementMode>,
}

impl Default for MovementState {
    fn default() -> Self {
        Self {
            kinematic: KinematicState::default(),
            view_angles: Vec3::ZERO,
            mode: MovementMode::Falling,
            // Braking starts enabled so a spawn on the ground stops cleanly.
            flags: MovementFlags(MovementFlags::BRAKING_FRAME_TOLERATED),
            jump: JumpState::default(),
            boost: BoostState::default(),
            friction: SurfaceFrictionTracker::default(),
            current_floor: FloorResult::none(),
            limits: SurfaceLimits::default(),
            analog_input_modifier: 0.0,
            elapsed: 0.0,
            pending_mode: None,
        }
    }
}

impl MovementState {
    /// Create a new movement state at the given position.
    pub fn new(position: Vec3) -> Self {
        let mut state = Self::default();
        state.kinematic.position = position;
        state
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.kinematic.position
    }

    #[inline]
    pub fn velocity(&self) -> Vec3 {
        self.kinematic.velocity
    }

    /// Horizontal facing direction from yaw.
    pub fn forward_direction(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.view_angles.y.sin_cos();
        Vec3::new(cos_yaw, sin_yaw, 0.0)
    }

    /// Horizontal right direction from yaw.
    pub fn right_direction(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.view_angles.y.sin_cos();
        Vec3::new(sin_yaw, -cos_yaw, 0.0)
    }

    /// Current horizontal speed.
    pub fn horizontal_speed(&self) -> f32 {
        self.kinematic.velocity.truncate().length()
    }

    pub fn surface_friction(&self) -> f32 {
        self.friction.value()
    }
}

/// Input command from the player for a single tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerCommand {
    /// Movement intent: x = strafe right, y = forward. Each in [-1, 1].
    pub move_intent: Vec2,

    /// View delta this tick in radians: x = yaw (left positive), y = pitch.
    pub look_intent: Vec2,

    /// Button states.
    pub buttons: CommandButtons,
}

/// Button state flags for player commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandButtons(pub u16);

impl CommandButtons {
    pub const JUMP: u16 = 1 << 0;

    pub const SPRINT: u16 = 1 << 1;

    /// Walk (slow movement) button.
    pub const WALK: u16 = 1 << 2;

    pub const CROUCH: u16 = 1 << 3;

    /// Check if a button is pressed.
    #[inline]
    pub fn pressed(self, button: u16) -> bool {
        (self.0 & button) != 0
    }

    /// Press a button.
    #[inline]
    pub fn press(&mut self, button: u16) {
        self.0 |= button;
    }

    /// Release a button.
    #[inline]
    pub fn release(&mut self, button: u16) {
        self.0 &= !button;
    }
}

impl PlayerCommand {
    /// Command that only moves.
    pub fn moving(move_intent: Vec2) -> Self {
        Self {
            move_intent,
            ..Default::default()
        }
    }

    /// Same command with `button` held.
    pub fn with(mut self, button: u16) -> Self {
        self.buttons.press(button);
        self
    }

    #[inline]
    pub fn wants_jump(&self) -> bool {
        self.buttons.pressed(CommandButtons::JUMP)
    }

    #[inline]
    pub fn wants_sprint(&self) -> bool {
        self.buttons.pressed(CommandButtons::SPRINT)
    }

    #[inline]
    pub fn wants_walk(&self) -> bool {
        self.buttons.pressed(CommandButtons::WALK)
    }

    #[inline]
    pub fn wants_crouch(&self) -> bool {
        self.buttons.pressed(CommandButtons::CROUCH)
    }
}
