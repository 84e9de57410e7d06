//! Character movement controller.
//!
//! This is the main entry point for character movement. It turns one
//! [`PlayerCommand`] into jump bookkeeping, input acceleration and a pass of
//! the mode solvers against a [`CollisionQuery`] world.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use glam::Vec3;

use crate::collision::{CollisionQuery, FloorQuery};
use crate::math::{PlanarExt, MIN_TICK_TIME};

use super::config::{ConfigError, MovementConfig, Setting};
use super::friction::FrictionSample;
use super::jump::{JumpContext, JumpController, TakeoffContext};
use super::landing::{MAX_FLOOR_DIST, MIN_FLOOR_DIST};
use super::mode::{MovementModeController, SimulationBudget, TickContext};
use super::state::{MovementEvent, MovementFlags, MovementMode, MovementState, PlayerCommand};

/// Pitch stops just short of straight up or down.
const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.01;

/// How far below a spawn point to look for ground.
const SPAWN_FLOOR_SEARCH: f32 = 200.0;

/// Character movement controller.
///
/// Owns the configuration and the jump-boost airtime window derived from it.
/// All per-character data lives in [`MovementState`], so one controller can
/// drive any number of characters.
///
/// # Example
///
/// ```ignore
/// let mut controller = MovementController::new(MovementConfig::default());
/// let mut state = MovementState::new(spawn_position);
/// controller.spawn_at(&mut state, spawn_position, &world);
///
/// // Each tick:
/// let events = controller.update(&mut state, &command, &world, delta_time);
/// ```
#[derive(Debug, Clone)]
pub struct MovementController {
    config: MovementConfig,

    /// Boost rate-limit window, fixed from the config the controller was
    /// built with.
    max_jump_time: f32,
}

impl MovementController {
    pub fn new(config: MovementConfig) -> Self {
        let max_jump_time = config.max_jump_time();
        Self {
            config,
            max_jump_time,
        }
    }

    pub fn with_default_config() -> Self {
        Self::new(MovementConfig::default())
    }

    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    /// Airtime window used to rate-limit the takeoff boost.
    pub fn max_jump_time(&self) -> f32 {
        self.max_jump_time
    }

    // ========================================================================
    // Runtime configuration
    // ========================================================================

    /// Apply one runtime setting. Invalid results leave the config untouched.
    pub fn apply_setting(&mut self, setting: &Setting) -> Result<(), ConfigError> {
        let next = setting.applied_to(&self.config).map_err(|err| {
            log::warn!("rejected setting {:?}: {}", setting, err);
            err
        })?;
        log::debug!("applied setting {:?}", setting);
        self.config = next;
        Ok(())
    }

    /// Swap in a new configuration after validating it.
    ///
    /// The boost airtime window keeps its startup value.
    pub fn reload(&mut self, config: MovementConfig) -> Result<(), ConfigError> {
        if let Err(err) = config.validate() {
            log::warn!("rejected config reload: {}", err);
            return Err(err);
        }
        self.config = config;
        log::debug!("movement config reloaded");
        Ok(())
    }

    // ========================================================================
    // Outside requests
    // ========================================================================

    /// Place a character at `spawn_pos`, dropping it onto ground right below
    /// when there is some.
    pub fn spawn_at<W: CollisionQuery + ?Sized>(
        &self,
        state: &mut MovementState,
        spawn_pos: Vec3,
        world: &W,
    ) {
        let shape = self.config.capsule();
        let position = world.resolve_penetration(spawn_pos, &shape);
        state.kinematic.position = position;
        state.kinematic.velocity = Vec3::ZERO;

        let floor = world.find_floor(
            position,
            &shape,
            &FloorQuery {
                max_distance: SPAWN_FLOOR_SEARCH,
                walkable_floor_z: self.config.walkable_floor_z,
            },
        );

        if floor.is_walkable_floor() {
            let hover = 0.5 * (MIN_FLOOR_DIST + MAX_FLOOR_DIST);
            state.kinematic.position.z -= (floor.floor_distance - hover).max(0.0);
            state.pending_mode = Some(MovementMode::Walking);
            log::debug!("spawned on ground at {:?}", state.position());
        } else {
            state.pending_mode = Some(MovementMode::Falling);
            log::debug!("spawned in the air at {:?}", state.position());
        }
    }

    /// Ask for a mode change at the start of the next tick.
    pub fn request_mode(&self, state: &mut MovementState, mode: MovementMode) {
        state.pending_mode = Some(mode);
    }

    /// Throw the character with `velocity`. It falls from the next tick on.
    pub fn launch(&self, state: &mut MovementState, velocity: Vec3) {
        state.kinematic.velocity = velocity;
        state.pending_mode = Some(MovementMode::Falling);
        if velocity.z > 0.0 {
            state.flags.set(MovementFlags::NOTIFY_APEX, true);
        }
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advance one character by `delta_time` seconds.
    ///
    /// Returns what happened during the tick, in order.
    pub fn update<W: CollisionQuery + ?Sized>(
        &self,
        state: &mut MovementState,
        command: &PlayerCommand,
        world: &W,
        delta_time: f32,
    ) -> Vec<MovementEvent> {
        let mut events = Vec::new();
        if !state.flags.can_move() || delta_time < MIN_TICK_TIME {
            return events;
        }

        self.update_view_angles(state, command);
        self.update_modifiers(state, command);

        let context = self.tick_context(state, command);
        let modes = MovementModeController::new(&self.config, world, &context, self.max_jump_time);

        if let Some(mode) = state.pending_mode.take() {
            modes.set_movement_mode(state, mode, &mut events);
        }

        self.clamp_vertical_speed(state);

        state.kinematic.acceleration = context.input_vector * self.config.max_acceleration;
        state.analog_input_modifier = context.input_vector.length().min(1.0);

        // Jump
        let jumps = JumpController::with_boost_window(&self.config, self.max_jump_time);
        jumps.apply_key(&mut state.jump, command.wants_jump(), state.mode.is_falling());

        let jump_context = JumpContext {
            mode: state.mode,
            floor_normal_z: state.current_floor.impact_normal().z,
            walkable_floor_z: state.limits.walkable_floor_z,
            cheat_flying: state.flags.cheat_flying(),
        };
        let takeoff = TakeoffContext {
            now: state.elapsed,
            facing: context.facing,
            acceleration: state.kinematic.acceleration,
            max_speed: context.max_speed,
            sprinting: state.flags.sprinting(),
            crouched: state.flags.crouched(),
        };
        let mut velocity = state.velocity();
        let commit = jumps.check_jump_input(
            &mut state.jump,
            &mut state.boost,
            &jump_context,
            &takeoff,
            &mut velocity,
        );
        if commit.did_jump {
            state.kinematic.velocity = velocity;
            if commit.takeoff {
                events.push(MovementEvent::Jumped {
                    boosted: commit.boosted,
                });
            }
            modes.set_movement_mode(state, MovementMode::Falling, &mut events);
        }

        // Physics
        let mut budget = SimulationBudget::default();
        modes.start_new_physics(state, delta_time, &mut budget, &mut events);

        // Bookkeeping
        jumps.clear_jump_input(&mut state.jump, delta_time);
        self.clamp_vertical_speed(state);

        let floor = state.current_floor;
        state.friction.update(&FrictionSample {
            mode: state.mode,
            floor: &floor,
            vertical_velocity: state.kinematic.velocity.z,
            jump_threshold_velocity: self.config.jump_threshold_velocity,
            cheat_flying: state.flags.cheat_flying(),
        });
        state
            .flags
            .set(MovementFlags::BRAKING_FRAME_TOLERATED, state.mode == MovementMode::Walking);
        state.elapsed += f64::from(delta_time);

        events
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn update_view_angles(&self, state: &mut MovementState, command: &PlayerCommand) {
        state.view_angles.y += command.look_intent.x;
        state.view_angles.x = (state.view_angles.x + command.look_intent.y).clamp(-PITCH_LIMIT, PITCH_LIMIT);

        // Normalize yaw to -PI..PI
        while state.view_angles.y > PI {
            state.view_angles.y -= TAU;
        }
        while state.view_angles.y < -PI {
            state.view_angles.y += TAU;
        }
    }

    fn update_modifiers(&self, state: &mut MovementState, command: &PlayerCommand) {
        state.flags.set(MovementFlags::SPRINTING, command.wants_sprint());
        state.flags.set(MovementFlags::WALKING, command.wants_walk());
        state.flags.set(MovementFlags::CROUCHED, command.wants_crouch());
    }

    fn tick_context(&self, state: &MovementState, command: &PlayerCommand) -> TickContext {
        let facing = state.forward_direction();
        let right = state.right_direction();
        let input_vector = (facing * command.move_intent.y + right * command.move_intent.x)
            .clamped_to_max_size(1.0);

        TickContext {
            shape: self.config.capsule(),
            max_speed: self.config.max_speed(
                state.flags.sprinting(),
                state.flags.walking(),
                state.flags.cheat_flying(),
            ),
            facing,
            right,
            input_vector,
        }
    }

    fn clamp_vertical_speed(&self, state: &mut MovementState) {
        let limit = self.config.axis_speed_limit;
        state.kinematic.velocity.z = state.kinematic.velocity.z.clamp(-limit, limit);
    }
}

impl Default for MovementController {
    fn default() -> Self {
        Self::with_default_config()
    }
}
