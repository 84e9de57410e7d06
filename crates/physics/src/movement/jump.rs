//! Jump eligibility, takeoff impulse and the takeoff speed boost.
//!
//! The jump key goes through a small lifecycle each tick:
//!
//! 1. [`JumpController::apply_key`] turns the held key into press/release
//!    events (a held key re-presses every tick with auto-bunnyhop).
//! 2. [`JumpController::check_jump_input`] runs before physics and commits
//!    a jump when [`JumpController::can_jump`] allows it.
//! 3. [`JumpController::clear_jump_input`] runs after physics and ages the
//!    hold window.
//!
//! Regrounding resets the counters through
//! [`JumpController::on_mode_changed`].

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::math::{PlanarExt, SMALL_NUMBER};

use super::config::{JumpBoostMode, MovementConfig};
use super::state::MovementMode;

/// Angle (radians) past which backwards input counts as backpedalling.
const BACKPEDAL_ANGLE: f32 = 0.6981;

/// Boost fraction while sprinting or crouched.
const SLOW_BOOST_FRACTION: f32 = 0.1;

/// Boost fraction otherwise.
const BOOST_FRACTION: f32 = 0.5;

/// Jump bookkeeping for one character.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JumpState {
    /// Jump is requested this tick.
    pressed: bool,

    /// A jump was committed on the previous check.
    was_jumping: bool,

    /// Time the current press has been held.
    key_hold_time: f32,

    /// Remaining time the jump force keeps applying.
    force_time_remaining: f32,

    /// Jumps used since last grounded.
    current_count: u32,

    /// Jump count captured before the latest check.
    count_pre_jump: u32,

    /// Key state on the previous tick (for edge detection).
    prev_key_down: bool,
}

impl JumpState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn was_jumping(&self) -> bool {
        self.was_jumping
    }

    pub fn current_count(&self) -> u32 {
        self.current_count
    }

    pub fn count_before_last_check(&self) -> u32 {
        self.count_pre_jump
    }

    pub fn key_hold_time(&self) -> f32 {
        self.key_hold_time
    }

    pub fn force_time_remaining(&self) -> f32 {
        self.force_time_remaining
    }

    /// Spend up to `delta_time` of the jump-force window.
    ///
    /// Returns the time consumed and whether the window closed, in which
    /// case the jump state has been reset.
    pub fn consume_force_time(&mut self, delta_time: f32) -> (f32, bool) {
        if self.force_time_remaining <= 0.0 {
            return (0.0, false);
        }
        let spent = self.force_time_remaining.min(delta_time);
        self.force_time_remaining -= spent;
        if self.force_time_remaining <= 0.0 {
            self.reset(true);
            (spent, true)
        } else {
            (spent, false)
        }
    }

    /// Clear press and force state. The count survives while airborne.
    fn reset(&mut self, falling: bool) {
        self.pressed = false;
        self.was_jumping = false;
        self.key_hold_time = 0.0;
        self.force_time_remaining = 0.0;
        if !falling {
            self.current_count = 0;
        }
    }
}

/// Rate limiter for the takeoff boost.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoostState {
    /// Simulation time of the last boost, if any.
    last_boost_time: Option<f64>,
}

impl BoostState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_boost_time(&self) -> Option<f64> {
        self.last_boost_time
    }

    fn ready(&self, now: f64, window: f32) -> bool {
        self.last_boost_time
            .map_or(true, |last| now >= last + f64::from(window))
    }
}

/// Facts about the character that gate a jump.
#[derive(Debug, Clone, Copy)]
pub struct JumpContext {
    pub mode: MovementMode,
    /// Z of the current floor's impact normal (only read while walking).
    pub floor_normal_z: f32,
    /// Walkable threshold after speed scaling.
    pub walkable_floor_z: f32,
    pub cheat_flying: bool,
}

/// Inputs to the takeoff boost.
#[derive(Debug, Clone, Copy)]
pub struct TakeoffContext {
    /// Current simulation time (seconds).
    pub now: f64,
    /// Horizontal facing direction (unit length).
    pub facing: Vec3,
    /// Current input acceleration.
    pub acceleration: Vec3,
    pub max_speed: f32,
    pub sprinting: bool,
    pub crouched: bool,
}

/// What happened during a jump check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JumpCommit {
    /// A jump impulse was applied this tick; the mode must become Falling.
    pub did_jump: bool,
    /// This was a fresh takeoff (not a continued hold).
    pub takeoff: bool,
    /// The takeoff boost raised horizontal speed.
    pub boosted: bool,
}

/// Jump rules bound to a configuration.
#[derive(Debug, Clone, Copy)]
pub struct JumpController<'a> {
    config: &'a MovementConfig,
    /// Minimum spacing between takeoff boosts.
    max_jump_time: f32,
}

impl<'a> JumpController<'a> {
    pub fn new(config: &'a MovementConfig) -> Self {
        Self::with_boost_window(config, config.max_jump_time())
    }

    /// Use a precomputed boost window instead of deriving it from `config`.
    pub fn with_boost_window(config: &'a MovementConfig, max_jump_time: f32) -> Self {
        Self {
            config,
            max_jump_time,
        }
    }

    // ========================================================================
    // Input lifecycle
    // ========================================================================

    /// Translate the held key into press/release events.
    pub fn apply_key(&self, jump: &mut JumpState, key_down: bool, falling: bool) {
        let just_pressed = key_down && !jump.prev_key_down;
        let just_released = !key_down && jump.prev_key_down;
        jump.prev_key_down = key_down;

        if just_pressed || (key_down && self.config.auto_bunnyhop) {
            self.press(jump);
        } else if just_released {
            self.release(jump, falling);
        }
    }

    /// Request a jump.
    pub fn press(&self, jump: &mut JumpState) {
        jump.pressed = true;
        jump.key_hold_time = 0.0;
    }

    /// Stop requesting a jump.
    pub fn release(&self, jump: &mut JumpState, falling: bool) {
        jump.pressed = false;
        jump.reset(falling);
    }

    /// Pre-physics check: commit a jump if one is requested and allowed.
    ///
    /// On commit `velocity` carries the takeoff impulse (and boost). The
    /// caller switches the mode to Falling when `did_jump` is set.
    pub fn check_jump_input(
        &self,
        jump: &mut JumpState,
        boost: &mut BoostState,
        context: &JumpContext,
        takeoff: &TakeoffContext,
        velocity: &mut Vec3,
    ) -> JumpCommit {
        jump.count_pre_jump = jump.current_count;
        if !jump.pressed {
            return JumpCommit::default();
        }

        // Walking off a ledge spends the first jump.
        if jump.current_count == 0 && context.mode == MovementMode::Falling {
            jump.current_count += 1;
        }

        let did_jump = self.can_jump(jump, context) && self.do_jump(velocity, context);
        let mut commit = JumpCommit {
            did_jump,
            ..Default::default()
        };

        if did_jump && !jump.was_jumping {
            jump.current_count += 1;
            jump.force_time_remaining = self.config.jump_max_hold_time;
            commit.takeoff = true;
            commit.boosted = self.on_jumped(boost, takeoff, velocity);
            log::debug!(
                "jump committed: count={} velocity={:?} boosted={}",
                jump.current_count,
                velocity,
                commit.boosted
            );
        }
        jump.was_jumping = did_jump;

        commit
    }

    /// Post-physics bookkeeping for the hold window.
    pub fn clear_jump_input(&self, jump: &mut JumpState, delta_time: f32) {
        if jump.pressed {
            jump.key_hold_time += delta_time;
            // Keep the press alive while the hold window is open.
            if jump.key_hold_time >= self.config.jump_max_hold_time {
                jump.pressed = false;
            }
        } else {
            jump.force_time_remaining = 0.0;
            jump.was_jumping = false;
        }
    }

    /// Reset counters when the movement mode changes.
    pub fn on_mode_changed(&self, jump: &mut JumpState, new_mode: MovementMode) {
        let falling = new_mode == MovementMode::Falling;
        if !jump.pressed {
            jump.reset(falling);
        }
        if !falling {
            jump.current_count = 0;
            jump.key_hold_time = 0.0;
            jump.force_time_remaining = 0.0;
            jump.was_jumping = false;
        }
    }

    // ========================================================================
    // Rules
    // ========================================================================

    /// Whether a jump may be committed now.
    pub fn can_jump(&self, jump: &JumpState, context: &JumpContext) -> bool {
        let max_count = self.config.max_jump_count;
        let max_hold = self.config.jump_max_hold_time;
        let on_ground = context.mode == MovementMode::Walking;

        if !self.config.can_jump || !(on_ground || context.mode == MovementMode::Falling) {
            return false;
        }

        let mut allowed = if !jump.was_jumping || max_hold <= 0.0 {
            if jump.current_count == 0 && context.mode == MovementMode::Falling {
                jump.current_count + 1 < max_count
            } else {
                jump.current_count < max_count
            }
        } else {
            let key_held = jump.pressed && jump.key_hold_time < max_hold;
            key_held
                && (on_ground
                    || jump.current_count < max_count
                    || (jump.was_jumping && jump.current_count == max_count))
        };

        if on_ground {
            let floor_z = context.floor_normal_z;
            let walkable = context.walkable_floor_z;
            allowed &= floor_z >= walkable || (floor_z - walkable).abs() <= SMALL_NUMBER;
        }

        allowed
    }

    /// Apply the vertical takeoff impulse.
    pub fn do_jump(&self, velocity: &mut Vec3, context: &JumpContext) -> bool {
        if context.cheat_flying {
            return false;
        }
        if let Some(normal) = self.config.plane_constraint_normal {
            // No vertical freedom to jump with.
            if normal.safe_normal().z.abs() == 1.0 {
                return false;
            }
        }

        if velocity.z <= 0.0 {
            velocity.z = self.config.jump_z_velocity;
        } else {
            velocity.z += self.config.jump_z_velocity;
        }
        true
    }

    /// Takeoff speed boost along facing.
    ///
    /// Returns whether horizontal speed was raised. Speed is never reduced.
    pub fn on_jumped(
        &self,
        boost: &mut BoostState,
        takeoff: &TakeoffContext,
        velocity: &mut Vec3,
    ) -> bool {
        let mode = self.config.jump_boost;
        if mode == JumpBoostMode::Off || !boost.ready(takeoff.now, self.max_jump_time) {
            return false;
        }
        boost.last_boost_time = Some(takeoff.now);

        let facing = takeoff.facing;
        let mut input = takeoff.acceleration;
        if mode == JumpBoostMode::AlignedOnly {
            // Only boost input along the current heading.
            let alignment = input.safe_normal_2d().dot(velocity.safe_normal_2d());
            input *= alignment.max(0.0);
        }

        let forward_speed = input.dot(facing);
        let fraction = if takeoff.sprinting || takeoff.crouched {
            SLOW_BOOST_FRACTION
        } else {
            BOOST_FRACTION
        };
        let mut addition = (forward_speed * fraction).abs();
        let max_boosted_speed = takeoff.max_speed + takeoff.max_speed * fraction;
        let new_speed = addition + velocity.size_2d();
        let mut addition_unclamped = addition;

        if new_speed > max_boosted_speed {
            addition -= new_speed - max_boosted_speed;
        }

        if forward_speed < -self.config.max_acceleration * BACKPEDAL_ANGLE.sin() {
            addition = -addition;
            addition_unclamped = -addition_unclamped;
        }

        let mut boosted = *velocity + facing * addition;
        let mut boosted_size_sq = boosted.size_squared_2d();
        if self.config.bunnyhop {
            let unclamped = *velocity + facing * addition_unclamped;
            let unclamped_size_sq = unclamped.size_squared_2d();
            if unclamped_size_sq > boosted_size_sq {
                boosted = unclamped;
                boosted_size_sq = unclamped_size_sq;
            }
        }

        if velocity.size_squared_2d() < boosted_size_sq {
            log::trace!(
                "takeoff boost {:.1} -> {:.1}",
                velocity.size_2d(),
                boosted.size_2d()
            );
            *velocity = boosted;
            true
        } else {
            false
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn grounded() -> JumpContext {
        JumpContext {
            mode: MovementMode::Walking,
            floor_normal_z: 1.0,
            walkable_floor_z: 0.7,
            cheat_flying: false,
        }
    }

    fn airborne() -> JumpContext {
        JumpContext {
            mode: MovementMode::Falling,
            ..grounded()
        }
    }

    fn takeoff(now: f64, acceleration: Vec3, max_speed: f32) -> TakeoffContext {
        TakeoffContext {
            now,
            facing: Vec3::X,
            acceleration,
            max_speed,
            sprinting: false,
            crouched: false,
        }
    }

    fn boost_config(mode: JumpBoostMode, bunnyhop: bool) -> MovementConfig {
        MovementConfig {
            jump_boost: mode,
            bunnyhop,
            ..Default::default()
        }
    }

    #[test]
    fn test_basic_jump_sets_takeoff_velocity() {
        let config = MovementConfig::default();
        let controller = JumpController::new(&config);
        let mut jump = JumpState::new();
        let mut boost = BoostState::new();
        let mut velocity = Vec3::ZERO;

        controller.press(&mut jump);
        let commit = controller.check_jump_input(
            &mut jump,
            &mut boost,
            &grounded(),
            &takeoff(0.0, Vec3::ZERO, 361.9),
            &mut velocity,
        );

        assert!(commit.did_jump && commit.takeoff);
        assert_eq!(velocity.z, config.jump_z_velocity);
        assert_eq!(jump.current_count(), 1);
    }

    #[test]
    fn test_rising_jump_adds_velocity() {
        let config = MovementConfig::default();
        let controller = JumpController::new(&config);
        let mut velocity = Vec3::new(0.0, 0.0, 100.0);

        assert!(controller.do_jump(&mut velocity, &grounded()));
        assert_eq!(velocity.z, 100.0 + config.jump_z_velocity);
    }

    #[test]
    fn test_cheat_flying_and_vertical_plane_block_jump() {
        let mut config = MovementConfig::default();
        let controller = JumpController::new(&config);
        let mut velocity = Vec3::ZERO;
        let flying = JumpContext {
            cheat_flying: true,
            ..grounded()
        };
        assert!(!controller.do_jump(&mut velocity, &flying));

        config.plane_constraint_normal = Some(Vec3::Z);
        let controller = JumpController::new(&config);
        assert!(!controller.do_jump(&mut velocity, &grounded()));
        assert_eq!(velocity, Vec3::ZERO);
    }

    #[test]
    fn test_cannot_jump_after_budget_spent() {
        let config = MovementConfig::default();
        let controller = JumpController::new(&config);
        let mut jump = JumpState::new();
        let mut boost = BoostState::new();
        let mut velocity = Vec3::ZERO;

        controller.press(&mut jump);
        controller.check_jump_input(
            &mut jump,
            &mut boost,
            &grounded(),
            &takeoff(0.0, Vec3::ZERO, 361.9),
            &mut velocity,
        );
        controller.clear_jump_input(&mut jump, DT);

        // Now airborne with the single jump used
        assert!(!controller.can_jump(&jump, &airborne()));

        controller.press(&mut jump);
        let mut velocity = Vec3::new(0.0, 0.0, 200.0);
        let commit = controller.check_jump_input(
            &mut jump,
            &mut boost,
            &airborne(),
            &takeoff(0.1, Vec3::ZERO, 361.9),
            &mut velocity,
        );
        assert!(!commit.did_jump);
        assert_eq!(velocity.z, 200.0);
    }

    #[test]
    fn test_double_jump_with_larger_budget() {
        let config = MovementConfig {
            max_jump_count: 2,
            ..Default::default()
        };
        let controller = JumpController::new(&config);
        let mut jump = JumpState::new();
        let mut boost = BoostState::new();
        let mut velocity = Vec3::ZERO;

        controller.press(&mut jump);
        controller.check_jump_input(&mut jump, &mut boost, &grounded(), &takeoff(0.0, Vec3::ZERO, 361.9), &mut velocity);
        controller.release(&mut jump, true);

        assert!(controller.can_jump(&jump, &airborne()));
        controller.press(&mut jump);
        let commit = controller.check_jump_input(&mut jump, &mut boost, &airborne(), &takeoff(0.2, Vec3::ZERO, 361.9), &mut velocity);
        assert!(commit.did_jump);
        assert_eq!(jump.current_count(), 2);
        assert!(!controller.can_jump(&jump, &airborne()));
    }

    #[test]
    fn test_walking_off_ledge_spends_first_jump() {
        let config = MovementConfig {
            max_jump_count: 2,
            ..Default::default()
        };
        let controller = JumpController::new(&config);
        let mut jump = JumpState::new();
        let mut boost = BoostState::new();
        let mut velocity = Vec3::new(0.0, 0.0, -50.0);

        controller.press(&mut jump);
        let commit = controller.check_jump_input(&mut jump, &mut boost, &airborne(), &takeoff(0.0, Vec3::ZERO, 361.9), &mut velocity);

        assert!(commit.did_jump);
        assert_eq!(jump.current_count(), 2, "ledge fall plus the air jump");
        assert_eq!(velocity.z, config.jump_z_velocity);
    }

    #[test]
    fn test_steep_floor_blocks_jump() {
        let config = MovementConfig::default();
        let controller = JumpController::new(&config);
        let mut jump = JumpState::new();
        controller.press(&mut jump);

        let steep = JumpContext {
            floor_normal_z: 0.5,
            ..grounded()
        };
        assert!(!controller.can_jump(&jump, &steep));

        let boundary = JumpContext {
            floor_normal_z: 0.7,
            ..grounded()
        };
        assert!(controller.can_jump(&jump, &boundary));
    }

    #[test]
    fn test_hold_window_keeps_jump_force() {
        let config = MovementConfig {
            jump_max_hold_time: 0.1,
            ..Default::default()
        };
        let controller = JumpController::new(&config);
        let mut jump = JumpState::new();
        let mut boost = BoostState::new();
        let mut velocity = Vec3::ZERO;

        controller.apply_key(&mut jump, true, false);
        let commit = controller.check_jump_input(&mut jump, &mut boost, &grounded(), &takeoff(0.0, Vec3::ZERO, 361.9), &mut velocity);
        assert!(commit.takeoff);
        assert_eq!(jump.force_time_remaining(), 0.1);
        controller.clear_jump_input(&mut jump, DT);
        assert!(jump.is_pressed(), "hold window still open");

        // Held continuation does not count as a new takeoff
        let commit = controller.check_jump_input(&mut jump, &mut boost, &airborne(), &takeoff(DT as f64, Vec3::ZERO, 361.9), &mut velocity);
        assert!(commit.did_jump);
        assert!(!commit.takeoff);
        assert_eq!(jump.current_count(), 1);

        for _ in 0..10 {
            controller.clear_jump_input(&mut jump, DT);
        }
        assert!(!jump.is_pressed(), "hold window exhausted");
    }

    #[test]
    fn test_release_resets_and_regrounding_clears_count() {
        let config = MovementConfig::default();
        let controller = JumpController::new(&config);
        let mut jump = JumpState::new();
        let mut boost = BoostState::new();
        let mut velocity = Vec3::ZERO;

        controller.apply_key(&mut jump, true, false);
        controller.check_jump_input(&mut jump, &mut boost, &grounded(), &takeoff(0.0, Vec3::ZERO, 361.9), &mut velocity);
        controller.apply_key(&mut jump, false, true);
        assert!(!jump.is_pressed());
        assert_eq!(jump.current_count(), 1, "count survives while falling");

        controller.on_mode_changed(&mut jump, MovementMode::Walking);
        assert_eq!(jump.current_count(), 0);
        assert!(!jump.was_jumping());
    }

    #[test]
    fn test_held_key_without_auto_bunnyhop_presses_once() {
        let config = MovementConfig {
            auto_bunnyhop: false,
            ..Default::default()
        };
        let controller = JumpController::new(&config);
        let mut jump = JumpState::new();

        controller.apply_key(&mut jump, true, false);
        assert!(jump.is_pressed());
        controller.clear_jump_input(&mut jump, DT);
        assert!(!jump.is_pressed());

        controller.apply_key(&mut jump, true, false);
        assert!(!jump.is_pressed(), "held key must not re-press");
    }

    #[test]
    fn test_held_key_with_auto_bunnyhop_re_presses() {
        let config = MovementConfig::default();
        let controller = JumpController::new(&config);
        let mut jump = JumpState::new();

        controller.apply_key(&mut jump, true, false);
        controller.clear_jump_input(&mut jump, DT);
        controller.apply_key(&mut jump, true, false);
        assert!(jump.is_pressed());
    }

    #[test]
    fn test_consume_force_time_closes_window() {
        let mut jump = JumpState {
            force_time_remaining: 0.02,
            pressed: true,
            current_count: 1,
            ..Default::default()
        };

        let (spent, ended) = jump.consume_force_time(0.015);
        assert!((spent - 0.015).abs() < 1.0e-6);
        assert!(!ended);

        let (spent, ended) = jump.consume_force_time(0.015);
        assert!((spent - 0.005).abs() < 1.0e-6);
        assert!(ended);
        assert!(!jump.is_pressed());
        assert_eq!(jump.current_count(), 1);
    }

    // ========================================================================
    // Takeoff boost
    // ========================================================================

    #[test]
    fn test_boost_always_bounded_and_increasing() {
        let config = boost_config(JumpBoostMode::Always, false);
        let controller = JumpController::new(&config);
        let mut boost = BoostState::new();
        let max_speed = config.run_speed;
        let mut velocity = Vec3::new(200.0, 0.0, 0.0);

        let raised = controller.on_jumped(
            &mut boost,
            &takeoff(1.0, Vec3::new(config.max_acceleration, 0.0, 0.0), max_speed),
            &mut velocity,
        );

        assert!(raised);
        let speed = velocity.size_2d();
        assert!(speed > 200.0, "speed {speed}");
        assert!(speed <= max_speed * 1.5 + 1.0e-3, "speed {speed}");
    }

    #[test]
    fn test_boost_clamps_to_exact_cap_without_bunnyhop() {
        let config = boost_config(JumpBoostMode::Always, false);
        let controller = JumpController::new(&config);
        let mut boost = BoostState::new();
        let max_speed = config.run_speed;
        let mut velocity = Vec3::new(300.0, 0.0, 0.0);
        let acceleration = Vec3::new(config.max_acceleration, 0.0, 0.0);

        // 300 + 0.5 * 857.25 exceeds the cap, so the clamp engages
        controller.on_jumped(&mut boost, &takeoff(1.0, acceleration, max_speed), &mut velocity);

        let cap = max_speed + max_speed * 0.5;
        assert!((velocity.size_2d() - cap).abs() < 1.0e-3, "speed {}", velocity.size_2d());
    }

    #[test]
    fn test_bunnyhop_uses_unclamped_boost() {
        let config = boost_config(JumpBoostMode::Always, true);
        let controller = JumpController::new(&config);
        let mut boost = BoostState::new();
        let mut velocity = Vec3::new(300.0, 0.0, 0.0);
        let acceleration = Vec3::new(config.max_acceleration, 0.0, 0.0);

        controller.on_jumped(&mut boost, &takeoff(1.0, acceleration, config.run_speed), &mut velocity);

        let expected = 300.0 + config.max_acceleration * 0.5;
        assert!((velocity.x - expected).abs() < 1.0e-3, "speed {}", velocity.x);
    }

    #[test]
    fn test_boost_rate_limited_within_airtime() {
        let config = boost_config(JumpBoostMode::Always, false);
        let controller = JumpController::new(&config);
        let mut boost = BoostState::new();
        let acceleration = Vec3::new(config.max_acceleration, 0.0, 0.0);
        let mut velocity = Vec3::new(100.0, 0.0, 0.0);

        assert!(controller.on_jumped(&mut boost, &takeoff(1.0, acceleration, config.run_speed), &mut velocity));
        let after_first = velocity;

        let within = 1.0 + f64::from(config.max_jump_time()) * 0.5;
        assert!(!controller.on_jumped(&mut boost, &takeoff(within, acceleration, config.run_speed), &mut velocity));
        assert_eq!(velocity, after_first);
        assert_eq!(boost.last_boost_time(), Some(1.0));
    }

    #[test]
    fn test_boost_never_reduces_speed() {
        let config = boost_config(JumpBoostMode::Always, false);
        let controller = JumpController::new(&config);
        let mut boost = BoostState::new();
        let mut velocity = Vec3::new(900.0, 0.0, 0.0);
        let acceleration = Vec3::new(config.max_acceleration, 0.0, 0.0);

        let raised = controller.on_jumped(&mut boost, &takeoff(1.0, acceleration, config.run_speed), &mut velocity);

        assert!(!raised);
        assert_eq!(velocity, Vec3::new(900.0, 0.0, 0.0));
    }

    #[test]
    fn test_aligned_only_ignores_perpendicular_input() {
        let config = boost_config(JumpBoostMode::AlignedOnly, false);
        let controller = JumpController::new(&config);
        let mut boost = BoostState::new();
        // Moving sideways, pushing forward
        let mut velocity = Vec3::new(0.0, 200.0, 0.0);
        let acceleration = Vec3::new(config.max_acceleration, 0.0, 0.0);

        let raised = controller.on_jumped(&mut boost, &takeoff(1.0, acceleration, config.run_speed), &mut velocity);

        assert!(!raised);
        assert_eq!(velocity, Vec3::new(0.0, 200.0, 0.0));
    }

    #[test]
    fn test_backpedal_boosts_backwards() {
        let config = boost_config(JumpBoostMode::Always, false);
        let controller = JumpController::new(&config);
        let mut boost = BoostState::new();
        let mut velocity = Vec3::new(-150.0, 0.0, 0.0);
        let acceleration = Vec3::new(-config.max_acceleration, 0.0, 0.0);

        assert!(controller.on_jumped(&mut boost, &takeoff(1.0, acceleration, config.run_speed), &mut velocity));
        assert!(velocity.x < -150.0, "velocity {:?}", velocity);
    }

    #[test]
    fn test_boost_off_does_nothing() {
        let config = boost_config(JumpBoostMode::Off, true);
        let controller = JumpController::new(&config);
        let mut boost = BoostState::new();
        let mut velocity = Vec3::new(100.0, 0.0, 0.0);

        assert!(!controller.on_jumped(&mut boost, &takeoff(1.0, Vec3::new(800.0, 0.0, 0.0), 361.9), &mut velocity));
        assert_eq!(boost.last_boost_time(), None);
    }
}
