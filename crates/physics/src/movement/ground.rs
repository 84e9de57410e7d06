//! Velocity integration for supported and lateral movement.
//!
//! One formula serves walking, the lateral part of falling, flying and
//! swimming:
//!
//! 1. Optional forced full acceleration.
//! 2. Ground braking (sub-stepped) or fluid friction.
//! 3. Per-axis horizontal clamp.
//! 4. Veer / add-speed acceleration: speed along the wish direction is
//!    capped, heading changes are free.
//! 5. Speed scaling of step height and walkable slope.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::math::{lerp, PlanarExt, MIN_TICK_TIME, SMALL_NUMBER};

use super::config::MovementConfig;
use super::state::{MovementFlags, MovementMode, MovementState};

/// Velocities below this in every axis skip braking.
const BRAKING_MIN_VELOCITY: f32 = 0.1;

/// Speeds within this fraction above max are not treated as overspeed.
const MAX_SPEED_TOLERANCE: f32 = 1.01;

/// Step height and walkable slope after speed scaling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceLimits {
    pub step_height: f32,
    pub walkable_floor_z: f32,
}

impl SurfaceLimits {
    /// Unscaled limits.
    pub fn from_config(config: &MovementConfig) -> Self {
        Self {
            step_height: config.max_step_height,
            walkable_floor_z: config.walkable_floor_z,
        }
    }

    /// Limits for moving at `speed_2d`.
    ///
    /// Fast movement lowers the step height and tightens the walkable
    /// slope towards flat. On the ground the effect fades with surface
    /// friction, so only slippery floors feel it.
    pub fn scaled_for_speed(
        config: &MovementConfig,
        speed_2d: f32,
        falling: bool,
        surface_friction: f32,
    ) -> Self {
        let range = config.speed_mult_max - config.speed_mult_min;
        let alpha = ((speed_2d - config.speed_mult_min) / range).clamp(0.0, 1.0);
        let mut speed_mult = alpha * alpha;
        if !falling {
            speed_mult = ((1.0 - surface_friction) * speed_mult).max(0.0);
        }

        Self {
            step_height: lerp(config.max_step_height, config.min_step_height, speed_mult),
            walkable_floor_z: lerp(
                config.walkable_floor_z,
                config.high_speed_walkable_floor_z,
                speed_mult,
            ),
        }
    }
}

impl Default for SurfaceLimits {
    fn default() -> Self {
        Self::from_config(&MovementConfig::default())
    }
}

/// Per-call inputs to [`GroundVelocitySolver::calc_velocity`].
#[derive(Debug, Clone, Copy)]
pub struct VelocityInput {
    pub velocity: Vec3,
    /// Input acceleration, already clamped to max acceleration.
    pub acceleration: Vec3,
    /// Horizontal facing, used when forcing acceleration without input.
    pub facing: Vec3,
    /// Max speed for the current modifiers, before analog scaling.
    pub max_speed: f32,
    pub analog_input_modifier: f32,
    pub friction: f32,
    pub braking_deceleration: f32,
    /// Apply fluid friction instead of ground braking.
    pub fluid: bool,
    pub delta_time: f32,
}

/// Result of one velocity update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityStep {
    pub velocity: Vec3,
    /// Acceleration actually used (differs when forced to max).
    pub acceleration: Vec3,
    pub analog_input_modifier: f32,
    pub limits: SurfaceLimits,
}

/// Ground-style velocity solver bound to one character's situation.
#[derive(Debug, Clone, Copy)]
pub struct GroundVelocitySolver<'a> {
    config: &'a MovementConfig,
    mode: MovementMode,
    surface_friction: f32,
    braking_tolerated: bool,
    cheat_flying: bool,
    limits: SurfaceLimits,
}

impl<'a> GroundVelocitySolver<'a> {
    pub fn new(
        config: &'a MovementConfig,
        mode: MovementMode,
        surface_friction: f32,
        braking_tolerated: bool,
        cheat_flying: bool,
        limits: SurfaceLimits,
    ) -> Self {
        Self {
            config,
            mode,
            surface_friction,
            braking_tolerated,
            cheat_flying,
            limits,
        }
    }

    pub fn from_state(config: &'a MovementConfig, state: &MovementState) -> Self {
        Self::new(
            config,
            state.mode,
            state.friction.value(),
            state.flags.has(MovementFlags::BRAKING_FRAME_TOLERATED),
            state.flags.cheat_flying(),
            state.limits,
        )
    }

    /// Ground braking only runs when the previous tick also ended on the ground.
    #[inline]
    fn is_ground_move(&self) -> bool {
        self.mode.is_moving_on_ground() && self.braking_tolerated
    }

    fn clamp_axes(&self, velocity: Vec3) -> Vec3 {
        let limit = self.config.axis_speed_limit;
        Vec3::new(
            velocity.x.clamp(-limit, limit),
            velocity.y.clamp(-limit, limit),
            velocity.z,
        )
    }

    /// Compute the velocity after one tick of input and friction.
    pub fn calc_velocity(&self, input: &VelocityInput) -> VelocityStep {
        let mut step = VelocityStep {
            velocity: input.velocity,
            acceleration: input.acceleration,
            analog_input_modifier: input.analog_input_modifier,
            limits: self.limits,
        };
        let dt = input.delta_time;
        if dt < MIN_TICK_TIME {
            return step;
        }

        let friction = input.friction.max(0.0);
        let max_accel = self.config.max_acceleration;
        let mut velocity = input.velocity;
        let mut acceleration = input.acceleration;

        if self.config.force_max_acceleration {
            acceleration = if acceleration.length_squared() > SMALL_NUMBER {
                acceleration.safe_normal() * max_accel
            } else if velocity.length_squared() < SMALL_NUMBER {
                input.facing * max_accel
            } else {
                velocity.safe_normal() * max_accel
            };
            step.analog_input_modifier = 1.0;
        }

        let max_speed = (input.max_speed * step.analog_input_modifier).max(0.0);

        // ====================================================================
        // Friction
        // ====================================================================
        if self.is_ground_move() {
            let old_velocity = velocity;
            let exceeding = is_exceeding_max_speed(velocity, max_speed);
            let braking_friction = if self.config.use_separate_braking_friction {
                self.config.braking_friction
            } else {
                friction
            } * self.surface_friction;

            velocity = self.apply_velocity_braking(
                velocity,
                dt,
                braking_friction,
                input.braking_deceleration,
            );

            // Braking from overspeed while still pushing forward stops at max
            if exceeding
                && velocity.length_squared() < max_speed * max_speed
                && acceleration.dot(old_velocity) > 0.0
            {
                velocity = old_velocity.safe_normal() * max_speed;
            }
        } else if input.fluid {
            velocity *= 1.0 - (friction * dt).min(1.0);
        }

        velocity = self.clamp_axes(velocity);

        // ====================================================================
        // Acceleration
        // ====================================================================
        if self.cheat_flying {
            velocity = (velocity + acceleration * dt).clamped_to_max_size(max_speed);
        } else if !acceleration.is_nearly_zero(0.0) {
            let wish = acceleration.clamped_to_max_size_2d(max_speed);
            let wish_dir = wish.safe_normal_2d();
            let veer = velocity.dot(wish_dir);

            // The landing frame still accelerates under air rules
            let on_ground = self.is_ground_move();
            let wish_speed = if on_ground {
                wish.size_2d()
            } else {
                wish.clamped_to_max_size_2d(self.config.air_speed_cap).size_2d()
            };
            let add_speed = wish_speed - veer;

            if add_speed > 0.0 {
                let multiplier = if on_ground {
                    self.config.ground_acceleration_multiplier
                } else {
                    self.config.air_acceleration_multiplier
                };
                let added = (wish * multiplier * self.surface_friction * dt)
                    .clamped_to_max_size_2d(add_speed);
                velocity += added;
            }
        }

        velocity = self.clamp_axes(velocity);

        step.velocity = velocity;
        step.acceleration = acceleration;
        step.limits = SurfaceLimits::scaled_for_speed(
            self.config,
            velocity.size_2d(),
            self.mode.is_falling(),
            self.surface_friction,
        );
        step
    }

    /// Slow `velocity` by `friction x deceleration` in fixed slices.
    ///
    /// Never reverses direction: a slice that would cross zero stops dead.
    pub fn apply_velocity_braking(
        &self,
        velocity: Vec3,
        delta_time: f32,
        friction: f32,
        braking_deceleration: f32,
    ) -> Vec3 {
        if velocity.is_nearly_zero(BRAKING_MIN_VELOCITY) || delta_time < MIN_TICK_TIME {
            return velocity;
        }

        let friction = (friction * self.config.braking_friction_factor).max(0.0);
        let deceleration = braking_deceleration.max(velocity.size_2d());
        if friction.abs() < SMALL_NUMBER || deceleration == 0.0 {
            return velocity;
        }

        let old_velocity = velocity;
        let reverse = -velocity.safe_normal();
        let slice = self.config.braking_slice();

        let mut velocity = velocity;
        let mut remaining = delta_time;
        while remaining >= MIN_TICK_TIME {
            // Halve long remainders so the final slice is never tiny
            let delta = if remaining > slice {
                slice.min(remaining * 0.5)
            } else {
                remaining
            };
            remaining -= delta;

            velocity += reverse * (friction * deceleration * delta);
            if velocity.dot(old_velocity) <= 0.0 {
                return Vec3::ZERO;
            }
        }

        // Snap at the skip threshold so braking always ends at exactly zero
        if velocity.is_nearly_zero(BRAKING_MIN_VELOCITY) {
            return Vec3::ZERO;
        }
        velocity
    }
}

fn is_exceeding_max_speed(velocity: Vec3, max_speed: f32) -> bool {
    let max_speed = max_speed.max(0.0) * MAX_SPEED_TOLERANCE;
    velocity.length_squared() > max_speed * max_speed
}
