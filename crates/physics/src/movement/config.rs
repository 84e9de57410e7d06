//! Movement configuration.
//!
//! All locomotion tunables live in one plain record. Units are centimetres
//! and seconds with +Z up; the defaults reproduce the classic shooter feel
//! the solvers were tuned against.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collision::CapsuleShape;
use crate::math::MIN_TICK_TIME;

/// Errors from loading, validating or mutating a [`MovementConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse movement config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("unknown setting `{0}`")]
    UnknownSetting(String),

    #[error("bad value `{value}` for setting `{name}`")]
    BadValue { name: String, value: String },
}

/// When the takeoff speed boost is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JumpBoostMode {
    /// Never boost.
    Off,
    /// Boost along facing from the full input.
    #[default]
    Always,
    /// Boost only with the part of the input aligned with current velocity.
    AlignedOnly,
}

impl FromStr for JumpBoostMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "0" | "off" => Ok(Self::Off),
            "1" | "always" => Ok(Self::Always),
            "2" | "aligned" | "aligned_only" => Ok(Self::AlignedOnly),
            _ => Err(ConfigError::BadValue {
                name: "jump_boost".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Configuration for character locomotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    // ========================================================================
    // Capsule
    // ========================================================================
    /// Capsule radius.
    pub capsule_radius: f32,

    /// Distance from capsule centre to its top or bottom.
    pub capsule_half_height: f32,

    // ========================================================================
    // Speeds
    // ========================================================================
    /// Max speed while the walk modifier is held.
    pub walk_speed: f32,

    /// Default max speed.
    pub run_speed: f32,

    /// Max speed while sprinting.
    pub sprint_speed: f32,

    /// Max speed multiplier in unconstrained fly mode.
    pub cheat_fly_speed_scale: f32,

    /// Hard cap on each horizontal velocity component and on vertical speed.
    pub axis_speed_limit: f32,

    // ========================================================================
    // Acceleration
    // ========================================================================
    /// Magnitude of full-stick input acceleration.
    pub max_acceleration: f32,

    /// Acceleration multiplier on the ground.
    pub ground_acceleration_multiplier: f32,

    /// Acceleration multiplier in the air.
    pub air_acceleration_multiplier: f32,

    /// Target speed used in the add-speed formula while airborne.
    pub air_speed_cap: f32,

    /// Always accelerate at full magnitude along the best available direction.
    pub force_max_acceleration: bool,

    // ========================================================================
    // Friction and Braking
    // ========================================================================
    pub ground_friction: f32,

    /// Used instead of ground friction when `use_separate_braking_friction` is set.
    pub braking_friction: f32,

    pub use_separate_braking_friction: bool,

    /// Scales whichever friction feeds the braking pass.
    pub braking_friction_factor: f32,

    /// Preferred braking slice length (seconds).
    pub braking_sub_step_time: f32,

    /// Lower bound for the braking slice (seconds).
    pub min_braking_sub_step_time: f32,

    /// Upper bound for the braking slice (seconds).
    pub max_braking_sub_step_time: f32,

    pub braking_deceleration_walking: f32,
    pub braking_deceleration_falling: f32,
    pub braking_deceleration_flying: f32,
    pub braking_deceleration_swimming: f32,

    /// Lateral friction while falling.
    pub falling_lateral_friction: f32,

    /// Friction applied by liquids and while flying.
    pub fluid_friction: f32,

    /// 1.0 = neutral buoyancy in water, 0.0 = sinks at full gravity.
    pub buoyancy: f32,

    // ========================================================================
    // Steps and Floors
    // ========================================================================
    /// Step height at low speed.
    pub max_step_height: f32,

    /// Step height at or above `speed_mult_max`.
    pub min_step_height: f32,

    /// Horizontal speed where step/floor scaling begins.
    pub speed_mult_min: f32,

    /// Horizontal speed where step/floor scaling is complete.
    pub speed_mult_max: f32,

    /// Minimum floor normal Z to stand on (0.7 is roughly 45 degrees).
    pub walkable_floor_z: f32,

    /// Walkable floor Z at full speed scaling (near flat only).
    pub high_speed_walkable_floor_z: f32,

    /// Treat the capsule bottom as flat for landing checks.
    pub use_flat_base_for_floor_checks: bool,

    /// Below this friction-weighted ratio the character is sliding and may catch air.
    pub slide_limit: f32,

    /// Extra deflection off surfaces scaled by `1 - surface_friction`.
    pub bounce_multiplier: f32,

    /// Restrict movement to a plane with this normal.
    pub plane_constraint_normal: Option<Vec3>,

    // ========================================================================
    // Jumping
    // ========================================================================
    pub can_jump: bool,

    /// Vertical takeoff velocity.
    pub jump_z_velocity: f32,

    /// Vertical speed treated as jump-driven: caps landing deflection and
    /// forces full surface friction when exceeded.
    pub jump_threshold_velocity: f32,

    pub max_jump_count: u32,

    /// How long holding jump keeps the jump force active (seconds).
    pub jump_max_hold_time: f32,

    pub jump_boost: JumpBoostMode,

    /// Let boosts exceed the boosted speed cap.
    pub bunnyhop: bool,

    /// A held jump key re-presses every tick.
    pub auto_bunnyhop: bool,

    /// Apply gravity during the jump-force window.
    pub apply_gravity_while_jumping: bool,

    // ========================================================================
    // Falling
    // ========================================================================
    /// Gravity along Z (negative is down).
    pub gravity_z: f32,

    pub terminal_velocity: f32,

    /// Longest substep the falling and walking integrators take (seconds).
    pub max_simulation_time_step: f32,

    /// Substep budget per tick.
    pub max_simulation_iterations: u32,

    /// Apex refinements allowed per falling pass.
    pub max_jump_apex_attempts: u32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        let sprint_speed = 609.6;
        Self {
            // Capsule
            capsule_radius: 30.48,
            capsule_half_height: 68.58,

            // Speeds
            walk_speed: 285.75,
            run_speed: 361.9,
            sprint_speed,
            cheat_fly_speed_scale: 1.5,
            axis_speed_limit: 6667.5,

            // Acceleration
            max_acceleration: 857.25,
            ground_acceleration_multiplier: 10.0,
            air_acceleration_multiplier: 10.0,
            air_speed_cap: 57.15,
            force_max_acceleration: false,

            // Friction and braking
            ground_friction: 4.0,
            braking_friction: 4.0,
            use_separate_braking_friction: false,
            braking_friction_factor: 1.0,
            braking_sub_step_time: 0.015,
            min_braking_sub_step_time: 1.0 / 75.0,
            max_braking_sub_step_time: 1.0 / 20.0,
            braking_deceleration_walking: 190.5,
            braking_deceleration_falling: 0.0,
            braking_deceleration_flying: 190.5,
            braking_deceleration_swimming: 190.5,
            falling_lateral_friction: 0.0,
            fluid_friction: 0.3,
            buoyancy: 1.0,

            // Steps and floors
            max_step_height: 34.29,
            min_step_height: 10.0,
            speed_mult_min: sprint_speed * 1.7,
            speed_mult_max: sprint_speed * 2.5,
            walkable_floor_z: 0.7,
            high_speed_walkable_floor_z: 0.9848,
            use_flat_base_for_floor_checks: true,
            slide_limit: 0.5,
            bounce_multiplier: 0.0,
            plane_constraint_normal: None,

            // Jumping
            can_jump: true,
            jump_z_velocity: 304.8,
            jump_threshold_velocity: 266.0,
            max_jump_count: 1,
            jump_max_hold_time: 0.0,
            jump_boost: JumpBoostMode::Always,
            bunnyhop: false,
            auto_bunnyhop: true,
            apply_gravity_while_jumping: true,

            // Falling
            gravity_z: -1143.0,
            terminal_velocity: 4000.0,
            max_simulation_time_step: 0.5,
            max_simulation_iterations: 1,
            max_jump_apex_attempts: 2,
        }
    }
}

impl MovementConfig {
    /// Skill-movement preset: aligned-only boosting with uncapped bunnyhops.
    pub fn competitive() -> Self {
        Self {
            jump_boost: JumpBoostMode::AlignedOnly,
            bunnyhop: true,
            ..Default::default()
        }
    }

    /// Gentle preset: no takeoff boost, no held-key rejumps, finer substeps.
    pub fn casual() -> Self {
        Self {
            jump_boost: JumpBoostMode::Off,
            auto_bunnyhop: false,
            max_simulation_time_step: 0.05,
            max_simulation_iterations: 8,
            ..Default::default()
        }
    }

    /// Parse and validate a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Max speed for the current modifiers, before analog scaling.
    pub fn max_speed(&self, is_sprinting: bool, is_walking: bool, cheat_flying: bool) -> f32 {
        let speed = if is_sprinting {
            self.sprint_speed
        } else if is_walking {
            self.walk_speed
        } else {
            self.run_speed
        };

        if cheat_flying {
            speed * self.cheat_fly_speed_scale
        } else {
            speed
        }
    }

    pub fn capsule(&self) -> CapsuleShape {
        CapsuleShape::new(self.capsule_radius, self.capsule_half_height)
    }

    /// Braking slice length clamped to its configured bounds.
    pub fn braking_slice(&self) -> f32 {
        self.braking_sub_step_time
            .clamp(self.min_braking_sub_step_time, self.max_braking_sub_step_time)
    }

    /// Length of the next integration substep.
    ///
    /// Long remainders are halved (capped at `max_simulation_time_step`)
    /// unless this is the last allowed iteration, which takes everything.
    pub fn simulation_time_step(&self, remaining_time: f32, iterations: u32) -> f32 {
        let mut step = remaining_time;
        if remaining_time > self.max_simulation_time_step
            && iterations < self.max_simulation_iterations
        {
            step = self.max_simulation_time_step.min(remaining_time * 0.5);
        }
        step.max(MIN_TICK_TIME)
    }

    /// Estimated airtime of a plain jump, used to rate-limit takeoff boosts.
    pub fn max_jump_time(&self) -> f32 {
        if self.gravity_z >= 0.0 {
            return 0.0;
        }
        -4.0 * self.jump_z_velocity / (3.0 * self.gravity_z)
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        let positive = [
            ("capsule_radius", self.capsule_radius),
            ("capsule_half_height", self.capsule_half_height),
            ("walk_speed", self.walk_speed),
            ("run_speed", self.run_speed),
            ("sprint_speed", self.sprint_speed),
            ("cheat_fly_speed_scale", self.cheat_fly_speed_scale),
            ("axis_speed_limit", self.axis_speed_limit),
            ("max_acceleration", self.max_acceleration),
            ("braking_sub_step_time", self.braking_sub_step_time),
            ("min_braking_sub_step_time", self.min_braking_sub_step_time),
            ("max_simulation_time_step", self.max_simulation_time_step),
            ("terminal_velocity", self.terminal_velocity),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(field, format!("must be positive, got {value}")));
            }
        }

        let non_negative = [
            ("ground_acceleration_multiplier", self.ground_acceleration_multiplier),
            ("air_acceleration_multiplier", self.air_acceleration_multiplier),
            ("air_speed_cap", self.air_speed_cap),
            ("ground_friction", self.ground_friction),
            ("braking_friction", self.braking_friction),
            ("braking_friction_factor", self.braking_friction_factor),
            ("braking_deceleration_walking", self.braking_deceleration_walking),
            ("braking_deceleration_falling", self.braking_deceleration_falling),
            ("braking_deceleration_flying", self.braking_deceleration_flying),
            ("braking_deceleration_swimming", self.braking_deceleration_swimming),
            ("falling_lateral_friction", self.falling_lateral_friction),
            ("fluid_friction", self.fluid_friction),
            ("buoyancy", self.buoyancy),
            ("min_step_height", self.min_step_height),
            ("bounce_multiplier", self.bounce_multiplier),
            ("jump_z_velocity", self.jump_z_velocity),
            ("jump_threshold_velocity", self.jump_threshold_velocity),
            ("jump_max_hold_time", self.jump_max_hold_time),
            ("slide_limit", self.slide_limit),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(field, format!("must be zero or positive, got {value}")));
            }
        }

        if self.capsule_radius > self.capsule_half_height {
            return Err(invalid(
                "capsule_radius",
                "must not exceed capsule_half_height",
            ));
        }
        if self.min_braking_sub_step_time > self.max_braking_sub_step_time {
            return Err(invalid(
                "min_braking_sub_step_time",
                "must not exceed max_braking_sub_step_time",
            ));
        }
        if self.min_step_height > self.max_step_height {
            return Err(invalid("min_step_height", "must not exceed max_step_height"));
        }
        if self.speed_mult_min >= self.speed_mult_max {
            return Err(invalid("speed_mult_min", "must be below speed_mult_max"));
        }
        if !(self.walkable_floor_z > 0.0 && self.walkable_floor_z <= 1.0) {
            return Err(invalid("walkable_floor_z", "must be in (0, 1]"));
        }
        if !(self.high_speed_walkable_floor_z >= self.walkable_floor_z
            && self.high_speed_walkable_floor_z <= 1.0)
        {
            return Err(invalid(
                "high_speed_walkable_floor_z",
                "must be in [walkable_floor_z, 1]",
            ));
        }
        if self.max_jump_count == 0 {
            return Err(invalid("max_jump_count", "must be at least 1"));
        }
        if self.max_simulation_iterations == 0 {
            return Err(invalid("max_simulation_iterations", "must be at least 1"));
        }
        if !(self.gravity_z.is_finite() && self.gravity_z <= 0.0) {
            return Err(invalid("gravity_z", "must be zero or negative"));
        }
        if let Some(normal) = self.plane_constraint_normal {
            if normal.length_squared() < 1.0e-4 {
                return Err(invalid("plane_constraint_normal", "must not be zero"));
            }
        }

        Ok(())
    }
}

/// A single runtime change to the running configuration.
///
/// Parsed from `"<name> <value>"` lines such as `"jump_boost aligned"` or
/// `"bunnyhop 1"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Setting {
    JumpBoost(JumpBoostMode),
    Bunnyhop(bool),
    AutoBunnyhop(bool),
    GravityZ(f32),
    JumpZVelocity(f32),
    MaxJumpCount(u32),
    JumpMaxHoldTime(f32),
    AirSpeedCap(f32),
}

impl Setting {
    /// Apply to a copy of `config`, returning the validated result.
    pub fn applied_to(&self, config: &MovementConfig) -> Result<MovementConfig, ConfigError> {
        let mut next = config.clone();
        match *self {
            Self::JumpBoost(mode) => next.jump_boost = mode,
            Self::Bunnyhop(enabled) => next.bunnyhop = enabled,
            Self::AutoBunnyhop(enabled) => next.auto_bunnyhop = enabled,
            Self::GravityZ(value) => next.gravity_z = value,
            Self::JumpZVelocity(value) => next.jump_z_velocity = value,
            Self::MaxJumpCount(value) => next.max_jump_count = value,
            Self::JumpMaxHoldTime(value) => next.jump_max_hold_time = value,
            Self::AirSpeedCap(value) => next.air_speed_cap = value,
        }
        next.validate()?;
        Ok(next)
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" => Ok(true),
        "0" | "false" | "off" => Ok(false),
        _ => Err(ConfigError::BadValue {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::BadValue {
        name: name.to_string(),
        value: value.to_string(),
    })
}

impl FromStr for Setting {
    type Err = ConfigError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let value = parts.next().ok_or_else(|| ConfigError::BadValue {
            name: name.to_string(),
            value: String::new(),
        })?;

        match name {
            "jump_boost" => Ok(Self::JumpBoost(value.parse()?)),
            "bunnyhop" => Ok(Self::Bunnyhop(parse_flag(name, value)?)),
            "auto_bunnyhop" => Ok(Self::AutoBunnyhop(parse_flag(name, value)?)),
            "gravity_z" => Ok(Self::GravityZ(parse_number(name, value)?)),
            "jump_z_velocity" => Ok(Self::JumpZVelocity(parse_number(name, value)?)),
            "max_jump_count" => Ok(Self::MaxJumpCount(parse_number(name, value)?)),
            "jump_max_hold_time" => Ok(Self::JumpMaxHoldTime(parse_number(name, value)?)),
            "air_speed_cap" => Ok(Self::AirSpeedCap(parse_number(name, value)?)),
            _ => Err(ConfigError::UnknownSetting(name.to_string())),
        }
    }
}
