//! Hopline locomotion core
//!
//! A deterministic first-person character movement simulator: ground
//! acceleration and friction, air control, slope handling, step and ledge
//! detection, and jump boosting that stays stable across tick rates.
//!
//! # Architecture
//!
//! - **Collision**: the [`CollisionQuery`] interface the solvers consume, plus
//!   a parry3d-backed [`CollisionWorld`] for tests and tools
//! - **Movement**: solvers, the mode state machine and [`MovementController`]
//!
//! Units are centimetres and seconds with +Z up.

pub mod collision;
pub mod math;
pub mod movement;

// Re-export commonly used types
pub use collision::{
    CapsuleShape, CollisionQuery, CollisionWorld, ContentFlags, FloorResult, HitResult,
    PhysicalMaterial,
};
pub use movement::{
    CommandButtons, ConfigError, JumpBoostMode, MovementConfig, MovementController, MovementEvent,
    MovementFlags, MovementMode, MovementState, PlayerCommand, Setting,
};
