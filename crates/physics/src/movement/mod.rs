//! Character locomotion.
//!
//! Classic first-person movement built from small solvers:
//!
//! - [`GroundVelocitySolver`]: acceleration, friction and braking on the ground
//! - [`AirVelocitySolver`]: substepped falling with wall deflection and apex detection
//! - [`SlopeDeflector`]: slides off walls and steep slopes
//! - [`LandingValidator`]: decides whether a hit is standable ground
//! - [`JumpController`]: jump eligibility, takeoff impulse and speed boost
//! - [`SurfaceFrictionTracker`]: friction scalar from the material underfoot
//! - [`MovementModeController`]: runs the active mode and applies transitions
//!
//! # Design
//!
//! [`MovementController`] owns the configuration and drives one tick: it
//! turns a [`PlayerCommand`] into jump bookkeeping and input acceleration,
//! then hands the [`MovementState`] to the mode controller. The solvers hold
//! no state of their own, so each can be driven directly in tests.

pub mod air;
pub mod config;
mod controller;
pub mod friction;
pub mod ground;
pub mod jump;
pub mod landing;
pub mod mode;
pub mod slide;
pub mod state;
pub mod walking;

pub use air::{new_fall_velocity, AirVelocitySolver};
pub use config::{ConfigError, JumpBoostMode, MovementConfig, Setting};
pub use controller::MovementController;
pub use friction::{FrictionSample, SurfaceFrictionTracker};
pub use ground::{GroundVelocitySolver, SurfaceLimits, VelocityInput, VelocityStep};
pub use jump::{BoostState, JumpCommit, JumpContext, JumpController, JumpState, TakeoffContext};
pub use landing::LandingValidator;
pub use mode::{MovementModeController, PhysicsOutcome, SimulationBudget, TickContext};
pub use slide::{safe_move, SlideContext, SlopeDeflector};
pub use state::{
    CommandButtons, KinematicState, ModeChange, MovementEvent, MovementFlags, MovementMode,
    MovementState, PlayerCommand,
};
pub use walking::WalkingSolver;
