//! Movement mode state machine.
//!
//! [`MovementModeController`] runs the solver for the active mode and
//! applies the side effects of every transition in one place. Solvers
//! never switch modes themselves; they return a [`PhysicsOutcome`] and the
//! dispatch loop hands the remaining time to the next mode's solver.

use glam::Vec3;

use crate::collision::{CapsuleShape, CollisionQuery, ContentFlags, FloorResult, HitResult};
use crate::math::{PlanarExt, MIN_TICK_TIME};

use super::air::AirVelocitySolver;
use super::config::MovementConfig;
use super::ground::{GroundVelocitySolver, VelocityInput};
use super::jump::JumpController;
use super::slide::{safe_move, SlideContext, SlopeDeflector};
use super::state::{ModeChange, MovementEvent, MovementFlags, MovementMode, MovementState};
use super::walking::WalkingSolver;

/// Per-tick facts shared by every solver.
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    pub shape: CapsuleShape,
    /// Max speed for the current modifiers, before analog scaling.
    pub max_speed: f32,
    /// Horizontal facing direction.
    pub facing: Vec3,
    /// Horizontal right direction.
    pub right: Vec3,
    /// Movement input in world space, unit length at most.
    pub input_vector: Vec3,
}

/// Iteration counters shared by all solvers during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulationBudget {
    pub iterations: u32,
    pub apex_attempts: u32,
}

/// How a solver pass ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhysicsOutcome {
    /// The time slice was consumed (or the iteration cap reached).
    Finished,
    /// Switch to `mode` and continue with `remaining` seconds.
    Transition { mode: MovementMode, remaining: f32 },
}

/// Drives the solvers for one character.
pub struct MovementModeController<'a, W: CollisionQuery + ?Sized> {
    config: &'a MovementConfig,
    world: &'a W,
    context: &'a TickContext,
    max_jump_time: f32,
}

impl<'a, W: CollisionQuery + ?Sized> MovementModeController<'a, W> {
    pub fn new(
        config: &'a MovementConfig,
        world: &'a W,
        context: &'a TickContext,
        max_jump_time: f32,
    ) -> Self {
        Self {
            config,
            world,
            context,
            max_jump_time,
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Switch modes and apply the transition side effects.
    ///
    /// Setting the current mode again does nothing.
    pub fn set_movement_mode(
        &self,
        state: &mut MovementState,
        new_mode: MovementMode,
        events: &mut Vec<MovementEvent>,
    ) {
        let previous = state.mode;
        if previous == new_mode {
            return;
        }
        state.mode = new_mode;

        if new_mode.is_moving_on_ground() {
            state.kinematic.velocity.z = 0.0;
            let walking = WalkingSolver::new(self.config, self.world, self.context);
            state.current_floor = walking.find_floor(state, state.position());
            walking.adjust_floor_height(state);
        } else {
            state.current_floor = FloorResult::none();
        }

        if new_mode.is_falling() && state.kinematic.velocity.z > 0.0 {
            state.flags.set(MovementFlags::NOTIFY_APEX, true);
        }

        JumpController::with_boost_window(self.config, self.max_jump_time)
            .on_mode_changed(&mut state.jump, new_mode);

        log::debug!("movement mode {:?} -> {:?}", previous, new_mode);
        events.push(MovementEvent::ModeChanged(ModeChange {
            previous,
            new: new_mode,
        }));
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Run physics for `delta_time`, following mode transitions until the
    /// time or the iteration budget runs out.
    pub fn start_new_physics(
        &self,
        state: &mut MovementState,
        delta_time: f32,
        budget: &mut SimulationBudget,
        events: &mut Vec<MovementEvent>,
    ) {
        let mut remaining = delta_time;
        loop {
            if remaining < MIN_TICK_TIME {
                break;
            }
            if budget.iterations >= self.config.max_simulation_iterations {
                log::trace!(
                    "iteration budget spent with {:.4}s left in {:?}",
                    remaining,
                    state.mode
                );
                break;
            }

            let outcome = match state.mode {
                MovementMode::Walking => WalkingSolver::new(self.config, self.world, self.context)
                    .phys_walking(state, remaining, budget),
                MovementMode::Falling => AirVelocitySolver::new(self.config, self.world, self.context)
                    .phys_falling(state, remaining, budget, events),
                MovementMode::Flying => self.phys_flying(state, remaining, budget),
                MovementMode::Swimming => self.phys_swimming(state, remaining, budget),
                MovementMode::Custom(_) => PhysicsOutcome::Finished,
            };

            match outcome {
                PhysicsOutcome::Finished => break,
                PhysicsOutcome::Transition { mode, remaining: left } => {
                    self.set_movement_mode(state, mode, events);
                    remaining = left;
                }
            }
        }
    }

    fn in_water(&self, position: Vec3) -> bool {
        self.world
            .contents_at(position, &self.context.shape)
            .intersects(ContentFlags::MASK_LIQUID)
    }

    fn fluid_velocity(
        &self,
        state: &mut MovementState,
        braking_deceleration: f32,
        delta_time: f32,
    ) {
        let step = GroundVelocitySolver::from_state(self.config, state).calc_velocity(&VelocityInput {
            velocity: state.kinematic.velocity,
            acceleration: state.kinematic.acceleration,
            facing: self.context.facing,
            max_speed: self.context.max_speed,
            analog_input_modifier: state.analog_input_modifier,
            friction: 0.5 * self.config.fluid_friction,
            braking_deceleration,
            fluid: true,
            delta_time,
        });
        state.kinematic.velocity = step.velocity;
        state.kinematic.acceleration = step.acceleration;
        state.analog_input_modifier = step.analog_input_modifier;
        state.limits = step.limits;
    }

    /// Slide the rest of a blocked move along the surface.
    fn slide_after_hit(&self, state: &mut MovementState, adjusted: Vec3, hit: &mut HitResult) {
        let deflector = SlopeDeflector::new(self.config, SlideContext::from_state(state));
        let normal = hit.normal;
        let mut position = state.position();
        deflector.slide_along_surface(
            self.world,
            &self.context.shape,
            &mut position,
            adjusted,
            1.0 - hit.time,
            normal,
            hit,
        );
        state.kinematic.position = position;
    }

    // ========================================================================
    // Flying and swimming
    // ========================================================================

    /// Free flight with fluid friction and no gravity.
    pub fn phys_flying(
        &self,
        state: &mut MovementState,
        delta_time: f32,
        budget: &mut SimulationBudget,
    ) -> PhysicsOutcome {
        if delta_time < MIN_TICK_TIME {
            return PhysicsOutcome::Finished;
        }
        budget.iterations += 1;

        if state.flags.cheat_flying() && state.kinematic.acceleration.is_nearly_zero(0.0) {
            state.kinematic.velocity = Vec3::ZERO;
        }
        self.fluid_velocity(state, self.config.braking_deceleration_flying, delta_time);

        let old_location = state.position();
        let adjusted = state.velocity() * delta_time;
        let mut position = old_location;
        let mut hit = safe_move(self.world, &self.context.shape, &mut position, adjusted);
        state.kinematic.position = position;

        if hit.time < 1.0 {
            log::trace!("flying impact normal={:?}", hit.normal);
            self.slide_after_hit(state, adjusted, &mut hit);
        }

        state.kinematic.velocity = (state.position() - old_location) / delta_time;
        PhysicsOutcome::Finished
    }

    /// Movement inside a liquid volume. Leaving the liquid starts a fall.
    pub fn phys_swimming(
        &self,
        state: &mut MovementState,
        delta_time: f32,
        budget: &mut SimulationBudget,
    ) -> PhysicsOutcome {
        if delta_time < MIN_TICK_TIME {
            return PhysicsOutcome::Finished;
        }
        budget.iterations += 1;

        self.fluid_velocity(state, self.config.braking_deceleration_swimming, delta_time);
        state.kinematic.velocity.z +=
            self.config.gravity_z * delta_time * (1.0 - self.config.buoyancy);

        let old_location = state.position();
        let adjusted = state.velocity() * delta_time;
        let mut position = old_location;
        let mut hit = safe_move(self.world, &self.context.shape, &mut position, adjusted);
        state.kinematic.position = position;

        if !self.in_water(position) {
            state.kinematic.velocity = (position - old_location) / delta_time;
            return PhysicsOutcome::Transition {
                mode: MovementMode::Falling,
                remaining: delta_time * (1.0 - hit.time),
            };
        }

        if hit.time < 1.0 {
            self.slide_after_hit(state, adjusted, &mut hit);
        }

        state.kinematic.velocity = (state.position() - old_location) / delta_time;
        PhysicsOutcome::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::CollisionWorld;

    fn context(config: &MovementConfig) -> TickContext {
        TickContext {
            shape: config.capsule(),
            max_speed: config.run_speed,
            facing: Vec3::X,
            right: -Vec3::Y,
            input_vector: Vec3::ZERO,
        }
    }

    fn floor_world() -> CollisionWorld {
        let mut world = CollisionWorld::new();
        world.add_box(Vec3::new(0.0, 0.0, -50.0), Vec3::new(2000.0, 2000.0, 50.0), ContentFlags::SOLID);
        world
    }

    #[test]
    fn test_entering_walking_finds_floor_and_zeroes_vertical() {
        let config = MovementConfig::default();
        let world = floor_world();
        let ctx = context(&config);
        let modes = MovementModeController::new(&config, &world, &ctx, config.max_jump_time());

        let mut state = MovementState::new(Vec3::new(0.0, 0.0, config.capsule_half_height + 2.0));
        state.kinematic.velocity = Vec3::new(100.0, 0.0, -300.0);
        let mut events = Vec::new();
        modes.set_movement_mode(&mut state, MovementMode::Walking, &mut events);

        assert_eq!(state.kinematic.velocity.z, 0.0);
        assert!(state.current_floor.is_walkable_floor());
        assert_eq!(
            events,
            vec![MovementEvent::ModeChanged(ModeChange {
                previous: MovementMode::Falling,
                new: MovementMode::Walking,
            })]
        );

        // Same mode again is silent
        modes.set_movement_mode(&mut state, MovementMode::Walking, &mut events);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_leaving_walking_clears_floor_and_arms_apex() {
        let config = MovementConfig::default();
        let world = floor_world();
        let ctx = context(&config);
        let modes = MovementModeController::new(&config, &world, &ctx, config.max_jump_time());

        let mut state = MovementState::new(Vec3::new(0.0, 0.0, config.capsule_half_height + 2.0));
        let mut events = Vec::new();
        modes.set_movement_mode(&mut state, MovementMode::Walking, &mut events);

        state.kinematic.velocity.z = 300.0;
        modes.set_movement_mode(&mut state, MovementMode::Falling, &mut events);

        assert!(!state.current_floor.blocking_hit);
        assert!(state.flags.has(MovementFlags::NOTIFY_APEX));
    }

    #[test]
    fn test_flying_ignores_gravity_and_slows() {
        let config = MovementConfig::default();
        let world = CollisionWorld::new();
        let ctx = context(&config);
        let modes = MovementModeController::new(&config, &world, &ctx, config.max_jump_time());

        let mut state = MovementState::new(Vec3::new(0.0, 0.0, 500.0));
        state.mode = MovementMode::Flying;
        state.kinematic.velocity = Vec3::new(200.0, 0.0, 0.0);
        let mut budget = SimulationBudget::default();

        let outcome = modes.phys_flying(&mut state, 0.1, &mut budget);

        assert_eq!(outcome, PhysicsOutcome::Finished);
        assert_eq!(budget.iterations, 1);
        assert!(state.velocity().x < 200.0 && state.velocity().x > 150.0, "got {:?}", state.velocity());
        assert!(state.velocity().z.abs() < 1.0e-3);
        assert!(state.position().x > 0.0);
    }

    #[test]
    fn test_swimming_out_of_water_falls() {
        let config = MovementConfig::default();
        let mut world = CollisionWorld::new();
        world.add_water_volume(Vec3::new(0.0, 0.0, 0.0), Vec3::new(200.0, 200.0, 200.0));
        let ctx = context(&config);
        let modes = MovementModeController::new(&config, &world, &ctx, config.max_jump_time());

        // Inside the water, drifting out through the top
        let mut state = MovementState::new(Vec3::new(0.0, 0.0, 260.0));
        state.mode = MovementMode::Swimming;
        state.kinematic.velocity = Vec3::new(0.0, 0.0, 400.0);
        let mut budget = SimulationBudget::default();

        let outcome = modes.phys_swimming(&mut state, 0.1, &mut budget);
        assert!(
            matches!(outcome, PhysicsOutcome::Transition { mode: MovementMode::Falling, .. }),
            "got {:?}",
            outcome
        );

        // Still submerged: stays swimming
        let mut state = MovementState::new(Vec3::ZERO);
        state.mode = MovementMode::Swimming;
        let outcome = modes.phys_swimming(&mut state, 0.1, &mut budget);
        assert_eq!(outcome, PhysicsOutcome::Finished);
    }

    #[test]
    fn test_dispatch_respects_iteration_budget() {
        let config = MovementConfig::default();
        let world = CollisionWorld::new();
        let ctx = context(&config);
        let modes = MovementModeController::new(&config, &world, &ctx, config.max_jump_time());

        let mut state = MovementState::new(Vec3::new(0.0, 0.0, 1000.0));
        let start = state.position();
        let mut budget = SimulationBudget {
            iterations: config.max_simulation_iterations,
            apex_attempts: 0,
        };
        let mut events = Vec::new();

        modes.start_new_physics(&mut state, 1.0 / 60.0, &mut budget, &mut events);
        assert_eq!(state.position(), start, "ran past the budget");
        assert!(events.is_empty());
    }

    #[test]
    fn test_custom_mode_is_not_simulated() {
        let config = MovementConfig::default();
        let world = CollisionWorld::new();
        let ctx = context(&config);
        let modes = MovementModeController::new(&config, &world, &ctx, config.max_jump_time());

        let mut state = MovementState::new(Vec3::new(0.0, 0.0, 1000.0));
        state.mode = MovementMode::Custom(3);
        state.kinematic.velocity = Vec3::new(0.0, 0.0, -500.0);
        let mut budget = SimulationBudget::default();
        let mut events = Vec::new();

        modes.start_new_physics(&mut state, 1.0 / 60.0, &mut budget, &mut events);
        assert_eq!(state.position(), Vec3::new(0.0, 0.0, 1000.0));
    }
}
