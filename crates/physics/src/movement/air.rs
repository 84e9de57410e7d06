//! Falling integration.
//!
//! Each substep integrates lateral input with the ground formula (vertical
//! held), applies gravity, refines the apex, moves with the trapezoid of the
//! begin and end velocities and then resolves whatever the move hit:
//! landing, water, a deflecting wall or a two-wall crease.

use glam::Vec3;

use crate::collision::{CollisionQuery, ContentFlags, HitResult};
use crate::math::{PlanarExt, KINDA_SMALL_NUMBER, MIN_TICK_TIME};

use super::config::MovementConfig;
use super::ground::{GroundVelocitySolver, VelocityInput};
use super::landing::{LandingValidator, VERTICAL_SLOPE_NORMAL_Z};
use super::mode::{PhysicsOutcome, SimulationBudget, TickContext};
use super::slide::{safe_move, SlideContext, SlopeDeflector};
use super::state::{MovementEvent, MovementFlags, MovementMode, MovementState};

/// Shortest time-to-apex worth splitting a substep for.
const MIN_APEX_TIME: f32 = 1.0e-4;

/// Horizontal speeds with a squared size below this snap to zero.
const MIN_HORIZONTAL_SPEED_SQUARED: f32 = 1.0e-3;

/// Velocity after `delta_time` of `gravity`, clamped to terminal velocity
/// along gravity and to the axis limit vertically.
pub fn new_fall_velocity(config: &MovementConfig, velocity: Vec3, gravity: Vec3, delta_time: f32) -> Vec3 {
    let mut result = velocity;
    if delta_time > 0.0 {
        result += gravity * delta_time;

        let gravity_dir = gravity.safe_normal();
        let terminal = config.terminal_velocity;
        if result.dot(gravity_dir).abs() > terminal {
            result = result.plane_project(gravity_dir) + gravity_dir * terminal;
        }
    }

    let limit = config.axis_speed_limit;
    result.z = result.z.clamp(-limit, limit);
    result
}

/// Solver for [`MovementMode::Falling`].
pub struct AirVelocitySolver<'a, W: CollisionQuery + ?Sized> {
    config: &'a MovementConfig,
    world: &'a W,
    context: &'a TickContext,
}

impl<'a, W: CollisionQuery + ?Sized> AirVelocitySolver<'a, W> {
    pub fn new(config: &'a MovementConfig, world: &'a W, context: &'a TickContext) -> Self {
        Self {
            config,
            world,
            context,
        }
    }

    fn validator(&self, state: &MovementState) -> LandingValidator<'a> {
        LandingValidator::new(self.config, state.limits)
    }

    fn deflector(&self, state: &MovementState) -> SlopeDeflector<'a> {
        SlopeDeflector::new(self.config, SlideContext::from_state(state))
    }

    fn in_water(&self, position: Vec3) -> bool {
        self.world
            .contents_at(position, &self.context.shape)
            .intersects(ContentFlags::MASK_LIQUID)
    }

    fn is_valid_landing_spot(&self, state: &MovementState, hit: &HitResult, delta_time: f32) -> bool {
        self.validator(state).is_valid_landing_spot(
            self.world,
            &self.context.shape,
            state.position(),
            hit,
            state.velocity(),
            delta_time,
            &self.deflector(state),
        )
    }

    fn move_by(&self, state: &mut MovementState, delta: Vec3) -> HitResult {
        let mut position = state.position();
        let hit = safe_move(self.world, &self.context.shape, &mut position, delta);
        state.kinematic.position = position;
        hit
    }

    /// Touch down and hand the remaining time to the next mode.
    fn process_landed(
        &self,
        state: &MovementState,
        remaining: f32,
        events: &mut Vec<MovementEvent>,
    ) -> PhysicsOutcome {
        let impact_velocity = state.velocity();
        log::debug!("landed at {:?} with velocity {:?}", state.position(), impact_velocity);
        events.push(MovementEvent::Landed { impact_velocity });

        let mode = if self.in_water(state.position()) {
            MovementMode::Swimming
        } else {
            MovementMode::Walking
        };
        PhysicsOutcome::Transition { mode, remaining }
    }

    /// Fall for up to `delta_time`.
    pub fn phys_falling(
        &self,
        state: &mut MovementState,
        delta_time: f32,
        budget: &mut SimulationBudget,
        events: &mut Vec<MovementEvent>,
    ) -> PhysicsOutcome {
        if delta_time < MIN_TICK_TIME {
            return PhysicsOutcome::Finished;
        }

        let fall_acceleration = state
            .kinematic
            .acceleration
            .horizontal()
            .clamped_to_max_size(self.config.max_acceleration);
        let gravity = Vec3::Z * self.config.gravity_z;

        let mut remaining = delta_time;
        while remaining >= MIN_TICK_TIME && budget.iterations < self.config.max_simulation_iterations {
            budget.iterations += 1;
            let mut time_tick = self.config.simulation_time_step(remaining, budget.iterations);
            remaining -= time_tick;

            let old_velocity = state.velocity();

            // ================================================================
            // Velocity
            // ================================================================
            let mut lateral = old_velocity;
            lateral.z = 0.0;
            let step = GroundVelocitySolver::from_state(self.config, state).calc_velocity(&VelocityInput {
                velocity: lateral,
                acceleration: fall_acceleration,
                facing: self.context.facing,
                max_speed: self.context.max_speed,
                analog_input_modifier: state.analog_input_modifier,
                friction: self.config.falling_lateral_friction,
                braking_deceleration: self.config.braking_deceleration_falling,
                fluid: false,
                delta_time: time_tick,
            });
            let mut velocity = step.velocity;
            velocity.z = old_velocity.z;
            state.analog_input_modifier = step.analog_input_modifier;
            state.limits = step.limits;

            // Jump force window decides how much of the tick sees gravity
            let (force_time, ending_jump_force) = state.jump.consume_force_time(time_tick);
            let gravity_time = if force_time > 0.0 && !self.config.apply_gravity_while_jumping {
                (time_tick - force_time).max(0.0)
            } else {
                time_tick
            };
            velocity = new_fall_velocity(self.config, velocity, gravity, gravity_time);

            // Split the substep at the apex
            if old_velocity.z > 0.0
                && velocity.z <= 0.0
                && budget.apex_attempts < self.config.max_jump_apex_attempts
            {
                let derived_accel = (velocity - old_velocity) / time_tick;
                if derived_accel.z.abs() > KINDA_SMALL_NUMBER {
                    let time_to_apex = -old_velocity.z / derived_accel.z;
                    if (MIN_APEX_TIME..time_tick).contains(&time_to_apex) {
                        velocity = old_velocity + derived_accel * time_to_apex;
                        velocity.z = 0.0;

                        remaining += time_tick - time_to_apex;
                        time_tick = time_to_apex;
                        budget.iterations = budget.iterations.saturating_sub(1);
                        budget.apex_attempts += 1;
                        log::trace!("apex split at {:.4}s", time_to_apex);
                    }
                }
            }
            state.kinematic.velocity = velocity;

            if state.flags.has(MovementFlags::NOTIFY_APEX) && velocity.z < 0.0 {
                state.flags.set(MovementFlags::NOTIFY_APEX, false);
                log::debug!("apex at z={:.2}", state.position().z);
                events.push(MovementEvent::Apex);
            }

            // ================================================================
            // Move
            // ================================================================
            let mut adjusted = 0.5 * (old_velocity + velocity) * time_tick;
            if ending_jump_force && !self.config.apply_gravity_while_jumping {
                let non_gravity_time = (time_tick - gravity_time).max(0.0);
                adjusted = old_velocity * non_gravity_time + 0.5 * (old_velocity + velocity) * gravity_time;
            }

            let mut hit = self.move_by(state, adjusted);
            let mut sub_remaining = time_tick * (1.0 - hit.time);

            if self.in_water(state.position()) {
                remaining += sub_remaining;
                log::debug!("entered water at {:?}", state.position());
                events.push(MovementEvent::EnteredWater);
                return PhysicsOutcome::Transition {
                    mode: MovementMode::Swimming,
                    remaining,
                };
            }

            if hit.blocking_hit {
                if self.is_valid_landing_spot(state, &hit, time_tick) {
                    remaining += sub_remaining;
                    return self.process_landed(state, remaining, events);
                }

                // Edge hits may still stand on a floor a probe can see
                let validator = self.validator(state);
                if !hit.start_penetrating
                    && validator.should_check_for_valid_landing_spot(state.position(), &hit, &self.context.shape)
                {
                    let floor = self.world.find_floor(
                        state.position(),
                        &self.context.shape,
                        &validator.floor_query(false),
                    );
                    if floor.is_walkable_floor() && self.is_valid_landing_spot(state, &floor.hit, time_tick) {
                        remaining += sub_remaining;
                        return self.process_landed(state, remaining, events);
                    }
                }

                log::trace!("air impact normal={:?} time={:.3}", hit.normal, hit.time);

                let old_hit_normal = hit.normal;
                let old_hit_impact_normal = hit.impact_normal;
                let deflector = self.deflector(state);
                let mut delta = deflector.compute_slide_vector(adjusted, 1.0 - hit.time, old_hit_normal, &hit);

                // Velocity follows the deflected end velocity
                let delta_step =
                    deflector.compute_slide_vector(state.velocity() * time_tick, 1.0 - hit.time, old_hit_normal, &hit);
                if sub_remaining > KINDA_SMALL_NUMBER {
                    state.kinematic.velocity = delta_step / sub_remaining;
                }

                if old_hit_normal.z > VERTICAL_SLOPE_NORMAL_Z {
                    state.friction.set_sliding(true);
                }

                if sub_remaining > KINDA_SMALL_NUMBER && delta.dot(adjusted) > 0.0 {
                    hit = self.move_by(state, delta);

                    if hit.blocking_hit {
                        let last_move_time_slice = sub_remaining;
                        sub_remaining *= 1.0 - hit.time;

                        if self.is_valid_landing_spot(state, &hit, last_move_time_slice) {
                            remaining += sub_remaining;
                            return self.process_landed(state, remaining, events);
                        }

                        delta = self.deflector(state).two_wall_adjust(delta, &hit, old_hit_normal);
                        if sub_remaining > KINDA_SMALL_NUMBER {
                            state.kinematic.velocity = delta / sub_remaining;
                        }

                        // Straddling two slopes, neither standable
                        let ditch = old_hit_impact_normal.z > 0.0
                            && hit.impact_normal.z > 0.0
                            && delta.z.abs() <= KINDA_SMALL_NUMBER
                            && hit.impact_normal.dot(old_hit_impact_normal) < 0.0;

                        hit = self.move_by(state, delta);
                        if hit.time == 0.0 {
                            // Stuck: side-step out of the crease
                            let mut side_delta = (old_hit_normal + hit.impact_normal).safe_normal_2d();
                            if side_delta.is_nearly_zero(KINDA_SMALL_NUMBER) {
                                side_delta = Vec3::new(old_hit_normal.y, -old_hit_normal.x, 0.0).safe_normal();
                            }
                            hit = self.move_by(state, side_delta);
                        }

                        if ditch || self.is_valid_landing_spot(state, &hit, last_move_time_slice) || hit.time == 0.0 {
                            log::trace!("forced landing (ditch={})", ditch);
                            return self.process_landed(state, 0.0, events);
                        }
                    }
                }
            }

            if state.kinematic.velocity.size_squared_2d() <= MIN_HORIZONTAL_SPEED_SQUARED {
                state.kinematic.velocity.x = 0.0;
                state.kinematic.velocity.y = 0.0;
            }
        }

        PhysicsOutcome::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::CollisionWorld;
    use crate::movement::jump::JumpController;

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

    fn airborne(z: f32, velocity: Vec3) -> MovementState {
        let mut state = MovementState::new(Vec3::new(0.0, 0.0, z));
        state.mode = MovementMode::Falling;
        state.kinematic.velocity = velocity;
        state
    }

    #[test]
    fn test_new_fall_velocity_clamps_terminal() {
        let config = MovementConfig::default();
        let gravity = Vec3::Z * config.gravity_z;

        let velocity = new_fall_velocity(&config, Vec3::new(50.0, 0.0, -3990.0), gravity, 0.1);
        assert!((velocity.z + config.terminal_velocity).abs() < 1.0e-3, "got {:?}", velocity);
        assert_eq!(velocity.x, 50.0);

        let velocity = new_fall_velocity(&config, Vec3::new(0.0, 0.0, 100.0), gravity, 0.1);
        assert!((velocity.z - (100.0 - 114.3)).abs() < 1.0e-3);
    }

    #[test]
    fn test_apex_fires_once_and_continues_down() {
        let config = MovementConfig::default();
        let world = CollisionWorld::new();
        let ctx = context(&config);
        let solver = AirVelocitySolver::new(&config, &world, &ctx);

        let mut state = airborne(1000.0, Vec3::new(0.0, 0.0, 100.0));
        state.flags.set(MovementFlags::NOTIFY_APEX, true);
        let mut budget = SimulationBudget::default();
        let mut events = Vec::new();

        let outcome = solver.phys_falling(&mut state, 0.2, &mut budget, &mut events);

        assert_eq!(outcome, PhysicsOutcome::Finished);
        assert_eq!(events, vec![MovementEvent::Apex]);
        assert!(state.velocity().z < 0.0);
        assert_eq!(budget.apex_attempts, 1);
        // The apex split spent one extra pass without using the budget
        assert_eq!(budget.iterations, 1);

        // Peak height is v^2 / 2g above the start
        let peak = 1000.0 + 100.0 * 100.0 / (2.0 * 1143.0);
        assert!(state.position().z < peak);
        assert!(state.position().z > 1000.0 - 10.0);
    }

    #[test]
    fn test_falls_onto_floor_and_lands() {
        let config = MovementConfig::default();
        let world = floor_world();
        let ctx = context(&config);
        let solver = AirVelocitySolver::new(&config, &world, &ctx);

        let mut state = airborne(config.capsule_half_height + 5.0, Vec3::new(0.0, 0.0, -400.0));
        let mut budget = SimulationBudget::default();
        let mut events = Vec::new();

        let outcome = solver.phys_falling(&mut state, 0.1, &mut budget, &mut events);

        match outcome {
            PhysicsOutcome::Transition { mode, remaining } => {
                assert_eq!(mode, MovementMode::Walking);
                assert!(remaining > 0.0 && remaining < 0.1, "remaining {}", remaining);
            }
            other => panic!("expected a landing, got {:?}", other),
        }
        assert!(matches!(events.as_slice(), [MovementEvent::Landed { impact_velocity }] if impact_velocity.z < 0.0));
        assert!(state.position().z >= config.capsule_half_height - 0.01);
    }

    #[test]
    fn test_wall_deflects_and_keeps_falling() {
        let config = MovementConfig::default();
        let mut world = CollisionWorld::new();
        world.add_box(Vec3::new(100.0, 0.0, 0.0), Vec3::new(10.0, 1000.0, 1000.0), ContentFlags::SOLID);
        let ctx = context(&config);
        let solver = AirVelocitySolver::new(&config, &world, &ctx);

        let mut state = airborne(0.0, Vec3::new(600.0, 300.0, 0.0));
        let mut budget = SimulationBudget::default();
        let mut events = Vec::new();

        let outcome = solver.phys_falling(&mut state, 0.2, &mut budget, &mut events);

        assert_eq!(outcome, PhysicsOutcome::Finished);
        assert!(events.is_empty());
        assert!(state.position().x < 90.0 - config.capsule_radius + 0.5, "through the wall: {:?}", state.position());
        assert!(state.velocity().x.abs() < 1.0, "still pushing into the wall: {:?}", state.velocity());
        assert!(state.velocity().y > 0.0);
        assert!(state.position().y > 0.0);
        // Vertical walls do not count as slope slides
        assert!(!state.friction.is_sliding());
    }

    #[test]
    fn test_steep_slope_sets_sliding() {
        let config = MovementConfig::default();
        let mut world = CollisionWorld::new();
        // 60 degree slope rising towards +X, too steep to stand on
        world.add_oriented_box(
            Vec3::new(300.0, 0.0, 0.0),
            Vec3::new(400.0, 400.0, 20.0),
            glam::Quat::from_rotation_y(-60.0_f32.to_radians()),
            ContentFlags::SOLID,
            None,
        );
        let ctx = context(&config);
        let solver = AirVelocitySolver::new(&config, &world, &ctx);

        let mut state = airborne(200.0, Vec3::new(800.0, 0.0, -200.0));
        for _ in 0..20 {
            let mut budget = SimulationBudget::default();
            let mut events = Vec::new();
            solver.phys_falling(&mut state, 1.0 / 30.0, &mut budget, &mut events);
        }

        assert!(state.friction.is_sliding());
    }

    #[test]
    fn test_entering_water_switches_to_swimming() {
        let config = MovementConfig::default();
        let mut world = CollisionWorld::new();
        world.add_water_volume(Vec3::new(0.0, 0.0, 0.0), Vec3::new(500.0, 500.0, 100.0));
        let ctx = context(&config);
        let solver = AirVelocitySolver::new(&config, &world, &ctx);

        let mut state = airborne(180.0, Vec3::new(0.0, 0.0, -600.0));
        let mut budget = SimulationBudget::default();
        let mut events = Vec::new();

        let outcome = solver.phys_falling(&mut state, 0.1, &mut budget, &mut events);
        assert!(
            matches!(outcome, PhysicsOutcome::Transition { mode: MovementMode::Swimming, .. }),
            "got {:?}",
            outcome
        );
        assert_eq!(events, vec![MovementEvent::EnteredWater]);
    }

    #[test]
    fn test_jump_force_window_delays_gravity() {
        let config = MovementConfig {
            jump_max_hold_time: 0.2,
            apply_gravity_while_jumping: false,
            ..Default::default()
        };
        let world = CollisionWorld::new();
        let ctx = context(&config);
        let solver = AirVelocitySolver::new(&config, &world, &ctx);
        let jumps = JumpController::new(&config);

        // Commit a grounded jump so the force window opens
        let mut state = MovementState::new(Vec3::new(0.0, 0.0, 1000.0));
        state.mode = MovementMode::Walking;
        jumps.press(&mut state.jump);
        let mut velocity = Vec3::ZERO;
        let commit = jumps.check_jump_input(
            &mut state.jump,
            &mut state.boost,
            &crate::movement::jump::JumpContext {
                mode: MovementMode::Walking,
                floor_normal_z: 1.0,
                walkable_floor_z: config.walkable_floor_z,
                cheat_flying: false,
            },
            &crate::movement::jump::TakeoffContext {
                now: 0.0,
                facing: Vec3::X,
                acceleration: Vec3::ZERO,
                max_speed: config.run_speed,
                sprinting: false,
                crouched: false,
            },
            &mut velocity,
        );
        assert!(commit.did_jump);
        state.mode = MovementMode::Falling;
        state.kinematic.velocity = velocity;

        let mut budget = SimulationBudget::default();
        let mut events = Vec::new();
        solver.phys_falling(&mut state, 0.1, &mut budget, &mut events);

        // Entirely inside the window: no gravity yet
        assert_eq!(state.velocity().z, config.jump_z_velocity);
        assert!((state.jump.force_time_remaining() - 0.1).abs() < 1.0e-5);
    }
}
