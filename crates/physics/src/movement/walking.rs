//! Walking physics: moving along the floor, stepping up, following ramps
//! and walking off ledges.

use glam::Vec3;

use crate::collision::{CollisionQuery, ContentFlags, FloorResult, HitResult};
use crate::math::{PlanarExt, KINDA_SMALL_NUMBER, MIN_TICK_TIME};

use super::config::MovementConfig;
use super::ground::{GroundVelocitySolver, VelocityInput};
use super::landing::{is_within_edge_tolerance, LandingValidator, MAX_FLOOR_DIST, MIN_FLOOR_DIST};
use super::mode::{PhysicsOutcome, SimulationBudget, TickContext};
use super::slide::{safe_move, SlideContext, SlopeDeflector};
use super::state::{MovementMode, MovementState};

/// Steps onto surfaces flatter than this need a floor below them.
const MAX_STEP_SIDE_Z: f32 = 0.08;

/// Solver for [`MovementMode::Walking`].
pub struct WalkingSolver<'a, W: CollisionQuery + ?Sized> {
    config: &'a MovementConfig,
    world: &'a W,
    context: &'a TickContext,
}

impl<'a, W: CollisionQuery + ?Sized> WalkingSolver<'a, W> {
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

    /// Probe for the floor under `location` with the walking reach.
    pub fn find_floor(&self, state: &MovementState, location: Vec3) -> FloorResult {
        let query = self.validator(state).floor_query(true);
        self.world.find_floor(location, &self.context.shape, &query)
    }

    // ========================================================================
    // Main loop
    // ========================================================================

    /// Walk for up to `delta_time`, substepping within the shared budget.
    pub fn phys_walking(
        &self,
        state: &mut MovementState,
        delta_time: f32,
        budget: &mut SimulationBudget,
    ) -> PhysicsOutcome {
        if delta_time < MIN_TICK_TIME {
            return PhysicsOutcome::Finished;
        }

        let mut remaining = delta_time;
        while remaining >= MIN_TICK_TIME && budget.iterations < self.config.max_simulation_iterations {
            budget.iterations += 1;
            let time_tick = self.config.simulation_time_step(remaining, budget.iterations);
            remaining -= time_tick;

            let old_location = state.position();
            let old_floor = state.current_floor;

            state.kinematic.velocity.z = 0.0;
            state.kinematic.acceleration.z = 0.0;
            let step = GroundVelocitySolver::from_state(self.config, state).calc_velocity(&VelocityInput {
                velocity: state.kinematic.velocity,
                acceleration: state.kinematic.acceleration,
                facing: self.context.facing,
                max_speed: self.context.max_speed,
                analog_input_modifier: state.analog_input_modifier,
                friction: self.config.ground_friction,
                braking_deceleration: self.config.braking_deceleration_walking,
                fluid: false,
                delta_time: time_tick,
            });
            state.kinematic.velocity = step.velocity;
            state.kinematic.acceleration = step.acceleration;
            state.analog_input_modifier = step.analog_input_modifier;
            state.limits = step.limits;

            let move_velocity = state.velocity();
            let delta = move_velocity * time_tick;
            if delta.is_nearly_zero(0.0) {
                remaining = 0.0;
            } else {
                self.move_along_floor(state, move_velocity, time_tick);
            }

            if self.in_water(state.position()) {
                return PhysicsOutcome::Transition {
                    mode: MovementMode::Swimming,
                    remaining,
                };
            }

            state.current_floor = self.find_floor(state, state.position());

            if state.current_floor.hit.start_penetrating && remaining <= 0.0 {
                let resolved = self.world.resolve_penetration(state.position(), &self.context.shape);
                if resolved != state.position() {
                    log::trace!("walking: pushed out of geometry to {:?}", resolved);
                    state.kinematic.position = resolved;
                    state.current_floor = self.find_floor(state, resolved);
                }
            }

            let refund = |remaining: f32, state: &MovementState| {
                let desired = delta.length();
                if desired < KINDA_SMALL_NUMBER {
                    0.0
                } else {
                    let actual = (state.position() - old_location).size_2d();
                    remaining + time_tick * (1.0 - (actual / desired).min(1.0))
                }
            };

            if !state.current_floor.is_walkable_floor() && !state.current_floor.hit.start_penetrating {
                log::trace!("walked off a ledge at {:?}", state.position());
                let remaining = refund(remaining, state);
                state.kinematic.velocity.z = 0.0;
                return PhysicsOutcome::Transition {
                    mode: MovementMode::Falling,
                    remaining,
                };
            }

            if state.current_floor.is_walkable_floor() {
                let catch_air = self.validator(state).should_catch_air(
                    &old_floor,
                    &state.current_floor,
                    state.velocity(),
                    self.context.input_vector,
                    self.context.right,
                );
                if catch_air {
                    // Leave the ramp with the velocity it gave us
                    let remaining = refund(remaining, state);
                    state.kinematic.velocity = (state.position() - old_location) / time_tick;
                    log::debug!("caught air off a ramp at {:?}", state.velocity());
                    return PhysicsOutcome::Transition {
                        mode: MovementMode::Falling,
                        remaining,
                    };
                }
                self.adjust_floor_height(state);
            }

            let mut velocity = (state.position() - old_location) / time_tick;
            velocity.z = 0.0;
            state.kinematic.velocity = velocity;

            if state.position() == old_location {
                break;
            }
        }

        PhysicsOutcome::Finished
    }

    // ========================================================================
    // Floor following
    // ========================================================================

    /// Turn a horizontal delta into one that follows the ramp of `ramp_hit`,
    /// keeping horizontal speed.
    pub fn compute_ground_movement_delta(&self, state: &MovementState, delta: Vec3, ramp_hit: &HitResult) -> Vec3 {
        let floor_normal = ramp_hit.impact_normal;
        let contact_normal = ramp_hit.normal;

        if floor_normal.z < 1.0 - KINDA_SMALL_NUMBER
            && floor_normal.z > KINDA_SMALL_NUMBER
            && contact_normal.z > KINDA_SMALL_NUMBER
            && self.validator(state).is_walkable(ramp_hit)
        {
            let floor_dot_delta = floor_normal.dot(delta);
            return Vec3::new(delta.x, delta.y, -floor_dot_delta / floor_normal.z);
        }
        delta
    }

    /// Move horizontally by `velocity x delta_time` along the current floor.
    pub fn move_along_floor(&self, state: &mut MovementState, velocity: Vec3, delta_time: f32) {
        if !state.current_floor.is_walkable_floor() {
            return;
        }

        let shape = &self.context.shape;
        let delta = velocity.horizontal() * delta_time;
        let floor_hit = state.current_floor.hit;
        let mut ramp_vector = self.compute_ground_movement_delta(state, delta, &floor_hit);

        let mut position = state.position();
        let mut hit = safe_move(self.world, shape, &mut position, ramp_vector);
        state.kinematic.position = position;

        if hit.start_penetrating {
            log::trace!("walking: stuck in geometry at {:?}", position);
            self.slide(state, delta, 1.0, hit.normal, &mut hit);
            return;
        }

        if !hit.is_valid_blocking_hit() {
            return;
        }

        let mut percent_applied = hit.time;
        if hit.time > 0.0 && hit.normal.z > KINDA_SMALL_NUMBER && self.validator(state).is_walkable(&hit) {
            // Another walkable ramp
            let initial_remaining = 1.0 - percent_applied;
            ramp_vector = self.compute_ground_movement_delta(state, delta * initial_remaining, &hit);
            let mut position = state.position();
            hit = safe_move(self.world, shape, &mut position, ramp_vector);
            state.kinematic.position = position;
            percent_applied = (percent_applied + hit.time * initial_remaining).clamp(0.0, 1.0);
        }

        if hit.is_valid_blocking_hit() {
            let step_delta = delta * (1.0 - percent_applied);
            if !self.step_up(state, step_delta, &hit) {
                log::trace!("walking impact normal={:?}", hit.normal);
                self.slide(state, delta, 1.0 - percent_applied, hit.normal, &mut hit);
            }
        }
    }

    fn slide(&self, state: &mut MovementState, delta: Vec3, time: f32, normal: Vec3, hit: &mut HitResult) -> f32 {
        let deflector = self.deflector(state);
        let mut position = state.position();
        let applied = deflector.slide_along_surface(self.world, &self.context.shape, &mut position, delta, time, normal, hit);
        state.kinematic.position = position;
        applied
    }

    /// Try to climb onto whatever `hit` blocked, using the speed-scaled
    /// step height. Restores the position and returns false on failure.
    pub fn step_up(&self, state: &mut MovementState, delta: Vec3, hit: &HitResult) -> bool {
        let step_height = state.limits.step_height;
        if step_height <= 0.0 {
            return false;
        }

        let shape = &self.context.shape;
        let old_location = state.position();
        let old_floor = state.current_floor;

        // Top of the capsule hitting something
        let initial_impact_z = hit.impact_point.z;
        if initial_impact_z > old_location.z + (shape.half_height - shape.radius) {
            return false;
        }

        let mut step_travel_up = step_height;
        let mut step_travel_down = step_height;
        let step_side_z = hit.impact_normal.z;
        let mut floor_base_z = old_location.z - shape.half_height;
        let mut floor_point_z = floor_base_z;

        if state.mode.is_moving_on_ground() && old_floor.is_walkable_floor() {
            let floor_distance = old_floor.floor_distance.max(0.0);
            floor_base_z -= floor_distance;
            step_travel_up = (step_travel_up - floor_distance).max(0.0);
            step_travel_down = step_height + MAX_FLOOR_DIST * 2.0;

            let hit_vertical_face = !is_within_edge_tolerance(hit.location, hit.impact_point, shape.radius);
            if !hit_vertical_face {
                floor_point_z = old_floor.hit.impact_point.z;
            } else {
                floor_point_z -= old_floor.floor_distance;
            }
        }

        // Impact below the feet is not a step
        if initial_impact_z <= floor_base_z {
            return false;
        }

        let revert = |state: &mut MovementState| {
            state.kinematic.position = old_location;
            false
        };

        // Up
        let mut position = old_location;
        let up_hit = safe_move(self.world, shape, &mut position, Vec3::Z * step_travel_up);
        state.kinematic.position = position;
        if up_hit.start_penetrating {
            return revert(state);
        }

        // Forward
        let mut position = state.position();
        let mut forward_hit = safe_move(self.world, shape, &mut position, delta);
        state.kinematic.position = position;
        if forward_hit.blocking_hit {
            if forward_hit.start_penetrating {
                return revert(state);
            }
            let forward_time = forward_hit.time;
            let normal = forward_hit.normal;
            let slide_amount = self.slide(state, delta, 1.0 - forward_time, normal, &mut forward_hit);
            if forward_time == 0.0 && slide_amount == 0.0 {
                return revert(state);
            }
        }

        // Down
        let mut position = state.position();
        let down_hit = safe_move(
            self.world,
            shape,
            &mut position,
            -Vec3::Z * (step_travel_up + step_travel_down),
        );
        state.kinematic.position = position;
        if down_hit.start_penetrating {
            return revert(state);
        }

        if down_hit.is_valid_blocking_hit() {
            let delta_z = down_hit.impact_point.z - floor_point_z;
            if delta_z > step_height {
                return revert(state);
            }

            if !self.validator(state).is_walkable(&down_hit) {
                // Unwalkable and facing us, or would leave us higher than we started
                if delta.dot(down_hit.impact_normal) < 0.0 || down_hit.location.z > old_location.z {
                    return revert(state);
                }
            }

            if !is_within_edge_tolerance(down_hit.location, down_hit.impact_point, shape.radius) {
                return revert(state);
            }

            if down_hit.location.z > old_location.z {
                let step_floor = self.find_floor(state, down_hit.location);
                if !step_floor.blocking_hit && step_side_z < MAX_STEP_SIDE_Z {
                    return revert(state);
                }
            }
        }

        log::trace!("stepped up {:.2}", state.position().z - old_location.z);
        true
    }

    /// Keep the capsule hovering inside the floor distance band.
    pub fn adjust_floor_height(&self, state: &mut MovementState) {
        if !state.current_floor.is_walkable_floor() {
            return;
        }

        let old_floor_distance = state.current_floor.floor_distance;
        if (MIN_FLOOR_DIST..=MAX_FLOOR_DIST).contains(&old_floor_distance) {
            return;
        }

        let initial_z = state.position().z;
        let average = (MIN_FLOOR_DIST + MAX_FLOOR_DIST) * 0.5;
        let move_distance = average - old_floor_distance;

        let mut position = state.position();
        let hit = safe_move(self.world, &self.context.shape, &mut position, Vec3::Z * move_distance);
        state.kinematic.position = position;

        if !hit.is_valid_blocking_hit() {
            state.current_floor.floor_distance += move_distance;
        } else if move_distance > 0.0 {
            state.current_floor.floor_distance += position.z - initial_z;
        } else {
            state.current_floor.floor_distance = position.z - hit.location.z;
            if self.validator(state).is_walkable(&hit) {
                state.current_floor.hit = hit;
            }
        }
    }
}
