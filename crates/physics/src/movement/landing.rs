//! Landing and standability checks.
//!
//! Decides whether a blocking hit is ground the character can stand on,
//! and whether a walking character should leave a ramp and catch air.

use glam::Vec3;

use crate::collision::{CapsuleShape, CollisionQuery, FloorQuery, FloorResult, HitResult};
use crate::math::{PlanarExt, KINDA_SMALL_NUMBER};

use super::config::MovementConfig;
use super::friction::friction_from_hit;
use super::ground::SurfaceLimits;
use super::slide::SlopeDeflector;

/// Lower bound of the gap kept between capsule and floor while walking.
pub const MIN_FLOOR_DIST: f32 = 1.9;

/// Upper bound of the gap kept between capsule and floor while walking.
pub const MAX_FLOOR_DIST: f32 = 2.4;

/// Hits this close to the capsule rim are treated as glancing.
pub const SWEEP_EDGE_REJECT_DISTANCE: f32 = 0.15;

/// A surface is vertical when `|normal.z|` is at or below this.
pub const VERTICAL_SLOPE_NORMAL_Z: f32 = 0.001;

/// Whether `hit` is a surface the character can stand on.
///
/// Exactly meeting the threshold counts as walkable.
pub fn is_walkable(hit: &HitResult, walkable_floor_z: f32) -> bool {
    if !hit.is_valid_blocking_hit() {
        return false;
    }
    let normal_z = hit.impact_normal.z;
    normal_z >= KINDA_SMALL_NUMBER && normal_z >= walkable_floor_z
}

/// Whether `impact_point` lies inside the capsule's footprint, away from the rim.
pub fn is_within_edge_tolerance(capsule_location: Vec3, impact_point: Vec3, radius: f32) -> bool {
    let dist_sq = (impact_point - capsule_location).size_squared_2d();
    let reduced_radius = (SWEEP_EDGE_REJECT_DISTANCE + KINDA_SMALL_NUMBER)
        .max(radius - SWEEP_EDGE_REJECT_DISTANCE);
    dist_sq < reduced_radius * reduced_radius
}

/// Validates landing spots against the current speed-scaled limits.
#[derive(Debug, Clone, Copy)]
pub struct LandingValidator<'a> {
    config: &'a MovementConfig,
    limits: SurfaceLimits,
}

impl<'a> LandingValidator<'a> {
    pub fn new(config: &'a MovementConfig, limits: SurfaceLimits) -> Self {
        Self { config, limits }
    }

    pub fn is_walkable(&self, hit: &HitResult) -> bool {
        is_walkable(hit, self.limits.walkable_floor_z)
    }

    /// Floor probe parameters. Walking probes reach past a full step.
    pub fn floor_query(&self, on_ground: bool) -> FloorQuery {
        let height_adjust = if on_ground {
            MAX_FLOOR_DIST + KINDA_SMALL_NUMBER
        } else {
            -MAX_FLOOR_DIST
        };
        FloorQuery {
            max_distance: MAX_FLOOR_DIST.max(self.limits.step_height + height_adjust),
            walkable_floor_z: self.limits.walkable_floor_z,
        }
    }

    /// Whether `hit`, taken at `capsule_location` while falling with
    /// `velocity`, is somewhere the character can land.
    #[allow(clippy::too_many_arguments)]
    pub fn is_valid_landing_spot<W: CollisionQuery + ?Sized>(
        &self,
        world: &W,
        shape: &CapsuleShape,
        capsule_location: Vec3,
        hit: &HitResult,
        velocity: Vec3,
        delta_time: f32,
        deflector: &SlopeDeflector<'_>,
    ) -> bool {
        if !hit.blocking_hit {
            return false;
        }

        if !hit.start_penetrating {
            if !self.is_walkable(hit) {
                return false;
            }

            if self.config.use_flat_base_for_floor_checks {
                // Reject hits above the flat base (sliding down a wall)
                let lower_z = hit.location.z - shape.half_height + MAX_FLOOR_DIST;
                let normal_z = hit.impact_normal.z;
                if (normal_z < self.limits.walkable_floor_z || normal_z == 1.0)
                    && hit.impact_point.z > lower_z
                {
                    return false;
                }
            } else {
                let lower_hemisphere_z = hit.location.z - shape.half_height + shape.radius;
                if hit.impact_point.z >= lower_hemisphere_z {
                    return false;
                }
            }

            if !is_within_edge_tolerance(hit.location, hit.impact_point, shape.radius) {
                return false;
            }
        } else if hit.normal.z < KINDA_SMALL_NUMBER {
            // Penetration next to a wall or overhang, don't pop onto it
            return false;
        }

        let floor = world.find_floor(capsule_location, shape, &self.floor_query(false));
        if !floor.is_walkable_floor() {
            return false;
        }

        // Moving up into a slope: landing only if the deflection stays below jump speed.
        if hit.normal.z < 1.0 && velocity.dot(hit.normal) < 0.0 {
            let mut deflection = velocity;
            deflection.z += 0.5 * self.config.gravity_z * delta_time;
            let deflection = deflector.compute_slide_vector(deflection, 1.0, hit.normal, hit);
            if deflection.z > self.config.jump_threshold_velocity {
                log::trace!("landing rejected: deflecting up at {:.1}", deflection.z);
                return false;
            }
        }

        true
    }

    /// Whether an edge hit deserves a second floor probe before it is
    /// rejected as a landing spot.
    pub fn should_check_for_valid_landing_spot(
        &self,
        capsule_location: Vec3,
        hit: &HitResult,
        shape: &CapsuleShape,
    ) -> bool {
        if self.config.use_flat_base_for_floor_checks {
            return false;
        }
        // Lower-edge hits report a normal that differs from the face normal
        hit.normal.z > KINDA_SMALL_NUMBER
            && !hit.normal.abs_diff_eq(hit.impact_normal, KINDA_SMALL_NUMBER)
            && is_within_edge_tolerance(capsule_location, hit.impact_point, shape.radius)
    }

    /// Whether a walking character moving from `old_floor` onto `new_floor`
    /// should launch off the ramp instead of following it.
    pub fn should_catch_air(
        &self,
        old_floor: &FloorResult,
        new_floor: &FloorResult,
        velocity: Vec3,
        input_vector: Vec3,
        right: Vec3,
    ) -> bool {
        let old_friction = friction_from_hit(&old_floor.hit);

        // Faster means a smaller multiplier, so low friction tips it over sooner
        let speed_mult = self.config.speed_mult_max / velocity.size_2d();
        let sliding = old_friction * speed_mult < self.config.slide_limit;

        let gaining_ramp = new_floor.impact_normal().z - old_floor.impact_normal().z >= 0.0;

        // Horizontal velocity into an up-ramp has a negative dot with its normal
        let going_up_ramp = velocity.dot(old_floor.impact_normal()) < 0.0;
        let strafing = input_vector.dot(right).abs() > 0.0;

        sliding && gaining_ramp && (going_up_ramp || strafing)
    }
}
