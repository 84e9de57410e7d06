//! Deflection of movement off blocking surfaces.
//!
//! A blocked move is projected onto the surface it hit and retried. While
//! falling the projection may add a bounce on slippery surfaces and picks
//! between the contact normal and the face normal for stability. While
//! walking, unwalkable surfaces are treated as vertical walls so the
//! character is never pushed up them.

use glam::Vec3;

use crate::collision::{CapsuleShape, CollisionQuery, ContentFlags, FloorResult, HitResult};
use crate::math::{PlanarExt, KINDA_SMALL_NUMBER};

use super::config::MovementConfig;
use super::ground::SurfaceLimits;
use super::landing::{is_walkable, MIN_FLOOR_DIST, VERTICAL_SLOPE_NORMAL_Z};
use super::state::{MovementMode, MovementState};

/// Deltas shorter than this in every axis are not worth a second move.
const MIN_SECOND_MOVE: f32 = 1.0e-3;

/// Nudge away from a wall hit twice in a row.
const SAME_WALL_NUDGE: f32 = 0.01;

/// Move the capsule by `delta`, resolving a starting penetration once.
///
/// `position` ends at the swept location. Returns the sweep result.
pub fn safe_move<W: CollisionQuery + ?Sized>(
    world: &W,
    shape: &CapsuleShape,
    position: &mut Vec3,
    delta: Vec3,
) -> HitResult {
    if delta.is_nearly_zero(0.0) {
        return HitResult::no_hit(*position);
    }

    let hit = world.sweep(*position, *position + delta, shape, ContentFlags::MASK_PLAYER_SOLID);
    if !hit.start_penetrating {
        *position = hit.location;
        return hit;
    }

    let resolved = world.resolve_penetration(*position, shape);
    if resolved == *position {
        return hit;
    }
    log::trace!("resolved penetration {:?} -> {:?}", position, resolved);
    *position = resolved;

    let retry = world.sweep(*position, *position + delta, shape, ContentFlags::MASK_PLAYER_SOLID);
    if !retry.start_penetrating {
        *position = retry.location;
    }
    retry
}

/// Character facts that shape deflection.
#[derive(Debug, Clone, Copy)]
pub struct SlideContext {
    pub mode: MovementMode,
    pub cheat_flying: bool,
    pub surface_friction: f32,
    pub limits: SurfaceLimits,
    /// Floor under the character (walking only).
    pub floor: FloorResult,
}

impl SlideContext {
    pub fn from_state(state: &MovementState) -> Self {
        Self {
            mode: state.mode,
            cheat_flying: state.flags.cheat_flying(),
            surface_friction: state.friction.value(),
            limits: state.limits,
            floor: state.current_floor,
        }
    }

    fn floor_touching(&self) -> bool {
        self.floor.blocking_hit && self.floor.floor_distance < MIN_FLOOR_DIST
    }
}

/// Computes and performs slides along blocking surfaces.
#[derive(Debug, Clone, Copy)]
pub struct SlopeDeflector<'a> {
    config: &'a MovementConfig,
    context: SlideContext,
}

impl<'a> SlopeDeflector<'a> {
    pub fn new(config: &'a MovementConfig, context: SlideContext) -> Self {
        Self { config, context }
    }

    pub fn context(&self) -> &SlideContext {
        &self.context
    }

    fn constrain_normal(&self, normal: Vec3) -> Vec3 {
        match self.config.plane_constraint_normal {
            Some(plane) => normal.plane_project(plane.safe_normal()).safe_normal(),
            None => normal,
        }
    }

    // ========================================================================
    // Slide vectors
    // ========================================================================

    /// Project `delta` onto the surface with `normal`, scaled by `time`.
    pub fn compute_slide_vector(&self, delta: Vec3, time: f32, normal: Vec3, hit: &HitResult) -> Vec3 {
        let result = delta.plane_project(self.constrain_normal(normal)) * time;
        if self.context.mode.is_falling() {
            self.handle_slope_boosting(result, delta, time, normal, hit)
        } else {
            result
        }
    }

    /// Airborne deflection off a surface.
    ///
    /// Uses the face normal unless it is vertical or flat, where the
    /// contact normal is more stable. Slippery surfaces bounce.
    pub fn handle_slope_boosting(
        &self,
        slide_result: Vec3,
        delta: Vec3,
        time: f32,
        normal: Vec3,
        hit: &HitResult,
    ) -> Vec3 {
        if self.context.cheat_flying {
            return self.limit_slope_boost(slide_result, delta, time, normal);
        }

        let wall_angle = hit.impact_normal.z.abs();
        let impact_normal = if wall_angle <= VERTICAL_SLOPE_NORMAL_Z || wall_angle == 1.0 {
            normal
        } else {
            hit.impact_normal
        };
        let impact_normal = self.constrain_normal(impact_normal);

        let bounce =
            1.0 + self.config.bounce_multiplier * (1.0 - self.context.surface_friction);
        (delta - bounce * delta.project_onto_normal(impact_normal)) * time
    }

    /// Keep a deflection from rising higher than the original move.
    fn limit_slope_boost(
        &self,
        slide_result: Vec3,
        delta: Vec3,
        time: f32,
        normal: Vec3,
    ) -> Vec3 {
        let mut result = slide_result;
        if result.z <= 0.0 {
            return result;
        }

        let z_limit = delta.z * time;
        if result.z - z_limit > KINDA_SMALL_NUMBER {
            if z_limit > 0.0 {
                // Rescale the whole vector so the direction is kept
                result *= z_limit / result.z;
            } else {
                result = Vec3::ZERO;
            }

            // Spend what is left horizontally along the surface
            let remainder = (slide_result - result).horizontal();
            let normal_2d = normal.safe_normal_2d();
            result += remainder.plane_project(self.constrain_normal(normal_2d));
        }
        result
    }

    /// Reconcile a slide between the previous wall and the one just hit.
    pub fn two_wall_adjust(&self, delta: Vec3, hit: &HitResult, old_hit_normal: Vec3) -> Vec3 {
        let in_delta = delta;
        let hit_normal = hit.normal;
        let mut delta = delta;

        if old_hit_normal.dot(hit_normal) <= 0.0 {
            // 90 degrees or tighter: follow the crease
            let desired = delta;
            let crease = hit_normal.cross(old_hit_normal).safe_normal();
            delta = crease * delta.dot(crease) * (1.0 - hit.time);
            if desired.dot(delta) < 0.0 {
                delta = -delta;
            }
        } else {
            let desired = delta;
            delta = self.compute_slide_vector(delta, 1.0 - hit.time, hit_normal, hit);
            if delta.dot(desired) <= 0.0 {
                delta = Vec3::ZERO;
            } else if (hit_normal.dot(old_hit_normal) - 1.0).abs() < KINDA_SMALL_NUMBER {
                delta += hit_normal * SAME_WALL_NUDGE;
            }
        }

        if !self.context.mode.is_moving_on_ground() {
            return delta;
        }

        if delta.z > 0.0 {
            let walkable_z = self.context.limits.walkable_floor_z;
            if (hit.normal.z >= walkable_z || is_walkable(hit, walkable_z))
                && hit.normal.z > KINDA_SMALL_NUMBER
            {
                // Up a walkable slope: keep horizontal speed
                let time = 1.0 - hit.time;
                let scaled = delta.safe_normal() * in_delta.length();
                delta = Vec3::new(in_delta.x, in_delta.y, scaled.z / hit.normal.z) * time;

                let step_height = self.context.limits.step_height;
                if delta.z > step_height {
                    delta *= step_height / delta.z;
                }
            } else {
                delta.z = 0.0;
            }
        } else if delta.z < 0.0 && self.context.floor_touching() {
            // Never push down into the floor
            delta.z = 0.0;
        }

        delta
    }

    // ========================================================================
    // Sliding moves
    // ========================================================================

    /// Slide along the surface of `hit`, trying a second move if the
    /// slide is blocked too.
    ///
    /// Returns the fraction of `time` actually applied. `hit` is updated
    /// with the last sweep.
    #[allow(clippy::too_many_arguments)]
    pub fn slide_along_surface<W: CollisionQuery + ?Sized>(
        &self,
        world: &W,
        shape: &CapsuleShape,
        position: &mut Vec3,
        delta: Vec3,
        time: f32,
        normal: Vec3,
        hit: &mut HitResult,
    ) -> f32 {
        if !hit.blocking_hit {
            return 0.0;
        }

        let normal = self.ground_slide_normal(delta, normal, hit);
        let old_hit_normal = normal;

        let mut slide_delta = self.compute_slide_vector(delta, time, normal, hit);
        if slide_delta.dot(delta) <= 0.0 {
            return 0.0;
        }

        *hit = safe_move(world, shape, position, slide_delta);
        let first_hit_percent = hit.time;
        let mut percent_applied = first_hit_percent;

        if hit.is_valid_blocking_hit() {
            log::trace!("slide impact normal={:?} time={:.3}", hit.normal, hit.time);
            slide_delta = self.two_wall_adjust(slide_delta, hit, old_hit_normal);

            if !slide_delta.is_nearly_zero(MIN_SECOND_MOVE) && slide_delta.dot(delta) > 0.0 {
                *hit = safe_move(world, shape, position, slide_delta);
                percent_applied += hit.time * (1.0 - first_hit_percent);
            }
        }

        percent_applied.clamp(0.0, 1.0)
    }

    /// While walking, treat unwalkable slopes as walls and keep ceiling
    /// hits from pressing the character into the floor.
    fn ground_slide_normal(&self, delta: Vec3, normal: Vec3, hit: &HitResult) -> Vec3 {
        if !self.context.mode.is_moving_on_ground() {
            return normal;
        }

        if normal.z > 0.0 {
            if !is_walkable(hit, self.context.limits.walkable_floor_z) {
                return normal.safe_normal_2d();
            }
        } else if normal.z < -KINDA_SMALL_NUMBER && self.context.floor_touching() {
            let floor_normal = self.context.floor.hit.normal;
            let floor_opposes_move = delta.dot(floor_normal) < 0.0 && floor_normal.z < 1.0 - 1.0e-5;
            let chosen = if floor_opposes_move { floor_normal } else { normal };
            return chosen.safe_normal_2d();
        }

        normal
    }
}
