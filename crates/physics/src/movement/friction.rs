//! Surface friction derived from the material underfoot.
//!
//! The tracked value is a multiplier in `[0, 1]` that scales both braking
//! and acceleration. It is refreshed once per tick after movement.

use serde::{Deserialize, Serialize};

use crate::collision::{FloorResult, HitResult};

use super::state::MovementMode;

/// Material friction is scaled up by this before clamping to 1.
const MATERIAL_FRICTION_SCALE: f32 = 1.25;

/// Friction while sliding along a slope in mid-air.
const AIR_SLIDE_FRICTION: f32 = 0.25;

/// Friction multiplier for the material of `hit`, or 1 without one.
pub fn friction_from_hit(hit: &HitResult) -> f32 {
    hit.material
        .map_or(1.0, |material| (material.friction * MATERIAL_FRICTION_SCALE).min(1.0))
}

/// Inputs for one friction refresh.
#[derive(Debug, Clone, Copy)]
pub struct FrictionSample<'a> {
    pub mode: MovementMode,
    pub floor: &'a FloorResult,
    pub vertical_velocity: f32,
    pub jump_threshold_velocity: f32,
    pub cheat_flying: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceFrictionTracker {
    value: f32,
    sliding: bool,
}

impl Default for SurfaceFrictionTracker {
    fn default() -> Self {
        Self {
            value: 1.0,
            sliding: false,
        }
    }
}

impl SurfaceFrictionTracker {
    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }

    #[inline]
    pub fn is_sliding(&self) -> bool {
        self.sliding
    }

    /// Mark that an airborne slide deflected off a slope.
    pub fn set_sliding(&mut self, sliding: bool) {
        self.sliding = sliding;
    }

    /// Refresh after movement.
    pub fn update(&mut self, sample: &FrictionSample<'_>) {
        if sample.mode.is_moving_on_ground() && sample.floor.is_walkable_floor() {
            self.value = friction_from_hit(&sample.floor.hit);
            self.sliding = false;
            return;
        }

        let vz = sample.vertical_velocity;
        if vz >= sample.jump_threshold_velocity || vz <= 0.0 || sample.cheat_flying {
            self.value = 1.0;
        } else if self.sliding {
            self.value = AIR_SLIDE_FRICTION;
        }
    }
}
