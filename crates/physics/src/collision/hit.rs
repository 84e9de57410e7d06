//! Hit and floor records returned by collision queries.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Surface material attached to a brush.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalMaterial {
    /// Raw material friction. Scaled by 1.25 and capped at 1 by the
    /// surface friction tracker.
    pub friction: f32,
}

impl PhysicalMaterial {
    pub const fn new(friction: f32) -> Self {
        Self { friction }
    }
}

impl Default for PhysicalMaterial {
    fn default() -> Self {
        Self { friction: 0.8 }
    }
}

/// Result of sweeping the character capsule through the world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitResult {
    /// The sweep was stopped by blocking geometry.
    pub blocking_hit: bool,

    /// The capsule already overlapped blocking geometry at the start.
    pub start_penetrating: bool,

    /// Fraction of the requested move that was completed.
    ///
    /// - `1.0` = no hit
    /// - `0.0` = blocked immediately
    pub time: f32,

    /// Capsule centre at the end of the move.
    pub location: Vec3,

    /// Contact point on the surface that was hit.
    pub impact_point: Vec3,

    /// Direction from the impact point towards the capsule core. For capsule
    /// sweeps this differs from `impact_normal` on edges and corners.
    pub normal: Vec3,

    /// Surface normal of the geometry at the impact point.
    pub impact_normal: Vec3,

    /// Material of the surface that was hit, if the brush has one.
    pub material: Option<PhysicalMaterial>,
}

impl HitResult {
    /// A sweep that travelled the full distance.
    pub fn no_hit(location: Vec3) -> Self {
        Self {
            blocking_hit: false,
            start_penetrating: false,
            time: 1.0,
            location,
            impact_point: location,
            normal: Vec3::ZERO,
            impact_normal: Vec3::ZERO,
            material: None,
        }
    }

    /// A blocking hit where `normal` and `impact_normal` agree.
    pub fn blocking(time: f32, location: Vec3, impact_point: Vec3, normal: Vec3) -> Self {
        Self {
            blocking_hit: true,
            start_penetrating: false,
            time,
            location,
            impact_point,
            normal,
            impact_normal: normal,
            material: None,
        }
    }

    /// Blocking and not stuck inside geometry.
    #[inline]
    pub fn is_valid_blocking_hit(&self) -> bool {
        self.blocking_hit && !self.start_penetrating
    }
}

impl Default for HitResult {
    fn default() -> Self {
        Self::no_hit(Vec3::ZERO)
    }
}

/// Parameters for a downward floor probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloorQuery {
    /// How far below the capsule to search.
    pub max_distance: f32,

    /// Minimum impact normal Z for the floor to count as walkable.
    pub walkable_floor_z: f32,
}

/// Outcome of a floor probe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloorResult {
    /// Something was found below the capsule.
    pub blocking_hit: bool,

    /// The surface found is walkable.
    pub walkable: bool,

    /// Gap between the capsule bottom and the floor.
    pub floor_distance: f32,

    /// The underlying sweep result.
    pub hit: HitResult,
}

impl FloorResult {
    /// No floor data. Reads as not walkable.
    pub fn none() -> Self {
        Self {
            blocking_hit: false,
            walkable: false,
            floor_distance: 0.0,
            hit: HitResult::default(),
        }
    }

    #[inline]
    pub fn is_walkable_floor(&self) -> bool {
        self.blocking_hit && self.walkable
    }

    #[inline]
    pub fn impact_normal(&self) -> Vec3 {
        self.hit.impact_normal
    }

    #[inline]
    pub fn impact_point(&self) -> Vec3 {
        self.hit.impact_point
    }
}

impl Default for FloorResult {
    fn default() -> Self {
        Self::none()
    }
}

/// Vertical character capsule. Locations refer to the capsule centre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapsuleShape {
    pub radius: f32,
    /// Distance from the centre to the top (or bottom) of the capsule.
    pub half_height: f32,
}

impl CapsuleShape {
    pub const fn new(radius: f32, half_height: f32) -> Self {
        Self {
            radius,
            half_height,
        }
    }

    /// Half length of the cylindrical section between the two caps.
    #[inline]
    pub fn segment_half_height(&self) -> f32 {
        (self.half_height - self.radius).max(0.0)
    }

    /// Closest point on the capsule's core segment to `point`.
    pub fn closest_core_point(&self, center: Vec3, point: Vec3) -> Vec3 {
        let h = self.segment_half_height();
        let z = point.z.clamp(center.z - h, center.z + h);
        Vec3::new(center.x, center.y, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_hit_completes_move() {
        let hit = HitResult::no_hit(Vec3::new(10.0, 0.0, 0.0));
        assert!(!hit.blocking_hit);
        assert_eq!(hit.time, 1.0);
        assert!(!hit.is_valid_blocking_hit());
    }

    #[test]
    fn test_missing_floor_is_not_walkable() {
        let floor = FloorResult::none();
        assert!(!floor.is_walkable_floor());
    }

    #[test]
    fn test_closest_core_point_clamps_to_segment() {
        let capsule = CapsuleShape::new(30.0, 70.0);
        let center = Vec3::new(0.0, 0.0, 100.0);

        let below = capsule.closest_core_point(center, Vec3::new(20.0, 0.0, 0.0));
        assert_eq!(below, Vec3::new(0.0, 0.0, 60.0));

        let side = capsule.closest_core_point(center, Vec3::new(30.0, 0.0, 110.0));
        assert_eq!(side, Vec3::new(0.0, 0.0, 110.0));
    }
}
