//! Collision queries consumed by the locomotion solvers.
//!
//! The movement code never talks to a physics engine directly. It issues
//! capsule sweeps, floor probes and liquid overlap tests through the
//! [`CollisionQuery`] trait, which keeps every solver testable against small
//! scripted worlds.
//!
//! # Key Types
//!
//! - [`CollisionQuery`]: the collaborator interface
//! - [`HitResult`] / [`FloorResult`]: query outputs
//! - [`CollisionWorld`]: a parry3d-backed implementation built from brushes

mod flags;
mod hit;
mod world;

use glam::Vec3;

pub use flags::ContentFlags;
pub use hit::{CapsuleShape, FloorQuery, FloorResult, HitResult, PhysicalMaterial};
pub use world::CollisionWorld;

/// Interface to the collision engine.
///
/// All calls are synchronous and return within the tick that issued them.
pub trait CollisionQuery {
    /// Sweep `shape` from `start` towards `end`, stopping at the first
    /// blocking brush matching `mask`.
    fn sweep(&self, start: Vec3, end: Vec3, shape: &CapsuleShape, mask: ContentFlags) -> HitResult;

    /// Probe for standable ground below `location`.
    ///
    /// The default sweeps the capsule straight down by `query.max_distance`.
    fn find_floor(&self, location: Vec3, shape: &CapsuleShape, query: &FloorQuery) -> FloorResult {
        let end = location - Vec3::Z * query.max_distance;
        let hit = self.sweep(location, end, shape, ContentFlags::MASK_PLAYER_SOLID);
        if !hit.blocking_hit {
            return FloorResult::none();
        }

        let floor_distance = if hit.start_penetrating {
            0.0
        } else {
            hit.time * query.max_distance
        };
        let normal_z = hit.impact_normal.z;

        FloorResult {
            blocking_hit: true,
            walkable: normal_z > 0.0 && normal_z >= query.walkable_floor_z,
            floor_distance,
            hit,
        }
    }

    /// Content flags of every volume the capsule overlaps at `location`.
    fn contents_at(&self, _location: Vec3, _shape: &CapsuleShape) -> ContentFlags {
        ContentFlags::EMPTY
    }

    /// Push a penetrating capsule back out of blocking geometry.
    fn resolve_penetration(&self, location: Vec3, _shape: &CapsuleShape) -> Vec3 {
        location
    }
}
