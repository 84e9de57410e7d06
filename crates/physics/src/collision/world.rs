//! Brush-based collision world.
//!
//! Stores static brushes (boxes, oriented boxes, convex hulls, liquid
//! volumes) and answers capsule queries against them with parry3d.

use glam::{Quat, Vec3};
use parry3d::math::{Isometry, Point, Real, Vector};
use parry3d::query::{contact, intersection_test, Ray};
use parry3d::shape::SharedShape;

use super::flags::ContentFlags;
use super::hit::{CapsuleShape, HitResult, PhysicalMaterial};
use super::CollisionQuery;

/// Refinement passes after the first overlapping sample along a sweep.
const SWEEP_REFINE_ITERATIONS: usize = 16;

/// Penetration resolution passes.
const RESOLVE_ITERATIONS: usize = 4;

/// Extra separation added when pushing out of geometry.
const RESOLVE_SKIN: f32 = 0.01;

/// How far face probes are pushed into the brush past the contact point.
const FACE_PROBE_INSET: f32 = 0.01;

/// A piece of collision geometry in the world.
#[derive(Clone)]
pub struct CollisionBrush {
    pub id: u32,
    pub shape: SharedShape,
    pub transform: Isometry<Real>,
    pub contents: ContentFlags,
    pub material: Option<PhysicalMaterial>,
}

impl std::fmt::Debug for CollisionBrush {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollisionBrush")
            .field("id", &self.id)
            .field("contents", &self.contents)
            .field("material", &self.material)
            .finish_non_exhaustive()
    }
}

/// Contact between the character capsule and one brush.
#[derive(Debug, Clone, Copy)]
struct BrushContact {
    brush: usize,
    point: Vec3,
    /// Outward surface normal of the brush.
    normal: Vec3,
    depth: f32,
    material: Option<PhysicalMaterial>,
}

/// The collision world containing all brushes.
///
/// Immutable during a tick; shared by reference with the movement code.
#[derive(Debug, Default)]
pub struct CollisionWorld {
    brushes: Vec<CollisionBrush>,
    next_id: u32,
}

impl CollisionWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an axis-aligned box.
    pub fn add_box(&mut self, center: Vec3, half_extents: Vec3, contents: ContentFlags) -> u32 {
        self.add_oriented_box(center, half_extents, Quat::IDENTITY, contents, None)
    }

    /// Add an axis-aligned box with a surface material.
    pub fn add_box_with_material(
        &mut self,
        center: Vec3,
        half_extents: Vec3,
        contents: ContentFlags,
        material: PhysicalMaterial,
    ) -> u32 {
        self.add_oriented_box(center, half_extents, Quat::IDENTITY, contents, Some(material))
    }

    /// Add a rotated box, used for ramps and slopes.
    pub fn add_oriented_box(
        &mut self,
        center: Vec3,
        half_extents: Vec3,
        rotation: Quat,
        contents: ContentFlags,
        material: Option<PhysicalMaterial>,
    ) -> u32 {
        let shape = SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z);
        let (axis, angle) = rotation.to_axis_angle();
        let scaled_axis = axis * angle;
        let transform = Isometry::new(
            Vector::new(center.x, center.y, center.z),
            Vector::new(scaled_axis.x, scaled_axis.y, scaled_axis.z),
        );
        self.push_brush(shape, transform, contents, material)
    }

    /// Add a water volume. Liquids never block sweeps.
    pub fn add_water_volume(&mut self, center: Vec3, half_extents: Vec3) -> u32 {
        self.add_box(center, half_extents, ContentFlags::WATER)
    }

    /// Add a convex hull brush. Returns `None` for degenerate point sets.
    pub fn add_convex_hull(
        &mut self,
        points: &[Vec3],
        contents: ContentFlags,
        material: Option<PhysicalMaterial>,
    ) -> Option<u32> {
        let parry_points: Vec<Point<Real>> =
            points.iter().map(|p| Point::new(p.x, p.y, p.z)).collect();
        let shape = SharedShape::convex_hull(&parry_points)?;
        Some(self.push_brush(shape, Isometry::identity(), contents, material))
    }

    pub fn clear(&mut self) {
        self.brushes.clear();
    }

    pub fn brush_count(&self) -> usize {
        self.brushes.len()
    }

    /// Whether the capsule at `position` overlaps any brush matching `mask`.
    pub fn overlaps(&self, position: Vec3, shape: &CapsuleShape, mask: ContentFlags) -> bool {
        let capsule = Self::capsule(shape);
        let transform = Self::capsule_transform(position);

        self.brushes
            .iter()
            .filter(|brush| mask.intersects(brush.contents))
            .any(|brush| {
                matches!(
                    intersection_test(
                        &transform,
                        capsule.as_ref(),
                        &brush.transform,
                        brush.shape.as_ref(),
                    ),
                    Ok(true)
                )
            })
    }

    // ========================================================================
    // Private helpers
    // ========================================================================

    fn push_brush(
        &mut self,
        shape: SharedShape,
        transform: Isometry<Real>,
        contents: ContentFlags,
        material: Option<PhysicalMaterial>,
    ) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.brushes.push(CollisionBrush {
            id,
            shape,
            transform,
            contents,
            material,
        });
        id
    }

    fn capsule(shape: &CapsuleShape) -> SharedShape {
        SharedShape::capsule_z(shape.segment_half_height(), shape.radius)
    }

    fn capsule_transform(position: Vec3) -> Isometry<Real> {
        Isometry::translation(position.x, position.y, position.z)
    }

    /// Deepest contact between the capsule and any brush matching `mask`.
    fn deepest_contact(
        &self,
        position: Vec3,
        shape: &CapsuleShape,
        mask: ContentFlags,
    ) -> Option<BrushContact> {
        let capsule = Self::capsule(shape);
        let transform = Self::capsule_transform(position);
        let mut deepest: Option<BrushContact> = None;

        for (index, brush) in self.brushes.iter().enumerate() {
            if !mask.intersects(brush.contents) {
                continue;
            }
            let Ok(Some(found)) = contact(
                &transform,
                capsule.as_ref(),
                &brush.transform,
                brush.shape.as_ref(),
                0.0,
            ) else {
                continue;
            };

            let depth = -found.dist;
            if deepest.map_or(true, |d| depth > d.depth) {
                deepest = Some(BrushContact {
                    brush: index,
                    point: Vec3::new(found.point2.x, found.point2.y, found.point2.z),
                    normal: Vec3::new(found.normal2.x, found.normal2.y, found.normal2.z),
                    depth,
                    material: brush.material,
                });
            }
        }

        deepest
    }

    /// Face normal of the brush under `point`.
    ///
    /// Casts a short ray along the sweep direction, nudged into the brush,
    /// so edge contacts report the face that opposes the motion. Without a
    /// direction the ray runs back along `toward` (surface to capsule).
    fn face_normal(
        &self,
        brush: usize,
        point: Vec3,
        toward: Vec3,
        sweep_dir: Option<Vec3>,
    ) -> Option<Vec3> {
        let brush = self.brushes.get(brush)?;
        let (origin, dir) = match sweep_dir {
            Some(dir) => (point - dir - toward * FACE_PROBE_INSET, dir),
            None => (point + toward, -toward),
        };
        let ray = Ray::new(
            Point::new(origin.x, origin.y, origin.z),
            Vector::new(dir.x, dir.y, dir.z),
        );
        let found = brush
            .shape
            .cast_ray_and_get_normal(&brush.transform, &ray, 2.0, true)?;
        Some(Vec3::new(found.normal.x, found.normal.y, found.normal.z))
    }

    fn hit_from_contact(
        &self,
        shape: &CapsuleShape,
        time: f32,
        location: Vec3,
        found: BrushContact,
        sweep_dir: Option<Vec3>,
    ) -> HitResult {
        let start_penetrating = sweep_dir.is_none();
        let contact_normal = found.normal.normalize_or(Vec3::Z);
        let core = shape.closest_core_point(location, found.point);
        let normal = (core - found.point).normalize_or(contact_normal);
        let impact_normal = sweep_dir
            .and_then(|dir| self.face_normal(found.brush, found.point, normal, Some(dir)))
            .or_else(|| self.face_normal(found.brush, found.point, normal, None))
            .and_then(|n| n.try_normalize())
            .unwrap_or(contact_normal);

        HitResult {
            blocking_hit: true,
            start_penetrating,
            time,
            location,
            impact_point: found.point,
            normal,
            impact_normal,
            material: found.material,
        }
    }
}

impl CollisionQuery for CollisionWorld {
    fn sweep(&self, start: Vec3, end: Vec3, shape: &CapsuleShape, mask: ContentFlags) -> HitResult {
        if let Some(found) = self.deepest_contact(start, shape, mask) {
            return self.hit_from_contact(shape, 0.0, start, found, None);
        }

        let delta = end - start;
        let distance = delta.length();
        if distance < 1.0e-4 {
            return HitResult::no_hit(start);
        }

        // Sample the path at half-radius spacing so thin brushes are not
        // skipped, then refine the first overlapping interval.
        let spacing = (shape.radius * 0.5).max(1.0);
        let samples = ((distance / spacing).ceil() as usize).max(1);
        let mut lo = 0.0_f32;
        let mut hi = None;
        for i in 1..=samples {
            let t = i as f32 / samples as f32;
            if self.overlaps(start + delta * t, shape, mask) {
                hi = Some(t);
                break;
            }
            lo = t;
        }

        let Some(mut hi) = hi else {
            return HitResult::no_hit(end);
        };

        for _ in 0..SWEEP_REFINE_ITERATIONS {
            let mid = (lo + hi) * 0.5;
            if self.overlaps(start + delta * mid, shape, mask) {
                hi = mid;
            } else {
                lo = mid;
            }
        }

        let location = start + delta * lo;
        match self.deepest_contact(start + delta * hi, shape, mask) {
            Some(found) => self.hit_from_contact(shape, lo, location, found, Some(delta / distance)),
            None => {
                let back = -delta / distance;
                HitResult::blocking(lo, location, location - back * shape.radius, back)
            }
        }
    }

    fn contents_at(&self, location: Vec3, shape: &CapsuleShape) -> ContentFlags {
        let capsule = Self::capsule(shape);
        let transform = Self::capsule_transform(location);
        let mut contents = ContentFlags::EMPTY;

        for brush in &self.brushes {
            if let Ok(true) = intersection_test(
                &transform,
                capsule.as_ref(),
                &brush.transform,
                brush.shape.as_ref(),
            ) {
                contents |= brush.contents;
            }
        }

        contents
    }

    fn resolve_penetration(&self, location: Vec3, shape: &CapsuleShape) -> Vec3 {
        let mut resolved = location;
        for _ in 0..RESOLVE_ITERATIONS {
            match self.deepest_contact(resolved, shape, ContentFlags::MASK_PLAYER_SOLID) {
                Some(found) if found.depth > 0.0 => {
                    resolved += found.normal * (found.depth + RESOLVE_SKIN);
                }
                _ => break,
            }
        }
        resolved
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::FloorQuery;

    const CAPSULE: CapsuleShape = CapsuleShape::new(30.0, 70.0);

    fn create_test_world() -> CollisionWorld {
        let mut world = CollisionWorld::new();

        // Floor top at z=0
        world.add_box(
            Vec3::new(0.0, 0.0, -50.0),
            Vec3::new(5000.0, 5000.0, 50.0),
            ContentFlags::SOLID,
        );

        // Wall face at x=500
        world.add_box(
            Vec3::new(550.0, 0.0, 200.0),
            Vec3::new(50.0, 1000.0, 200.0),
            ContentFlags::SOLID,
        );

        world
    }

    #[test]
    fn test_sweep_stops_before_wall() {
        let world = create_test_world();

        let hit = world.sweep(
            Vec3::new(0.0, 0.0, 100.0),
            Vec3::new(1000.0, 0.0, 100.0),
            &CAPSULE,
            ContentFlags::MASK_PLAYER_SOLID,
        );

        assert!(hit.blocking_hit);
        assert!(!hit.start_penetrating);
        assert!((hit.location.x - 470.0).abs() < 0.5, "stopped at {}", hit.location.x);
        assert!((hit.impact_normal.x + 1.0).abs() < 0.01);
        assert!((hit.normal.x + 1.0).abs() < 0.01);
    }

    #[test]
    fn test_sweep_without_obstacle_completes() {
        let world = create_test_world();
        let end = Vec3::new(-300.0, 200.0, 100.0);

        let hit = world.sweep(
            Vec3::new(0.0, 0.0, 100.0),
            end,
            &CAPSULE,
            ContentFlags::MASK_PLAYER_SOLID,
        );

        assert!(!hit.blocking_hit);
        assert_eq!(hit.time, 1.0);
        assert_eq!(hit.location, end);
    }

    #[test]
    fn test_find_floor_reports_distance() {
        let world = create_test_world();
        let query = FloorQuery {
            max_distance: 50.0,
            walkable_floor_z: 0.7,
        };

        // Capsule bottom 10 units above the floor
        let floor = world.find_floor(Vec3::new(0.0, 0.0, 80.0), &CAPSULE, &query);

        assert!(floor.is_walkable_floor());
        assert!((floor.floor_distance - 10.0).abs() < 0.1, "distance {}", floor.floor_distance);
        assert!((floor.impact_normal().z - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_edge_hit_normals_differ() {
        let mut world = CollisionWorld::new();
        // Ledge with its top edge at x=100, z=0
        world.add_box(
            Vec3::new(0.0, 0.0, -50.0),
            Vec3::new(100.0, 100.0, 50.0),
            ContentFlags::SOLID,
        );

        // Drop the capsule onto the edge, offset past the corner
        let hit = world.sweep(
            Vec3::new(115.0, 0.0, 200.0),
            Vec3::new(115.0, 0.0, 0.0),
            &CAPSULE,
            ContentFlags::MASK_PLAYER_SOLID,
        );

        assert!(hit.blocking_hit);
        assert!(hit.normal.x > 0.1, "normal {:?}", hit.normal);
        assert!(hit.normal.z > 0.0);
        assert!(hit.normal.distance(hit.impact_normal) > 0.01);
    }

    #[test]
    fn test_water_does_not_block_but_is_reported() {
        let mut world = create_test_world();
        world.add_water_volume(Vec3::new(-500.0, 0.0, 100.0), Vec3::new(100.0, 100.0, 100.0));

        let hit = world.sweep(
            Vec3::new(0.0, 0.0, 100.0),
            Vec3::new(-500.0, 0.0, 100.0),
            &CAPSULE,
            ContentFlags::MASK_PLAYER_SOLID,
        );
        assert!(!hit.blocking_hit);

        let contents = world.contents_at(hit.location, &CAPSULE);
        assert!(contents.contains(ContentFlags::WATER));
    }

    #[test]
    fn test_start_penetrating_and_resolve() {
        let world = create_test_world();
        // Capsule bottom 5 units inside the floor
        let start = Vec3::new(0.0, 0.0, 65.0);

        let hit = world.sweep(
            start,
            start + Vec3::new(10.0, 0.0, 0.0),
            &CAPSULE,
            ContentFlags::MASK_PLAYER_SOLID,
        );
        assert!(hit.start_penetrating);

        let resolved = world.resolve_penetration(start, &CAPSULE);
        assert!(resolved.z >= 70.0, "resolved to {}", resolved.z);
        assert!(!world.overlaps(resolved, &CAPSULE, ContentFlags::MASK_PLAYER_SOLID));
    }

    #[test]
    fn test_material_reported_on_hit() {
        let mut world = CollisionWorld::new();
        world.add_box_with_material(
            Vec3::new(0.0, 0.0, -50.0),
            Vec3::new(500.0, 500.0, 50.0),
            ContentFlags::SOLID,
            PhysicalMaterial::new(0.4),
        );

        let hit = world.sweep(
            Vec3::new(0.0, 0.0, 100.0),
            Vec3::new(0.0, 0.0, 0.0),
            &CAPSULE,
            ContentFlags::MASK_PLAYER_SOLID,
        );

        assert_eq!(hit.material, Some(PhysicalMaterial::new(0.4)));
    }
}
