//! Vector helpers for Z-up locomotion math.
//!
//! Most movement formulas treat the horizontal plane (X, Y) separately from
//! the vertical axis. These helpers keep that split explicit.

use glam::Vec3;

/// Shortest tick the solvers will integrate.
pub const MIN_TICK_TIME: f32 = 1.0e-6;

/// General tolerance for near-zero comparisons.
pub const KINDA_SMALL_NUMBER: f32 = 1.0e-4;

/// Tolerance for squared-length and friction comparisons.
pub const SMALL_NUMBER: f32 = 1.0e-8;

/// Horizontal-plane and tolerance helpers for [`Vec3`].
pub trait PlanarExt: Sized {
    /// Length of the (x, y) part.
    fn size_2d(self) -> f32;

    /// Squared length of the (x, y) part.
    fn size_squared_2d(self) -> f32;

    /// The (x, y) part as a unit vector with z = 0, or zero.
    fn safe_normal_2d(self) -> Self;

    /// Unit vector, or zero for near-zero input.
    fn safe_normal(self) -> Self;

    /// Scale the (x, y) part down to at most `max_size`, keeping z.
    fn clamped_to_max_size_2d(self, max_size: f32) -> Self;

    /// Scale the whole vector down to at most `max_size`.
    fn clamped_to_max_size(self, max_size: f32) -> Self;

    /// Every component is within `tolerance` of zero.
    fn is_nearly_zero(self, tolerance: f32) -> bool;

    /// Component of `self` along `normal` (assumed unit length).
    fn project_onto_normal(self, normal: Self) -> Self;

    /// `self` with its component along `normal` removed.
    fn plane_project(self, normal: Self) -> Self;

    /// Same vector with z forced to zero.
    fn horizontal(self) -> Self;
}

impl PlanarExt for Vec3 {
    #[inline]
    fn size_2d(self) -> f32 {
        self.size_squared_2d().sqrt()
    }

    #[inline]
    fn size_squared_2d(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    #[inline]
    fn safe_normal_2d(self) -> Self {
        let square_sum = self.size_squared_2d();
        if square_sum < SMALL_NUMBER {
            return Vec3::ZERO;
        }
        let scale = square_sum.sqrt().recip();
        Vec3::new(self.x * scale, self.y * scale, 0.0)
    }

    #[inline]
    fn safe_normal(self) -> Self {
        let square_sum = self.length_squared();
        if square_sum < SMALL_NUMBER {
            return Vec3::ZERO;
        }
        self * square_sum.sqrt().recip()
    }

    fn clamped_to_max_size_2d(self, max_size: f32) -> Self {
        if max_size < KINDA_SMALL_NUMBER {
            return Vec3::new(0.0, 0.0, self.z);
        }
        let square_sum = self.size_squared_2d();
        if square_sum > max_size * max_size {
            let scale = max_size / square_sum.sqrt();
            Vec3::new(self.x * scale, self.y * scale, self.z)
        } else {
            self
        }
    }

    fn clamped_to_max_size(self, max_size: f32) -> Self {
        if max_size < KINDA_SMALL_NUMBER {
            return Vec3::ZERO;
        }
        let square_sum = self.length_squared();
        if square_sum > max_size * max_size {
            self * (max_size / square_sum.sqrt())
        } else {
            self
        }
    }

    #[inline]
    fn is_nearly_zero(self, tolerance: f32) -> bool {
        self.x.abs() <= tolerance && self.y.abs() <= tolerance && self.z.abs() <= tolerance
    }

    #[inline]
    fn project_onto_normal(self, normal: Self) -> Self {
        normal * self.dot(normal)
    }

    #[inline]
    fn plane_project(self, normal: Self) -> Self {
        self - self.project_onto_normal(normal)
    }

    #[inline]
    fn horizontal(self) -> Self {
        Vec3::new(self.x, self.y, 0.0)
    }
}

/// Linear interpolation between `a` and `b`.
#[inline]
pub fn lerp(a: f32, b: f32, alpha: f32) -> f32 {
    a + (b - a) * alpha
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_2d_keeps_vertical() {
        let v = Vec3::new(300.0, 400.0, -50.0);
        let clamped = v.clamped_to_max_size_2d(100.0);

        assert!((clamped.size_2d() - 100.0).abs() < 1.0e-3);
        assert_eq!(clamped.z, -50.0);
        assert!((clamped.x / clamped.y - 0.75).abs() < 1.0e-5);
    }

    #[test]
    fn test_clamp_2d_tiny_limit_zeroes_horizontal() {
        let v = Vec3::new(3.0, 4.0, 5.0);
        assert_eq!(v.clamped_to_max_size_2d(0.0), Vec3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn test_safe_normal_2d() {
        assert_eq!(Vec3::new(0.0, 0.0, 10.0).safe_normal_2d(), Vec3::ZERO);
        let n = Vec3::new(3.0, 4.0, 10.0).safe_normal_2d();
        assert!((n.length() - 1.0).abs() < 1.0e-6);
        assert_eq!(n.z, 0.0);
    }

    #[test]
    fn test_plane_project_removes_normal_component() {
        let v = Vec3::new(10.0, 0.0, -10.0);
        let projected = v.plane_project(Vec3::Z);
        assert_eq!(projected, Vec3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn test_nearly_zero_is_per_component() {
        assert!(Vec3::new(0.05, -0.05, 0.0).is_nearly_zero(0.1));
        assert!(!Vec3::new(0.05, -0.2, 0.0).is_nearly_zero(0.1));
    }
}
