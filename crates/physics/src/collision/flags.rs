//! Content flags for collision filtering.
//!
//! Brushes carry a content set; sweeps carry a mask. A brush takes part in a
//! query only when its contents intersect the mask.

use serde::{Deserialize, Serialize};

/// Content flags describe what type of volume a brush is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ContentFlags(pub u32);

impl ContentFlags {
    /// Empty space.
    pub const EMPTY: Self = Self(0);

    /// Solid world geometry: walls, floors, ramps.
    pub const SOLID: Self = Self(1 << 0);

    /// Water volume. Entering one hands the character to swimming.
    pub const WATER: Self = Self(1 << 1);

    /// Blocks characters but nothing else.
    pub const PLAYER_CLIP: Self = Self(1 << 2);

    /// Non-blocking gameplay volume.
    pub const TRIGGER: Self = Self(1 << 3);

    /// Mask for character movement sweeps.
    pub const MASK_PLAYER_SOLID: Self = Self(Self::SOLID.0 | Self::PLAYER_CLIP.0);

    /// Mask for liquid overlap tests.
    pub const MASK_LIQUID: Self = Self::WATER;

    #[inline]
    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    #[inline]
    pub fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for ContentFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for ContentFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitAnd for ContentFlags {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}
