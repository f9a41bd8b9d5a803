use serde::{Deserialize, Serialize};

/// Closed catalog of collision geometry types.
///
/// The discriminant order is the canonical order used by the dispatch table: a type pair is
/// always looked up with the lower discriminant first.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GeomType {
    /// Infinite plane whose normal is the local z axis.
    Plane = 0,
    /// Elevation grid over the local xy plane.
    HeightField = 1,
    /// Sphere; size\[0\] is the radius.
    Sphere = 2,
    /// Segment along local z swept by a sphere; size is (radius, half length).
    Capsule = 3,
    /// Ellipsoid; size holds the three radii.
    Ellipsoid = 4,
    /// Cylinder along local z; size is (radius, half height).
    Cylinder = 5,
    /// Box; size holds the half sizes.
    Box = 6,
    /// Convex hull of a vertex set.
    Mesh = 7,
}

impl GeomType {
    /// Number of geometry types.
    pub const COUNT: usize = 8;

    /// Every type in discriminant order.
    pub const ALL: [GeomType; Self::COUNT] = [
        GeomType::Plane,
        GeomType::HeightField,
        GeomType::Sphere,
        GeomType::Capsule,
        GeomType::Ellipsoid,
        GeomType::Cylinder,
        GeomType::Box,
        GeomType::Mesh,
    ];

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Orders a pair so that the lower discriminant comes first.
    /// Returns the ordered pair and whether the inputs were swapped.
    #[inline(always)]
    pub fn canonical_pair(a: GeomType, b: GeomType) -> ((GeomType, GeomType), bool) {
        if a <= b {
            ((a, b), false)
        } else {
            ((b, a), true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_pair_is_order_independent() {
        for &a in GeomType::ALL.iter() {
            for &b in GeomType::ALL.iter() {
                let (ab, swapped_ab) = GeomType::canonical_pair(a, b);
                let (ba, swapped_ba) = GeomType::canonical_pair(b, a);
                assert_eq!(ab, ba);
                assert!(ab.0 <= ab.1);
                if a != b {
                    assert_ne!(swapped_ab, swapped_ba);
                }
            }
        }
    }

    #[test]
    fn indices_follow_all() {
        for (index, geom_type) in GeomType::ALL.iter().enumerate() {
            assert_eq!(geom_type.index(), index);
        }
    }
}
