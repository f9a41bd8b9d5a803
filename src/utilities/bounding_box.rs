use glam::{Mat3, Vec3};

/// Axis-aligned bounding box in center/half-extent form.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    /// Center of the box.
    pub center: Vec3,
    /// Half of the box's size along each axis.
    pub half_extents: Vec3,
}

impl BoundingBox {
    /// Constructs a bounding box from its center and half extents.
    #[inline]
    pub const fn new(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    /// Constructs a bounding box from its minimum and maximum corners.
    #[inline]
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self {
            center: (min + max) * 0.5,
            half_extents: (max - min) * 0.5,
        }
    }

    /// Location with the lowest X, Y, and Z coordinates in the box.
    #[inline(always)]
    pub fn min(&self) -> Vec3 {
        self.center - self.half_extents
    }

    /// Location with the highest X, Y, and Z coordinates in the box.
    #[inline(always)]
    pub fn max(&self) -> Vec3 {
        self.center + self.half_extents
    }

    /// Grows the box by `amount` along every axis in both directions.
    #[inline(always)]
    pub fn inflated(&self, amount: f32) -> Self {
        Self {
            center: self.center,
            half_extents: self.half_extents + Vec3::splat(amount),
        }
    }

    /// Maps a box given in a local frame to a world-space axis-aligned box.
    ///
    /// The half extent along each world axis is the dot product of the local half extents with the
    /// absolute values of the corresponding rotation row; the center is rotated and translated.
    #[inline(always)]
    pub fn transformed(&self, position: Vec3, rotation: &Mat3) -> Self {
        let abs_rotation = Mat3::from_cols(
            rotation.x_axis.abs(),
            rotation.y_axis.abs(),
            rotation.z_axis.abs(),
        );
        Self {
            center: *rotation * self.center + position,
            half_extents: abs_rotation * self.half_extents,
        }
    }

    /// Projects the box onto `direction`, returning the `(center, radius)` of the interval.
    /// `abs_direction` must be the component-wise absolute value of `direction`.
    #[inline(always)]
    pub fn project(&self, direction: Vec3, abs_direction: Vec3) -> (f32, f32) {
        (direction.dot(self.center), self.half_extents.dot(abs_direction))
    }

    /// Determines if two boxes intersect. Boxes that merely touch count as intersecting.
    #[inline(always)]
    pub fn intersects(a: &Self, b: &Self) -> bool {
        let (a_min, a_max) = (a.min(), a.max());
        let (b_min, b_max) = (b.min(), b.max());
        !(a_min.x > b_max.x
            || b_min.x > a_max.x
            || a_min.y > b_max.y
            || b_min.y > a_max.y
            || a_min.z > b_max.z
            || b_min.z > a_max.z)
    }
}

/// Axis-aligned min/max envelope of a body.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aamm {
    /// Lowest corner.
    pub min: Vec3,
    /// Highest corner.
    pub max: Vec3,
}

impl Default for Aamm {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aamm {
    /// Inverted envelope; the identity for [`Aamm::merge`]. A body with no geoms keeps this value.
    pub const EMPTY: Self = Self {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };

    /// Envelope covering all of space, used for unbounded geometry like planes.
    pub const UNBOUNDED: Self = Self {
        min: Vec3::NEG_INFINITY,
        max: Vec3::INFINITY,
    };

    /// Whether the envelope is inverted on any axis.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    /// Grows the envelope to contain a sphere.
    #[inline(always)]
    pub fn include_sphere(&mut self, center: Vec3, radius: f32) {
        let radius = Vec3::splat(radius);
        self.min = self.min.min(center - radius);
        self.max = self.max.max(center + radius);
    }

    /// Grows the envelope to contain another one.
    #[inline(always)]
    pub fn merge(&mut self, other: &Self) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Determines if two envelopes intersect. Empty envelopes intersect nothing.
    #[inline(always)]
    pub fn intersects(a: &Self, b: &Self) -> bool {
        if a.is_empty() || b.is_empty() {
            return false;
        }
        !(a.min.cmpgt(b.max).any() || b.min.cmpgt(a.max).any())
    }
}
