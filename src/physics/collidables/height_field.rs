use crate::error::{CollisionError, Result};
use glam::{Vec2, Vec3};

/// Elevation grid geometry.
///
/// The grid covers `[-size[0], size[0]] x [-size[1], size[1]]` in the local xy plane. Samples are
/// stored row-major with `ncol` samples along x and `nrow` along y, and hold normalized
/// elevations in `[0, 1]` that are scaled by `size[2]`. `size[3]` is the depth of the solid base
/// below z = 0.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightField {
    nrow: usize,
    ncol: usize,
    size: [f32; 4],
    data: Vec<f32>,
}

impl HeightField {
    pub fn new(nrow: usize, ncol: usize, size: [f32; 4], data: Vec<f32>) -> Result<Self> {
        if nrow < 2 || ncol < 2 {
            return Err(CollisionError::InvalidHeightField {
                reason: format!("grid must be at least 2x2, got {nrow}x{ncol}"),
            });
        }
        if data.len() != nrow * ncol {
            return Err(CollisionError::InvalidHeightField {
                reason: format!("expected {} samples, got {}", nrow * ncol, data.len()),
            });
        }
        if size.iter().any(|s| !s.is_finite() || *s < 0.0) || size[0] <= 0.0 || size[1] <= 0.0 {
            return Err(CollisionError::InvalidHeightField {
                reason: format!("invalid size {size:?}"),
            });
        }
        if data.iter().any(|d| !d.is_finite()) {
            return Err(CollisionError::InvalidHeightField {
                reason: "elevation samples must be finite".to_string(),
            });
        }
        Ok(Self {
            nrow,
            ncol,
            size,
            data,
        })
    }

    /// A height field with every sample at the same normalized elevation.
    pub fn flat(nrow: usize, ncol: usize, size: [f32; 4], elevation: f32) -> Result<Self> {
        Self::new(nrow, ncol, size, vec![elevation; nrow * ncol])
    }

    #[inline(always)]
    pub fn nrow(&self) -> usize {
        self.nrow
    }

    #[inline(always)]
    pub fn ncol(&self) -> usize {
        self.ncol
    }

    #[inline(always)]
    pub fn size(&self) -> [f32; 4] {
        self.size
    }

    /// Local `(center, half_extents)` box covering the grid and its base.
    pub fn local_box(&self) -> (Vec3, Vec3) {
        let top = self.size[2] * self.data.iter().copied().fold(0.0, f32::max);
        let bottom = -self.size[3];
        (
            Vec3::new(0.0, 0.0, 0.5 * (top + bottom)),
            Vec3::new(self.size[0], self.size[1], 0.5 * (top - bottom)),
        )
    }

    #[inline(always)]
    fn sample(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.ncol + col] * self.size[2]
    }

    /// Grid cell containing a local xy point and the fractional position inside it.
    fn locate(&self, point: Vec2) -> Option<(usize, usize, f32, f32)> {
        let u = (point.x + self.size[0]) / (2.0 * self.size[0]) * (self.ncol - 1) as f32;
        let v = (point.y + self.size[1]) / (2.0 * self.size[1]) * (self.nrow - 1) as f32;
        if !(0.0..=(self.ncol - 1) as f32).contains(&u) || !(0.0..=(self.nrow - 1) as f32).contains(&v)
        {
            return None;
        }
        let col = (u as usize).min(self.ncol - 2);
        let row = (v as usize).min(self.nrow - 2);
        Some((row, col, u - col as f32, v - row as f32))
    }

    /// Bilinearly interpolated surface height at a local xy point, or `None` outside the grid.
    pub fn height(&self, point: Vec2) -> Option<f32> {
        let (row, col, fx, fy) = self.locate(point)?;
        let h00 = self.sample(row, col);
        let h01 = self.sample(row, col + 1);
        let h10 = self.sample(row + 1, col);
        let h11 = self.sample(row + 1, col + 1);
        let bottom = h00 + (h01 - h00) * fx;
        let top = h10 + (h11 - h10) * fx;
        Some(bottom + (top - bottom) * fy)
    }

    /// Unit surface normal at a local xy point, or `None` outside the grid.
    pub fn normal(&self, point: Vec2) -> Option<Vec3> {
        let (row, col, fx, fy) = self.locate(point)?;
        let h00 = self.sample(row, col);
        let h01 = self.sample(row, col + 1);
        let h10 = self.sample(row + 1, col);
        let h11 = self.sample(row + 1, col + 1);
        let cell_x = 2.0 * self.size[0] / (self.ncol - 1) as f32;
        let cell_y = 2.0 * self.size[1] / (self.nrow - 1) as f32;
        let dh_dx = ((h01 - h00) * (1.0 - fy) + (h11 - h10) * fy) / cell_x;
        let dh_dy = ((h10 - h00) * (1.0 - fx) + (h11 - h01) * fx) / cell_y;
        Some(Vec3::new(-dh_dx, -dh_dy, 1.0).normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp() -> HeightField {
        // Elevation rises linearly along x from 0 to 1.
        let data = (0..3)
            .flat_map(|_| (0..3).map(|col| col as f32 * 0.5))
            .collect();
        HeightField::new(3, 3, [1.0, 1.0, 2.0, 0.5], data).unwrap()
    }

    #[test]
    fn rejects_bad_shapes() {
        assert!(HeightField::new(1, 3, [1.0, 1.0, 1.0, 1.0], vec![0.0; 3]).is_err());
        assert!(HeightField::new(2, 2, [1.0, 1.0, 1.0, 1.0], vec![0.0; 3]).is_err());
        assert!(HeightField::new(2, 2, [0.0, 1.0, 1.0, 1.0], vec![0.0; 4]).is_err());
    }

    #[test]
    fn interpolates_and_slopes() {
        let field = ramp();
        assert_relative_eq!(field.height(Vec2::new(-1.0, 0.0)).unwrap(), 0.0);
        assert_relative_eq!(field.height(Vec2::new(0.5, 0.3)).unwrap(), 1.5, epsilon = 1e-6);
        assert_relative_eq!(field.height(Vec2::new(1.0, 1.0)).unwrap(), 2.0, epsilon = 1e-6);
        assert!(field.height(Vec2::new(1.5, 0.0)).is_none());
        let normal = field.normal(Vec2::new(0.2, 0.0)).unwrap();
        assert!(normal.x < 0.0 && normal.z > 0.0);
        assert_relative_eq!(normal.y, 0.0);
    }

    #[test]
    fn local_box_spans_base_to_peak() {
        let (center, half) = ramp().local_box();
        assert_relative_eq!(center.z - half.z, -0.5);
        assert_relative_eq!(center.z + half.z, 2.0);
    }
}
