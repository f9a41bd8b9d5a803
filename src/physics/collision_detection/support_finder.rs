use crate::physics::collidables::convex_hull::ConvexMesh;
use crate::physics::collidables::geom_type::GeomType;
use crate::physics::model::Model;
use glam::{Mat3, Vec2, Vec3};

/// Support mapping of a convex shape in world space.
pub trait SupportFinder {
    /// Point of the shape with the largest projection onto `direction`. `direction` need not be
    /// normalized.
    fn support(&self, direction: Vec3) -> Vec3;

    /// A point inside the shape.
    fn center(&self) -> Vec3;
}

/// Local geometry of a convex geom.
#[derive(Debug, Clone, Copy)]
pub enum ConvexShape<'a> {
    Sphere { radius: f32 },
    Capsule { radius: f32, half_length: f32 },
    Ellipsoid { radii: Vec3 },
    Cylinder { radius: f32, half_height: f32 },
    Box { half_extents: Vec3 },
    Mesh(&'a ConvexMesh),
}

impl ConvexShape<'_> {
    /// Local support point along a direction.
    pub fn local_support(&self, direction: Vec3) -> Vec3 {
        match *self {
            ConvexShape::Sphere { radius } => direction.normalize_or_zero() * radius,
            ConvexShape::Capsule {
                radius,
                half_length,
            } => {
                let tip = if direction.z >= 0.0 { half_length } else { -half_length };
                Vec3::new(0.0, 0.0, tip) + direction.normalize_or_zero() * radius
            }
            ConvexShape::Ellipsoid { radii } => {
                let scaled = direction * radii;
                let length = scaled.length();
                if length > 0.0 {
                    scaled * radii / length
                } else {
                    Vec3::ZERO
                }
            }
            ConvexShape::Cylinder {
                radius,
                half_height,
            } => {
                let radial = Vec2::new(direction.x, direction.y).normalize_or_zero() * radius;
                let z = if direction.z >= 0.0 { half_height } else { -half_height };
                Vec3::new(radial.x, radial.y, z)
            }
            ConvexShape::Box { half_extents } => Vec3::select(
                direction.cmpge(Vec3::ZERO),
                half_extents,
                -half_extents,
            ),
            ConvexShape::Mesh(mesh) => mesh.support(direction),
        }
    }

    #[inline]
    fn local_center(&self) -> Vec3 {
        match self {
            ConvexShape::Mesh(mesh) => mesh.centroid(),
            _ => Vec3::ZERO,
        }
    }
}

/// A convex geom placed in the world, optionally inflated by a spherical margin.
#[derive(Debug, Clone, Copy)]
pub struct ConvexSupport<'a> {
    pub shape: ConvexShape<'a>,
    pub position: Vec3,
    pub rotation: Mat3,
    pub margin: f32,
}

impl<'a> ConvexSupport<'a> {
    pub fn new(shape: ConvexShape<'a>, position: Vec3, rotation: Mat3) -> Self {
        Self {
            shape,
            position,
            rotation,
            margin: 0.0,
        }
    }

    /// Builds the support mapping of a geom. Returns `None` for planes and height fields, and for
    /// meshes whose data is missing.
    pub fn from_geom(model: &'a Model, geom: usize, position: Vec3, rotation: Mat3) -> Option<Self> {
        let size = model.geom_size[geom];
        let shape = match model.geom_type[geom] {
            GeomType::Plane | GeomType::HeightField => return None,
            GeomType::Sphere => ConvexShape::Sphere { radius: size.x },
            GeomType::Capsule => ConvexShape::Capsule {
                radius: size.x,
                half_length: size.y,
            },
            GeomType::Ellipsoid => ConvexShape::Ellipsoid { radii: size },
            GeomType::Cylinder => ConvexShape::Cylinder {
                radius: size.x,
                half_height: size.y,
            },
            GeomType::Box => ConvexShape::Box { half_extents: size },
            GeomType::Mesh => ConvexShape::Mesh(model.geom_mesh(geom)?),
        };
        Some(Self::new(shape, position, rotation))
    }

    /// Inflates the shape by a sphere of radius `margin`.
    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin;
        self
    }
}

impl SupportFinder for ConvexSupport<'_> {
    #[inline]
    fn support(&self, direction: Vec3) -> Vec3 {
        let local = self.shape.local_support(self.rotation.transpose() * direction);
        let mut point = self.rotation * local + self.position;
        if self.margin > 0.0 {
            point += direction.normalize_or_zero() * self.margin;
        }
        point
    }

    #[inline]
    fn center(&self) -> Vec3 {
        self.rotation * self.shape.local_center() + self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn primitive_supports() {
        let d = Vec3::new(1.0, 1.0, 1.0);
        let sphere = ConvexShape::Sphere { radius: 2.0 };
        assert_relative_eq!(sphere.local_support(d).length(), 2.0, epsilon = 1e-6);
        let cylinder = ConvexShape::Cylinder {
            radius: 1.0,
            half_height: 3.0,
        };
        let s = cylinder.local_support(d);
        assert_relative_eq!(s.z, 3.0);
        assert_relative_eq!(Vec2::new(s.x, s.y).length(), 1.0, epsilon = 1e-6);
        let ellipsoid = ConvexShape::Ellipsoid {
            radii: Vec3::new(3.0, 1.0, 1.0),
        };
        assert_relative_eq!(ellipsoid.local_support(Vec3::X).x, 3.0);
        let cuboid = ConvexShape::Box {
            half_extents: Vec3::new(1.0, 2.0, 3.0),
        };
        assert_eq!(cuboid.local_support(Vec3::new(-1.0, 0.5, -0.1)), Vec3::new(-1.0, 2.0, -3.0));
    }

    #[test]
    fn world_support_applies_pose_and_margin() {
        let capsule = ConvexShape::Capsule {
            radius: 0.5,
            half_length: 1.0,
        };
        // Rotate the capsule axis onto world x.
        let rotation = Mat3::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let support = ConvexSupport::new(capsule, Vec3::new(0.0, 2.0, 0.0), rotation).with_margin(0.25);
        let s = support.support(Vec3::X);
        assert_relative_eq!(s.x, 1.75, epsilon = 1e-5);
        assert_relative_eq!(s.y, 2.0, epsilon = 1e-5);
        assert_eq!(support.center(), Vec3::new(0.0, 2.0, 0.0));
    }
}
