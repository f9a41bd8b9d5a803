use crate::error::{CollisionError, Result};
use glam::Vec3;

/// Convex mesh geometry stored as the vertex set of its hull, in the geom's local frame.
///
/// Only the vertices matter for collision: the support mapping of a convex hull is the vertex
/// with the largest projection onto the query direction.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexMesh {
    vertices: Vec<Vec3>,
    centroid: Vec3,
    min: Vec3,
    max: Vec3,
}

impl ConvexMesh {
    /// Creates a mesh from hull vertices. At least one finite vertex is required.
    pub fn new(vertices: Vec<Vec3>) -> Result<Self> {
        if vertices.is_empty() {
            return Err(CollisionError::InvalidMesh {
                reason: "a convex mesh needs at least one vertex".to_string(),
            });
        }
        if let Some(index) = vertices.iter().position(|v| !v.is_finite()) {
            return Err(CollisionError::InvalidMesh {
                reason: format!("vertex {index} is not finite"),
            });
        }
        let mut min = Vec3::INFINITY;
        let mut max = Vec3::NEG_INFINITY;
        let mut sum = Vec3::ZERO;
        for &vertex in vertices.iter() {
            min = min.min(vertex);
            max = max.max(vertex);
            sum += vertex;
        }
        let centroid = sum / vertices.len() as f32;
        Ok(Self {
            vertices,
            centroid,
            min,
            max,
        })
    }

    /// Creates the eight-vertex hull of a box with the given half extents.
    pub fn cuboid(half_extents: Vec3) -> Result<Self> {
        let vertices = (0..8)
            .map(|corner| {
                Vec3::new(
                    if corner & 1 == 0 { -half_extents.x } else { half_extents.x },
                    if corner & 2 == 0 { -half_extents.y } else { half_extents.y },
                    if corner & 4 == 0 { -half_extents.z } else { half_extents.z },
                )
            })
            .collect();
        Self::new(vertices)
    }

    #[inline(always)]
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    /// Average of the vertices. Always strictly inside the hull unless the hull is degenerate.
    #[inline(always)]
    pub fn centroid(&self) -> Vec3 {
        self.centroid
    }

    /// Local axis-aligned bounds as `(min, max)`.
    #[inline(always)]
    pub fn bounds(&self) -> (Vec3, Vec3) {
        (self.min, self.max)
    }

    /// Distance from the local origin to the farthest vertex.
    pub fn bounding_radius(&self) -> f32 {
        self.vertices
            .iter()
            .map(|v| v.length())
            .fold(0.0, f32::max)
    }

    /// Vertex with the largest projection onto `direction`.
    #[inline]
    pub fn support(&self, direction: Vec3) -> Vec3 {
        let mut best = self.vertices[0];
        let mut best_dot = best.dot(direction);
        for &vertex in self.vertices[1..].iter() {
            let dot = vertex.dot(direction);
            if dot > best_dot {
                best_dot = dot;
                best = vertex;
            }
        }
        best
    }
}
