use crate::physics::collision_detection::narrow_phase::{
    CandidatePair, ContactGeometry, NarrowPhaseContext,
};
use glam::Vec3;

/// Pair tester for sphere vs sphere collisions.
pub struct SpherePairTester;

impl SpherePairTester {
    /// Contact between two spheres. The normal points from `a` toward `b`; coincident centers
    /// fall back to (0, 1, 0).
    #[inline(always)]
    pub fn test(center_a: Vec3, radius_a: f32, center_b: Vec3, radius_b: f32) -> ContactGeometry {
        let offset = center_b - center_a;
        let center_distance = offset.length();
        let normal = if center_distance > 0.0 {
            offset / center_distance
        } else {
            Vec3::Y
        };
        let dist = center_distance - radius_a - radius_b;
        ContactGeometry {
            dist,
            pos: center_a + normal * (radius_a + 0.5 * dist),
            normal,
        }
    }
}

/// Bucket routine for sphere vs sphere.
pub fn sphere_sphere(context: &NarrowPhaseContext<'_>, pairs: &[CandidatePair]) {
    let size = &context.model.geom_size;
    for pair in pairs {
        let (pos_a, _) = context.pose(pair.world, pair.geom_a);
        let (pos_b, _) = context.pose(pair.world, pair.geom_b);
        let geometry =
            SpherePairTester::test(pos_a, size[pair.geom_a].x, pos_b, size[pair.geom_b].x);
        context.emit(pair, geometry);
    }
}
