use super::sphere_pair_tester::SpherePairTester;
use crate::physics::collision_detection::narrow_phase::{
    CandidatePair, ContactGeometry, NarrowPhaseContext,
};
use glam::{Mat3, Vec3};

/// Pair tester for sphere vs capsule collisions.
pub struct SphereCapsuleTester;

impl SphereCapsuleTester {
    /// Closest point to `point` on the segment `center ± axis * half_length`.
    #[inline(always)]
    pub fn closest_on_segment(point: Vec3, center: Vec3, axis: Vec3, half_length: f32) -> Vec3 {
        let t = axis.dot(point - center).clamp(-half_length, half_length);
        center + axis * t
    }

    /// The contact is based on the closest point of the capsule's internal segment to the
    /// sphere center.
    #[inline(always)]
    pub fn test(
        sphere_center: Vec3,
        sphere_radius: f32,
        capsule_center: Vec3,
        capsule_rotation: &Mat3,
        capsule_radius: f32,
        half_length: f32,
    ) -> ContactGeometry {
        let closest = Self::closest_on_segment(
            sphere_center,
            capsule_center,
            capsule_rotation.z_axis,
            half_length,
        );
        SpherePairTester::test(sphere_center, sphere_radius, closest, capsule_radius)
    }
}

/// Bucket routine for sphere vs capsule.
pub fn sphere_capsule(context: &NarrowPhaseContext<'_>, pairs: &[CandidatePair]) {
    let size = &context.model.geom_size;
    for pair in pairs {
        let (sphere_pos, _) = context.pose(pair.world, pair.geom_a);
        let (capsule_pos, capsule_mat) = context.pose(pair.world, pair.geom_b);
        let capsule_size = size[pair.geom_b];
        let geometry = SphereCapsuleTester::test(
            sphere_pos,
            size[pair.geom_a].x,
            capsule_pos,
            &capsule_mat,
            capsule_size.x,
            capsule_size.y,
        );
        context.emit(pair, geometry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sphere_beside_capsule_side() {
        let g = SphereCapsuleTester::test(
            Vec3::new(0.0, 0.8, 0.5),
            0.5,
            Vec3::ZERO,
            &Mat3::IDENTITY,
            0.5,
            1.0,
        );
        assert_relative_eq!(g.dist, -0.2, epsilon = 1e-6);
        assert_relative_eq!(g.normal.y, -1.0);
    }

    #[test]
    fn sphere_past_capsule_tip() {
        let g = SphereCapsuleTester::test(
            Vec3::new(0.0, 0.0, 3.0),
            0.5,
            Vec3::ZERO,
            &Mat3::IDENTITY,
            0.5,
            1.0,
        );
        assert_relative_eq!(g.dist, 1.0, epsilon = 1e-6);
        assert_relative_eq!(g.normal.z, -1.0);
    }
}
