use super::sphere_pair_tester::SpherePairTester;
use crate::physics::collision_detection::narrow_phase::{
    CandidatePair, ContactGeometry, NarrowPhaseContext,
};
use glam::{Mat3, Vec3};

/// Pair tester for capsule vs capsule collisions.
pub struct CapsulePairTester;

impl CapsulePairTester {
    /// Closest points between segments `center_a ± axis_a * half_a` and `center_b ± axis_b * half_b`.
    /// Axes must be unit length.
    pub fn closest_points(
        center_a: Vec3,
        axis_a: Vec3,
        half_a: f32,
        center_b: Vec3,
        axis_b: Vec3,
        half_b: f32,
    ) -> (Vec3, Vec3) {
        let offset = center_b - center_a;
        let da_offset = axis_a.dot(offset);
        let db_offset = axis_b.dot(offset);
        let dadb = axis_a.dot(axis_b);
        let denominator = 1.0 - dadb * dadb;
        // Parallel axes: any point of the overlapping range works, take the middle of it.
        let mut ta = if denominator > 1.0e-6 {
            (da_offset - db_offset * dadb) / denominator
        } else {
            let low = (-half_a).max(da_offset - half_b);
            let high = half_a.min(da_offset + half_b);
            0.5 * (low + high)
        };
        ta = ta.clamp(-half_a, half_a);
        let tb = (ta * dadb - db_offset).clamp(-half_b, half_b);
        let ta = (da_offset + tb * dadb).clamp(-half_a, half_a);
        (center_a + axis_a * ta, center_b + axis_b * tb)
    }

    #[inline(always)]
    pub fn test(
        center_a: Vec3,
        rotation_a: &Mat3,
        size_a: Vec3,
        center_b: Vec3,
        rotation_b: &Mat3,
        size_b: Vec3,
    ) -> ContactGeometry {
        let (on_a, on_b) = Self::closest_points(
            center_a,
            rotation_a.z_axis,
            size_a.y,
            center_b,
            rotation_b.z_axis,
            size_b.y,
        );
        SpherePairTester::test(on_a, size_a.x, on_b, size_b.x)
    }
}

/// Bucket routine for capsule vs capsule.
pub fn capsule_capsule(context: &NarrowPhaseContext<'_>, pairs: &[CandidatePair]) {
    let size = &context.model.geom_size;
    for pair in pairs {
        let (pos_a, mat_a) = context.pose(pair.world, pair.geom_a);
        let (pos_b, mat_b) = context.pose(pair.world, pair.geom_b);
        let geometry = CapsulePairTester::test(
            pos_a,
            &mat_a,
            size[pair.geom_a],
            pos_b,
            &mat_b,
            size[pair.geom_b],
        );
        context.emit(pair, geometry);
    }
}
