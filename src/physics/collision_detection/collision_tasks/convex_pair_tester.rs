use crate::physics::collision_detection::depth_refiner::DepthRefiner;
use crate::physics::collision_detection::narrow_phase::{
    CandidatePair, ContactGeometry, NarrowPhaseContext,
};
use crate::physics::collision_detection::support_finder::ConvexSupport;

/// General convex pair tester built on Minkowski portal refinement.
pub struct ConvexPairTester;

impl ConvexPairTester {
    /// Tests two convex shapes, reporting contacts up to `margin` apart.
    ///
    /// `a` is inflated by `margin` so that shapes within the margin register as penetrating; the
    /// margin is then taken back out of the depth and the position.
    pub fn test(
        a: &ConvexSupport<'_>,
        b: &ConvexSupport<'_>,
        margin: f32,
        tolerance: f32,
        max_iterations: usize,
    ) -> Option<ContactGeometry> {
        let inflated = a.with_margin(a.margin + margin);
        let penetration = DepthRefiner::find_penetration(&inflated, b, tolerance, max_iterations)?;
        let dist = margin - penetration.depth;
        Some(ContactGeometry {
            dist,
            pos: penetration.position - penetration.normal * (0.5 * margin),
            normal: penetration.normal,
        })
    }
}

/// Bucket routine for every convex pair without an analytic routine.
pub fn convex_convex(context: &NarrowPhaseContext<'_>, pairs: &[CandidatePair]) {
    let model = context.model;
    for pair in pairs {
        let (pos_a, mat_a) = context.pose(pair.world, pair.geom_a);
        let (pos_b, mat_b) = context.pose(pair.world, pair.geom_b);
        let (Some(a), Some(b)) = (
            ConvexSupport::from_geom(model, pair.geom_a, pos_a, mat_a),
            ConvexSupport::from_geom(model, pair.geom_b, pos_b, mat_b),
        ) else {
            continue;
        };
        if let Some(geometry) = ConvexPairTester::test(
            &a,
            &b,
            context.margin(pair),
            context.mpr_tolerance,
            context.mpr_iterations,
        ) {
            context.emit(pair, geometry);
        }
    }
}

/// Bucket routine for box vs box. Shares the portal refinement path with [`convex_convex`] and
/// keeps its own table entry so a dedicated routine can be registered in its place.
pub fn box_box(context: &NarrowPhaseContext<'_>, pairs: &[CandidatePair]) {
    convex_convex(context, pairs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collision_detection::support_finder::ConvexShape;
    use approx::assert_relative_eq;
    use glam::{Mat3, Vec3};

    #[test]
    fn margin_reports_near_misses() {
        let a = ConvexSupport::new(ConvexShape::Sphere { radius: 0.5 }, Vec3::ZERO, Mat3::IDENTITY);
        let b = ConvexSupport::new(
            ConvexShape::Box {
                half_extents: Vec3::splat(0.5),
            },
            Vec3::new(1.1, 0.0, 0.0),
            Mat3::IDENTITY,
        );
        assert!(ConvexPairTester::test(&a, &b, 0.0, 1e-6, 50).is_none());
        let g = ConvexPairTester::test(&a, &b, 0.2, 1e-6, 50).unwrap();
        assert_relative_eq!(g.dist, 0.1, epsilon = 1e-3);
        assert_relative_eq!(g.normal.x, 1.0, epsilon = 1e-3);
    }
}
