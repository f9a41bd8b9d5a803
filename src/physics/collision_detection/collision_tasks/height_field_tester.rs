use crate::physics::collidables::height_field::HeightField;
use crate::physics::collision_detection::narrow_phase::{
    CandidatePair, ContactGeometry, NarrowPhaseContext,
};
use crate::physics::collision_detection::support_finder::{ConvexSupport, SupportFinder};
use glam::{Mat3, Vec3};

/// Surface normal refinement passes.
const NORMAL_PASSES: usize = 2;

/// Tests convex geometry against a height field by finding the convex shape's deepest point
/// along the local surface normal and comparing it with the interpolated surface height.
pub struct HeightFieldTester;

impl HeightFieldTester {
    /// Returns `None` when the deepest point lies outside the grid.
    pub fn test<S: SupportFinder>(
        field: &HeightField,
        field_position: Vec3,
        field_rotation: &Mat3,
        convex: &S,
    ) -> Option<ContactGeometry> {
        let to_world = *field_rotation;
        let to_local = field_rotation.transpose();
        let local = |point: Vec3| to_local * (point - field_position);

        let center = local(convex.center());
        let mut normal = field.normal(center.truncate()).unwrap_or(Vec3::Z);
        let mut deepest = local(convex.support(to_world * -normal));
        for _ in 1..NORMAL_PASSES {
            let Some(refined) = field.normal(deepest.truncate()) else {
                break;
            };
            normal = refined;
            deepest = local(convex.support(to_world * -normal));
        }

        let height = field.height(deepest.truncate())?;
        let dist = (deepest.z - height) * normal.z;
        let pos = deepest - normal * (0.5 * dist);
        Some(ContactGeometry {
            dist,
            pos: to_world * pos + field_position,
            normal: to_world * normal,
        })
    }
}

/// Bucket routine for height field vs sphere, capsule, box and mesh.
pub fn hfield_convex(context: &NarrowPhaseContext<'_>, pairs: &[CandidatePair]) {
    let model = context.model;
    for pair in pairs {
        let Some(field) = model.geom_height_field(pair.geom_a) else {
            continue;
        };
        let (field_position, field_rotation) = context.pose(pair.world, pair.geom_a);
        let (position, rotation) = context.pose(pair.world, pair.geom_b);
        let Some(convex) = ConvexSupport::from_geom(model, pair.geom_b, position, rotation) else {
            continue;
        };
        if let Some(geometry) =
            HeightFieldTester::test(field, field_position, &field_rotation, &convex)
        {
            context.emit(pair, geometry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collision_detection::support_finder::ConvexShape;
    use approx::assert_relative_eq;

    #[test]
    fn sphere_sinking_into_flat_field() {
        let field = HeightField::flat(4, 4, [2.0, 2.0, 1.0, 0.5], 0.5).unwrap();
        let sphere = ConvexSupport::new(
            ConvexShape::Sphere { radius: 0.5 },
            Vec3::new(0.3, -0.2, 0.9),
            Mat3::IDENTITY,
        );
        let g = HeightFieldTester::test(&field, Vec3::ZERO, &Mat3::IDENTITY, &sphere).unwrap();
        assert_relative_eq!(g.dist, -0.1, epsilon = 1e-5);
        assert_relative_eq!(g.normal.z, 1.0, epsilon = 1e-6);
        assert_relative_eq!(g.pos.z, 0.45, epsilon = 1e-5);
    }

    #[test]
    fn outside_the_grid_is_no_contact() {
        let field = HeightField::flat(2, 2, [1.0, 1.0, 1.0, 0.5], 0.0).unwrap();
        let sphere = ConvexSupport::new(
            ConvexShape::Sphere { radius: 0.5 },
            Vec3::new(3.0, 0.0, 0.0),
            Mat3::IDENTITY,
        );
        assert!(HeightFieldTester::test(&field, Vec3::ZERO, &Mat3::IDENTITY, &sphere).is_none());
    }
}
