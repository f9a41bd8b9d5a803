use glam::{Mat3, Vec3};
use tracing::instrument;

use crate::physics::collidables::geom_type::GeomType;
use crate::physics::data::Data;
use crate::physics::model::Model;
use crate::utilities::thread_dispatcher::ThreadDispatcher;
use crate::utilities::{Aamm, BoundingBox};

/// Bounding volume construction for bodies and geoms.
pub struct BoundingBoxHelpers;

impl BoundingBoxHelpers {
    /// Computes the envelope of every body of one world.
    ///
    /// Each geom contributes a sphere of radius `rbound + margin` around its position; planes
    /// contribute an unbounded envelope. Bodies without geoms are left [`Aamm::EMPTY`].
    pub fn compute_body_aamm(model: &Model, geom_xpos: &[Vec3], body_aamm: &mut [Aamm]) {
        for (body, aamm) in body_aamm.iter_mut().enumerate() {
            let start = model.body_geomadr[body];
            let mut envelope = Aamm::EMPTY;
            for geom in start..start + model.body_geomnum[body] {
                if model.geom_type[geom] == GeomType::Plane {
                    envelope = Aamm::UNBOUNDED;
                    continue;
                }
                envelope.include_sphere(
                    geom_xpos[geom],
                    model.geom_rbound[geom] + model.geom_margin[geom],
                );
            }
            *aamm = envelope;
        }
    }

    /// World-space box of a geom, inflated by its margin.
    #[inline(always)]
    pub fn world_geom_box(model: &Model, geom: usize, position: Vec3, rotation: &Mat3) -> BoundingBox {
        model.geom_aabb[geom]
            .transformed(position, rotation)
            .inflated(model.geom_margin[geom])
    }

    /// Rebuilds `data.body_aamm` and `data.geom_world_aabb` for every world from the current geom
    /// poses. Worlds are processed in parallel.
    #[instrument(level = "debug", skip_all, fields(nworld = data.nworld(), ngeom = model.ngeom))]
    pub fn update(dispatcher: &ThreadDispatcher, model: &Model, data: &mut Data) {
        let ngeom = model.ngeom;
        let nbody = model.nbody;
        // Without geoms every body stays empty, which is how the envelopes were allocated.
        if ngeom == 0 {
            return;
        }
        let geom_xpos = &data.geom_xpos;
        let geom_xmat = &data.geom_xmat;
        let body_chunks = data.body_aamm.chunks_mut(nbody);
        let box_chunks = data.geom_world_aabb.chunks_mut(ngeom);
        let mut worlds: Vec<_> = body_chunks.zip(box_chunks).collect();
        dispatcher.for_each_mut(&mut worlds, |world, (body_aamm, boxes)| {
            let base = world * ngeom;
            let positions = &geom_xpos[base..base + ngeom];
            Self::compute_body_aamm(model, positions, body_aamm);
            for (geom, geom_box) in boxes.iter_mut().enumerate() {
                *geom_box =
                    Self::world_geom_box(model, geom, positions[geom], &geom_xmat[base + geom]);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::model::{GeomDescription, ModelBuilder};
    use crate::physics::simulation_allocation_sizes::CollisionSettings;

    #[test]
    fn body_envelope_covers_its_geoms() {
        let mut builder = ModelBuilder::new();
        let body = builder.add_body();
        let empty = builder.add_body();
        let ground = builder.add_body();
        builder.add_geom(GeomDescription::sphere(body, 0.5).with_margin(0.1));
        builder.add_geom(GeomDescription::cuboid(body, Vec3::ONE));
        builder.add_geom(GeomDescription::plane(ground));
        let model = builder.build().unwrap();

        let positions = [Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0), Vec3::ZERO];
        let mut aamm = [Aamm::default(); 3];
        BoundingBoxHelpers::compute_body_aamm(&model, &positions, &mut aamm);
        assert!((aamm[body].min.x + 0.6).abs() < 1e-6);
        assert!((aamm[body].max.x - (3.0 + 3f32.sqrt())).abs() < 1e-5);
        assert!(aamm[empty].is_empty());
        assert_eq!(aamm[ground], Aamm::UNBOUNDED);
    }

    #[test]
    fn update_fills_every_world() {
        let mut builder = ModelBuilder::new();
        let body = builder.add_body();
        builder.add_geom(GeomDescription::cuboid(body, Vec3::new(1.0, 2.0, 3.0)).with_margin(0.5));
        let model = builder.build().unwrap();
        let mut data = Data::new(&model, 2, &CollisionSettings::default()).unwrap();
        data.set_geom_pose(1, 0, Vec3::new(0.0, 0.0, 5.0), Mat3::from_rotation_z(std::f32::consts::FRAC_PI_2))
            .unwrap();
        BoundingBoxHelpers::update(&ThreadDispatcher::new(2), &model, &mut data);

        assert_eq!(data.geom_world_aabb[0].half_extents, Vec3::new(1.5, 2.5, 3.5));
        let rotated = data.geom_world_aabb[1];
        assert!((rotated.center.z - 5.0).abs() < 1e-6);
        assert!((rotated.half_extents.x - 2.5).abs() < 1e-5);
        assert!((rotated.half_extents.y - 1.5).abs() < 1e-5);
        assert!(!data.body_aamm(1, 0).is_empty());
    }
}
