use approx::assert_relative_eq;
use batched_collision::{
    CandidatePair, CollisionPipeline, CollisionSettings, ContactGeometry, ConvexMesh, Data,
    GeomDescription, GeomType, HeightField, Model, ModelBuilder, NarrowPhaseContext, StepReport,
    COLLISION_TASKS, SENTINEL_DIST,
};
use glam::{Mat3, Vec3};

fn geom(geom_type: GeomType, body: usize) -> GeomDescription {
    match geom_type {
        GeomType::Plane => GeomDescription::plane(body),
        GeomType::HeightField => GeomDescription::height_field(body, 0),
        GeomType::Sphere => GeomDescription::sphere(body, 0.5),
        GeomType::Capsule => GeomDescription::capsule(body, 0.5, 0.5),
        GeomType::Ellipsoid => GeomDescription::ellipsoid(body, Vec3::new(0.5, 0.4, 0.6)),
        GeomType::Cylinder => GeomDescription::cylinder(body, 0.5, 0.5),
        GeomType::Box => GeomDescription::cuboid(body, Vec3::splat(0.5)),
        GeomType::Mesh => GeomDescription::mesh(body, 0),
    }
}

/// Two geoms on separate bodies, with one mesh and one flat height field available.
fn pair_model(a: GeomType, b: GeomType) -> Model {
    let mut builder = ModelBuilder::new();
    builder.add_mesh(ConvexMesh::cuboid(Vec3::splat(0.5)).unwrap());
    builder.add_height_field(HeightField::flat(5, 5, [2.0, 2.0, 1.0, 0.5], 0.0).unwrap());
    let body_a = builder.add_body();
    let body_b = builder.add_body();
    builder.add_geom(geom(a, body_a));
    builder.add_geom(geom(b, body_b));
    builder.build().unwrap()
}

fn step_pair(pipeline: &CollisionPipeline, model: &Model, offset: Vec3) -> (StepReport, Data) {
    let mut data = pipeline.create_data(model, 1).unwrap();
    data.set_geom_pose(0, 1, offset, Mat3::IDENTITY).unwrap();
    let report = pipeline.step(model, &mut data).unwrap();
    (report, data)
}

fn pipeline() -> CollisionPipeline {
    CollisionPipeline::new(CollisionSettings {
        worker_threads: 2,
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn every_table_entry_reports_overlap_and_separation() {
    let pipeline = pipeline();
    for task in COLLISION_TASKS.iter() {
        let (a, b) = task.types;
        let model = pair_model(a, b);

        let (report, data) = step_pair(&pipeline, &model, Vec3::new(0.3, 0.2, 0.3));
        assert_eq!(report.active_buckets, 1, "{}", task.name);
        assert!(report.total_contacts() >= 1, "{} found no contact", task.name);
        for slot in 0..report.contacts.per_world[0] {
            let contact = data.contact.get(0, slot);
            assert_eq!((contact.g1, contact.g2), (0, 1), "{}", task.name);
            assert!(contact.dist <= 0.0, "{}: dist {}", task.name, contact.dist);
            assert_relative_eq!(contact.normal.length(), 1.0, epsilon = 1e-4);
        }

        let (report, _) = step_pair(&pipeline, &model, Vec3::new(0.0, 0.0, 50.0));
        assert_eq!(report.total_contacts(), 0, "{} touched at a distance", task.name);
    }
}

#[test]
fn pairs_missing_from_the_table_never_collide() {
    let pipeline = pipeline();
    for (a, b) in [
        (GeomType::Box, GeomType::Cylinder),
        (GeomType::Plane, GeomType::Plane),
        (GeomType::HeightField, GeomType::Cylinder),
    ] {
        let model = pair_model(a, b);
        let (report, _) = step_pair(&pipeline, &model, Vec3::new(0.1, 0.0, 0.1));
        assert_eq!(report.candidates, 0);
        assert_eq!(report.active_buckets, 0);
        assert_eq!(report.total_contacts(), 0);
    }
}

#[test]
fn overlapping_unit_spheres() {
    let mut builder = ModelBuilder::new();
    let a = builder.add_body();
    let b = builder.add_body();
    builder.add_geom(GeomDescription::sphere(a, 1.0));
    builder.add_geom(GeomDescription::sphere(b, 1.0));
    let model = builder.build().unwrap();

    let (report, data) = step_pair(&pipeline(), &model, Vec3::new(1.5, 0.0, 0.0));
    assert_eq!(report.overlaps, vec![1]);
    assert_eq!(report.contacts.per_world, vec![1]);
    let contact = data.contact.get(0, 0);
    assert_relative_eq!(contact.dist, -0.5, epsilon = 1e-5);
    assert_relative_eq!(contact.normal.x, 1.0, epsilon = 1e-5);
    assert_relative_eq!(contact.pos.x, 0.75, epsilon = 1e-5);
    assert_relative_eq!(contact.includemargin, 0.0);
}

#[test]
fn sphere_sunk_below_a_plane_keeps_its_contact() {
    let model = pair_model(GeomType::Plane, GeomType::Sphere);
    let pipeline = pipeline();
    for depth in [0.4f32, 0.6, 2.0, 40.0] {
        let (report, data) = step_pair(&pipeline, &model, Vec3::new(1.0, -3.0, -depth));
        assert_eq!(report.overlaps, vec![1], "depth {depth}");
        assert_eq!(report.contacts.per_world, vec![1], "depth {depth}");
        let contact = data.contact.get(0, 0);
        assert_relative_eq!(contact.dist, -depth - 0.5, epsilon = 1e-4);
        assert_eq!(contact.normal, Vec3::Z);
    }
}

#[test]
fn near_miss_reaches_the_routine_but_emits_nothing() {
    let model = pair_model(GeomType::Sphere, GeomType::Box);
    let (report, _) = step_pair(&pipeline(), &model, Vec3::new(0.9, 0.9, 0.0));
    assert_eq!(report.candidates, 1);
    assert_eq!(report.total_contacts(), 0);
}

#[test]
fn contact_slots_are_sentinel_or_complete() {
    let mut builder = ModelBuilder::new();
    let floor = builder.add_body();
    builder.add_geom(GeomDescription::plane(floor));
    for _ in 0..4 {
        let body = builder.add_body();
        builder.add_geom(GeomDescription::cuboid(body, Vec3::splat(0.5)));
    }
    let model = builder.build().unwrap();
    let pipeline = pipeline();
    let mut data = pipeline.create_data(&model, 3).unwrap();
    for world in 0..3 {
        for cube in 1..5 {
            let height = if cube <= world { 0.45 } else { 3.0 };
            let position = Vec3::new(2.0 * cube as f32, 0.0, height);
            data.set_geom_pose(world, cube, position, Mat3::IDENTITY).unwrap();
        }
    }
    let report = pipeline.step(&model, &mut data).unwrap();
    assert_eq!(report.contacts.per_world, vec![0, 4, 8]);

    for world in 0..3 {
        let used = report.contacts.per_world[world];
        for slot in 0..data.contact.capacity() {
            let contact = data.contact.get(world, slot);
            if slot < used {
                assert_eq!(contact.g1, 0);
                assert!((1..5).contains(&contact.g2));
                assert_relative_eq!(contact.dist, -0.05, epsilon = 1e-5);
                assert_eq!(contact.normal, Vec3::Z);
            } else {
                assert!(contact.is_sentinel(), "world {world} slot {slot}");
                assert_eq!(contact.dist, SENTINEL_DIST);
            }
        }
    }
    let flat = data.contact.compacted(&report.contacts);
    assert_eq!(flat.len(), 12);
    assert_eq!(report.contacts.offsets, vec![0, 0, 4]);
}

#[test]
fn contact_buffer_overflow_keeps_the_first_reservations() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut builder = ModelBuilder::new();
    for _ in 0..5 {
        let body = builder.add_body();
        builder.add_geom(GeomDescription::sphere(body, 1.0));
    }
    let model = builder.build().unwrap();
    let pipeline = CollisionPipeline::new(CollisionSettings {
        max_contacts_per_world: 5,
        ..Default::default()
    })
    .unwrap();
    let mut data = pipeline.create_data(&model, 1).unwrap();
    for geom in 0..5 {
        let position = Vec3::new(0.2 * geom as f32, 0.1 * geom as f32, 0.0);
        data.set_geom_pose(0, geom, position, Mat3::IDENTITY).unwrap();
    }
    let report = pipeline.step(&model, &mut data).unwrap();
    assert_eq!(report.overlaps, vec![10]);
    assert_eq!(report.contacts.per_world, vec![5]);
    assert_eq!(report.contacts.dropped, vec![5]);
    assert!(report.contact_overflowed());
    for slot in 0..5 {
        assert!(!data.contact.get(0, slot).is_sentinel());
    }
}

#[test]
fn replaced_routine_keeps_its_bucket() {
    fn fixed_contact(context: &NarrowPhaseContext<'_>, pairs: &[CandidatePair]) {
        for pair in pairs {
            context.emit(
                pair,
                ContactGeometry {
                    dist: -1.0,
                    pos: Vec3::splat(7.0),
                    normal: Vec3::Y,
                },
            );
        }
    }

    let mut pipeline = pipeline();
    let bucket = pipeline
        .registry_mut()
        .set_routine(GeomType::Sphere, GeomType::Sphere, fixed_contact);
    assert_eq!(bucket, Some(10));

    let model = pair_model(GeomType::Sphere, GeomType::Sphere);
    let (report, data) = step_pair(&pipeline, &model, Vec3::new(0.5, 0.0, 0.0));
    assert_eq!(report.total_contacts(), 1);
    let contact = data.contact.get(0, 0);
    assert_eq!(contact.pos, Vec3::splat(7.0));
    assert_eq!(contact.normal, Vec3::Y);
}
