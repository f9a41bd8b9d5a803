use batched_collision::utilities::thread_dispatcher::ThreadDispatcher;
use batched_collision::utilities::BoundingBox;
use batched_collision::{
    BroadPhase, CollisionPipeline, CollisionSettings, Data, GeomDescription, Model, ModelBuilder,
    OverlapPair,
};
use glam::{Mat3, Vec3};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn cuboid_model(ngeom: usize) -> Model {
    let mut builder = ModelBuilder::new();
    let body = builder.add_body();
    for _ in 0..ngeom {
        builder.add_geom(GeomDescription::cuboid(body, Vec3::ONE));
    }
    builder.build().unwrap()
}

fn brute_force(boxes: &[BoundingBox]) -> BTreeSet<OverlapPair> {
    let mut pairs = BTreeSet::new();
    for i in 0..boxes.len() {
        for j in i + 1..boxes.len() {
            if BoundingBox::intersects(&boxes[i], &boxes[j]) {
                pairs.insert(OverlapPair::new(i, j));
            }
        }
    }
    pairs
}

fn bounding_box() -> impl Strategy<Value = BoundingBox> {
    (
        prop::array::uniform3(-10.0f32..10.0),
        prop::array::uniform3(0.05f32..3.0),
    )
        .prop_map(|(center, half)| BoundingBox::new(Vec3::from(center), Vec3::from(half)))
}

fn worlds() -> impl Strategy<Value = Vec<Vec<BoundingBox>>> {
    (1usize..4, 1usize..24).prop_flat_map(|(nworld, ngeom)| {
        prop::collection::vec(prop::collection::vec(bounding_box(), ngeom), nworld)
    })
}

/// Axis-aligned, negative and nearly degenerate directions, plus arbitrary ones.
fn sweep_direction() -> impl Strategy<Value = Vec3> {
    prop_oneof![
        Just(Vec3::X),
        Just(Vec3::Z),
        Just(-Vec3::Y),
        Just(Vec3::new(-1.0, 0.5, -0.2).normalize()),
        Just(Vec3::new(1.0e-3, 1.0, 0.0).normalize()),
        prop::array::uniform3(-1.0f32..1.0)
            .prop_map(Vec3::from)
            .prop_filter("direction must have a length", |d| d.length() > 1.0e-3)
            .prop_map(Vec3::normalize),
    ]
}

fn run_broad_phase(worlds: &[Vec<BoundingBox>], threads: usize) -> Data {
    let settings = CollisionSettings::default();
    sweep(worlds, threads, settings.normalized_sweep_direction())
}

fn sweep(worlds: &[Vec<BoundingBox>], threads: usize, direction: Vec3) -> Data {
    let ngeom = worlds[0].len();
    let model = cuboid_model(ngeom);
    let settings = CollisionSettings::default();
    let mut data = Data::new(&model, worlds.len(), &settings).unwrap();
    for (world, boxes) in worlds.iter().enumerate() {
        data.geom_world_aabb[world * ngeom..(world + 1) * ngeom].copy_from_slice(boxes);
    }
    BroadPhase::run(
        &ThreadDispatcher::new(threads),
        direction,
        settings.sweep_oversubscription,
        &mut data,
    );
    data
}

proptest! {
    #[test]
    fn sweep_matches_all_pairs_oracle(worlds in worlds(), threads in 1usize..5) {
        let mut data = run_broad_phase(&worlds, threads);
        for (world, boxes) in worlds.iter().enumerate() {
            let pairs = data.overlap_pairs(world).to_vec();
            let found: BTreeSet<OverlapPair> = pairs.iter().copied().collect();
            prop_assert_eq!(found.len(), pairs.len(), "duplicate pair in world {}", world);
            prop_assert!(pairs.iter().all(|p| p.a < p.b));
            prop_assert_eq!(found, brute_force(boxes));
            prop_assert_eq!(data.dropped_overlaps(world), 0);
        }
    }

    #[test]
    fn any_sweep_direction_finds_the_same_pairs(
        worlds in worlds(),
        direction in sweep_direction(),
        threads in 1usize..4,
    ) {
        let mut data = sweep(&worlds, threads, direction);
        for (world, boxes) in worlds.iter().enumerate() {
            let found: BTreeSet<OverlapPair> = data.overlap_pairs(world).iter().copied().collect();
            prop_assert_eq!(found.len(), data.overlap_pairs(world).len());
            prop_assert_eq!(found, brute_force(boxes), "direction {:?}", direction);
        }
    }

    #[test]
    fn worlds_never_see_each_other(boxes in prop::collection::vec(bounding_box(), 2..16)) {
        let n = boxes.len();
        let reversed: Vec<BoundingBox> = boxes.iter().rev().copied().collect();
        let scattered: Vec<BoundingBox> = (0..n)
            .map(|i| BoundingBox::new(Vec3::new(10.0 * i as f32, 0.0, 0.0), Vec3::splat(0.5)))
            .collect();
        let mut data = run_broad_phase(&[boxes.clone(), reversed, scattered], 2);

        let expected = brute_force(&boxes);
        let first: BTreeSet<OverlapPair> = data.overlap_pairs(0).iter().copied().collect();
        let second: BTreeSet<OverlapPair> = data
            .overlap_pairs(1)
            .iter()
            .map(|p| OverlapPair::new(n - 1 - p.a, n - 1 - p.b))
            .collect();
        prop_assert_eq!(&first, &expected);
        prop_assert_eq!(&second, &expected);
        prop_assert!(data.overlap_pairs(2).is_empty());
    }
}

#[test]
fn distant_boxes_are_pruned_before_the_narrow_phase() {
    let mut builder = ModelBuilder::new();
    let a = builder.add_body();
    let b = builder.add_body();
    builder.add_geom(GeomDescription::cuboid(a, Vec3::ONE));
    builder.add_geom(GeomDescription::cuboid(b, Vec3::ONE));
    let model = builder.build().unwrap();

    let pipeline = CollisionPipeline::new(CollisionSettings::default()).unwrap();
    let mut data = pipeline.create_data(&model, 1).unwrap();
    data.set_geom_pose(0, 1, Vec3::new(100.0, 0.0, 0.0), Mat3::IDENTITY)
        .unwrap();
    let report = pipeline.step(&model, &mut data).unwrap();
    assert_eq!(report.overlaps, vec![0]);
    assert_eq!(report.work_packages, 0);
    assert_eq!(report.candidates, 0);
    assert_eq!(report.total_contacts(), 0);
}

#[test]
fn overlap_buffer_overflow_is_counted() {
    let mut builder = ModelBuilder::new();
    for _ in 0..7 {
        let body = builder.add_body();
        builder.add_geom(GeomDescription::sphere(body, 1.0));
    }
    let model = builder.build().unwrap();
    let pipeline = CollisionPipeline::new(CollisionSettings {
        max_overlaps_per_world: 16,
        ..Default::default()
    })
    .unwrap();
    let mut data = pipeline.create_data(&model, 2).unwrap();
    for world in 0..2 {
        for geom in 0..7 {
            let position = Vec3::new(0.1 * geom as f32, 0.0, 0.0);
            data.set_geom_pose(world, geom, position, Mat3::IDENTITY).unwrap();
        }
    }
    let report = pipeline.step(&model, &mut data).unwrap();
    assert_eq!(report.overlaps, vec![16, 16]);
    assert_eq!(report.dropped_overlaps, vec![5, 5]);
    assert!(report.overlap_overflowed());
    let stored = data.overlap_pairs(1);
    assert_eq!(stored.len(), 16);
    assert!(stored.iter().all(|p| p.a < p.b && p.b < 7));
}
